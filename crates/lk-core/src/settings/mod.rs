//! Application settings model.

pub mod defaults;
pub mod model;
