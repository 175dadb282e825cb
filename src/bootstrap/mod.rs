pub mod config;
pub mod tracing;
pub mod wiring;

pub use config::load_settings;
pub use wiring::{wire_dependencies, AppPaths, LinkarooRuntime, WiringError};
