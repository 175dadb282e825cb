//! Port interfaces for the application layer
//!
//! Ports define the contract between the use cases and infrastructure
//! implementations, so the consent logic stays independent of storage,
//! clocks and the host screen.

mod avatar_encoder;
mod avatar_store;
mod clock;
mod consent_outcome;
pub mod settings;

pub use avatar_encoder::AvatarEncoderPort;
pub use avatar_store::{AvatarStoreError, AvatarStorePort};
pub use clock::ClockPort;
pub use consent_outcome::ConsentOutcomePort;
pub use settings::SettingsPort;
