//! # lk-core
//!
//! Core domain models and consent flow logic for Linkaroo.
//!
//! This crate contains pure business logic without any infrastructure dependencies.

// Public module exports
pub mod avatar;
pub mod connection;
pub mod consent;
pub mod ids;
pub mod inbox;
pub mod ports;
pub mod settings;
pub mod template;

// Re-export commonly used types at the crate root
pub use avatar::AvatarImage;
pub use connection::{Connection, ConnectionFilter, ConnectionStatus};
pub use consent::{
    ConsentAction, ConsentEvent, ConsentFlowMachine, ConsentOutcome, ConsentRequest, ConsentState,
    DurationClass, GrantedConnection, PermissionSet, RejectionRecord, SourceChannel,
};
pub use ids::{ConnectionId, RequestId, TemplateId};
pub use settings::model::Settings;
pub use template::ConnectionTemplate;
