//! Linkaroo Application Orchestration Layer
//!
//! This crate contains the consent flow orchestration and the host-side use
//! cases that own request and connection collections.

pub mod usecases;

pub use usecases::consent::{
    ConsentConfig, ConsentFlowError, ConsentFlowSnapshot, ConsentOrchestrator, ExpiryTimer,
};
pub use usecases::connections::{BulkReport, ConnectionLedger};
pub use usecases::requests::RequestInbox;
pub use usecases::templates::TemplateStore;
pub use usecases::avatar::{AvatarLookup, LoadAvatar, RemoveAvatar, UpdateAvatar};
