pub mod expiry_timer;
pub mod orchestrator;

pub use expiry_timer::ExpiryTimer;
pub use orchestrator::{ConsentConfig, ConsentFlowError, ConsentFlowSnapshot, ConsentOrchestrator};
