//! Business logic use cases
//!
//! ```text
//! QR / NFC / nearby discovery
//!         ↓
//! RequestInbox::receive        → pending list, badge count
//!         ↓
//! ConsentOrchestrator::open    → wizard + countdown
//!         ↓
//! ConsentOutcomePort           → RequestInbox (status) → ConnectionLedger (grant)
//! ```

pub mod avatar;
pub mod connections;
pub mod consent;
pub mod requests;
pub mod templates;
