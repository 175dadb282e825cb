//! Consent domain: inbound requests, the approval wizard and its outcomes.

pub mod countdown;
pub mod outcome;
pub mod request;
pub mod state_machine;

pub use countdown::{format_countdown, remaining_ms};
pub use outcome::{ConsentOutcome, DurationClass, GrantedConnection, RejectReason, RejectionRecord};
pub use request::{
    ConsentRequest, ConsentRequestError, PermissionKind, PermissionSet, RequesterProfile,
    SourceChannel,
};
pub use state_machine::{
    ConfirmBranch, ConsentAction, ConsentEvent, ConsentFlowMachine, ConsentFlowPolicy,
    ConsentState, PermissionDraft,
};
