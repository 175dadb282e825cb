//! Consent flow state machine
//!
//! Explicit wizard that turns one pending [`ConsentRequest`] into an approval
//! or a rejection. Transitions are a pure function
//! `(state, event, now) -> (new_state, actions[])`; the host executes the
//! returned actions (start/stop the countdown, deliver the outcome).
//!
//! ```text
//! Review ──approve──▶ SetPermissions ──continue──▶ Confirm(Approve) ──confirm──▶ Completed
//!   │  ▲                    │                            │
//!   │  └──────back──────────┘◀───────────back────────────┘
//!   └──reject──▶ Confirm(Reject) ──confirm / block──▶ Completed
//!
//! any non-terminal state ──ttl reaches 0──▶ Expired
//! ```
//!
//! `ApplyTemplate` replaces the draft wholesale: from `Review` it also moves
//! to `SetPermissions`, so a saved preset can be reviewed before confirming.

use serde::{Deserialize, Serialize};

use crate::consent::outcome::{
    ConsentOutcome, DurationClass, GrantedConnection, RejectReason, RejectionRecord,
};
use crate::consent::request::{ConsentRequest, PermissionKind, PermissionSet};
use crate::ids::RequestId;

/// Which decision led to the confirm step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmBranch {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentState {
    /// Requester identity, message and privacy notice.
    Review,
    /// Permission toggles and duration picker (approve branch only).
    SetPermissions,
    /// Summary before approval, or reason picker before rejection.
    Confirm { branch: ConfirmBranch },
    /// Terminal. The outcome has been emitted.
    Completed { outcome: ConsentOutcome },
    /// Terminal. TTL reached zero before completion; nothing is emitted.
    Expired,
}

impl ConsentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConsentState::Completed { .. } | ConsentState::Expired)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConsentState::Review => "review",
            ConsentState::SetPermissions => "set_permissions",
            ConsentState::Confirm {
                branch: ConfirmBranch::Approve,
            } => "confirm_approve",
            ConsentState::Confirm {
                branch: ConfirmBranch::Reject,
            } => "confirm_reject",
            ConsentState::Completed { .. } => "completed",
            ConsentState::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentEvent {
    ChooseApprove,
    ChooseReject,
    /// Reveal or hide the extended request metadata. Never changes the step.
    ToggleDetails,
    TogglePermission { kind: PermissionKind },
    SelectDuration { duration_class: DurationClass },
    /// Replace the permissions and duration with a saved preset.
    ApplyTemplate { draft: PermissionDraft },
    Back,
    Continue,
    ConfirmApproval,
    SelectRejectReason { reason: Option<RejectReason> },
    ConfirmRejection,
    BlockAndReject,
    /// Countdown reached zero.
    Expire,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentAction {
    StartCountdown {
        request_id: RequestId,
        expires_at_ms: i64,
    },
    StopCountdown {
        request_id: RequestId,
    },
    /// Deliver the outcome to the host. Produced at most once per machine.
    EmitOutcome { outcome: ConsentOutcome },
    LogTransition {
        request_id: RequestId,
        old_state: String,
        event: String,
        new_state: String,
    },
}

/// Permissions and duration being edited on the approve branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDraft {
    pub permissions: PermissionSet,
    pub duration_class: DurationClass,
}

#[derive(Debug, Clone, Default)]
pub struct ConsentFlowPolicy {
    pub default_duration: DurationClass,
}

/// Consent flow for a single request.
///
/// # Example
///
/// ```
/// use lk_core::consent::{
///     ConsentEvent, ConsentFlowMachine, ConsentFlowPolicy, ConsentRequest, ConsentState,
///     PermissionSet, RequesterProfile, SourceChannel,
/// };
/// use std::time::Duration;
///
/// let request = ConsentRequest::with_ttl(
///     RequesterProfile::new("Mike Johnson", "+1 (555) 456-XXXX", "MJ"),
///     None,
///     0,
///     Duration::from_secs(300),
///     SourceChannel::QrScan,
///     PermissionSet::new(true, true, false),
/// )
/// .unwrap();
/// let (mut machine, _actions) = ConsentFlowMachine::open(request, ConsentFlowPolicy::default(), 0);
/// let (state, _) = machine.handle_event(ConsentEvent::ChooseApprove, 1_000);
/// assert_eq!(state, ConsentState::SetPermissions);
/// ```
#[derive(Debug, Clone)]
pub struct ConsentFlowMachine {
    state: ConsentState,
    request: ConsentRequest,
    draft: PermissionDraft,
    reject_reason: Option<RejectReason>,
    show_details: bool,
}

impl ConsentFlowMachine {
    /// Mounts the flow. A request that is already past its expiry opens
    /// directly in [`ConsentState::Expired`] and never starts a countdown.
    pub fn open(
        request: ConsentRequest,
        policy: ConsentFlowPolicy,
        now_ms: i64,
    ) -> (Self, Vec<ConsentAction>) {
        let draft = PermissionDraft {
            permissions: request.requested_permissions(),
            duration_class: policy.default_duration,
        };
        let expired = request.is_expired_at(now_ms);
        let state = if expired {
            ConsentState::Expired
        } else {
            ConsentState::Review
        };
        let actions = if expired {
            Vec::new()
        } else {
            vec![ConsentAction::StartCountdown {
                request_id: request.id().clone(),
                expires_at_ms: request.expires_at_ms(),
            }]
        };

        (
            Self {
                state,
                request,
                draft,
                reject_reason: None,
                show_details: false,
            },
            actions,
        )
    }

    pub fn state(&self) -> &ConsentState {
        &self.state
    }

    pub fn request(&self) -> &ConsentRequest {
        &self.request
    }

    pub fn draft(&self) -> &PermissionDraft {
        &self.draft
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        self.reject_reason.as_ref()
    }

    pub fn show_details(&self) -> bool {
        self.show_details
    }

    /// Whether `Continue` is enabled on the permissions step.
    pub fn can_continue(&self) -> bool {
        self.draft.permissions.allows_contact()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Handles an event and returns the new state plus the actions to run.
    ///
    /// The first action is always a [`ConsentAction::LogTransition`].
    pub fn handle_event(
        &mut self,
        event: ConsentEvent,
        now_ms: i64,
    ) -> (ConsentState, Vec<ConsentAction>) {
        let old_state = self.state.name();
        let event_debug = format!("{:?}", event);

        let actions = self.transition(event, now_ms);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            request_id = %self.request.id(),
            from = old_state,
            to = self.state.name(),
            event = %event_debug,
            "consent flow transition"
        );

        let mut all_actions = vec![ConsentAction::LogTransition {
            request_id: self.request.id().clone(),
            old_state: old_state.to_string(),
            event: event_debug,
            new_state: self.state.name().to_string(),
        }];
        all_actions.extend(actions);

        (self.state.clone(), all_actions)
    }

    fn transition(&mut self, event: ConsentEvent, now_ms: i64) -> Vec<ConsentAction> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        if event == ConsentEvent::Expire || self.request.is_expired_at(now_ms) {
            return self.expire();
        }

        match (self.state.clone(), event) {
            (ConsentState::Review, ConsentEvent::ChooseApprove) => {
                self.state = ConsentState::SetPermissions;
                Vec::new()
            }
            (ConsentState::Review, ConsentEvent::ChooseReject) => {
                self.state = ConsentState::Confirm {
                    branch: ConfirmBranch::Reject,
                };
                Vec::new()
            }
            (ConsentState::Review, ConsentEvent::ApplyTemplate { draft })
            | (ConsentState::SetPermissions, ConsentEvent::ApplyTemplate { draft }) => {
                self.draft = draft;
                self.state = ConsentState::SetPermissions;
                Vec::new()
            }
            (ConsentState::Review, ConsentEvent::ToggleDetails) => {
                self.show_details = !self.show_details;
                Vec::new()
            }
            (ConsentState::SetPermissions, ConsentEvent::TogglePermission { kind }) => {
                self.draft.permissions.toggle(kind);
                Vec::new()
            }
            (ConsentState::SetPermissions, ConsentEvent::SelectDuration { duration_class }) => {
                self.draft.duration_class = duration_class;
                Vec::new()
            }
            (ConsentState::SetPermissions, ConsentEvent::Back) => {
                self.state = ConsentState::Review;
                Vec::new()
            }
            (ConsentState::SetPermissions, ConsentEvent::Continue) => {
                if self.can_continue() {
                    self.state = ConsentState::Confirm {
                        branch: ConfirmBranch::Approve,
                    };
                }
                Vec::new()
            }
            (
                ConsentState::Confirm {
                    branch: ConfirmBranch::Approve,
                },
                ConsentEvent::Back,
            ) => {
                self.state = ConsentState::SetPermissions;
                Vec::new()
            }
            (
                ConsentState::Confirm {
                    branch: ConfirmBranch::Approve,
                },
                ConsentEvent::ConfirmApproval,
            ) => {
                let grant = GrantedConnection::new(
                    self.request.id().clone(),
                    self.draft.permissions,
                    self.draft.duration_class,
                    now_ms,
                );
                self.complete(ConsentOutcome::Approved(grant))
            }
            (
                ConsentState::Confirm {
                    branch: ConfirmBranch::Reject,
                },
                ConsentEvent::SelectRejectReason { reason },
            ) => {
                self.reject_reason = reason;
                Vec::new()
            }
            (
                ConsentState::Confirm {
                    branch: ConfirmBranch::Reject,
                },
                ConsentEvent::Back,
            ) => {
                self.state = ConsentState::Review;
                Vec::new()
            }
            (
                ConsentState::Confirm {
                    branch: ConfirmBranch::Reject,
                },
                ConsentEvent::ConfirmRejection,
            ) => {
                let record = self.rejection_record(false, now_ms);
                self.complete(ConsentOutcome::Rejected(record))
            }
            (
                ConsentState::Confirm {
                    branch: ConfirmBranch::Reject,
                },
                ConsentEvent::BlockAndReject,
            ) => {
                let record = self.rejection_record(true, now_ms);
                self.complete(ConsentOutcome::Blocked(record))
            }
            // Anything else is not offered by the current step.
            _ => Vec::new(),
        }
    }

    fn rejection_record(&self, blocked: bool, now_ms: i64) -> RejectionRecord {
        RejectionRecord {
            request_id: self.request.id().clone(),
            reason: self
                .reject_reason
                .as_ref()
                .map(|r| r.label().to_string())
                .unwrap_or_default(),
            blocked,
            responded_at_ms: now_ms,
        }
    }

    fn complete(&mut self, outcome: ConsentOutcome) -> Vec<ConsentAction> {
        self.state = ConsentState::Completed {
            outcome: outcome.clone(),
        };
        vec![
            ConsentAction::StopCountdown {
                request_id: self.request.id().clone(),
            },
            ConsentAction::EmitOutcome { outcome },
        ]
    }

    fn expire(&mut self) -> Vec<ConsentAction> {
        self.state = ConsentState::Expired;
        vec![ConsentAction::StopCountdown {
            request_id: self.request.id().clone(),
        }]
    }
}
