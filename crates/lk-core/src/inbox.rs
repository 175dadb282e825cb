//! Host-side records for inbound requests.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consent::{ConsentOutcome, ConsentRequest, PermissionSet};
use crate::ids::RequestId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxStatus {
    Pending,
    Approved,
    Rejected,
    Blocked,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxFilter {
    All,
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl InboxFilter {
    pub fn matches(&self, status: InboxStatus) -> bool {
        match self {
            InboxFilter::All => true,
            InboxFilter::Pending => status == InboxStatus::Pending,
            InboxFilter::Approved => status == InboxStatus::Approved,
            InboxFilter::Rejected => status == InboxStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InboxError {
    #[error("request {0} is already in the inbox")]
    Duplicate(RequestId),

    #[error("requester {0} is blocked")]
    RequesterBlocked(String),

    #[error("request not found: {0}")]
    NotFound(RequestId),

    #[error("request {0} has already been answered")]
    AlreadySettled(RequestId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxEntry {
    pub request: ConsentRequest,
    pub status: InboxStatus,
    pub responded_at_ms: Option<i64>,
    pub approved_permissions: Option<PermissionSet>,
    pub rejection_reason: Option<String>,
}

impl InboxEntry {
    pub fn pending(request: ConsentRequest) -> Self {
        Self {
            request,
            status: InboxStatus::Pending,
            responded_at_ms: None,
            approved_permissions: None,
            rejection_reason: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == InboxStatus::Pending
    }

    /// Records the terminal outcome of the consent flow on this entry.
    pub fn apply_outcome(&mut self, outcome: &ConsentOutcome) {
        match outcome {
            ConsentOutcome::Approved(grant) => {
                self.status = InboxStatus::Approved;
                self.approved_permissions = Some(grant.permissions);
                self.responded_at_ms = Some(grant.approved_at_ms);
            }
            ConsentOutcome::Rejected(record) => {
                self.status = InboxStatus::Rejected;
                self.rejection_reason = Some(record.reason.clone());
                self.responded_at_ms = Some(record.responded_at_ms);
            }
            ConsentOutcome::Blocked(record) => {
                self.status = InboxStatus::Blocked;
                self.responded_at_ms = Some(record.responded_at_ms);
            }
        }
    }
}
