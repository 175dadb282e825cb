use serde::{Deserialize, Serialize};

use crate::consent::request::PermissionSet;
use crate::ids::RequestId;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Lifetime a responder grants to an approved connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationClass {
    OneDay,
    #[default]
    SevenDays,
    ThirtyDays,
    Permanent,
}

impl DurationClass {
    pub const ALL: [DurationClass; 4] = [
        DurationClass::OneDay,
        DurationClass::SevenDays,
        DurationClass::ThirtyDays,
        DurationClass::Permanent,
    ];

    /// `None` for [`DurationClass::Permanent`].
    pub fn duration_ms(&self) -> Option<i64> {
        match self {
            DurationClass::OneDay => Some(DAY_MS),
            DurationClass::SevenDays => Some(7 * DAY_MS),
            DurationClass::ThirtyDays => Some(30 * DAY_MS),
            DurationClass::Permanent => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DurationClass::OneDay => "1 Day",
            DurationClass::SevenDays => "7 Days",
            DurationClass::ThirtyDays => "30 Days",
            DurationClass::Permanent => "Permanent",
        }
    }

    pub fn expires_at_ms(&self, from_ms: i64) -> Option<i64> {
        self.duration_ms().map(|d| from_ms.saturating_add(d))
    }
}

/// Result of a fully confirmed approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantedConnection {
    pub request_id: RequestId,
    pub permissions: PermissionSet,
    pub duration_class: DurationClass,
    pub approved_at_ms: i64,
    pub effective_expires_at_ms: Option<i64>,
}

impl GrantedConnection {
    pub fn new(
        request_id: RequestId,
        permissions: PermissionSet,
        duration_class: DurationClass,
        approved_at_ms: i64,
    ) -> Self {
        Self {
            request_id,
            permissions,
            duration_class,
            approved_at_ms,
            effective_expires_at_ms: duration_class.expires_at_ms(approved_at_ms),
        }
    }
}

/// Canned rejection reasons offered on the confirm screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    UnknownPerson,
    NotInterested,
    Suspicious,
    PrivacyConcerns,
    Other,
    Custom(String),
}

impl RejectReason {
    pub const CANNED: [RejectReason; 5] = [
        RejectReason::UnknownPerson,
        RejectReason::NotInterested,
        RejectReason::Suspicious,
        RejectReason::PrivacyConcerns,
        RejectReason::Other,
    ];

    pub fn label(&self) -> &str {
        match self {
            RejectReason::UnknownPerson => "I don't know this person",
            RejectReason::NotInterested => "Not interested in connecting",
            RejectReason::Suspicious => "Suspicious request",
            RejectReason::PrivacyConcerns => "Privacy concerns",
            RejectReason::Other => "Other",
            RejectReason::Custom(text) => text.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub request_id: RequestId,
    /// Empty when the responder picked no reason.
    pub reason: String,
    pub blocked: bool,
    pub responded_at_ms: i64,
}

/// The single terminal emission of a consent flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentOutcome {
    Approved(GrantedConnection),
    Rejected(RejectionRecord),
    Blocked(RejectionRecord),
}

impl ConsentOutcome {
    pub fn request_id(&self) -> &RequestId {
        match self {
            ConsentOutcome::Approved(grant) => &grant.request_id,
            ConsentOutcome::Rejected(record) | ConsentOutcome::Blocked(record) => {
                &record.request_id
            }
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ConsentOutcome::Approved(_))
    }
}
