use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::RequestId;

/// How a request reached this device. Presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceChannel {
    QrScan,
    NearbyProximity,
    NfcTap,
    Manual,
}

impl SourceChannel {
    pub fn label(&self) -> &'static str {
        match self {
            SourceChannel::QrScan => "QR Code Scan",
            SourceChannel::NearbyProximity => "Nearby Discovery",
            SourceChannel::NfcTap => "NFC Tap",
            SourceChannel::Manual => "Manual Request",
        }
    }
}

/// One capability flag of a [`PermissionSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    Call,
    Message,
    ShareProfile,
}

/// Capabilities granted over a masked number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PermissionSet {
    pub can_call: bool,
    pub can_message: bool,
    pub can_share_profile: bool,
}

impl PermissionSet {
    pub fn new(can_call: bool, can_message: bool, can_share_profile: bool) -> Self {
        Self {
            can_call,
            can_message,
            can_share_profile,
        }
    }

    pub fn get(&self, kind: PermissionKind) -> bool {
        match kind {
            PermissionKind::Call => self.can_call,
            PermissionKind::Message => self.can_message,
            PermissionKind::ShareProfile => self.can_share_profile,
        }
    }

    pub fn toggle(&mut self, kind: PermissionKind) {
        match kind {
            PermissionKind::Call => self.can_call = !self.can_call,
            PermissionKind::Message => self.can_message = !self.can_message,
            PermissionKind::ShareProfile => self.can_share_profile = !self.can_share_profile,
        }
    }

    /// A connection needs at least one contact channel; profile sharing alone is not one.
    pub fn allows_contact(&self) -> bool {
        self.can_call || self.can_message
    }
}

/// Presentation strings describing who is asking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterProfile {
    pub display_name: String,
    pub masked_id: String,
    pub avatar_initials: String,
}

impl RequesterProfile {
    pub fn new(
        display_name: impl Into<String>,
        masked_id: impl Into<String>,
        avatar_initials: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            masked_id: masked_id.into(),
            avatar_initials: avatar_initials.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsentRequestError {
    #[error("request expiry {expires_at_ms} is not after creation {created_at_ms}")]
    ExpiryNotAfterCreation {
        created_at_ms: i64,
        expires_at_ms: i64,
    },
}

/// An inbound request to establish a masked-contact connection.
///
/// All fields are fixed at creation. The value lives in memory only and is
/// dropped by its host once the flow reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawConsentRequest")]
pub struct ConsentRequest {
    id: RequestId,
    requester: RequesterProfile,
    message: Option<String>,
    created_at_ms: i64,
    expires_at_ms: i64,
    source_channel: SourceChannel,
    requested_permissions: PermissionSet,
}

/// Wire shape of [`ConsentRequest`]; deserialization goes through
/// [`ConsentRequest::new`] so decoded requests hold the same invariants.
#[derive(Deserialize)]
struct RawConsentRequest {
    id: RequestId,
    requester: RequesterProfile,
    message: Option<String>,
    created_at_ms: i64,
    expires_at_ms: i64,
    source_channel: SourceChannel,
    requested_permissions: PermissionSet,
}

impl TryFrom<RawConsentRequest> for ConsentRequest {
    type Error = ConsentRequestError;

    fn try_from(raw: RawConsentRequest) -> Result<Self, Self::Error> {
        Self::new(
            raw.id,
            raw.requester,
            raw.message,
            raw.created_at_ms,
            raw.expires_at_ms,
            raw.source_channel,
            raw.requested_permissions,
        )
    }
}

impl ConsentRequest {
    pub fn new(
        id: RequestId,
        requester: RequesterProfile,
        message: Option<String>,
        created_at_ms: i64,
        expires_at_ms: i64,
        source_channel: SourceChannel,
        requested_permissions: PermissionSet,
    ) -> Result<Self, ConsentRequestError> {
        if expires_at_ms <= created_at_ms {
            return Err(ConsentRequestError::ExpiryNotAfterCreation {
                created_at_ms,
                expires_at_ms,
            });
        }

        Ok(Self {
            id,
            requester,
            message: message.filter(|m| !m.trim().is_empty()),
            created_at_ms,
            expires_at_ms,
            source_channel,
            requested_permissions,
        })
    }

    /// Creates a request with a fresh id that expires `ttl` after `created_at_ms`.
    pub fn with_ttl(
        requester: RequesterProfile,
        message: Option<String>,
        created_at_ms: i64,
        ttl: Duration,
        source_channel: SourceChannel,
        requested_permissions: PermissionSet,
    ) -> Result<Self, ConsentRequestError> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self::new(
            RequestId::new(),
            requester,
            message,
            created_at_ms,
            created_at_ms.saturating_add(ttl_ms),
            source_channel,
            requested_permissions,
        )
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn requester(&self) -> &RequesterProfile {
        &self.requester
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }

    pub fn expires_at_ms(&self) -> i64 {
        self.expires_at_ms
    }

    pub fn source_channel(&self) -> SourceChannel {
        self.source_channel
    }

    pub fn requested_permissions(&self) -> PermissionSet {
        self.requested_permissions
    }

    pub fn remaining_ms(&self, now_ms: i64) -> u64 {
        super::countdown::remaining_ms(self.expires_at_ms, now_ms)
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.remaining_ms(now_ms) == 0
    }

    /// Short id shown in the extended details: first 8 characters and an ellipsis.
    pub fn id_fragment(&self) -> String {
        let head: String = self.id.as_str().chars().take(8).collect();
        format!("{head}...")
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.created_at_ms).single()
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.expires_at_ms).single()
    }
}
