//! Approved masked-contact connections and their lifetime.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consent::{ConsentRequest, DurationClass, GrantedConnection, PermissionSet};
use crate::ids::{ConnectionId, RequestId};

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Active,
    Expired,
    Revoked,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("connection not found: {0}")]
    NotFound(ConnectionId),

    #[error("connection {0} was revoked and cannot be changed")]
    Revoked(ConnectionId),

    #[error("permissions must allow calls or messages")]
    NoContactChannel,
}

/// Status filter of the connection management screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionFilter {
    #[default]
    All,
    Active,
    Expired,
    Revoked,
}

impl ConnectionFilter {
    pub fn matches(&self, status: ConnectionStatus) -> bool {
        match self {
            ConnectionFilter::All => true,
            ConnectionFilter::Active => status == ConnectionStatus::Active,
            ConnectionFilter::Expired => status == ConnectionStatus::Expired,
            ConnectionFilter::Revoked => status == ConnectionStatus::Revoked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub request_id: RequestId,
    pub display_name: String,
    pub masked_id: String,
    pub avatar_initials: String,
    pub permissions: PermissionSet,
    pub duration_class: DurationClass,
    pub approved_at_ms: i64,
    /// `None` for permanent connections.
    pub expires_at_ms: Option<i64>,
    pub status: ConnectionStatus,
    pub revoked_at_ms: Option<i64>,
    pub renewed_at_ms: Option<i64>,
}

impl Connection {
    pub fn from_grant(request: &ConsentRequest, grant: &GrantedConnection) -> Self {
        let requester = request.requester();
        Self {
            id: ConnectionId::new(),
            request_id: grant.request_id.clone(),
            display_name: requester.display_name.clone(),
            masked_id: requester.masked_id.clone(),
            avatar_initials: requester.avatar_initials.clone(),
            permissions: grant.permissions,
            duration_class: grant.duration_class,
            approved_at_ms: grant.approved_at_ms,
            expires_at_ms: grant.effective_expires_at_ms,
            status: ConnectionStatus::Active,
            revoked_at_ms: None,
            renewed_at_ms: None,
        }
    }

    pub fn is_past_expiry(&self, now_ms: i64) -> bool {
        self.expires_at_ms.is_some_and(|at| at <= now_ms)
    }

    pub fn revoke(&mut self, now_ms: i64) {
        self.status = ConnectionStatus::Revoked;
        self.revoked_at_ms = Some(now_ms);
    }

    /// Reactivates the connection for `renew_ms` from `now_ms`.
    pub fn renew(&mut self, now_ms: i64, renew_ms: i64) -> Result<(), ConnectionError> {
        if self.status == ConnectionStatus::Revoked {
            return Err(ConnectionError::Revoked(self.id.clone()));
        }
        self.status = ConnectionStatus::Active;
        self.expires_at_ms = Some(now_ms.saturating_add(renew_ms));
        self.renewed_at_ms = Some(now_ms);
        Ok(())
    }

    /// Marks an active connection expired once its lifetime has passed.
    /// Returns whether the status changed.
    pub fn refresh_status(&mut self, now_ms: i64) -> bool {
        if self.status == ConnectionStatus::Active && self.is_past_expiry(now_ms) {
            self.status = ConnectionStatus::Expired;
            return true;
        }
        false
    }

    /// Replaces the granted permissions of a live connection.
    pub fn update_permissions(&mut self, permissions: PermissionSet) -> Result<(), ConnectionError> {
        if self.status == ConnectionStatus::Revoked {
            return Err(ConnectionError::Revoked(self.id.clone()));
        }
        if !permissions.allows_contact() {
            return Err(ConnectionError::NoContactChannel);
        }
        self.permissions = permissions;
        Ok(())
    }

    /// Case-insensitive match on the display name, or a plain substring of
    /// the masked number. An empty query matches everything.
    pub fn matches_search(&self, query: &str) -> bool {
        let query = query.trim();
        query.is_empty()
            || self
                .display_name
                .to_lowercase()
                .contains(&query.to_lowercase())
            || self.masked_id.contains(query)
    }

    pub fn time_left_label(&self, now_ms: i64) -> String {
        match self.expires_at_ms {
            Some(at) => format_time_left(at, now_ms),
            None => "No expiry".to_string(),
        }
    }
}

/// Coarse remaining lifetime: `"2d 5h remaining"`, `"5h remaining"` or `"Expired"`.
pub fn format_time_left(expires_at_ms: i64, now_ms: i64) -> String {
    let remaining = expires_at_ms.saturating_sub(now_ms);
    if remaining <= 0 {
        return "Expired".to_string();
    }

    let days = remaining / DAY_MS;
    let hours = (remaining % DAY_MS) / HOUR_MS;
    if days > 0 {
        format!("{days}d {hours}h remaining")
    } else {
        format!("{hours}h remaining")
    }
}
