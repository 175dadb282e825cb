use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use lk_core::{
    consent::{ConsentOutcome, ConsentRequest, GrantedConnection, RejectionRecord},
    inbox::{InboxEntry, InboxError, InboxFilter, InboxStatus},
    ports::ConsentOutcomePort,
    RequestId,
};

use crate::usecases::connections::ConnectionLedger;

#[derive(Default)]
struct InboxState {
    /// Newest first
    entries: VecDeque<InboxEntry>,
    /// Masked ids whose requests are refused
    blocked: HashSet<String>,
}

/// Host collection of inbound consent requests.
///
/// Doubles as the [`ConsentOutcomePort`] for flows opened on its entries:
/// approvals land in the [`ConnectionLedger`], blocks feed the block list.
pub struct RequestInbox {
    ledger: Arc<ConnectionLedger>,
    state: RwLock<InboxState>,
}

impl RequestInbox {
    pub fn new(ledger: Arc<ConnectionLedger>) -> Self {
        Self {
            ledger,
            state: RwLock::new(InboxState::default()),
        }
    }

    pub async fn receive(&self, request: ConsentRequest) -> Result<InboxEntry, InboxError> {
        let mut state = self.state.write().await;
        let masked_id = &request.requester().masked_id;
        if state.blocked.contains(masked_id) {
            tracing::warn!(
                request_id = %request.id(),
                "request from blocked requester refused"
            );
            return Err(InboxError::RequesterBlocked(masked_id.clone()));
        }
        if state
            .entries
            .iter()
            .any(|entry| entry.request.id() == request.id())
        {
            return Err(InboxError::Duplicate(request.id().clone()));
        }

        tracing::info!(
            request_id = %request.id(),
            source = request.source_channel().label(),
            "consent request received"
        );
        let entry = InboxEntry::pending(request);
        state.entries.push_front(entry.clone());
        Ok(entry)
    }

    pub async fn list(&self, filter: InboxFilter) -> Vec<InboxEntry> {
        self.state
            .read()
            .await
            .entries
            .iter()
            .filter(|entry| filter.matches(entry.status))
            .cloned()
            .collect()
    }

    pub async fn pending_count(&self) -> usize {
        self.state
            .read()
            .await
            .entries
            .iter()
            .filter(|entry| entry.status == InboxStatus::Pending)
            .count()
    }

    pub async fn get(&self, id: &RequestId) -> Option<InboxEntry> {
        self.state
            .read()
            .await
            .entries
            .iter()
            .find(|entry| entry.request.id() == id)
            .cloned()
    }

    pub async fn is_blocked(&self, masked_id: &str) -> bool {
        self.state.read().await.blocked.contains(masked_id)
    }

    /// Pending entries whose request has expired become [`InboxStatus::Expired`].
    pub async fn sweep_expired(&self, now_ms: i64) -> usize {
        let mut state = self.state.write().await;
        let mut expired = 0;
        for entry in state.entries.iter_mut() {
            if entry.status == InboxStatus::Pending && entry.request.is_expired_at(now_ms) {
                entry.status = InboxStatus::Expired;
                expired += 1;
            }
        }
        if expired > 0 {
            tracing::debug!(expired, "pending requests expired");
        }
        expired
    }

    /// Forgets one entry regardless of its status.
    pub async fn remove(&self, id: &RequestId) -> Option<InboxEntry> {
        let mut state = self.state.write().await;
        let index = state
            .entries
            .iter()
            .position(|entry| entry.request.id() == id)?;
        state.entries.remove(index)
    }

    /// Drops every entry that is no longer pending. Returns how many went.
    pub async fn clear_settled(&self) -> usize {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(InboxEntry::is_pending);
        let cleared = before - state.entries.len();
        if cleared > 0 {
            tracing::debug!(cleared, "settled requests cleared");
        }
        cleared
    }

    /// Applies `outcome` to its pending entry and returns the updated entry.
    ///
    /// Each request is answered once; outcomes for entries that were already
    /// answered or expired are refused.
    async fn settle(&self, outcome: &ConsentOutcome) -> Result<InboxEntry, InboxError> {
        let mut state = self.state.write().await;
        let entry = state
            .entries
            .iter_mut()
            .find(|entry| entry.request.id() == outcome.request_id())
            .ok_or_else(|| InboxError::NotFound(outcome.request_id().clone()))?;
        if !entry.is_pending() {
            tracing::warn!(
                request_id = %outcome.request_id(),
                status = ?entry.status,
                "outcome for an answered request refused"
            );
            return Err(InboxError::AlreadySettled(outcome.request_id().clone()));
        }
        entry.apply_outcome(outcome);
        let settled = entry.clone();

        if let ConsentOutcome::Blocked(_) = outcome {
            state
                .blocked
                .insert(settled.request.requester().masked_id.clone());
        }
        Ok(settled)
    }
}

#[async_trait]
impl ConsentOutcomePort for RequestInbox {
    async fn on_approve(&self, grant: GrantedConnection) -> anyhow::Result<()> {
        let outcome = ConsentOutcome::Approved(grant.clone());
        let entry = self.settle(&outcome).await?;
        self.ledger.record(&entry.request, &grant).await;
        Ok(())
    }

    async fn on_reject(&self, record: RejectionRecord) -> anyhow::Result<()> {
        self.settle(&ConsentOutcome::Rejected(record)).await?;
        Ok(())
    }

    async fn on_block(&self, record: RejectionRecord) -> anyhow::Result<()> {
        let entry = self.settle(&ConsentOutcome::Blocked(record)).await?;
        tracing::info!(request_id = %entry.request.id(), "requester added to block list");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use lk_core::consent::{DurationClass, PermissionSet, RequesterProfile, SourceChannel};

    const NOW: i64 = 1_700_000_000_000;

    fn request(id: &str, masked_id: &str) -> ConsentRequest {
        ConsentRequest::new(
            RequestId::from(id),
            RequesterProfile::new("Alex Rivera", masked_id, "AR"),
            None,
            NOW,
            NOW + 300_000,
            SourceChannel::NfcTap,
            PermissionSet::new(true, true, true),
        )
        .expect("valid request")
    }

    fn rejection(id: &str, reason: &str, blocked: bool) -> RejectionRecord {
        RejectionRecord {
            request_id: RequestId::from(id),
            reason: reason.to_string(),
            blocked,
            responded_at_ms: NOW + 10,
        }
    }

    fn inbox() -> (RequestInbox, Arc<ConnectionLedger>) {
        let ledger = Arc::new(ConnectionLedger::new(Duration::from_secs(7 * 24 * 3600)));
        (RequestInbox::new(ledger.clone()), ledger)
    }

    #[tokio::test]
    async fn receive_rejects_duplicates() {
        let (inbox, _) = inbox();
        inbox.receive(request("req_1", "+1 (555) 1")).await.expect("first");
        let err = inbox
            .receive(request("req_1", "+1 (555) 1"))
            .await
            .expect_err("duplicate");
        assert_eq!(err, InboxError::Duplicate(RequestId::from("req_1")));
        assert_eq!(inbox.pending_count().await, 1);
    }

    #[tokio::test]
    async fn approval_marks_entry_and_records_connection() {
        let (inbox, ledger) = inbox();
        inbox.receive(request("req_1", "+1 (555) 1")).await.expect("receive");

        inbox
            .on_approve(GrantedConnection::new(
                RequestId::from("req_1"),
                PermissionSet::new(false, true, false),
                DurationClass::SevenDays,
                NOW + 10,
            ))
            .await
            .expect("approve");

        let entry = inbox.get(&RequestId::from("req_1")).await.expect("entry");
        assert_eq!(entry.status, InboxStatus::Approved);
        assert_eq!(
            entry.approved_permissions,
            Some(PermissionSet::new(false, true, false))
        );
        let connections = ledger.list().await;
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].request_id, RequestId::from("req_1"));
        assert_eq!(inbox.pending_count().await, 0);
    }

    #[tokio::test]
    async fn rejection_keeps_reason_including_empty() {
        let (inbox, _) = inbox();
        inbox.receive(request("req_1", "+1 (555) 1")).await.expect("receive");
        inbox.receive(request("req_2", "+1 (555) 2")).await.expect("receive");

        inbox
            .on_reject(rejection("req_1", "Suspicious request", false))
            .await
            .expect("reject");
        inbox
            .on_reject(rejection("req_2", "", false))
            .await
            .expect("reject");

        let rejected = inbox.list(InboxFilter::Rejected).await;
        assert_eq!(rejected.len(), 2);
        let reasons: Vec<_> = rejected
            .iter()
            .filter_map(|entry| entry.rejection_reason.clone())
            .collect();
        assert!(reasons.contains(&"Suspicious request".to_string()));
        assert!(reasons.contains(&String::new()));
    }

    #[tokio::test]
    async fn block_refuses_future_requests_from_same_requester() {
        let (inbox, ledger) = inbox();
        inbox.receive(request("req_1", "+1 (555) 9")).await.expect("receive");
        inbox
            .on_block(rejection("req_1", "", true))
            .await
            .expect("block");

        assert!(inbox.is_blocked("+1 (555) 9").await);
        assert_eq!(
            inbox.receive(request("req_2", "+1 (555) 9")).await,
            Err(InboxError::RequesterBlocked("+1 (555) 9".to_string()))
        );
        assert!(inbox.list(InboxFilter::Rejected).await.is_empty());
        assert_eq!(inbox.list(InboxFilter::All).await.len(), 1);
        assert!(ledger.list().await.is_empty());
    }

    #[tokio::test]
    async fn outcome_for_unknown_request_is_an_error() {
        let (inbox, _) = inbox();
        let err = inbox
            .on_reject(rejection("req_missing", "Other", false))
            .await
            .expect_err("unknown");
        assert_eq!(
            err.downcast_ref::<InboxError>(),
            Some(&InboxError::NotFound(RequestId::from("req_missing")))
        );
    }

    #[tokio::test]
    async fn answered_request_refuses_further_outcomes() {
        let (inbox, ledger) = inbox();
        inbox.receive(request("req_1", "+1 (555) 1")).await.expect("receive");
        let grant = GrantedConnection::new(
            RequestId::from("req_1"),
            PermissionSet::new(true, true, false),
            DurationClass::OneDay,
            NOW + 10,
        );
        inbox.on_approve(grant.clone()).await.expect("approve");

        let err = inbox.on_approve(grant).await.expect_err("second approval");
        assert_eq!(
            err.downcast_ref::<InboxError>(),
            Some(&InboxError::AlreadySettled(RequestId::from("req_1")))
        );
        let err = inbox
            .on_reject(rejection("req_1", "Other", false))
            .await
            .expect_err("rejection after approval");
        assert_eq!(
            err.downcast_ref::<InboxError>(),
            Some(&InboxError::AlreadySettled(RequestId::from("req_1")))
        );

        let entry = inbox.get(&RequestId::from("req_1")).await.expect("entry");
        assert_eq!(entry.status, InboxStatus::Approved);
        assert_eq!(entry.rejection_reason, None);
        assert_eq!(ledger.list().await.len(), 1);
    }

    #[tokio::test]
    async fn expired_entry_refuses_outcomes() {
        let (inbox, _) = inbox();
        inbox.receive(request("req_1", "+1 (555) 1")).await.expect("receive");
        inbox.sweep_expired(NOW + 300_000).await;

        assert!(inbox
            .on_block(rejection("req_1", "", true))
            .await
            .is_err());
        assert!(!inbox.is_blocked("+1 (555) 1").await);
    }

    #[tokio::test]
    async fn remove_and_clear_settled_shrink_the_inbox() {
        let (inbox, _) = inbox();
        inbox.receive(request("req_1", "+1 (555) 1")).await.expect("receive");
        inbox.receive(request("req_2", "+1 (555) 2")).await.expect("receive");
        inbox.receive(request("req_3", "+1 (555) 3")).await.expect("receive");
        inbox
            .on_reject(rejection("req_2", "Other", false))
            .await
            .expect("reject");

        let ids: Vec<_> = inbox
            .list(InboxFilter::All)
            .await
            .iter()
            .map(|entry| entry.request.id().to_string())
            .collect();
        assert_eq!(ids, ["req_3", "req_2", "req_1"]);

        assert_eq!(inbox.clear_settled().await, 1);
        assert!(inbox.get(&RequestId::from("req_2")).await.is_none());

        let removed = inbox.remove(&RequestId::from("req_1")).await.expect("removed");
        assert_eq!(removed.request.id(), &RequestId::from("req_1"));
        assert!(inbox.remove(&RequestId::from("req_1")).await.is_none());
        assert_eq!(inbox.list(InboxFilter::All).await.len(), 1);
    }

    #[tokio::test]
    async fn sweep_expires_only_pending_entries() {
        let (inbox, _) = inbox();
        inbox.receive(request("req_1", "+1 (555) 1")).await.expect("receive");
        inbox.receive(request("req_2", "+1 (555) 2")).await.expect("receive");
        inbox
            .on_reject(rejection("req_2", "Other", false))
            .await
            .expect("reject");

        assert_eq!(inbox.sweep_expired(NOW + 299_999).await, 0);
        assert_eq!(inbox.sweep_expired(NOW + 300_000).await, 1);
        let entry = inbox.get(&RequestId::from("req_1")).await.expect("entry");
        assert_eq!(entry.status, InboxStatus::Expired);
        assert_eq!(inbox.list(InboxFilter::Pending).await.len(), 0);
    }
}
