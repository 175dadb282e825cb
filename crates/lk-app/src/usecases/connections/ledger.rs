use std::time::Duration;

use tokio::sync::RwLock;

use lk_core::{
    connection::{Connection, ConnectionError, ConnectionFilter, ConnectionStatus},
    consent::{ConsentRequest, GrantedConnection, PermissionSet},
    settings::model::Settings,
    ConnectionId,
};

/// Result of applying one change to a selection of connections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    /// Connections after the change, in selection order.
    pub updated: Vec<Connection>,
    /// Selected ids the change could not be applied to.
    pub failed: Vec<ConnectionError>,
}

impl BulkReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// In-memory history of approved connections.
///
/// Entries are kept in approval order, newest last.
pub struct ConnectionLedger {
    renew_duration: Duration,
    connections: RwLock<Vec<Connection>>,
}

impl ConnectionLedger {
    pub fn new(renew_duration: Duration) -> Self {
        Self {
            renew_duration,
            connections: RwLock::new(Vec::new()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(Duration::from_secs(settings.connections.renew_duration_secs))
    }

    /// Stores the connection produced by approving `request`.
    pub async fn record(&self, request: &ConsentRequest, grant: &GrantedConnection) -> Connection {
        let connection = Connection::from_grant(request, grant);
        tracing::info!(
            connection_id = %connection.id,
            request_id = %connection.request_id,
            duration = connection.duration_class.label(),
            "connection recorded"
        );
        self.connections.write().await.push(connection.clone());
        connection
    }

    pub async fn list(&self) -> Vec<Connection> {
        self.connections.read().await.clone()
    }

    /// Connections whose status passes `filter` and that match `search`
    /// (see [`Connection::matches_search`]).
    pub async fn list_matching(&self, filter: ConnectionFilter, search: &str) -> Vec<Connection> {
        self.connections
            .read()
            .await
            .iter()
            .filter(|connection| filter.matches(connection.status))
            .filter(|connection| connection.matches_search(search))
            .cloned()
            .collect()
    }

    pub async fn get(&self, id: &ConnectionId) -> Option<Connection> {
        self.connections
            .read()
            .await
            .iter()
            .find(|connection| &connection.id == id)
            .cloned()
    }

    pub async fn revoke(&self, id: &ConnectionId, now_ms: i64) -> Result<Connection, ConnectionError> {
        let mut connections = self.connections.write().await;
        let connection = find_mut(&mut connections, id)?;
        connection.revoke(now_ms);
        tracing::info!(connection_id = %id, "connection revoked");
        Ok(connection.clone())
    }

    pub async fn renew(&self, id: &ConnectionId, now_ms: i64) -> Result<Connection, ConnectionError> {
        let renew_ms = self.renew_ms();
        let mut connections = self.connections.write().await;
        let connection = find_mut(&mut connections, id)?;
        connection.renew(now_ms, renew_ms)?;
        tracing::info!(
            connection_id = %id,
            expires_at_ms = ?connection.expires_at_ms,
            "connection renewed"
        );
        Ok(connection.clone())
    }

    /// Renews every selected connection for the configured duration.
    /// Revoked or unknown ids are reported in [`BulkReport::failed`].
    pub async fn extend_many(&self, ids: &[ConnectionId], now_ms: i64) -> BulkReport {
        let renew_ms = self.renew_ms();
        let report = self
            .apply_many(ids, |connection| connection.renew(now_ms, renew_ms))
            .await;
        tracing::info!(
            extended = report.updated.len(),
            failed = report.failed.len(),
            "connections extended"
        );
        report
    }

    pub async fn revoke_many(&self, ids: &[ConnectionId], now_ms: i64) -> BulkReport {
        let report = self
            .apply_many(ids, |connection| {
                connection.revoke(now_ms);
                Ok(())
            })
            .await;
        tracing::info!(
            revoked = report.updated.len(),
            failed = report.failed.len(),
            "connections revoked"
        );
        report
    }

    /// Grants `permissions` to every selected connection.
    ///
    /// Permissions without a call or message channel are refused as a whole.
    pub async fn update_permissions_many(
        &self,
        ids: &[ConnectionId],
        permissions: PermissionSet,
    ) -> Result<BulkReport, ConnectionError> {
        if !permissions.allows_contact() {
            return Err(ConnectionError::NoContactChannel);
        }
        let report = self
            .apply_many(ids, |connection| connection.update_permissions(permissions))
            .await;
        tracing::info!(
            updated = report.updated.len(),
            failed = report.failed.len(),
            "connection permissions updated"
        );
        Ok(report)
    }

    async fn apply_many<F>(&self, ids: &[ConnectionId], mut change: F) -> BulkReport
    where
        F: FnMut(&mut Connection) -> Result<(), ConnectionError>,
    {
        let mut connections = self.connections.write().await;
        let mut report = BulkReport::default();
        for id in ids {
            let applied = find_mut(&mut connections, id).and_then(|connection| {
                change(connection)?;
                Ok(connection.clone())
            });
            match applied {
                Ok(connection) => report.updated.push(connection),
                Err(error) => report.failed.push(error),
            }
        }
        report
    }

    fn renew_ms(&self) -> i64 {
        i64::try_from(self.renew_duration.as_millis()).unwrap_or(i64::MAX)
    }

    /// Marks active connections whose lifetime has passed as expired.
    /// Returns how many changed.
    pub async fn refresh_expired(&self, now_ms: i64) -> usize {
        let mut connections = self.connections.write().await;
        let changed = connections
            .iter_mut()
            .map(|connection| connection.refresh_status(now_ms))
            .filter(|changed| *changed)
            .count();
        if changed > 0 {
            tracing::debug!(changed, "connections expired");
        }
        changed
    }

    pub async fn count_by_status(&self, status: ConnectionStatus) -> usize {
        self.connections
            .read()
            .await
            .iter()
            .filter(|connection| connection.status == status)
            .count()
    }
}

fn find_mut<'a>(
    connections: &'a mut [Connection],
    id: &ConnectionId,
) -> Result<&'a mut Connection, ConnectionError> {
    connections
        .iter_mut()
        .find(|connection| &connection.id == id)
        .ok_or_else(|| ConnectionError::NotFound(id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lk_core::{
        consent::{DurationClass, PermissionSet, RequesterProfile, SourceChannel},
        RequestId,
    };

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;
    const NOW: i64 = 1_700_000_000_000;

    fn request() -> ConsentRequest {
        ConsentRequest::new(
            RequestId::from("req_ledger"),
            RequesterProfile::new("Sarah Chen", "+1 (555) 123-XXXX", "SC"),
            Some("Met at the conference".to_string()),
            NOW - 1_000,
            NOW + 300_000,
            SourceChannel::NearbyProximity,
            PermissionSet::new(true, true, false),
        )
        .expect("valid request")
    }

    fn grant(duration_class: DurationClass) -> GrantedConnection {
        GrantedConnection::new(
            RequestId::from("req_ledger"),
            PermissionSet::new(false, true, false),
            duration_class,
            NOW,
        )
    }

    fn ledger() -> ConnectionLedger {
        ConnectionLedger::new(Duration::from_millis(7 * DAY_MS as u64))
    }

    #[tokio::test]
    async fn record_copies_requester_and_grant() {
        let ledger = ledger();
        let connection = ledger
            .record(&request(), &grant(DurationClass::OneDay))
            .await;

        assert_eq!(connection.display_name, "Sarah Chen");
        assert_eq!(connection.masked_id, "+1 (555) 123-XXXX");
        assert_eq!(connection.expires_at_ms, Some(NOW + DAY_MS));
        assert_eq!(connection.status, ConnectionStatus::Active);
        assert_eq!(ledger.list().await.len(), 1);
        assert_eq!(ledger.get(&connection.id).await, Some(connection.clone()));
    }

    #[tokio::test]
    async fn refresh_expires_only_past_due_active_connections() {
        let ledger = ledger();
        ledger.record(&request(), &grant(DurationClass::OneDay)).await;
        ledger
            .record(&request(), &grant(DurationClass::Permanent))
            .await;

        assert_eq!(ledger.refresh_expired(NOW + DAY_MS - 1).await, 0);
        assert_eq!(ledger.refresh_expired(NOW + DAY_MS).await, 1);
        assert_eq!(ledger.refresh_expired(NOW + 400 * DAY_MS).await, 0);
        assert_eq!(ledger.count_by_status(ConnectionStatus::Expired).await, 1);
        assert_eq!(ledger.count_by_status(ConnectionStatus::Active).await, 1);
    }

    #[tokio::test]
    async fn renew_reactivates_expired_connection_for_configured_duration() {
        let ledger = ledger();
        let id = ledger
            .record(&request(), &grant(DurationClass::OneDay))
            .await
            .id;
        let later = NOW + 2 * DAY_MS;
        ledger.refresh_expired(later).await;

        let renewed = ledger.renew(&id, later).await.expect("renew");
        assert_eq!(renewed.status, ConnectionStatus::Active);
        assert_eq!(renewed.expires_at_ms, Some(later + 7 * DAY_MS));
        assert_eq!(renewed.renewed_at_ms, Some(later));
        assert_eq!(renewed.time_left_label(later), "7d 0h remaining");
    }

    #[tokio::test]
    async fn revoked_connection_cannot_be_renewed() {
        let ledger = ledger();
        let id = ledger
            .record(&request(), &grant(DurationClass::ThirtyDays))
            .await
            .id;

        let revoked = ledger.revoke(&id, NOW + 5).await.expect("revoke");
        assert_eq!(revoked.status, ConnectionStatus::Revoked);
        assert_eq!(revoked.revoked_at_ms, Some(NOW + 5));

        let err = ledger.renew(&id, NOW + 10).await.expect_err("revoked");
        assert_eq!(err, ConnectionError::Revoked(id));
    }

    #[tokio::test]
    async fn unknown_connection_is_not_found() {
        let ledger = ledger();
        let missing = ConnectionId::from("conn_missing");
        assert_eq!(
            ledger.revoke(&missing, NOW).await,
            Err(ConnectionError::NotFound(missing.clone()))
        );
    }

    async fn ledger_with_three() -> (ConnectionLedger, Vec<ConnectionId>) {
        let ledger = ledger();
        let mut ids = Vec::new();
        for (name, masked) in [
            ("Sarah Mitchell", "+1 (555) 123-XXXX"),
            ("Mike Johnson", "+1 (555) 456-XXXX"),
            ("Lisa Garcia", "+1 (555) 789-XXXX"),
        ] {
            let request = ConsentRequest::new(
                RequestId::from(format!("req_{masked}")),
                RequesterProfile::new(name, masked, "XX"),
                None,
                NOW - 1_000,
                NOW + 300_000,
                SourceChannel::QrScan,
                PermissionSet::new(true, true, false),
            )
            .expect("valid request");
            let grant = GrantedConnection::new(
                request.id().clone(),
                PermissionSet::new(true, true, false),
                DurationClass::OneDay,
                NOW,
            );
            ids.push(ledger.record(&request, &grant).await.id);
        }
        (ledger, ids)
    }

    #[tokio::test]
    async fn list_matching_combines_filter_and_search() {
        let (ledger, ids) = ledger_with_three().await;
        ledger.revoke(&ids[1], NOW).await.expect("revoke");

        let active = ledger.list_matching(ConnectionFilter::Active, "").await;
        assert_eq!(active.len(), 2);

        let found = ledger.list_matching(ConnectionFilter::All, "mike").await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].status, ConnectionStatus::Revoked);

        let by_number = ledger.list_matching(ConnectionFilter::Active, "789").await;
        assert_eq!(by_number.len(), 1);
        assert_eq!(by_number[0].display_name, "Lisa Garcia");

        assert!(ledger
            .list_matching(ConnectionFilter::Expired, "")
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn extend_many_renews_selection_and_reports_failures() {
        let (ledger, ids) = ledger_with_three().await;
        let later = NOW + 2 * DAY_MS;
        ledger.refresh_expired(later).await;
        ledger.revoke(&ids[2], later).await.expect("revoke");
        let missing = ConnectionId::from("conn_missing");

        let report = ledger
            .extend_many(&[ids[0].clone(), ids[2].clone(), missing.clone()], later)
            .await;

        assert_eq!(report.updated.len(), 1);
        assert_eq!(report.updated[0].id, ids[0]);
        assert_eq!(report.updated[0].expires_at_ms, Some(later + 7 * DAY_MS));
        assert_eq!(
            report.failed,
            vec![
                ConnectionError::Revoked(ids[2].clone()),
                ConnectionError::NotFound(missing),
            ]
        );
        assert!(!report.is_complete());
        assert_eq!(
            ledger.get(&ids[1]).await.expect("untouched").status,
            ConnectionStatus::Expired
        );
    }

    #[tokio::test]
    async fn revoke_many_revokes_only_selection() {
        let (ledger, ids) = ledger_with_three().await;

        let report = ledger.revoke_many(&ids[..2], NOW + 5).await;

        assert!(report.is_complete());
        assert_eq!(ledger.count_by_status(ConnectionStatus::Revoked).await, 2);
        assert_eq!(ledger.count_by_status(ConnectionStatus::Active).await, 1);
        assert!(report
            .updated
            .iter()
            .all(|connection| connection.revoked_at_ms == Some(NOW + 5)));
    }

    #[tokio::test]
    async fn update_permissions_many_applies_to_selection() {
        let (ledger, ids) = ledger_with_three().await;
        let permissions = PermissionSet::new(false, true, true);

        let report = ledger
            .update_permissions_many(&[ids[0].clone(), ids[2].clone()], permissions)
            .await
            .expect("update");

        assert!(report.is_complete());
        assert_eq!(ledger.get(&ids[0]).await.expect("conn").permissions, permissions);
        assert_eq!(
            ledger.get(&ids[1]).await.expect("conn").permissions,
            PermissionSet::new(true, true, false)
        );

        assert_eq!(
            ledger
                .update_permissions_many(&ids, PermissionSet::new(false, false, true))
                .await,
            Err(ConnectionError::NoContactChannel)
        );
    }
}
