//! Consent flow orchestrator
//!
//! Hosts one [`ConsentFlowMachine`] per open request, feeds it user and timer
//! events, and executes the actions it returns.
//!
//! ```text
//! User events / countdown expiry
//!   ↓
//! ConsentOrchestrator (serialises events per request)
//!   ↓
//! ConsentFlowMachine (pure transitions)
//!   ↓
//! ConsentActions → ExpiryTimer start/stop, ConsentOutcomePort callbacks
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info_span, Instrument};

use lk_core::{
    consent::{
        format_countdown, ConsentAction, ConsentEvent, ConsentFlowMachine, ConsentFlowPolicy,
        ConsentOutcome, ConsentRequest, ConsentState, DurationClass, PermissionDraft,
        RejectReason,
    },
    ports::{ClockPort, ConsentOutcomePort},
    settings::model::Settings,
    template::ConnectionTemplate,
    RequestId,
};

use super::expiry_timer::ExpiryTimer;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct ConsentConfig {
    /// Countdown refresh cadence
    pub countdown_tick: Duration,
    /// Duration preselected on the permissions step
    pub default_duration: DurationClass,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl ConsentConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            countdown_tick: Duration::from_millis(settings.consent.countdown_tick_ms.max(1)),
            default_duration: settings.consent.default_duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsentFlowError {
    #[error("no consent flow open for request {0}")]
    SessionNotFound(RequestId),

    #[error("a consent flow is already open for request {0}")]
    AlreadyOpen(RequestId),
}

/// Everything a host screen needs to render one flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentFlowSnapshot {
    pub request: ConsentRequest,
    pub state: ConsentState,
    pub draft: PermissionDraft,
    pub reject_reason: Option<RejectReason>,
    pub show_details: bool,
    pub can_continue: bool,
    pub remaining_ms: u64,
    pub countdown_label: String,
}

/// Consent orchestrator
///
/// Cheap to clone; clones share the same sessions.
#[derive(Clone)]
pub struct ConsentOrchestrator {
    config: ConsentConfig,
    /// Open flows (request_id -> session)
    sessions: Arc<RwLock<HashMap<RequestId, ConsentSessionContext>>>,
    clock: Arc<dyn ClockPort>,
    outcome_port: Arc<dyn ConsentOutcomePort>,
}

struct ConsentSessionContext {
    machine: ConsentFlowMachine,
    /// Present while the countdown runs
    timer: Option<ExpiryTimer>,
}

impl ConsentOrchestrator {
    pub fn new(
        config: ConsentConfig,
        clock: Arc<dyn ClockPort>,
        outcome_port: Arc<dyn ConsentOutcomePort>,
    ) -> Self {
        Self {
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            clock,
            outcome_port,
        }
    }

    /// Mounts a consent flow for `request` and starts its countdown.
    ///
    /// A request that is already expired opens in [`ConsentState::Expired`].
    pub async fn open(&self, request: ConsentRequest) -> Result<ConsentState> {
        let request_id = request.id().clone();
        let span = info_span!("consent.open", request_id = %request_id);
        async {
            let (machine, actions) =
                ConsentFlowMachine::open(request, self.build_policy(), self.clock.now_ms());
            let state = machine.state().clone();

            let outcomes = {
                let mut sessions = self.sessions.write().await;
                if sessions.contains_key(&request_id) {
                    return Err(ConsentFlowError::AlreadyOpen(request_id.clone()).into());
                }
                let context = sessions
                    .entry(request_id.clone())
                    .or_insert(ConsentSessionContext {
                        machine,
                        timer: None,
                    });
                self.apply_actions(context, actions)
            };
            self.deliver(outcomes).await?;

            tracing::info!(state = state.name(), "consent flow opened");
            Ok(state)
        }
        .instrument(span)
        .await
    }

    /// Feeds one user event into the flow for `request_id`.
    pub async fn dispatch(&self, request_id: &RequestId, event: ConsentEvent) -> Result<ConsentState> {
        let span = info_span!("consent.dispatch", request_id = %request_id);
        async {
            let (state, outcomes) = {
                let mut sessions = self.sessions.write().await;
                let context = sessions
                    .get_mut(request_id)
                    .ok_or_else(|| ConsentFlowError::SessionNotFound(request_id.clone()))?;
                let (state, actions) = context.machine.handle_event(event, self.clock.now_ms());
                let outcomes = self.apply_actions(context, actions);
                (state, outcomes)
            };
            self.deliver(outcomes).await?;
            Ok(state)
        }
        .instrument(span)
        .await
    }

    /// Seeds the flow's draft from `template` and shows the permissions step.
    ///
    /// An auto-approve template whose permissions allow contact continues
    /// straight through to the approval under the same lock.
    pub async fn apply_template(
        &self,
        request_id: &RequestId,
        template: &ConnectionTemplate,
    ) -> Result<ConsentState> {
        let span = info_span!(
            "consent.apply_template",
            request_id = %request_id,
            template_id = %template.id
        );
        async {
            let mut events = vec![ConsentEvent::ApplyTemplate {
                draft: template.draft(),
            }];
            if template.auto_approve && template.allows_contact() {
                events.extend([ConsentEvent::Continue, ConsentEvent::ConfirmApproval]);
            }

            let (state, outcomes) = {
                let mut sessions = self.sessions.write().await;
                let context = sessions
                    .get_mut(request_id)
                    .ok_or_else(|| ConsentFlowError::SessionNotFound(request_id.clone()))?;
                let mut outcomes = Vec::new();
                for event in events {
                    let (_, actions) = context.machine.handle_event(event, self.clock.now_ms());
                    outcomes.extend(self.apply_actions(context, actions));
                }
                (context.machine.state().clone(), outcomes)
            };
            self.deliver(outcomes).await?;

            tracing::info!(
                state = state.name(),
                auto_approve = template.auto_approve,
                "template applied"
            );
            Ok(state)
        }
        .instrument(span)
        .await
    }

    /// Unmounts the flow: stops its countdown and forgets it.
    ///
    /// Returns `false` when nothing was open for `request_id`.
    pub async fn close(&self, request_id: &RequestId) -> bool {
        let removed = self.sessions.write().await.remove(request_id);
        match removed {
            Some(mut context) => {
                if let Some(timer) = context.timer.as_mut() {
                    timer.cancel();
                }
                tracing::debug!(request_id = %request_id, "consent flow closed");
                true
            }
            None => false,
        }
    }

    pub async fn state(&self, request_id: &RequestId) -> Option<ConsentState> {
        let sessions = self.sessions.read().await;
        sessions
            .get(request_id)
            .map(|context| context.machine.state().clone())
    }

    pub async fn remaining_ms(&self, request_id: &RequestId) -> Option<u64> {
        let sessions = self.sessions.read().await;
        sessions
            .get(request_id)
            .map(|context| self.remaining_for(context))
    }

    /// Remaining time as `M:SS`.
    pub async fn countdown_label(&self, request_id: &RequestId) -> Option<String> {
        self.remaining_ms(request_id).await.map(format_countdown)
    }

    pub async fn snapshot(&self, request_id: &RequestId) -> Option<ConsentFlowSnapshot> {
        let sessions = self.sessions.read().await;
        sessions.get(request_id).map(|context| {
            let machine = &context.machine;
            let remaining_ms = self.remaining_for(context);
            ConsentFlowSnapshot {
                request: machine.request().clone(),
                state: machine.state().clone(),
                draft: *machine.draft(),
                reject_reason: machine.reject_reason().cloned(),
                show_details: machine.show_details(),
                can_continue: machine.can_continue(),
                remaining_ms,
                countdown_label: format_countdown(remaining_ms),
            }
        })
    }

    pub async fn open_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn remaining_for(&self, context: &ConsentSessionContext) -> u64 {
        if context.machine.state() == &ConsentState::Expired {
            return 0;
        }
        match &context.timer {
            Some(timer) => timer.remaining_ms(),
            None => context.machine.request().remaining_ms(self.clock.now_ms()),
        }
    }

    fn build_policy(&self) -> ConsentFlowPolicy {
        ConsentFlowPolicy {
            default_duration: self.config.default_duration,
        }
    }

    /// Runs timer and logging actions in place and returns the outcomes to
    /// deliver once the session lock is released.
    fn apply_actions(
        &self,
        context: &mut ConsentSessionContext,
        actions: Vec<ConsentAction>,
    ) -> Vec<ConsentOutcome> {
        let mut outcomes = Vec::new();
        for action in actions {
            match action {
                ConsentAction::StartCountdown {
                    request_id,
                    expires_at_ms,
                } => {
                    let orchestrator = self.clone();
                    let expired_id = request_id.clone();
                    let timer = ExpiryTimer::start(
                        expires_at_ms,
                        self.clock.clone(),
                        self.config.countdown_tick,
                        move || async move {
                            if let Err(error) = orchestrator.handle_expiry(&expired_id).await {
                                tracing::error!(
                                    request_id = %expired_id,
                                    error = ?error,
                                    "consent expiry handling failed"
                                );
                            }
                        },
                    );
                    if let Some(mut previous) = context.timer.replace(timer) {
                        previous.cancel();
                    }
                    tracing::debug!(request_id = %request_id, expires_at_ms, "countdown started");
                }
                ConsentAction::StopCountdown { request_id } => {
                    if let Some(mut timer) = context.timer.take() {
                        timer.cancel();
                        tracing::debug!(request_id = %request_id, "countdown stopped");
                    }
                }
                ConsentAction::EmitOutcome { outcome } => outcomes.push(outcome),
                ConsentAction::LogTransition {
                    request_id,
                    old_state,
                    event,
                    new_state,
                } => {
                    tracing::debug!(
                        request_id = %request_id,
                        %old_state,
                        %event,
                        %new_state,
                        "consent transition"
                    );
                }
            }
        }
        outcomes
    }

    async fn deliver(&self, outcomes: Vec<ConsentOutcome>) -> Result<()> {
        for outcome in outcomes {
            let request_id = outcome.request_id().clone();
            match outcome {
                ConsentOutcome::Approved(grant) => {
                    tracing::info!(
                        request_id = %request_id,
                        duration = grant.duration_class.label(),
                        "consent approved"
                    );
                    self.outcome_port.on_approve(grant).await?;
                }
                ConsentOutcome::Rejected(record) => {
                    tracing::info!(request_id = %request_id, "consent rejected");
                    self.outcome_port.on_reject(record).await?;
                }
                ConsentOutcome::Blocked(record) => {
                    tracing::info!(request_id = %request_id, "requester blocked");
                    self.outcome_port.on_block(record).await?;
                }
            }
        }
        Ok(())
    }

    async fn handle_expiry(&self, request_id: &RequestId) -> Result<()> {
        let span = info_span!("consent.expire", request_id = %request_id);
        async {
            let outcomes = {
                let mut sessions = self.sessions.write().await;
                let Some(context) = sessions.get_mut(request_id) else {
                    tracing::debug!("expired flow already closed");
                    return Ok(());
                };
                let (state, actions) = context
                    .machine
                    .handle_event(ConsentEvent::Expire, self.clock.now_ms());
                tracing::info!(state = state.name(), "consent request expired");
                self.apply_actions(context, actions)
            };
            self.deliver(outcomes).await
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use lk_core::consent::{
        GrantedConnection, PermissionKind, PermissionSet, RejectionRecord, RequesterProfile,
        SourceChannel,
    };

    struct TokioClock {
        origin: tokio::time::Instant,
        base_ms: i64,
    }

    impl ClockPort for TokioClock {
        fn now_ms(&self) -> i64 {
            self.base_ms + self.origin.elapsed().as_millis() as i64
        }
    }

    #[derive(Default)]
    struct RecordingOutcomes {
        outcomes: Mutex<Vec<ConsentOutcome>>,
    }

    impl RecordingOutcomes {
        fn taken(&self) -> Vec<ConsentOutcome> {
            self.outcomes.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl ConsentOutcomePort for RecordingOutcomes {
        async fn on_approve(&self, grant: GrantedConnection) -> anyhow::Result<()> {
            self.outcomes
                .lock()
                .expect("lock")
                .push(ConsentOutcome::Approved(grant));
            Ok(())
        }

        async fn on_reject(&self, record: RejectionRecord) -> anyhow::Result<()> {
            self.outcomes
                .lock()
                .expect("lock")
                .push(ConsentOutcome::Rejected(record));
            Ok(())
        }

        async fn on_block(&self, record: RejectionRecord) -> anyhow::Result<()> {
            self.outcomes
                .lock()
                .expect("lock")
                .push(ConsentOutcome::Blocked(record));
            Ok(())
        }
    }

    const NOW: i64 = 1_700_000_000_000;

    fn build_orchestrator() -> (ConsentOrchestrator, Arc<RecordingOutcomes>) {
        let clock = Arc::new(TokioClock {
            origin: tokio::time::Instant::now(),
            base_ms: NOW,
        });
        let outcomes = Arc::new(RecordingOutcomes::default());
        let orchestrator =
            ConsentOrchestrator::new(ConsentConfig::default(), clock, outcomes.clone());
        (orchestrator, outcomes)
    }

    fn build_request(id: &str, ttl_ms: i64) -> ConsentRequest {
        ConsentRequest::new(
            RequestId::from(id),
            RequesterProfile::new("Mike Johnson", "+1 (555) 456-XXXX", "MJ"),
            None,
            NOW - 60_000,
            NOW + ttl_ms,
            SourceChannel::QrScan,
            PermissionSet::new(true, true, true),
        )
        .expect("valid request")
    }

    async fn has_timer(orchestrator: &ConsentOrchestrator, id: &RequestId) -> bool {
        let sessions = orchestrator.sessions.read().await;
        sessions
            .get(id)
            .and_then(|context| context.timer.as_ref())
            .is_some_and(|timer| timer.is_running())
    }

    #[tokio::test(start_paused = true)]
    async fn open_records_timer_handle() {
        let (orchestrator, _) = build_orchestrator();
        let id = RequestId::from("req_timer");
        orchestrator
            .open(build_request("req_timer", 60_000))
            .await
            .expect("open");
        assert!(has_timer(&orchestrator, &id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn open_twice_is_rejected() {
        let (orchestrator, _) = build_orchestrator();
        orchestrator
            .open(build_request("req_dup", 60_000))
            .await
            .expect("open");
        let err = orchestrator
            .open(build_request("req_dup", 60_000))
            .await
            .expect_err("second open");
        assert_eq!(
            err.downcast_ref::<ConsentFlowError>(),
            Some(&ConsentFlowError::AlreadyOpen(RequestId::from("req_dup")))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_transition_stops_timer() {
        let (orchestrator, outcomes) = build_orchestrator();
        let id = RequestId::from("req_reject");
        orchestrator
            .open(build_request("req_reject", 60_000))
            .await
            .expect("open");
        orchestrator
            .dispatch(&id, ConsentEvent::ChooseReject)
            .await
            .expect("reject");
        orchestrator
            .dispatch(&id, ConsentEvent::ConfirmRejection)
            .await
            .expect("confirm");

        assert!(!has_timer(&orchestrator, &id).await);
        assert_eq!(outcomes.taken().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_expiry_moves_flow_to_expired_without_outcome() {
        let (orchestrator, outcomes) = build_orchestrator();
        let id = RequestId::from("req_expire");
        orchestrator
            .open(build_request("req_expire", 3_000))
            .await
            .expect("open");
        orchestrator
            .dispatch(&id, ConsentEvent::ChooseApprove)
            .await
            .expect("approve");

        tokio::time::sleep(Duration::from_millis(3_500)).await;

        assert_eq!(orchestrator.state(&id).await, Some(ConsentState::Expired));
        assert_eq!(orchestrator.remaining_ms(&id).await, Some(0));
        assert!(!has_timer(&orchestrator, &id).await);

        let state = orchestrator
            .dispatch(&id, ConsentEvent::Continue)
            .await
            .expect("dispatch after expiry");
        assert_eq!(state, ConsentState::Expired);
        assert!(outcomes.taken().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn close_aborts_timer_and_forgets_session() {
        let (orchestrator, outcomes) = build_orchestrator();
        let id = RequestId::from("req_close");
        orchestrator
            .open(build_request("req_close", 2_000))
            .await
            .expect("open");
        let timer_rx = {
            let sessions = orchestrator.sessions.read().await;
            sessions
                .get(&id)
                .and_then(|c| c.timer.as_ref())
                .map(|t| t.subscribe())
                .expect("timer")
        };

        assert!(orchestrator.close(&id).await);
        assert!(!orchestrator.close(&id).await);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(orchestrator.open_count().await, 0);
        assert!(timer_rx.has_changed().is_err());
        assert!(outcomes.taken().is_empty());
        let err = orchestrator
            .dispatch(&id, ConsentEvent::ChooseApprove)
            .await
            .expect_err("closed");
        assert_eq!(
            err.downcast_ref::<ConsentFlowError>(),
            Some(&ConsentFlowError::SessionNotFound(id))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_reflects_draft_and_countdown() {
        let (orchestrator, _) = build_orchestrator();
        let id = RequestId::from("req_snapshot");
        orchestrator
            .open(build_request("req_snapshot", 61_000))
            .await
            .expect("open");
        orchestrator
            .dispatch(&id, ConsentEvent::ChooseApprove)
            .await
            .expect("approve");
        orchestrator
            .dispatch(
                &id,
                ConsentEvent::TogglePermission {
                    kind: PermissionKind::Call,
                },
            )
            .await
            .expect("toggle");

        let snapshot = orchestrator.snapshot(&id).await.expect("snapshot");
        assert_eq!(snapshot.state, ConsentState::SetPermissions);
        assert_eq!(snapshot.draft.permissions, PermissionSet::new(false, true, true));
        assert!(snapshot.can_continue);
        assert_eq!(snapshot.countdown_label, "1:01");
    }

    fn template(auto_approve: bool, permissions: PermissionSet) -> ConnectionTemplate {
        ConnectionTemplate::new(lk_core::template::TemplateInput {
            name: "Emergency Contacts".to_string(),
            permissions,
            duration_class: DurationClass::Permanent,
            auto_approve,
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn applied_template_waits_for_confirmation() {
        let (orchestrator, outcomes) = build_orchestrator();
        let id = RequestId::from("req_template");
        orchestrator
            .open(build_request("req_template", 60_000))
            .await
            .expect("open");

        let state = orchestrator
            .apply_template(&id, &template(false, PermissionSet::new(false, true, false)))
            .await
            .expect("apply");

        assert_eq!(state, ConsentState::SetPermissions);
        let snapshot = orchestrator.snapshot(&id).await.expect("snapshot");
        assert_eq!(snapshot.draft.permissions, PermissionSet::new(false, true, false));
        assert_eq!(snapshot.draft.duration_class, DurationClass::Permanent);
        assert!(outcomes.taken().is_empty());
        assert!(has_timer(&orchestrator, &id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_approve_template_completes_with_its_grant() {
        let (orchestrator, outcomes) = build_orchestrator();
        let id = RequestId::from("req_auto");
        orchestrator
            .open(build_request("req_auto", 60_000))
            .await
            .expect("open");

        let state = orchestrator
            .apply_template(&id, &template(true, PermissionSet::new(true, true, true)))
            .await
            .expect("apply");

        assert!(matches!(state, ConsentState::Completed { .. }));
        assert!(!has_timer(&orchestrator, &id).await);
        match outcomes.taken().as_slice() {
            [ConsentOutcome::Approved(grant)] => {
                assert_eq!(grant.duration_class, DurationClass::Permanent);
                assert_eq!(grant.permissions, PermissionSet::new(true, true, true));
            }
            other => panic!("expected one approval, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn auto_approve_without_contact_channel_stops_at_permissions() {
        let (orchestrator, outcomes) = build_orchestrator();
        let id = RequestId::from("req_profile_only");
        orchestrator
            .open(build_request("req_profile_only", 60_000))
            .await
            .expect("open");

        let state = orchestrator
            .apply_template(&id, &template(true, PermissionSet::new(false, false, true)))
            .await
            .expect("apply");

        assert_eq!(state, ConsentState::SetPermissions);
        assert!(outcomes.taken().is_empty());

        let err = orchestrator
            .apply_template(
                &RequestId::from("req_unknown"),
                &template(false, PermissionSet::default()),
            )
            .await
            .expect_err("no flow");
        assert_eq!(
            err.downcast_ref::<ConsentFlowError>(),
            Some(&ConsentFlowError::SessionNotFound(RequestId::from("req_unknown")))
        );
    }
}
