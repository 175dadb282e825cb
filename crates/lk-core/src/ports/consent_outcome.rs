use async_trait::async_trait;

use crate::consent::{GrantedConnection, RejectionRecord};

/// Callbacks through which a consent flow reports its single terminal outcome.
///
/// Exactly one of these is invoked per flow that reaches completion; none is
/// invoked for a flow that expires.
#[async_trait]
pub trait ConsentOutcomePort: Send + Sync {
    async fn on_approve(&self, grant: GrantedConnection) -> anyhow::Result<()>;
    async fn on_reject(&self, record: RejectionRecord) -> anyhow::Result<()>;
    async fn on_block(&self, record: RejectionRecord) -> anyhow::Result<()>;
}
