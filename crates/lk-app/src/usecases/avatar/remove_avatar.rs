use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, info_span, Instrument};

use lk_core::ports::AvatarStorePort;

pub struct RemoveAvatar {
    store: Arc<dyn AvatarStorePort>,
}

impl RemoveAvatar {
    pub fn new(store: Arc<dyn AvatarStorePort>) -> Self {
        Self { store }
    }

    pub async fn execute(&self) -> Result<()> {
        let span = info_span!("usecase.remove_avatar.execute");
        async {
            self.store
                .clear()
                .await
                .context("failed to clear avatar")?;
            info!("avatar removed");
            Ok(())
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::avatar::mocks::MockAvatarStore;

    #[tokio::test]
    async fn clears_store() {
        let mut store = MockAvatarStore::new();
        store.expect_clear().times(1).returning(|| Ok(()));

        RemoveAvatar::new(Arc::new(store))
            .execute()
            .await
            .expect("remove");
    }
}
