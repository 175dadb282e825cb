use async_trait::async_trait;
use thiserror::Error;

use crate::avatar::{AvatarError, AvatarImage};

#[derive(Debug, Error)]
pub enum AvatarStoreError {
    #[error("avatar storage unavailable: {0}")]
    Storage(String),

    #[error("stored avatar is unreadable: {0}")]
    Corrupt(#[from] AvatarError),
}

/// Persistent slot for the single local avatar.
#[async_trait]
pub trait AvatarStorePort: Send + Sync {
    /// `Ok(None)` when no avatar has been set.
    async fn load(&self) -> Result<Option<AvatarImage>, AvatarStoreError>;
    async fn save(&self, avatar: &AvatarImage) -> Result<(), AvatarStoreError>;
    async fn clear(&self) -> Result<(), AvatarStoreError>;
}
