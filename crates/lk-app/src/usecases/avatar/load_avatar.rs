use std::sync::Arc;

use tracing::{info_span, warn, Instrument};

use lk_core::{ports::AvatarStorePort, AvatarImage};

/// Result of reading the stored avatar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarLookup {
    Present(AvatarImage),
    /// No avatar has been set; render initials.
    Absent,
    /// The slot could not be read or held garbage. Render initials and let
    /// the user pick a new picture.
    Fallback { reason: String },
}

impl AvatarLookup {
    pub fn image(&self) -> Option<&AvatarImage> {
        match self {
            AvatarLookup::Present(image) => Some(image),
            _ => None,
        }
    }
}

/// Reads the stored avatar for display.
///
/// Never fails: storage errors degrade to [`AvatarLookup::Fallback`].
pub struct LoadAvatar {
    store: Arc<dyn AvatarStorePort>,
}

impl LoadAvatar {
    pub fn new(store: Arc<dyn AvatarStorePort>) -> Self {
        Self { store }
    }

    pub async fn execute(&self) -> AvatarLookup {
        let span = info_span!("usecase.load_avatar.execute");
        async {
            match self.store.load().await {
                Ok(Some(image)) => AvatarLookup::Present(image),
                Ok(None) => AvatarLookup::Absent,
                Err(error) => {
                    warn!(error = %error, "stored avatar unavailable, falling back to initials");
                    AvatarLookup::Fallback {
                        reason: error.to_string(),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}
