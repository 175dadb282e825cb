use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, info_span, Instrument};

use lk_core::{
    ports::{AvatarEncoderPort, AvatarStorePort},
    AvatarImage,
};

/// Encodes an uploaded picture and stores it as the avatar.
pub struct UpdateAvatar {
    encoder: Arc<dyn AvatarEncoderPort>,
    store: Arc<dyn AvatarStorePort>,
}

impl UpdateAvatar {
    pub fn new(encoder: Arc<dyn AvatarEncoderPort>, store: Arc<dyn AvatarStorePort>) -> Self {
        Self { encoder, store }
    }

    pub async fn execute(&self, image_bytes: &[u8]) -> Result<AvatarImage> {
        let span = info_span!("usecase.update_avatar.execute", input_bytes = image_bytes.len());
        async {
            let avatar = self
                .encoder
                .encode(image_bytes)
                .context("failed to encode avatar")?;
            self.store
                .save(&avatar)
                .await
                .context("failed to store avatar")?;

            info!(
                mime_type = avatar.mime_type(),
                encoded_len = avatar.as_data_url().len(),
                "avatar updated"
            );
            Ok(avatar)
        }
        .instrument(span)
        .await
    }
}
