use crate::avatar::AvatarImage;

/// Turns raw uploaded image bytes into a stored avatar.
pub trait AvatarEncoderPort: Send + Sync {
    fn encode(&self, image_bytes: &[u8]) -> anyhow::Result<AvatarImage>;
}
