use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, ColorType, GenericImageView};
use lk_core::{
    ports::AvatarEncoderPort, settings::model::AvatarSettings, AvatarImage,
};

/// Downscales uploaded pictures and stores them as JPEG data URLs.
pub struct AvatarEncoder {
    max_edge: u32,
    quality: u8,
}

impl AvatarEncoder {
    pub fn new(max_edge: u32, quality: u8) -> Self {
        Self {
            max_edge: max_edge.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    pub fn from_settings(settings: &AvatarSettings) -> Self {
        Self::new(settings.max_edge_px, settings.jpeg_quality)
    }
}

impl AvatarEncoderPort for AvatarEncoder {
    fn encode(&self, image_bytes: &[u8]) -> Result<AvatarImage> {
        let decoded = image::load_from_memory(image_bytes).context("decode avatar image bytes")?;
        let (original_width, original_height) = decoded.dimensions();
        let (target_width, target_height) =
            calculate_target_size(original_width, original_height, self.max_edge);

        let resized = if target_width == original_width && target_height == original_height {
            decoded
        } else {
            decoded.resize_exact(target_width, target_height, FilterType::Triangle)
        };

        let rgb = resized.to_rgb8();
        let (width, height) = rgb.dimensions();
        let mut jpeg_bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg_bytes, self.quality)
            .encode(rgb.as_raw(), width, height, ColorType::Rgb8.into())
            .context("encode avatar to jpeg")?;

        tracing::debug!(
            original_width,
            original_height,
            width,
            height,
            jpeg_len = jpeg_bytes.len(),
            "avatar encoded"
        );

        AvatarImage::from_encoded("image/jpeg", &STANDARD.encode(&jpeg_bytes))
            .context("wrap avatar as data url")
    }
}

/// Fits `width`x`height` inside a `max_edge` square, keeping aspect ratio.
/// Images already inside the square are left as they are.
fn calculate_target_size(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width <= max_edge && height <= max_edge {
        return (width, height);
    }

    if width >= height {
        let scaled_height = ((height as f64) * (max_edge as f64) / (width as f64)).round() as u32;
        (max_edge, scaled_height.max(1))
    } else {
        let scaled_width = ((width as f64) * (max_edge as f64) / (height as f64)).round() as u32;
        (scaled_width.max(1), max_edge)
    }
}
