//! Locally stored profile picture.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DATA_URL_PREFIX: &str = "data:image/";
const BASE64_MARKER: &str = ";base64,";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AvatarError {
    #[error("avatar is not an image data URL")]
    Malformed,
}

/// Avatar encoded as a `data:image/<type>;base64,<payload>` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarImage(String);

impl AvatarImage {
    pub fn from_data_url(data_url: impl Into<String>) -> Result<Self, AvatarError> {
        let data_url: String = data_url.into();
        let data_url = data_url.trim().to_string();
        let well_formed = data_url
            .strip_prefix(DATA_URL_PREFIX)
            .and_then(|rest| rest.split_once(BASE64_MARKER))
            .is_some_and(|(mime_subtype, payload)| {
                !mime_subtype.is_empty() && !payload.is_empty()
            });
        if !well_formed {
            return Err(AvatarError::Malformed);
        }
        Ok(Self(data_url))
    }

    pub fn from_encoded(mime_type: &str, base64_payload: &str) -> Result<Self, AvatarError> {
        Self::from_data_url(format!("data:{mime_type}{BASE64_MARKER}{base64_payload}"))
    }

    pub fn as_data_url(&self) -> &str {
        &self.0
    }

    pub fn mime_type(&self) -> &str {
        self.0
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(BASE64_MARKER))
            .map(|(mime, _)| mime)
            .unwrap_or_default()
    }
}
