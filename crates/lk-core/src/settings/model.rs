use serde::{Deserialize, Serialize};

use crate::consent::DurationClass;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentSettings {
    /// Countdown refresh cadence for pending requests.
    pub countdown_tick_ms: u64,
    /// Duration preselected on the permissions step.
    pub default_duration: DurationClass,
    /// Lifetime given to requests created on this device.
    pub request_ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Lifetime applied when an expired connection is renewed.
    pub renew_duration_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarSettings {
    /// Uploaded pictures are scaled down to fit this square.
    pub max_edge_px: u32,
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "current_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub consent: ConsentSettings,

    #[serde(default)]
    pub connections: ConnectionSettings,

    #[serde(default)]
    pub avatar: AvatarSettings,
}

fn current_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}
