use super::model::*;
use crate::consent::DurationClass;

impl Default for ConsentSettings {
    fn default() -> Self {
        Self {
            countdown_tick_ms: 1_000,
            default_duration: DurationClass::SevenDays,
            request_ttl_secs: 5 * 60,
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            renew_duration_secs: 7 * 24 * 60 * 60,
        }
    }
}

impl Default for AvatarSettings {
    fn default() -> Self {
        Self {
            max_edge_px: 512,
            jpeg_quality: 90,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            consent: ConsentSettings::default(),
            connections: ConnectionSettings::default(),
            avatar: AvatarSettings::default(),
        }
    }
}
