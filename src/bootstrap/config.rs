//! Settings loading at startup.
//!
//! Pure data loading: whatever the settings file holds is taken as-is;
//! sections it lacks take their defaults.

use anyhow::Context;
use std::path::Path;

use lk_core::{ports::SettingsPort, Settings};
use lk_infra::FileSettingsRepository;

/// Load settings from `settings_path`, or defaults when the file is missing.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn load_settings(settings_path: &Path) -> anyhow::Result<Settings> {
    FileSettingsRepository::new(settings_path)
        .load()
        .await
        .with_context(|| format!("Failed to load settings: {}", settings_path.display()))
}
