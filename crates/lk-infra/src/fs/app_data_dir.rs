use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR_NAME: &str = "linkaroo";

/// Environment variable selecting an isolated data directory, e.g. for a
/// second local instance.
pub const PROFILE_ENV: &str = "LINKAROO_PROFILE";

fn resolved_app_dir_name() -> String {
    match std::env::var(PROFILE_ENV) {
        Ok(profile) if !profile.is_empty() => format!("{APP_DIR_NAME}-{profile}"),
        _ => APP_DIR_NAME.to_string(),
    }
}

/// Get the Linkaroo application data root directory.
///
/// # Platform-specific Paths
/// - macOS: ~/Library/Application Support/linkaroo
/// - Windows: %APPDATA%\linkaroo
/// - Linux: $XDG_DATA_HOME/linkaroo or ~/.local/share/linkaroo
///
/// A non-empty `LINKAROO_PROFILE` appends `-<profile>` to the directory name.
///
/// This function does not create the directory.
pub fn app_data_dir() -> Result<PathBuf> {
    let base_dir =
        get_platform_data_dir().context("Failed to get platform-specific data directory")?;

    Ok(base_dir.join(resolved_app_dir_name()))
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(app_data_dir()?.join("settings.json"))
}

/// Slot holding the local avatar data URL.
pub fn avatar_path() -> Result<PathBuf> {
    Ok(app_data_dir()?.join("avatar"))
}

fn get_platform_data_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        if let Some(xdg_data_home) = std::env::var_os("XDG_DATA_HOME") {
            return Ok(PathBuf::from(xdg_data_home));
        }
    }

    dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Unable to get platform data directory"))
}
