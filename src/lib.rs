//! Linkaroo: consent-gated exchange of masked contact details.
//!
//! The domain lives in `lk-core`, use cases in `lk-app` and adapters in
//! `lk-infra`; this crate wires them together.

pub mod bootstrap;

pub use bootstrap::{load_settings, wire_dependencies, AppPaths, LinkarooRuntime};

/// Resolve the data directory, load settings and wire the runtime.
pub async fn create_runtime() -> anyhow::Result<LinkarooRuntime> {
    let paths = AppPaths::resolve()?;
    let settings = load_settings(&paths.settings_path).await?;
    let runtime = wire_dependencies(settings, paths)?;
    Ok(runtime)
}
