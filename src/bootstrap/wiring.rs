//! # Dependency Injection
//!
//! The only place that depends on lk-infra and lk-app at the same time.
//! It assembles adapters behind their ports and hands out use cases; it makes
//! no decisions of its own.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use lk_app::{
    ConnectionLedger, ConsentConfig, ConsentOrchestrator, LoadAvatar, RemoveAvatar,
    RequestInbox, TemplateStore, UpdateAvatar,
};
use lk_core::{
    consent::{
        ConsentRequest, ConsentRequestError, PermissionSet, RequesterProfile, SourceChannel,
    },
    ports::{AvatarEncoderPort, AvatarStorePort, ClockPort, ConsentOutcomePort},
    Settings,
};
use lk_infra::{AvatarEncoder, FileAvatarStore, SystemClock};

#[derive(Debug, Error)]
pub enum WiringError {
    #[error("failed to resolve app data directory: {0}")]
    DataDirUnavailable(String),

    #[error("failed to create app data directory {path}: {source}")]
    CreateDataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type WiringResult<T> = Result<T, WiringError>;

/// On-disk locations used by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub settings_path: PathBuf,
    pub avatar_path: PathBuf,
}

impl AppPaths {
    pub fn from_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            settings_path: data_dir.join("settings.json"),
            avatar_path: data_dir.join("avatar"),
            data_dir,
        }
    }

    /// Platform data directory, honouring `LINKAROO_PROFILE`.
    pub fn resolve() -> WiringResult<Self> {
        let data_dir = lk_infra::fs::app_data_dir()
            .map_err(|e| WiringError::DataDirUnavailable(format!("{e:#}")))?;
        Ok(Self::from_data_dir(data_dir))
    }
}

/// Assembled application: shared collections, the consent orchestrator and
/// the adapters behind the avatar use cases.
pub struct LinkarooRuntime {
    pub settings: Settings,
    pub paths: AppPaths,
    pub clock: Arc<dyn ClockPort>,
    pub ledger: Arc<ConnectionLedger>,
    pub inbox: Arc<RequestInbox>,
    pub templates: Arc<TemplateStore>,
    pub orchestrator: ConsentOrchestrator,
    avatar_store: Arc<dyn AvatarStorePort>,
    avatar_encoder: Arc<dyn AvatarEncoderPort>,
}

impl LinkarooRuntime {
    pub fn load_avatar(&self) -> LoadAvatar {
        LoadAvatar::new(self.avatar_store.clone())
    }

    pub fn update_avatar(&self) -> UpdateAvatar {
        UpdateAvatar::new(self.avatar_encoder.clone(), self.avatar_store.clone())
    }

    pub fn remove_avatar(&self) -> RemoveAvatar {
        RemoveAvatar::new(self.avatar_store.clone())
    }

    /// Builds an outbound request stamped now, living for the configured TTL.
    pub fn compose_request(
        &self,
        requester: RequesterProfile,
        message: Option<String>,
        source_channel: SourceChannel,
        requested_permissions: PermissionSet,
    ) -> Result<ConsentRequest, ConsentRequestError> {
        ConsentRequest::with_ttl(
            requester,
            message,
            self.clock.now_ms(),
            Duration::from_secs(self.settings.consent.request_ttl_secs),
            source_channel,
            requested_permissions,
        )
    }
}

/// Wire the runtime with the system clock.
pub fn wire_dependencies(settings: Settings, paths: AppPaths) -> WiringResult<LinkarooRuntime> {
    wire_with_clock(settings, paths, Arc::new(SystemClock))
}

/// Wire the runtime with an injected clock.
pub fn wire_with_clock(
    settings: Settings,
    paths: AppPaths,
    clock: Arc<dyn ClockPort>,
) -> WiringResult<LinkarooRuntime> {
    ensure_dir(&paths.data_dir)?;

    let ledger = Arc::new(ConnectionLedger::from_settings(&settings));
    let inbox = Arc::new(RequestInbox::new(ledger.clone()));
    let templates = Arc::new(TemplateStore::new());
    let outcome_port: Arc<dyn ConsentOutcomePort> = inbox.clone();
    let orchestrator = ConsentOrchestrator::new(
        ConsentConfig::from_settings(&settings),
        clock.clone(),
        outcome_port,
    );

    let avatar_store: Arc<dyn AvatarStorePort> =
        Arc::new(FileAvatarStore::new(paths.avatar_path.clone()));
    let avatar_encoder: Arc<dyn AvatarEncoderPort> =
        Arc::new(AvatarEncoder::from_settings(&settings.avatar));

    tracing::info!(data_dir = %paths.data_dir.display(), "runtime wired");

    Ok(LinkarooRuntime {
        settings,
        paths,
        clock,
        ledger,
        inbox,
        templates,
        orchestrator,
        avatar_store,
        avatar_encoder,
    })
}

fn ensure_dir(dir: &Path) -> WiringResult<()> {
    std::fs::create_dir_all(dir).map_err(|source| WiringError::CreateDataDir {
        path: dir.to_path_buf(),
        source,
    })
}
