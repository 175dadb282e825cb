use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use lk_core::{
    ports::{AvatarStoreError, AvatarStorePort},
    AvatarImage,
};

use crate::fs::atomic_write;

/// Single-file avatar slot holding the data URL as text.
pub struct FileAvatarStore {
    path: PathBuf,
}

impl FileAvatarStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_error(&self, action: &str, err: impl std::fmt::Display) -> AvatarStoreError {
        AvatarStoreError::Storage(format!("{action} {}: {err}", self.path.display()))
    }
}

#[async_trait]
impl AvatarStorePort for FileAvatarStore {
    async fn load(&self) -> Result<Option<AvatarImage>, AvatarStoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.storage_error("read avatar failed", e)),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(AvatarImage::from_data_url(content)?))
    }

    async fn save(&self, avatar: &AvatarImage) -> Result<(), AvatarStoreError> {
        atomic_write(&self.path, avatar.as_data_url())
            .await
            .map_err(|e| self.storage_error("write avatar failed", format!("{e:#}")))
    }

    async fn clear(&self) -> Result<(), AvatarStoreError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.storage_error("remove avatar failed", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avatar() -> AvatarImage {
        AvatarImage::from_data_url("data:image/jpeg;base64,/9j/4AAQSkZJRg==").unwrap()
    }

    #[tokio::test]
    async fn empty_slot_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAvatarStore::new(dir.path().join("avatar"));
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAvatarStore::new(dir.path().join("avatar"));

        store.save(&avatar()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(avatar()));

        store.clear().await.unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.load().await.unwrap(), None);
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn garbage_slot_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avatar");
        fs::write(&path, "<svg/>").await.unwrap();

        let err = FileAvatarStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, AvatarStoreError::Corrupt(_)));
    }

    #[tokio::test]
    async fn unreadable_slot_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be cannot be read as text.
        let path = dir.path().join("avatar");
        fs::create_dir(&path).await.unwrap();

        let err = FileAvatarStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, AvatarStoreError::Storage(_)));
    }
}
