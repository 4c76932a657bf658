use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::{RelayError, StageResult};

/// What a scratch file holds for its request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScratchRole {
    /// The video as fetched from the extraction API
    Original,
    /// The re-encoded video
    Compressed,
}

impl ScratchRole {
    pub fn file_prefix(&self) -> &'static str {
        match self {
            ScratchRole::Original => "downloaded_video",
            ScratchRole::Compressed => "compressed_video",
        }
    }
}

/// Shared scratch directory for in-flight requests.
///
/// File names embed the request id, so concurrent requests never collide and no locking is
/// needed. The sweep only removes entries older than the retention window it is given.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the workspace directory if it is missing
    pub fn ensure_exists(&self) -> StageResult<()> {
        fs_err::create_dir_all(&self.root).map_err(|e| RelayError::Workspace(e.to_string()))
    }

    /// Path of the scratch file for a request and role. Does not touch the filesystem.
    pub fn allocate(&self, request_id: &str, role: ScratchRole) -> PathBuf {
        self.root.join(format!("{}_{}.mp4", role.file_prefix(), request_id))
    }

    /// Delete every entry whose modification time is older than `max_age`.
    ///
    /// Per-entry failures are logged and skipped. Returns how many entries were removed.
    pub async fn sweep_expired(&self, max_age: Duration) -> StageResult<usize> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| RelayError::Workspace(format!("{}: {}", self.root.display(), e)))?;

        let now = SystemTime::now();
        let mut removed = 0;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Failed to read workspace entry: {}", e);
                    break;
                }
            };
            let path = entry.path();

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!("Cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };

            // A modification time in the future counts as brand new
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age <= max_age {
                continue;
            }

            let result = if metadata.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };

            match result {
                Ok(()) => {
                    tracing::debug!("Swept expired workspace entry: {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to delete {}: {}", path.display(), e),
            }
        }

        Ok(removed)
    }

    /// Idempotent delete of a file inside the workspace
    pub async fn remove_if_exists(&self, path: &Path) -> StageResult<bool> {
        if !path.starts_with(&self.root) {
            return Err(RelayError::Workspace(format!(
                "refusing to delete {} outside {}",
                path.display(),
                self.root.display()
            )));
        }

        remove_file_if_exists(path)
            .await
            .map_err(|e| RelayError::Workspace(format!("{}: {}", path.display(), e)))
    }

    /// Best-effort removal of several scratch files; errors are only logged
    pub async fn discard(&self, paths: &[&Path]) {
        for path in paths {
            match self.remove_if_exists(path).await {
                Ok(true) => tracing::debug!("Deleted scratch file: {}", path.display()),
                Ok(false) => {}
                Err(e) => tracing::warn!("{}", e),
            }
        }
    }
}

/// Remove a file, treating an absent file as success. Returns whether a file was deleted.
pub(crate) async fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
