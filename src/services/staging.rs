use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::io::{AsyncRead, AsyncWriteExt};
use uuid::Uuid;

/// A payload written to transient local storage for the length of one request.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Write the payload to staging. A partially written file is removed
    /// before the error is returned.
    async fn stage<'a>(
        &self,
        file_name: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> io::Result<StagedFile>;

    /// Delete a staged file. Idempotent; failures are logged, never returned.
    async fn release(&self, staged: &StagedFile);

    /// Check the staging area is usable
    async fn health_check(&self) -> bool;
}

/// Owns a staged file until it is released. Dropping the guard without an
/// explicit release (e.g. the request future was cancelled) schedules the
/// release on the runtime instead.
pub struct StagingGuard {
    staging: Arc<dyn StagingStore>,
    staged: StagedFile,
    released: bool,
}

impl StagingGuard {
    pub fn new(staging: Arc<dyn StagingStore>, staged: StagedFile) -> Self {
        Self {
            staging,
            staged,
            released: false,
        }
    }

    pub fn file(&self) -> &StagedFile {
        &self.staged
    }

    pub async fn release(mut self) {
        // Marked first so a release cancelled mid-await is not repeated by Drop
        self.released = true;
        self.staging.release(&self.staged).await;
    }
}

impl fmt::Debug for StagingGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingGuard")
            .field("staged", &self.staged)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let staging = self.staging.clone();
        let staged = self.staged.clone();
        tracing::warn!("Request ended before cleanup, releasing {:?}", staged.path);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    staging.release(&staged).await;
                });
            }
            Err(_) => {
                if let Err(e) = std::fs::remove_file(&staged.path) {
                    if e.kind() != io::ErrorKind::NotFound {
                        tracing::error!("Error cleaning up staged file {:?}: {}", staged.path, e);
                    }
                }
            }
        }
    }
}

/// Staging on the local filesystem under a single directory
pub struct LocalStagingStore {
    root: PathBuf,
}

impl LocalStagingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn staged_path(&self, file_name: &str) -> PathBuf {
        let unique = format!(
            "{}-{}-{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            file_name
        );
        self.root.join(unique)
    }

    /// Delete staged files older than `max_age`. Returns how many were removed.
    pub async fn sweep_stale(&self, max_age: Duration) -> io::Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let now = SystemTime::now();
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();

            if age < max_age {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    tracing::info!("Swept stale staged file {:?} (age {:?})", entry.path(), age);
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!("Failed to sweep staged file {:?}: {}", entry.path(), e);
                }
            }
        }

        Ok(removed)
    }
}

#[async_trait]
impl StagingStore for LocalStagingStore {
    async fn stage<'a>(
        &self,
        file_name: &str,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> io::Result<StagedFile> {
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self.staged_path(file_name);
        let created_at = Utc::now();

        let written = async {
            let mut file = tokio::fs::File::create(&path).await?;
            let size = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, io::Error>(size)
        }
        .await;

        match written {
            Ok(size_bytes) => {
                tracing::debug!("Staged {} ({} bytes) at {:?}", file_name, size_bytes, path);
                Ok(StagedFile {
                    path,
                    file_name: file_name.to_string(),
                    size_bytes,
                    created_at,
                })
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        tracing::error!(
                            "Error cleaning up partial staged file {:?}: {}",
                            path,
                            cleanup
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn release(&self, staged: &StagedFile) {
        match tokio::fs::remove_file(&staged.path).await {
            Ok(()) => tracing::debug!("Released staged file {:?}", staged.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("Staged file {:?} already gone", staged.path);
            }
            Err(e) => tracing::error!("Error cleaning up staged file {:?}: {}", staged.path, e),
        }
    }

    async fn health_check(&self) -> bool {
        tokio::fs::create_dir_all(&self.root).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stage_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStagingStore::new(dir.path().join("staging"));

        let staged = store
            .stage("clip.mp4", Box::new(&b"fake video bytes"[..]))
            .await
            .unwrap();

        assert_eq!(staged.size_bytes, 16);
        assert!(staged.path.starts_with(store.root()));
        assert!(staged.path.to_string_lossy().ends_with("-clip.mp4"));
        assert_eq!(tokio::fs::read(&staged.path).await.unwrap(), b"fake video bytes");

        store.release(&staged).await;
        assert!(!staged.path.exists());

        // Releasing again is a no-op
        store.release(&staged).await;
    }

    #[tokio::test]
    async fn test_same_name_does_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStagingStore::new(dir.path());

        let a = store.stage("clip.mp4", Box::new(&b"a"[..])).await.unwrap();
        let b = store.stage("clip.mp4", Box::new(&b"b"[..])).await.unwrap();
        assert_ne!(a.path, b.path);
    }

    #[tokio::test]
    async fn test_stage_fails_when_root_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let store = LocalStagingStore::new(&blocker);
        assert!(store.stage("clip.mp4", Box::new(&b"a"[..])).await.is_err());
        assert!(!store.health_check().await);
    }

    #[tokio::test]
    async fn test_sweep_only_removes_old_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStagingStore::new(dir.path());
        let staged = store.stage("clip.mp4", Box::new(&b"a"[..])).await.unwrap();

        assert_eq!(store.sweep_stale(Duration::from_secs(3600)).await.unwrap(), 0);
        assert!(staged.path.exists());

        assert_eq!(store.sweep_stale(Duration::ZERO).await.unwrap(), 1);
        assert!(!staged.path.exists());
    }

    #[tokio::test]
    async fn test_sweep_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStagingStore::new(dir.path().join("never-created"));
        assert_eq!(store.sweep_stale(Duration::ZERO).await.unwrap(), 0);
    }
    #[derive(Default)]
    struct StuckRelease {
        releases: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl StagingStore for StuckRelease {
        async fn stage<'a>(
            &self,
            _file_name: &str,
            _reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
        ) -> io::Result<StagedFile> {
            Err(io::Error::other("not used"))
        }

        async fn release(&self, _staged: &StagedFile) {
            self.releases.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            std::future::pending::<()>().await;
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn staged_at(path: PathBuf) -> StagedFile {
        StagedFile {
            path,
            file_name: "clip.mp4".to_string(),
            size_bytes: 1,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_cancelled_release_is_not_repeated_on_drop() {
        let store = Arc::new(StuckRelease::default());
        let guard = StagingGuard::new(store.clone(), staged_at(PathBuf::from("/nonexistent")));

        let cancelled = tokio::time::timeout(Duration::from_millis(50), guard.release()).await;
        assert!(cancelled.is_err());

        // Give a spawned Drop release the chance to run
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(store.releases.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_guard_releases_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStagingStore::new(dir.path()));
        let staged = store.stage("clip.mp4", Box::new(&b"a"[..])).await.unwrap();
        let path = staged.path.clone();

        drop(StagingGuard::new(store, staged));

        for _ in 0..100 {
            if !path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!path.exists());
    }
}
