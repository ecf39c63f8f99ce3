use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{event::MediaRef, platform::PlatformPort, Result};

/// Filesystem-backed cache of downloaded media blobs.
///
/// Blobs are keyed by the originating message's id, so no two events write
/// the same path and the store needs no locking beyond the filesystem.
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic blob filename for a message.
    pub fn filename_for(message_id: i32) -> String {
        message_id.to_string()
    }

    /// Download `media` into the store, keyed by the message id, and return
    /// the local path. Completes before the caller may build a public URL
    /// for the blob.
    pub async fn save(
        &self,
        message_id: i32,
        platform: &dyn PlatformPort,
        media: &MediaRef,
    ) -> Result<PathBuf> {
        let path = self.dir.join(Self::filename_for(message_id));
        platform.download_media(media, &path).await?;
        Ok(path)
    }

    /// Delete every regular file whose last-modified time is older than
    /// `retention`. Per-file failures are swallowed; eviction is
    /// best-effort and never propagates.
    pub fn sweep_once(&self, retention: Duration) -> usize {
        let Ok(rd) = fs::read_dir(&self.dir) else {
            return 0;
        };

        let now = SystemTime::now();
        let mut removed = 0usize;
        for ent in rd.flatten() {
            let path = ent.path();
            if !path.is_file() {
                continue;
            }
            let Ok(md) = ent.metadata() else {
                continue;
            };
            let Ok(modified) = md.modified() else {
                continue;
            };
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age > retention && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        removed
    }

    /// Run the eviction sweep immediately and then on a fixed cadence until
    /// `shutdown` is cancelled.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        retention: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tick.tick() => {
                        let removed = store.sweep_once(retention);
                        if removed > 0 {
                            debug!("media sweep removed {removed} file(s)");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_the_message_id() {
        assert_eq!(MediaStore::filename_for(999), "999");
    }

    #[test]
    fn sweep_removes_only_stale_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MediaStore::new(tmp.path()).unwrap();

        fs::write(tmp.path().join("1"), b"one").unwrap();
        fs::write(tmp.path().join("2"), b"two").unwrap();

        // Fresh files survive a sweep with the production retention.
        assert_eq!(store.sweep_once(Duration::from_secs(72 * 3600)), 0);
        assert!(tmp.path().join("1").exists());

        // With zero retention everything written before the sweep is stale.
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(store.sweep_once(Duration::ZERO), 2);
        assert!(!tmp.path().join("1").exists());
        assert!(!tmp.path().join("2").exists());
    }

    #[test]
    fn sweep_on_missing_dir_is_a_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MediaStore::new(tmp.path().join("cache")).unwrap();
        fs::remove_dir_all(store.dir()).unwrap();
        assert_eq!(store.sweep_once(Duration::ZERO), 0);
    }

    #[tokio::test]
    async fn sweeper_stops_on_cancellation() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(MediaStore::new(tmp.path()).unwrap());

        let shutdown = CancellationToken::new();
        let handle = store.spawn_sweeper(
            Duration::from_millis(10),
            Duration::from_secs(3600),
            shutdown.clone(),
        );

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
