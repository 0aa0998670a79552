use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::foundation::error::{FlipbookError, FlipbookResult};

static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique path in the system temp directory for an intermediate file.
pub(crate) fn scratch_path(stem: &str, ext: &str) -> PathBuf {
    let n = SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "flipbook-{stem}-{}-{n}.{ext}",
        std::process::id()
    ))
}

#[derive(Debug)]
struct LedgerInner {
    dir: PathBuf,
    next_id: AtomicU64,
    urls: Mutex<HashMap<u64, PathBuf>>,
    tracks: AtomicUsize,
}

/// Tracks the temporary resources owned by export sessions.
///
/// Object URLs are temporary files; stream tracks are live capture streams. A torn-down session
/// must leave both counts where they were before it started.
#[derive(Clone, Debug)]
pub struct ResourceLedger {
    inner: Arc<LedgerInner>,
}

impl Default for ResourceLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceLedger {
    /// Ledger whose object URLs live in the system temp directory.
    pub fn new() -> Self {
        Self::with_dir(std::env::temp_dir().join("flipbook"))
    }

    /// Ledger whose object URLs live in `dir`.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(LedgerInner {
                dir: dir.into(),
                next_id: AtomicU64::new(1),
                urls: Mutex::new(HashMap::new()),
                tracks: AtomicUsize::new(0),
            }),
        }
    }

    /// Directory holding object URL files.
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Write `bytes` to a new temporary file and register it as a live object URL.
    pub async fn create_object_url(&self, bytes: &[u8], ext: &str) -> FlipbookResult<ObjectUrl> {
        tokio::fs::create_dir_all(&self.inner.dir)
            .await
            .map_err(|e| {
                FlipbookError::Other(anyhow::anyhow!(
                    "create object url dir '{}': {e}",
                    self.inner.dir.display()
                ))
            })?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let path = self
            .inner
            .dir
            .join(format!("blob-{}-{id}.{ext}", std::process::id()));
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            FlipbookError::Other(anyhow::anyhow!("write object url '{}': {e}", path.display()))
        })?;

        self.urls().insert(id, path.clone());
        tracing::debug!(id, path = %path.display(), "object url created");
        Ok(ObjectUrl {
            id,
            path,
            ledger: self.clone(),
        })
    }

    /// Register a live stream track.
    pub fn open_track(&self) -> StreamTrack {
        self.inner.tracks.fetch_add(1, Ordering::SeqCst);
        StreamTrack {
            ledger: self.clone(),
            live: true,
        }
    }

    /// Number of object URLs created and not yet revoked.
    pub fn live_object_urls(&self) -> usize {
        self.urls().len()
    }

    /// Number of stream tracks started and not yet stopped.
    pub fn live_tracks(&self) -> usize {
        self.inner.tracks.load(Ordering::SeqCst)
    }

    fn revoke(&self, id: u64) -> bool {
        let Some(path) = self.urls().remove(&id) else {
            return false;
        };
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::debug!(path = %path.display(), error = %e, "object url file already gone");
        }
        tracing::debug!(id, "object url revoked");
        true
    }

    fn urls(&self) -> std::sync::MutexGuard<'_, HashMap<u64, PathBuf>> {
        self.inner.urls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Ledger-tracked temporary file standing in for a browser object URL.
#[derive(Clone, Debug)]
pub struct ObjectUrl {
    id: u64,
    path: PathBuf,
    ledger: ResourceLedger,
}

impl ObjectUrl {
    /// `file://` URL of the backing file.
    pub fn href(&self) -> String {
        format!("file://{}", self.path.display())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return `true` until the URL is revoked.
    pub fn is_live(&self) -> bool {
        self.ledger.urls().contains_key(&self.id)
    }

    /// Delete the backing file. Revoking twice is a no-op; returns whether this call revoked it.
    pub fn revoke(&self) -> bool {
        self.ledger.revoke(self.id)
    }
}

/// Live capture stream registration. Stopped explicitly or on drop.
#[derive(Debug)]
pub struct StreamTrack {
    ledger: ResourceLedger,
    live: bool,
}

impl StreamTrack {
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Stop the track. Stopping twice is a no-op.
    pub fn stop(&mut self) {
        if std::mem::take(&mut self.live) {
            self.ledger.inner.tracks.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for StreamTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/ledger.rs"]
mod tests;
