use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context as _;

use crate::export::png::{EncodedImage, ExportFormat};
use crate::foundation::error::QrLogoResult;

const URL_PREFIX: &str = "blob:qrlogo/";

struct BlobEntry {
    bytes: Arc<Vec<u8>>,
    format: ExportFormat,
}

/// In-memory registry of exported images, addressed by `blob:` URLs.
///
/// Entries live exactly as long as the [`ExportHandle`] that owns them.
#[derive(Default)]
pub struct BlobStore {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, BlobEntry>>,
}

impl fmt::Debug for BlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobStore")
            .field("live", &self.live_count())
            .finish()
    }
}

impl BlobStore {
    /// Create an empty store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `image` and return the owning handle.
    pub fn publish(self: &Arc<Self>, image: EncodedImage) -> ExportHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(
            id,
            BlobEntry {
                bytes: Arc::new(image.bytes),
                format: image.format,
            },
        );
        tracing::debug!(id, "blob published");
        ExportHandle {
            id,
            width: image.width,
            height: image.height,
            format: image.format,
            store: Arc::clone(self),
        }
    }

    /// Bytes behind `url`, or `None` once revoked.
    pub fn resolve(&self, url: &str) -> Option<Arc<Vec<u8>>> {
        let id = url.strip_prefix(URL_PREFIX)?.parse::<u64>().ok()?;
        self.lock().get(&id).map(|e| Arc::clone(&e.bytes))
    }

    /// MIME type behind `url`, or `None` once revoked.
    pub fn content_type(&self, url: &str) -> Option<&'static str> {
        let id = url.strip_prefix(URL_PREFIX)?.parse::<u64>().ok()?;
        self.lock().get(&id).map(|e| e.format.mime_type())
    }

    /// Number of unrevoked entries.
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn revoke(&self, id: u64) {
        if self.lock().remove(&id).is_some() {
            tracing::debug!(id, "blob revoked");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, BlobEntry>> {
        // Every critical section is a single map call, so a poisoned map is still consistent.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Owning reference to an exported image. Dropping it revokes the blob.
pub struct ExportHandle {
    id: u64,
    width: u32,
    height: u32,
    format: ExportFormat,
    store: Arc<BlobStore>,
}

impl fmt::Debug for ExportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportHandle")
            .field("url", &self.url())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl ExportHandle {
    /// Transient URL resolvable through the owning [`BlobStore`].
    pub fn url(&self) -> String {
        format!("{URL_PREFIX}{}", self.id)
    }

    /// Pixel dimensions of the exported image.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Container format.
    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// Encoded bytes. Always present while the handle is alive.
    pub fn bytes(&self) -> Arc<Vec<u8>> {
        self.store
            .lock()
            .get(&self.id)
            .map(|e| Arc::clone(&e.bytes))
            .unwrap_or_default()
    }

    /// Download file name, e.g. `qr-450x450-1700000000000.png`.
    pub fn suggested_filename(&self, epoch_millis: u128) -> String {
        format!(
            "qr-{}x{}-{epoch_millis}.{}",
            self.width,
            self.height,
            self.format.extension()
        )
    }

    /// Write the image into `dir` under [`Self::suggested_filename`] and return the path.
    pub fn save_to(&self, dir: &Path, epoch_millis: u128) -> QrLogoResult<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create output dir '{}'", dir.display()))?;
        let path = dir.join(self.suggested_filename(epoch_millis));
        std::fs::write(&path, self.bytes().as_slice())
            .with_context(|| format!("write image '{}'", path.display()))?;
        Ok(path)
    }
}

impl Drop for ExportHandle {
    fn drop(&mut self) {
        self.store.revoke(self.id);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/blob.rs"]
mod tests;
