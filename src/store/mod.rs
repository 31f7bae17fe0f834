//! Capture store: paired image + location records on the flash filesystem.
//!
//! There is no index file. The pending set is whatever `capture_*.jpg`
//! objects exist on the medium, re-listed on every call, so it survives
//! power loss as-is. Listing is sorted by key to give FIFO upload order.
//!
//! Image and sidecar are two independent objects. Writes and deletes are
//! best-effort per object: a failed sidecar write keeps the image, and a
//! failed sidecar delete leaves an orphan `.txt` that the next save under
//! the same key simply overwrites.

pub mod record;

use log::{info, warn};

use crate::app::commands::GeoLocation;
use crate::app::ports::BlobStore;
use crate::config::SystemConfig;
use crate::error::StorageError;

pub use record::{CaptureRecord, RecordKey};

/// Store tuning derived from [`SystemConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    /// Oldest records are evicted to stay below this (0 = unbounded).
    pub max_pending: usize,
}

impl StoreSettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            max_pending: usize::from(config.max_pending_records),
        }
    }
}

pub struct CaptureStore<B> {
    blob: B,
    settings: StoreSettings,
    mounted: bool,
    /// Newest key written or found on the medium.  Keys come from uptime,
    /// which restarts every boot, so new keys never go below this.
    last_key: Option<RecordKey>,
    seeded: bool,
}

impl<B: BlobStore> CaptureStore<B> {
    pub fn new(blob: B, settings: StoreSettings) -> Self {
        Self {
            blob,
            settings,
            mounted: false,
            last_key: None,
            seeded: false,
        }
    }

    fn ensure_mounted(&mut self) -> Result<(), StorageError> {
        if !self.mounted {
            self.blob.mount().map_err(|e| {
                warn!("Capture store mount failed: {}", e);
                StorageError::Unavailable
            })?;
            self.mounted = true;
        }
        Ok(())
    }

    /// Persist one capture.  The image is written first; a failed sidecar
    /// write is logged and does not undo it.
    pub fn save(
        &mut self,
        image: &[u8],
        location: GeoLocation,
        now_ms: u64,
    ) -> Result<RecordKey, StorageError> {
        let keys = self.pending_keys()?;
        if !self.seeded {
            self.last_key = self.last_key.max(keys.last().copied());
            self.seeded = true;
        }
        self.make_room(&keys)?;

        let key = self.next_key(now_ms)?;
        self.blob.write(&key.image_name(), image)?;
        self.last_key = Some(key);

        let meta = record::format_location(&location);
        if let Err(e) = self.blob.write(&key.meta_name(), meta.as_bytes()) {
            warn!("{}: sidecar write failed ({}), image kept", key, e);
        }

        info!("Stored {} ({} bytes)", key, image.len());
        Ok(key)
    }

    /// Unique key for a capture at `now_ms`, ordered after every key
    /// already issued or stored.
    fn next_key(&self, now_ms: u64) -> Result<RecordKey, StorageError> {
        let mut key = match self.last_key {
            // Same millisecond: next sequence number.
            Some(last) if last.millis == now_ms => RecordKey::new(last.millis, last.seq),
            // Clock behind the newest record (fresh boot): continue after it.
            Some(last) if last.millis > now_ms => RecordKey::new(last.millis + 1, 0),
            _ => RecordKey::new(now_ms, 0),
        };
        while Some(key) <= self.last_key || self.blob.exists(&key.image_name()) {
            key.seq = key.seq.checked_add(1).ok_or(StorageError::Full)?;
        }
        Ok(key)
    }

    /// Evict the oldest records until a new one fits under the bound.
    fn make_room(&mut self, keys: &[RecordKey]) -> Result<(), StorageError> {
        let max = self.settings.max_pending;
        if max == 0 {
            return Ok(());
        }
        let excess = (keys.len() + 1).saturating_sub(max);
        for key in keys.iter().take(excess) {
            warn!("Store full ({} pending), evicting {}", keys.len(), key);
            self.remove_key(*key)?;
        }
        Ok(())
    }

    /// Keys of every pending record, oldest first.
    pub fn pending_keys(&mut self) -> Result<Vec<RecordKey>, StorageError> {
        self.ensure_mounted()?;
        let mut keys: Vec<RecordKey> = self
            .blob
            .list()?
            .iter()
            .filter_map(|name| RecordKey::from_image_name(name))
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    pub fn pending_count(&mut self) -> Result<usize, StorageError> {
        Ok(self.pending_keys()?.len())
    }

    /// Open one record, reading its sidecar.
    pub fn open(&self, key: RecordKey) -> CaptureRecord {
        let location = self
            .blob
            .read(&key.meta_name())
            .ok()
            .and_then(|bytes| core::str::from_utf8(&bytes).ok().and_then(record::parse_location));
        CaptureRecord { key, location }
    }

    /// Pending records, oldest first.  The listing is taken now; each
    /// record's sidecar is read as the iterator reaches it.
    pub fn enumerate(&mut self) -> Result<Records<'_, B>, StorageError> {
        let keys = self.pending_keys()?;
        Ok(Records {
            store: self,
            keys: keys.into_iter(),
        })
    }

    pub fn load_image(&self, record: &CaptureRecord) -> Result<Vec<u8>, StorageError> {
        self.blob.read(&record.key.image_name())
    }

    /// Delete a record.  The image and sidecar deletions are independent;
    /// only an image deletion failure is reported.
    pub fn remove(&mut self, record: &CaptureRecord) -> Result<(), StorageError> {
        self.remove_key(record.key)
    }

    fn remove_key(&mut self, key: RecordKey) -> Result<(), StorageError> {
        let image = self.blob.remove(&key.image_name());
        if let Err(e) = self.blob.remove(&key.meta_name()) {
            warn!("{}: sidecar delete failed: {}", key, e);
        }
        image
    }

    pub fn blob(&self) -> &B {
        &self.blob
    }

    pub fn blob_mut(&mut self) -> &mut B {
        &mut self.blob
    }
}

/// Lazy walk over the pending set.  See [`CaptureStore::enumerate`].
pub struct Records<'a, B> {
    store: &'a CaptureStore<B>,
    keys: std::vec::IntoIter<RecordKey>,
}

impl<B: BlobStore> Iterator for Records<'_, B> {
    type Item = CaptureRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.keys.next()?;
        Some(self.store.open(key))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}
