//! Store-and-forward sync: opportunistic uploads over home WiFi.
//!
//! Checked from the control loop on a fixed interval; nothing runs in the
//! background. Each cycle:
//!
//! ```text
//! scan ──▶ target visible? ──no──▶ skip (retry next interval)
//!              │ yes
//!              ▼
//!         connect (bounded polls) ──fail──▶ disconnect, skip
//!              │
//!              ▼
//!   for each pending record, oldest first:
//!       POST ──2xx──▶ remove record
//!            └─else──▶ keep for next cycle
//!              │
//!              ▼
//!         disconnect (radio off)
//! ```
//!
//! Delivery is at-least-once: a record is only removed after the
//! collector answered 2xx, so a lost response means a duplicate upload.
//! All state lives in the store; nothing is carried between cycles.

pub mod upload;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::app::ports::{BlobStore, NetworkPort, UploadPort};
use crate::config::SystemConfig;
use crate::error::{NetworkError, Result, UploadError};
use crate::store::{CaptureRecord, CaptureStore};

use upload::{UploadRequest, UploadSettings};

/// Sync tuning derived from [`SystemConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
    pub interval_ms: u32,
    pub connect_attempts: u8,
    pub connect_retry_delay_ms: u32,
    /// 0 disables the early abort.
    pub max_consecutive_failures: u8,
}

impl SyncSettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            ssid: config.wifi_ssid.clone(),
            password: config.wifi_password.clone(),
            interval_ms: config.sync_interval_ms,
            connect_attempts: config.connect_attempts,
            connect_retry_delay_ms: config.connect_retry_delay_ms,
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No home network configured.
    NoCredentials,
    ScanFailed,
    /// Home network not in range.
    NetworkAbsent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Records found when the cycle started.
    pub pending: usize,
    pub uploaded: usize,
    pub failed: usize,
    /// The cycle stopped early after repeated failures.
    pub aborted: bool,
}

/// Result of one sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReport {
    Skipped(SkipReason),
    ConnectFailed,
    Drained(SyncStats),
}

/// Collaborators for one sync cycle.
pub struct SyncIo<'a, N, U, B, D> {
    pub net: &'a mut N,
    pub uploader: &'a mut U,
    pub store: &'a mut CaptureStore<B>,
    pub delay: &'a mut D,
}

pub struct SyncManager {
    settings: SyncSettings,
    upload: UploadSettings,
    last_check_ms: u64,
}

impl SyncManager {
    pub fn new(settings: SyncSettings, upload: UploadSettings) -> Self {
        Self {
            settings,
            upload,
            last_check_ms: 0,
        }
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_check_ms) >= u64::from(self.settings.interval_ms)
    }

    /// Run a cycle if the interval has elapsed.  Returns `None` when it
    /// was not yet time.
    pub fn poll<N, U, B, D>(&mut self, now_ms: u64, io: &mut SyncIo<'_, N, U, B, D>) -> Option<SyncReport>
    where
        N: NetworkPort,
        U: UploadPort,
        B: BlobStore,
        D: DelayNs,
    {
        if !self.is_due(now_ms) {
            return None;
        }
        self.last_check_ms = now_ms;
        Some(self.run_cycle(io))
    }

    /// One full cycle, regardless of the interval.
    pub fn run_cycle<N, U, B, D>(&mut self, io: &mut SyncIo<'_, N, U, B, D>) -> SyncReport
    where
        N: NetworkPort,
        U: UploadPort,
        B: BlobStore,
        D: DelayNs,
    {
        if self.settings.ssid.is_empty() {
            return SyncReport::Skipped(SkipReason::NoCredentials);
        }

        // Scanning powers the radio up; every path below ends with it off.
        let report = match io.net.scan() {
            Err(e) => {
                warn!("WiFi scan failed: {}", e);
                SyncReport::Skipped(SkipReason::ScanFailed)
            }
            Ok(visible) if !visible.iter().any(|ssid| ssid.as_str() == self.settings.ssid.as_str()) => {
                debug!("'{}' not in range ({} networks seen)", self.settings.ssid, visible.len());
                SyncReport::Skipped(SkipReason::NetworkAbsent)
            }
            Ok(_) => {
                info!("'{}' in range, connecting", self.settings.ssid);
                match self.connect(io) {
                    Ok(()) => SyncReport::Drained(self.drain(io)),
                    Err(e) => {
                        warn!("Sync connect failed: {}", e);
                        SyncReport::ConnectFailed
                    }
                }
            }
        };

        io.net.disconnect();
        report
    }

    fn connect<N, U, B, D>(&self, io: &mut SyncIo<'_, N, U, B, D>) -> core::result::Result<(), NetworkError>
    where
        N: NetworkPort,
        D: DelayNs,
    {
        io.net
            .begin_connect(&self.settings.ssid, &self.settings.password)?;
        for _ in 0..self.settings.connect_attempts {
            if io.net.is_connected() {
                return Ok(());
            }
            io.delay.delay_ms(self.settings.connect_retry_delay_ms);
        }
        if io.net.is_connected() {
            Ok(())
        } else {
            Err(NetworkError::ConnectFailed)
        }
    }

    fn drain<N, U, B, D>(&self, io: &mut SyncIo<'_, N, U, B, D>) -> SyncStats
    where
        U: UploadPort,
        B: BlobStore,
    {
        let mut stats = SyncStats::default();
        let keys = match io.store.pending_keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Cannot list pending captures: {}", e);
                return stats;
            }
        };
        stats.pending = keys.len();

        let mut consecutive = 0u8;
        for key in keys {
            let record = io.store.open(key);
            match self.upload_one(&record, io) {
                Ok(()) => {
                    if let Err(e) = io.store.remove(&record) {
                        warn!("{} uploaded but not removed: {}", key, e);
                    }
                    stats.uploaded += 1;
                    consecutive = 0;
                }
                Err(e) => {
                    warn!("{} upload failed, kept: {}", key, e);
                    stats.failed += 1;
                    consecutive = consecutive.saturating_add(1);
                    let limit = self.settings.max_consecutive_failures;
                    if limit > 0 && consecutive >= limit {
                        warn!("{} failures in a row, ending sync early", consecutive);
                        stats.aborted = true;
                        break;
                    }
                }
            }
        }

        info!(
            "Sync: {} uploaded, {} failed, {} pending at start",
            stats.uploaded, stats.failed, stats.pending
        );
        stats
    }

    fn upload_one<N, U, B, D>(&self, record: &CaptureRecord, io: &mut SyncIo<'_, N, U, B, D>) -> Result<()>
    where
        U: UploadPort,
        B: BlobStore,
    {
        let image = io.store.load_image(record)?;
        let request = UploadRequest::for_record(&self.upload, record, &image)?;
        drop(image);

        let status = io.uploader.post(&request)?;
        if upload::is_success(status) {
            debug!("{} accepted ({})", record.key, status);
            Ok(())
        } else {
            Err(UploadError::Status(status).into())
        }
    }
}
