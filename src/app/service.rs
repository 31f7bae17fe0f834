//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the capture controller, the transfer channel, the
//! capture store and the sync manager, and drains the request inbox fed by
//! the BLE command characteristic. All I/O flows through port traits, the
//! link and store by ownership, everything else injected at call sites, so
//! the whole service runs on the host against mocks.
//!
//! ```text
//!  RequestReceiver ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!      CameraPort ───▶ │          AppService          │ ──▶ LinkPort
//!     NetworkPort ◀──▶ │ Capture · Transfer · Store   │ ◀─▶ BlobStore
//!      UploadPort ◀─── │            · Sync            │
//!                      └──────────────────────────────┘
//! ```

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::capture::{CaptureController, CaptureIo, CaptureSettings, ControllerState, Delivery};
use crate::command::inbox::RequestReceiver;
use crate::config::SystemConfig;
use crate::error::Result;
use crate::store::{CaptureStore, StoreSettings};
use crate::sync::upload::UploadSettings;
use crate::sync::{SyncIo, SyncManager, SyncReport, SyncSettings};
use crate::transfer::{TransferChannel, TransferSettings};

use super::commands::CaptureRequest;
use super::events::AppEvent;
use super::ports::{BlobStore, CameraPort, EventSink, LinkPort, NetworkPort, UploadPort};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService<B, L> {
    config: SystemConfig,
    inbox: RequestReceiver,
    controller: CaptureController,
    transfer: TransferChannel<L>,
    store: CaptureStore<B>,
    sync: SyncManager,
    captures_ok: u32,
    captures_failed: u32,
}

impl<B: BlobStore, L: LinkPort> AppService<B, L> {
    /// Construct the service.  Call [`start`](Self::start) next.
    pub fn new(config: SystemConfig, inbox: RequestReceiver, link: L, blob: B) -> Self {
        let controller = CaptureController::new(CaptureSettings::from_config(&config));
        let transfer = TransferChannel::new(link, TransferSettings::from_config(&config));
        let store = CaptureStore::new(blob, StoreSettings::from_config(&config));
        let sync = SyncManager::new(
            SyncSettings::from_config(&config),
            UploadSettings::from_config(&config),
        );

        Self {
            config,
            inbox,
            controller,
            transfer,
            store,
            sync,
            captures_ok: 0,
            captures_failed: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Mount the store and report what is still waiting from earlier
    /// sessions.  A store that cannot be mounted is not fatal: streaming
    /// still works and `save` retries the mount.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        let pending = match self.store.pending_count() {
            Ok(n) => n,
            Err(e) => {
                warn!("Capture store unavailable at start: {}", e);
                0
            }
        };
        sink.emit(&AppEvent::Started { pending });
        info!("AppService started, {} captures pending", pending);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// One pass of the control loop: service at most one waiting capture
    /// request, then run a sync cycle if one is due.
    pub fn poll(
        &mut self,
        now_ms: u64,
        camera: &mut impl CameraPort,
        net: &mut impl NetworkPort,
        uploader: &mut impl UploadPort,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) {
        if let Some(request) = self.inbox.take() {
            // Failure is already reported through the sink.
            let _ = self.handle_request(request, now_ms, camera, &mut *delay, sink);
        }

        let mut io = SyncIo {
            net,
            uploader,
            store: &mut self.store,
            delay,
        };
        if let Some(report) = self.sync.poll(now_ms, &mut io) {
            sink.emit(&AppEvent::SyncFinished(report));
        }
    }

    /// Run one capture request to completion.
    pub fn handle_request(
        &mut self,
        request: CaptureRequest,
        now_ms: u64,
        camera: &mut impl CameraPort,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> Result<Delivery> {
        let mut io = CaptureIo {
            camera,
            transfer: &mut self.transfer,
            store: &mut self.store,
            delay,
            now_ms,
        };
        let result = self.controller.step(request, &mut io);

        match &result {
            Ok(delivery) => {
                self.captures_ok = self.captures_ok.wrapping_add(1);
                sink.emit(&AppEvent::CaptureCompleted {
                    kind: request.kind,
                    delivery: *delivery,
                });
            }
            Err(e) => {
                self.captures_failed = self.captures_failed.wrapping_add(1);
                warn!("{} capture failed: {}", request.kind.label(), e);
                sink.emit(&AppEvent::CaptureFailed {
                    kind: request.kind,
                    error: *e,
                });
            }
        }
        result
    }

    /// Run a sync cycle now, ignoring the interval.
    pub fn sync_now(
        &mut self,
        net: &mut impl NetworkPort,
        uploader: &mut impl UploadPort,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> SyncReport {
        let mut io = SyncIo {
            net,
            uploader,
            store: &mut self.store,
            delay,
        };
        let report = self.sync.run_cycle(&mut io);
        sink.emit(&AppEvent::SyncFinished(report));
        report
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn controller_state(&self) -> ControllerState {
        self.controller.state()
    }

    /// Requests waiting in the inbox.
    pub fn queued_requests(&self) -> usize {
        self.inbox.pending()
    }

    /// `(completed, failed)` capture counts since start.
    pub fn capture_counts(&self) -> (u32, u32) {
        (self.captures_ok, self.captures_failed)
    }

    pub fn pending_records(&mut self) -> Result<usize> {
        Ok(self.store.pending_count()?)
    }

    pub fn store(&self) -> &CaptureStore<B> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut CaptureStore<B> {
        &mut self.store
    }

    pub fn transfer(&self) -> &TransferChannel<L> {
        &self.transfer
    }

    pub fn transfer_mut(&mut self) -> &mut TransferChannel<L> {
        &mut self.transfer
    }
}
