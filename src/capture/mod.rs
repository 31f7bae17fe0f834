//! Capture controller: turns one [`CaptureRequest`] into one delivered
//! frame.
//!
//! ```text
//!            step(request)
//!   Idle ───────────────────▶ Capturing(kind) ──────▶ Idle
//!                              │ flush stale frames
//!                              │ acquire (best-of-N for bursts)
//!                              └ stream to phone │ persist to flash
//! ```
//!
//! Frames are owned values that go back to the driver when dropped, so
//! every exit path (success, acquisition failure, storage failure) releases
//! what it holds. Preview resolution changes are scoped the same way.

pub mod resolution;
pub mod selection;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::app::commands::{CaptureKind, CaptureRequest, GeoLocation};
use crate::app::ports::{BlobStore, CameraPort, LinkPort};
use crate::config::{Resolution, SystemConfig};
use crate::error::{CameraError, Result};
use crate::store::{CaptureStore, RecordKey};
use crate::transfer::{TransferChannel, TransferReport};

use resolution::ResolutionOverride;
use selection::BestOf;

/// Capture tuning derived from [`SystemConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub capture_resolution: Resolution,
    pub preview_resolution: Resolution,
    pub preview_settle_ms: u32,
    pub single_flush_frames: u8,
    pub burst_flush_frames: u8,
    pub preview_flush_frames: u8,
}

impl CaptureSettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            capture_resolution: config.capture_resolution,
            preview_resolution: config.preview_resolution,
            preview_settle_ms: config.preview_settle_ms,
            single_flush_frames: config.single_flush_frames,
            burst_flush_frames: config.burst_flush_frames,
            preview_flush_frames: config.preview_flush_frames,
        }
    }
}

/// Where a captured frame ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Pushed (or attempted) over the notify link.
    Streamed(TransferReport),
    /// Written to flash for a later sync.
    Persisted(RecordKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Capturing(CaptureKind),
}

/// Everything a capture touches, borrowed for the duration of one step.
pub struct CaptureIo<'a, C, L, B, D> {
    pub camera: &'a mut C,
    pub transfer: &'a mut TransferChannel<L>,
    pub store: &'a mut CaptureStore<B>,
    pub delay: &'a mut D,
    pub now_ms: u64,
}

pub struct CaptureController {
    settings: CaptureSettings,
    state: ControllerState,
}

impl CaptureController {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            settings,
            state: ControllerState::Idle,
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Service one request to completion.  The controller is back in
    /// [`ControllerState::Idle`] when this returns, whatever the outcome.
    pub fn step<C, L, B, D>(
        &mut self,
        request: CaptureRequest,
        io: &mut CaptureIo<'_, C, L, B, D>,
    ) -> Result<Delivery>
    where
        C: CameraPort,
        L: LinkPort,
        B: BlobStore,
        D: DelayNs,
    {
        self.state = ControllerState::Capturing(request.kind);
        let result = match request.kind {
            CaptureKind::Single => self.single(request.location, io),
            CaptureKind::Preview => self.preview(io),
            CaptureKind::Burst(count) => self.burst(count, request.location, io),
        };
        self.state = ControllerState::Idle;
        result
    }

    fn single<C, L, B, D>(
        &self,
        location: GeoLocation,
        io: &mut CaptureIo<'_, C, L, B, D>,
    ) -> Result<Delivery>
    where
        C: CameraPort,
        L: LinkPort,
        B: BlobStore,
        D: DelayNs,
    {
        self.ensure_capture_resolution(&mut *io.camera)?;
        flush(&mut *io.camera, self.settings.single_flush_frames);
        let frame = io.camera.acquire()?;
        debug!("Single capture: {} bytes", frame.len());
        deliver(&frame, location, io)
    }

    fn preview<C, L, B, D>(&self, io: &mut CaptureIo<'_, C, L, B, D>) -> Result<Delivery>
    where
        C: CameraPort,
        L: LinkPort,
        B: BlobStore,
        D: DelayNs,
    {
        let mut camera = ResolutionOverride::apply(&mut *io.camera, self.settings.preview_resolution)?;
        io.delay.delay_ms(self.settings.preview_settle_ms);
        flush(&mut *camera, self.settings.preview_flush_frames);

        let frame = camera.acquire()?;
        let report = io.transfer.send(&frame, &mut *io.delay);
        // Buffer goes back before the sensor is reprogrammed.
        drop(frame);
        drop(camera);

        debug!("Preview: {:?}", report);
        Ok(Delivery::Streamed(report))
    }

    fn burst<C, L, B, D>(
        &self,
        count: u8,
        location: GeoLocation,
        io: &mut CaptureIo<'_, C, L, B, D>,
    ) -> Result<Delivery>
    where
        C: CameraPort,
        L: LinkPort,
        B: BlobStore,
        D: DelayNs,
    {
        self.ensure_capture_resolution(&mut *io.camera)?;
        flush(&mut *io.camera, self.settings.burst_flush_frames);

        let mut selector = BestOf::new();
        for i in 0..count {
            match io.camera.acquire() {
                Ok(frame) => {
                    let len = frame.len();
                    if selector.offer(frame) {
                        debug!("Burst {}/{}: {} bytes, new best", i + 1, count, len);
                    }
                }
                Err(CameraError::Corrupt) => {
                    warn!("Burst {}/{}: undecodable frame, skipped", i + 1, count);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let best = selector.into_best().ok_or(CameraError::NoFrame)?;
        info!("Burst of {} selected {} bytes", count, best.len());
        deliver(&best, location, io)
    }
}

impl CaptureController {
    // A failed preview restore must not leak into full-size captures.
    fn ensure_capture_resolution<C: CameraPort>(&self, camera: &mut C) -> Result<()> {
        let wanted = self.settings.capture_resolution;
        if camera.resolution() != wanted {
            warn!("Sensor at {:?}, resetting to {:?}", camera.resolution(), wanted);
            camera.set_resolution(wanted)?;
        }
        Ok(())
    }
}

/// Discard up to `n` frames already queued in the driver.
fn flush<C: CameraPort>(camera: &mut C, n: u8) {
    for _ in 0..n {
        match camera.acquire() {
            Ok(stale) => drop(stale),
            Err(_) => break,
        }
    }
}

/// Stream to the phone if one is listening, otherwise persist.
fn deliver<C, L, B, D>(
    image: &[u8],
    location: GeoLocation,
    io: &mut CaptureIo<'_, C, L, B, D>,
) -> Result<Delivery>
where
    L: LinkPort,
    B: BlobStore,
    D: DelayNs,
{
    if io.transfer.is_peer_connected() {
        Ok(Delivery::Streamed(io.transfer.send(image, &mut *io.delay)))
    } else {
        Ok(Delivery::Persisted(io.store.save(image, location, io.now_ms)?))
    }
}
