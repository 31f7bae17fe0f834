//! Camera adapter: esp32-camera driver behind [`CameraPort`].
//!
//! Frames are borrowed driver buffers. [`EspFrame`] returns its buffer with
//! `esp_camera_fb_return` on drop, so a frame cannot outlive the pipeline
//! step that took it and never leaks on an early return.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: OV2640 through `esp_idf_svc::sys::camera`.
//! - **all other targets**: synthetic JPEG-shaped frames whose size can be
//!   scripted, for host-side runs.

use core::ops::Deref;

use log::{debug, info, warn};

use crate::app::ports::CameraPort;
use crate::config::{Resolution, SystemConfig};
use crate::error::CameraError;

/// JPEG start-of-image marker.
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// A frame is usable if it is non-empty and starts with SOI.
pub fn is_jpeg(data: &[u8]) -> bool {
    data.len() > JPEG_SOI.len() && data[..2] == JPEG_SOI
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF backend
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use super::*;
    use crate::pins::*;
    use esp_idf_svc::sys::camera::*;
    use esp_idf_svc::sys::esp;

    pub(super) fn framesize(r: Resolution) -> framesize_t {
        match r {
            Resolution::Qqvga => framesize_t_FRAMESIZE_QQVGA,
            Resolution::Qvga => framesize_t_FRAMESIZE_QVGA,
            Resolution::Vga => framesize_t_FRAMESIZE_VGA,
            Resolution::Svga => framesize_t_FRAMESIZE_SVGA,
            Resolution::Sxga => framesize_t_FRAMESIZE_SXGA,
            Resolution::Uxga => framesize_t_FRAMESIZE_UXGA,
        }
    }

    pub(super) fn init(config: &SystemConfig) -> Result<(), CameraError> {
        let cfg = camera_config_t {
            pin_pwdn: CAM_PWDN_GPIO,
            pin_reset: CAM_RESET_GPIO,
            pin_xclk: CAM_XCLK_GPIO,
            __bindgen_anon_1: camera_config_t__bindgen_ty_1 {
                pin_sccb_sda: CAM_SIOD_GPIO,
            },
            __bindgen_anon_2: camera_config_t__bindgen_ty_2 {
                pin_sccb_scl: CAM_SIOC_GPIO,
            },
            pin_d0: CAM_DATA_GPIOS[0],
            pin_d1: CAM_DATA_GPIOS[1],
            pin_d2: CAM_DATA_GPIOS[2],
            pin_d3: CAM_DATA_GPIOS[3],
            pin_d4: CAM_DATA_GPIOS[4],
            pin_d5: CAM_DATA_GPIOS[5],
            pin_d6: CAM_DATA_GPIOS[6],
            pin_d7: CAM_DATA_GPIOS[7],
            pin_vsync: CAM_VSYNC_GPIO,
            pin_href: CAM_HREF_GPIO,
            pin_pclk: CAM_PCLK_GPIO,
            xclk_freq_hz: CAM_XCLK_FREQ_HZ,
            ledc_timer: ledc_timer_t_LEDC_TIMER_0,
            ledc_channel: ledc_channel_t_LEDC_CHANNEL_0,
            pixel_format: pixformat_t_PIXFORMAT_JPEG,
            frame_size: framesize(config.capture_resolution),
            jpeg_quality: i32::from(config.jpeg_quality),
            fb_count: CAM_FB_COUNT,
            fb_location: camera_fb_location_t_CAMERA_FB_IN_PSRAM,
            grab_mode: camera_grab_mode_t_CAMERA_GRAB_LATEST,
            ..Default::default()
        };
        esp!(unsafe { esp_camera_init(&cfg) }).map_err(|e| {
            log::error!("Camera: init failed ({})", e);
            CameraError::InitFailed
        })
    }

    pub(super) fn set_framesize(r: Resolution) -> Result<(), CameraError> {
        let sensor = unsafe { esp_camera_sensor_get() };
        if sensor.is_null() {
            return Err(CameraError::InitFailed);
        }
        let Some(set) = (unsafe { (*sensor).set_framesize }) else {
            return Err(CameraError::ResolutionRejected);
        };
        if unsafe { set(sensor, framesize(r)) } != 0 {
            return Err(CameraError::ResolutionRejected);
        }
        Ok(())
    }

    /// Driver frame buffer on loan.
    pub struct EspFrame {
        fb: *mut camera_fb_t,
    }

    impl EspFrame {
        pub(super) fn grab() -> Result<Self, CameraError> {
            let fb = unsafe { esp_camera_fb_get() };
            if fb.is_null() {
                return Err(CameraError::NoFrame);
            }
            Ok(Self { fb })
        }
    }

    impl Deref for EspFrame {
        type Target = [u8];

        fn deref(&self) -> &[u8] {
            // SAFETY: fb is non-null and owned by this guard until drop.
            unsafe { core::slice::from_raw_parts((*self.fb).buf, (*self.fb).len) }
        }
    }

    impl Drop for EspFrame {
        fn drop(&mut self) {
            unsafe { esp_camera_fb_return(self.fb) };
        }
    }
}

#[cfg(target_os = "espidf")]
pub use esp::EspFrame;

// ───────────────────────────────────────────────────────────────
// Simulation backend
// ───────────────────────────────────────────────────────────────

/// Simulated frame: an owned JPEG-shaped buffer.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug)]
pub struct SimFrame(Vec<u8>);

#[cfg(not(target_os = "espidf"))]
impl Deref for SimFrame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(not(target_os = "espidf"))]
fn synth_jpeg(len: usize, seed: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(len);
    data.extend_from_slice(&JPEG_SOI);
    let mut x = seed.wrapping_mul(2_654_435_761).max(1);
    while data.len() < len.saturating_sub(2) {
        // xorshift keeps the payload non-uniform without a PRNG dependency.
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        data.push(x as u8);
    }
    data.extend_from_slice(&[0xFF, 0xD9]);
    data.truncate(len.max(4));
    data
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

pub struct CameraAdapter {
    resolution: Resolution,
    frames_taken: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_sizes: std::collections::VecDeque<usize>,
}

impl CameraAdapter {
    /// Initialise the sensor at the capture resolution.
    pub fn new(config: &SystemConfig) -> Result<Self, CameraError> {
        #[cfg(target_os = "espidf")]
        esp::init(config)?;

        let (w, h) = config.capture_resolution.dimensions();
        info!("Camera: ready at {}x{}, quality {}", w, h, config.jpeg_quality);
        Ok(Self {
            resolution: config.capture_resolution,
            frames_taken: 0,
            #[cfg(not(target_os = "espidf"))]
            sim_sizes: std::collections::VecDeque::new(),
        })
    }

    pub fn frames_taken(&self) -> u32 {
        self.frames_taken
    }

    /// Simulation: sizes of the next frames. Once exhausted, frames are
    /// sized from the current resolution.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_queue_sizes(&mut self, sizes: &[usize]) {
        self.sim_sizes.extend(sizes.iter().copied());
    }
}

impl CameraPort for CameraAdapter {
    #[cfg(target_os = "espidf")]
    type Frame = EspFrame;
    #[cfg(not(target_os = "espidf"))]
    type Frame = SimFrame;

    #[cfg(target_os = "espidf")]
    fn acquire(&mut self) -> Result<EspFrame, CameraError> {
        let frame = EspFrame::grab()?;
        self.frames_taken = self.frames_taken.wrapping_add(1);
        if !is_jpeg(&frame) {
            warn!("Camera: frame of {} bytes without SOI", frame.len());
            return Err(CameraError::Corrupt);
        }
        Ok(frame)
    }

    #[cfg(not(target_os = "espidf"))]
    fn acquire(&mut self) -> Result<SimFrame, CameraError> {
        self.frames_taken = self.frames_taken.wrapping_add(1);
        let len = self.sim_sizes.pop_front().unwrap_or_else(|| {
            let (w, h) = self.resolution.dimensions();
            // Roughly 1 byte per 8 pixels at default quality.
            usize::from(w) * usize::from(h) / 8
        });
        if len == 0 {
            warn!("Camera(sim): empty frame");
            return Err(CameraError::Corrupt);
        }
        debug!("Camera(sim): frame {} ({} bytes)", self.frames_taken, len);
        Ok(SimFrame(synth_jpeg(len, self.frames_taken)))
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn set_resolution(&mut self, resolution: Resolution) -> Result<(), CameraError> {
        if resolution == self.resolution {
            return Ok(());
        }
        #[cfg(target_os = "espidf")]
        esp::set_framesize(resolution)?;

        debug!("Camera: {:?} -> {:?}", self.resolution, resolution);
        self.resolution = resolution;
        Ok(())
    }
}
