//! System configuration parameters
//!
//! All tunable parameters for the PetCam node. Defaults mirror the values
//! the board shipped with; any of them can be overridden by the blob stored
//! in NVS (see [`crate::adapters::nvs`]).

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use serde::{Deserialize, Serialize};

/// Sensor frame sizes the capture pipeline switches between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// 160x120
    Qqvga,
    /// 320x240
    Qvga,
    /// 640x480
    Vga,
    /// 800x600
    Svga,
    /// 1280x1024
    Sxga,
    /// 1600x1200
    Uxga,
}

impl Resolution {
    /// Pixel dimensions `(width, height)`.
    pub const fn dimensions(self) -> (u16, u16) {
        match self {
            Self::Qqvga => (160, 120),
            Self::Qvga => (320, 240),
            Self::Vga => (640, 480),
            Self::Svga => (800, 600),
            Self::Sxga => (1280, 1024),
            Self::Uxga => (1600, 1200),
        }
    }
}

/// How the image body is carried in the collector upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadEncoding {
    /// `multipart/form-data` with a single `file` part.
    Multipart,
    /// Raw `image/jpeg` request body.
    Raw,
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Camera ---
    /// Frame size used for single and burst captures
    pub capture_resolution: Resolution,
    /// Reduced frame size used for previews
    pub preview_resolution: Resolution,
    /// JPEG quality (0 = best, 63 = worst)
    pub jpeg_quality: u8,
    /// Time to let the sensor settle after a resolution change (ms)
    pub preview_settle_ms: u32,
    /// Stale frames discarded before a single capture
    pub single_flush_frames: u8,
    /// Stale frames discarded before a burst
    pub burst_flush_frames: u8,
    /// Stale frames discarded after the preview resolution switch
    pub preview_flush_frames: u8,
    /// Burst length when the command frame does not carry one
    pub burst_count: u8,
    /// Upper bound for a frame-supplied burst length
    pub max_burst_count: u8,

    // --- BLE transfer ---
    /// Largest notify payload (bytes); also clamped to the negotiated MTU
    pub chunk_size: u16,
    /// Delay after each notify so the phone can keep up (ms)
    pub chunk_pacing_ms: u32,

    // --- Store ---
    /// Oldest captures are evicted once this many are pending
    pub max_pending_records: u16,

    // --- Sync ---
    /// Home network the node uploads from
    pub wifi_ssid: heapless::String<32>,
    /// WPA2 passphrase (empty for open networks)
    pub wifi_password: heapless::String<64>,
    /// Collector endpoint receiving uploads
    pub upload_url: heapless::String<128>,
    /// Body encoding of the upload request
    pub upload_encoding: UploadEncoding,
    /// Per-request HTTP timeout (ms)
    pub upload_timeout_ms: u32,
    /// Interval between network probes (ms)
    pub sync_interval_ms: u32,
    /// Association status polls before giving up
    pub connect_attempts: u8,
    /// Delay between association polls (ms)
    pub connect_retry_delay_ms: u32,
    /// Consecutive upload failures that end a sync cycle early (0 = never)
    pub max_consecutive_failures: u8,
}

fn fixed<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    let _ = out.push_str(s);
    out
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Camera
            capture_resolution: Resolution::Qvga,
            preview_resolution: Resolution::Qqvga,
            jpeg_quality: 12,
            preview_settle_ms: 200,
            single_flush_frames: 2,
            burst_flush_frames: 2,
            preview_flush_frames: 1,
            burst_count: 3,
            max_burst_count: 10,

            // BLE transfer
            chunk_size: 500, // fits a 512-byte negotiated MTU
            chunk_pacing_ms: 10,

            // Store
            max_pending_records: 200,

            // Sync
            wifi_ssid: heapless::String::new(),
            wifi_password: heapless::String::new(),
            upload_url: fixed(DEFAULT_UPLOAD_URL),
            upload_encoding: UploadEncoding::Multipart,
            upload_timeout_ms: 10_000,
            sync_interval_ms: 30_000,
            connect_attempts: 20,       // 20 x 500 ms = 10 s
            connect_retry_delay_ms: 500,
            max_consecutive_failures: 3,
        }
    }
}

/// Built-in collector endpoint.  Stored configs still carrying it are
/// treated as unprovisioned.
pub const DEFAULT_UPLOAD_URL: &str = "http://192.168.0.10:8000/upscale";

/// Site settings baked into the image at build time.
///
/// Set `PETCAM_WIFI_SSID`, `PETCAM_WIFI_PASSWORD` and `PETCAM_UPLOAD_URL`
/// in the build environment; unset variables leave the stored config alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Provisioning {
    pub wifi_ssid: Option<&'static str>,
    pub wifi_password: Option<&'static str>,
    pub upload_url: Option<&'static str>,
}

impl Provisioning {
    pub const fn from_build_env() -> Self {
        Self {
            wifi_ssid: option_env!("PETCAM_WIFI_SSID"),
            wifi_password: option_env!("PETCAM_WIFI_PASSWORD"),
            upload_url: option_env!("PETCAM_UPLOAD_URL"),
        }
    }

    /// Fill in the fields `config` has not been given yet: the home network
    /// when no SSID is stored, the collector when the URL is still the
    /// built-in one.  Returns `true` if `config` changed.
    pub fn apply(&self, config: &mut SystemConfig) -> bool {
        let mut changed = false;

        if let Some(ssid) = self.wifi_ssid.filter(|s| !s.is_empty()) {
            if config.wifi_ssid.is_empty() {
                let password = self.wifi_password.unwrap_or("");
                match (fit::<32>(ssid), fit::<64>(password)) {
                    (Some(ssid), Some(password)) => {
                        config.wifi_ssid = ssid;
                        config.wifi_password = password;
                        changed = true;
                    }
                    _ => warn!("Provisioned WiFi credentials too long, ignored"),
                }
            }
        }

        if let Some(url) = self.upload_url.filter(|u| !u.is_empty()) {
            if config.upload_url.as_str() == DEFAULT_UPLOAD_URL && url != DEFAULT_UPLOAD_URL {
                match fit::<128>(url) {
                    Some(url) => {
                        config.upload_url = url;
                        changed = true;
                    }
                    None => warn!("Provisioned upload URL too long, ignored"),
                }
            }
        }

        changed
    }
}

impl SystemConfig {
    /// Boot-time config: the stored blob, or defaults persisted on first
    /// boot, with `site` filled in over anything still unprovisioned.
    /// A blob that fails to load is not overwritten.
    pub fn load_or_provision(port: &impl ConfigPort, site: &Provisioning) -> Self {
        // (config, writable, first boot)
        let (mut config, writable, fresh) = match port.load() {
            Ok(config) => {
                info!("Config loaded from NVS");
                (config, true, false)
            }
            Err(ConfigError::NotFound) => (Self::default(), true, true),
            Err(e) => {
                warn!("NVS config load failed ({}), using defaults", e);
                (Self::default(), false, false)
            }
        };

        let provisioned = site.apply(&mut config);
        if provisioned {
            info!("Build-time site settings applied");
        }
        if writable && (fresh || provisioned) {
            if let Err(e) = port.save(&config) {
                warn!("Could not persist config: {}", e);
            }
        }
        config
    }
}

fn fit<const N: usize>(s: &str) -> Option<heapless::String<N>> {
    let mut out = heapless::String::new();
    out.push_str(s).ok()?;
    Some(out)
}
