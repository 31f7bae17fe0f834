//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (camera, BLE link, flash store, WiFi, HTTP, NVS, event
//! sinks) implement these traits. The capture controller, store and sync
//! manager consume them via generics, so the domain core never touches the
//! ESP-IDF APIs directly and every path runs on the host against mocks.

use core::ops::Deref;

use crate::config::{Resolution, SystemConfig};
use crate::error::{CameraError, LinkError, NetworkError, StorageError, UploadError};
use crate::sync::upload::UploadRequest;

// ───────────────────────────────────────────────────────────────
// Camera port (driven adapter: sensor → domain)
// ───────────────────────────────────────────────────────────────

/// Frame source.
///
/// A [`Frame`](CameraPort::Frame) is the driver's buffer on loan to the
/// domain: it derefs to the encoded JPEG bytes and hands itself back to the
/// driver when dropped. Callers therefore release a frame simply by letting
/// it go out of scope, on every path.
pub trait CameraPort {
    type Frame: Deref<Target = [u8]>;

    /// Grab the next frame from the sensor pipeline.
    ///
    /// [`CameraError::Corrupt`] means a buffer arrived but is unusable;
    /// any other error means the sensor produced nothing.
    fn acquire(&mut self) -> Result<Self::Frame, CameraError>;

    /// Frame size currently programmed into the sensor.
    fn resolution(&self) -> Resolution;

    /// Reprogram the sensor frame size.
    fn set_resolution(&mut self, resolution: Resolution) -> Result<(), CameraError>;
}

// ───────────────────────────────────────────────────────────────
// Link port (driven adapter: domain → BLE notify characteristic)
// ───────────────────────────────────────────────────────────────

/// Push-style byte channel to the connected phone.
pub trait LinkPort {
    /// Whether a central is currently connected.
    fn is_connected(&self) -> bool;

    /// Largest payload a single notification can carry (negotiated MTU - 3).
    fn max_payload(&self) -> usize;

    /// Push one chunk.  Delivery order is the transport's responsibility.
    fn notify(&mut self, chunk: &[u8]) -> Result<(), LinkError>;
}

// ───────────────────────────────────────────────────────────────
// Blob store port (driven adapter: domain ↔ flash filesystem)
// ───────────────────────────────────────────────────────────────

/// Flat namespace of named byte objects on the durable medium.
pub trait BlobStore {
    /// Make the medium available.  Idempotent.
    fn mount(&mut self) -> Result<(), StorageError>;

    /// Names of every object currently stored, in medium order.
    fn list(&self) -> Result<Vec<String>, StorageError>;

    /// Read a whole object.
    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Create or replace an object.
    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete an object.  Returns `Ok(())` even if it didn't exist.
    fn remove(&mut self, name: &str) -> Result<(), StorageError>;

    /// Check whether an object exists without reading it.
    fn exists(&self, name: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Network port (driven adapter: domain → WiFi station)
// ───────────────────────────────────────────────────────────────

/// Station-mode WiFi used only for the upload window.
pub trait NetworkPort {
    /// SSIDs visible right now.
    fn scan(&mut self) -> Result<Vec<heapless::String<32>>, NetworkError>;

    /// Start associating with `ssid`.  Completion is observed through
    /// [`is_connected`](NetworkPort::is_connected).
    fn begin_connect(&mut self, ssid: &str, password: &str) -> Result<(), NetworkError>;

    fn is_connected(&self) -> bool;

    /// Drop the association and power the radio down.
    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Upload port (driven adapter: domain → HTTP collector)
// ───────────────────────────────────────────────────────────────

/// Submits one upload request and reports the HTTP status.
pub trait UploadPort {
    /// `Ok(status)` whenever a response came back, whatever the status.
    fn post(&mut self, request: &UploadRequest) -> Result<u16, UploadError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting and reject out-of-range
/// values with [`ConfigError::ValidationFailed`] rather than clamping.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`ConfigError::NotFound`] on first boot.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
