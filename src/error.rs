//! Unified error types for the PetCam firmware.
//!
//! Each subsystem owns a small `Copy` error enum. Those that can end a
//! capture or an upload convert into the top-level [`Error`]; link and
//! network failures are reported through `TransferReport` / `SyncReport`
//! instead.
//! Nothing here allocates, so errors can travel through events and logs
//! freely.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible capture / store / sync operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The camera could not deliver a usable frame.
    Camera(CameraError),
    /// The durable medium rejected a read/write.
    Storage(StorageError),
    /// The collector upload failed.
    Upload(UploadError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camera(e) => write!(f, "camera: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Upload(e) => write!(f, "upload: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Camera errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraError {
    /// The driver returned no frame buffer.
    NoFrame,
    /// A frame arrived but is not a decodable JPEG (empty, truncated, no SOI).
    Corrupt,
    /// The sensor rejected a resolution change.
    ResolutionRejected,
    /// Driver / sensor initialisation failed.
    InitFailed,
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFrame => write!(f, "no frame from sensor"),
            Self::Corrupt => write!(f, "frame failed to decode"),
            Self::ResolutionRejected => write!(f, "resolution change rejected"),
            Self::InitFailed => write!(f, "camera init failed"),
        }
    }
}

impl From<CameraError> for Error {
    fn from(e: CameraError) -> Self {
        Self::Camera(e)
    }
}

// ---------------------------------------------------------------------------
// Link (BLE notify) errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// No central is connected / subscribed.
    NotConnected,
    /// The stack refused the notification.
    NotifyFailed,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "no peer connected"),
            Self::NotifyFailed => write!(f, "notify rejected by stack"),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The medium could not be mounted / made available.
    Unavailable,
    /// Requested object does not exist.
    NotFound,
    /// Partition is full.
    Full,
    /// Generic I/O error.
    Io,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "medium unavailable"),
            Self::NotFound => write!(f, "object not found"),
            Self::Full => write!(f, "medium full"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Network errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ScanFailed,
    ConnectFailed,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ScanFailed => write!(f, "WiFi scan failed"),
            Self::ConnectFailed => write!(f, "WiFi connection failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Upload errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadError {
    /// Connection / socket level failure (includes timeouts).
    Transport,
    /// The collector answered with a non-2xx status.
    Status(u16),
    /// The upload URL could not be composed (too long / malformed).
    BadUrl,
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport failure"),
            Self::Status(code) => write!(f, "collector returned HTTP {code}"),
            Self::BadUrl => write!(f, "upload URL invalid"),
        }
    }
}

impl From<UploadError> for Error {
    fn from(e: UploadError) -> Self {
        Self::Upload(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
