//! Inbound capture requests.
//!
//! These represent actions requested by the phone over the BLE command
//! characteristic. The [`CommandChannel`](crate::command::CommandChannel)
//! builds them; the [`AppService`](super::service::AppService) consumes
//! them one at a time.

/// Position reported by the phone alongside a command.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// `true` for the (0.0, 0.0) placeholder sent when the phone had no fix.
    pub fn is_unknown(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

/// The three capture flavours the controller knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    /// One fresh frame at full resolution.
    Single,
    /// One low-resolution frame, streamed immediately.
    Preview,
    /// Best-of-N selection over `count` frames.
    Burst(u8),
}

impl CaptureKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Preview => "preview",
            Self::Burst(_) => "burst",
        }
    }
}

/// A capture request with the location snapshot taken when it was decoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRequest {
    pub kind: CaptureKind,
    pub location: GeoLocation,
}

impl CaptureRequest {
    pub const fn new(kind: CaptureKind, location: GeoLocation) -> Self {
        Self { kind, location }
    }
}
