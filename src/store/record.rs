//! Durable record naming and the textual location sidecar.
//!
//! ```text
//! capture_000000123456.jpg      image
//! capture_000000123456.txt      "lat,lng"
//! capture_000000123456_1.jpg    second capture in the same millisecond
//! ```

use core::fmt::{self, Write as _};

use crate::app::commands::GeoLocation;

const PREFIX: &str = "capture_";
pub const IMAGE_EXT: &str = ".jpg";
pub const META_EXT: &str = ".txt";

/// Name of one stored object (`capture_…` plus extension).
pub type ObjectName = heapless::String<40>;

/// Identity of a capture record, derived from the capture time.
///
/// Ordering is `(millis, seq)`, which is capture order within one boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub millis: u64,
    pub seq: u8,
}

impl RecordKey {
    pub const fn new(millis: u64, seq: u8) -> Self {
        Self { millis, seq }
    }

    pub fn image_name(&self) -> ObjectName {
        self.object_name(IMAGE_EXT)
    }

    pub fn meta_name(&self) -> ObjectName {
        self.object_name(META_EXT)
    }

    fn object_name(&self, ext: &str) -> ObjectName {
        let mut out = ObjectName::new();
        // 8 + 20 + 4 + 4 bytes worst case, always fits
        let _ = write!(out, "{self}{ext}");
        out
    }

    /// Recover the key from an image object name.  Anything that is not a
    /// `capture_*.jpg` name yields `None`.
    pub fn from_image_name(name: &str) -> Option<Self> {
        let stem = name.strip_prefix(PREFIX)?.strip_suffix(IMAGE_EXT)?;
        let (millis, seq) = match stem.split_once('_') {
            Some((m, s)) => (m, s.parse().ok()?),
            None => (stem, 0),
        };
        if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self::new(millis.parse().ok()?, seq))
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{:012}", self.millis)?;
        if self.seq > 0 {
            write!(f, "_{}", self.seq)?;
        }
        Ok(())
    }
}

/// One pending capture as discovered in storage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRecord {
    pub key: RecordKey,
    /// `None` when the sidecar is missing or unreadable.
    pub location: Option<GeoLocation>,
}

// ───────────────────────────────────────────────────────────────
// Location sidecar
// ───────────────────────────────────────────────────────────────

/// Render a location as `"lat,lng"`.  Shortest form that parses back to
/// the same values.
pub fn format_location(loc: &GeoLocation) -> String {
    format!("{},{}", loc.latitude, loc.longitude)
}

/// Parse a `"lat,lng"` sidecar.  Whitespace around either value is
/// tolerated.
pub fn parse_location(text: &str) -> Option<GeoLocation> {
    let (lat, lng) = text.trim().split_once(',')?;
    let latitude: f64 = lat.trim().parse().ok()?;
    let longitude: f64 = lng.trim().parse().ok()?;
    if !latitude.is_finite() || !longitude.is_finite() {
        return None;
    }
    Some(GeoLocation::new(latitude, longitude))
}
