//! Command channel: decodes frames written by the phone to the BLE command
//! characteristic and hands capture requests to the control loop.
//!
//! Wire format:
//! ```text
//! ┌────────┬──────────────────┬──────────────────┬─────────────┐
//! │ opcode │ latitude (f64 LE)│ longitude (f64 LE)│ burst count │
//! │ byte 0 │ bytes 1..9       │ bytes 9..17       │ byte 17     │
//! └────────┴──────────────────┴──────────────────┴─────────────┘
//! ```
//!
//! The location is present only when the frame is at least 17 bytes long;
//! shorter frames reset it to (0.0, 0.0). The burst count is optional and
//! only meaningful for [`OP_BURST`]. No acknowledgement goes back to the
//! phone.

pub mod inbox;

use log::{debug, info};

use crate::app::commands::{CaptureKind, CaptureRequest, GeoLocation};
use crate::config::SystemConfig;

use inbox::{RequestSender, Submission};

pub const OP_SINGLE: u8 = 0x01;
pub const OP_BURST: u8 = 0x02;
pub const OP_PREVIEW: u8 = 0x03;

const LAT_OFFSET: usize = 1;
const LNG_OFFSET: usize = 9;
/// Frames at least this long carry a location.
pub const LOCATION_FRAME_LEN: usize = 17;
const BURST_COUNT_OFFSET: usize = 17;

/// Known opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Single,
    Burst,
    Preview,
}

impl Opcode {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            OP_SINGLE => Some(Self::Single),
            OP_BURST => Some(Self::Burst),
            OP_PREVIEW => Some(Self::Preview),
            _ => None,
        }
    }
}

/// A command frame after decoding, before burst-count policy is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedCommand {
    /// The raw first byte.
    pub raw_opcode: u8,
    /// `None` for opcodes this firmware does not implement.
    pub opcode: Option<Opcode>,
    pub location: GeoLocation,
    /// Non-zero burst count carried by a burst frame.
    pub burst_count: Option<u8>,
}

/// Decode one command frame.  Returns `None` for an empty frame.
pub fn decode(frame: &[u8]) -> Option<DecodedCommand> {
    let (&raw_opcode, _) = frame.split_first()?;
    let opcode = Opcode::from_byte(raw_opcode);

    let location = if frame.len() >= LOCATION_FRAME_LEN {
        GeoLocation::new(
            read_f64_le(frame, LAT_OFFSET),
            read_f64_le(frame, LNG_OFFSET),
        )
    } else {
        GeoLocation::default()
    };

    let burst_count = match opcode {
        Some(Opcode::Burst) => frame.get(BURST_COUNT_OFFSET).copied().filter(|&n| n > 0),
        _ => None,
    };

    Some(DecodedCommand {
        raw_opcode,
        opcode,
        location,
        burst_count,
    })
}

fn read_f64_le(frame: &[u8], offset: usize) -> f64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&frame[offset..offset + 8]);
    f64::from_le_bytes(bytes)
}

/// Build a command frame.  Used by tests and the host simulation.
pub fn encode(opcode: u8, location: Option<GeoLocation>, burst_count: Option<u8>) -> heapless::Vec<u8, 18> {
    let mut out = heapless::Vec::new();
    let _ = out.push(opcode);
    if let Some(loc) = location {
        let _ = out.extend_from_slice(&loc.latitude.to_le_bytes());
        let _ = out.extend_from_slice(&loc.longitude.to_le_bytes());
        if let Some(n) = burst_count {
            let _ = out.push(n);
        }
    }
    out
}

// ───────────────────────────────────────────────────────────────
// Burst-count policy
// ───────────────────────────────────────────────────────────────

/// How decoded commands turn into capture kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSettings {
    pub default_burst: u8,
    pub max_burst: u8,
}

impl CommandSettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            default_burst: config.burst_count,
            max_burst: config.max_burst_count,
        }
    }

    fn burst_len(&self, requested: Option<u8>) -> u8 {
        let max = self.max_burst.max(1);
        requested.unwrap_or(self.default_burst).clamp(1, max)
    }
}

impl DecodedCommand {
    /// Capture kind this command asks for, if any.
    pub fn kind(&self, settings: &CommandSettings) -> Option<CaptureKind> {
        Some(match self.opcode? {
            Opcode::Single => CaptureKind::Single,
            Opcode::Preview => CaptureKind::Preview,
            Opcode::Burst => CaptureKind::Burst(settings.burst_len(self.burst_count)),
        })
    }
}

// ───────────────────────────────────────────────────────────────
// CommandChannel
// ───────────────────────────────────────────────────────────────

/// Write handler for the command characteristic.
///
/// Runs in the BLE stack's callback context; everything it touches goes
/// through the [`RequestSender`].
#[derive(Clone)]
pub struct CommandChannel {
    settings: CommandSettings,
    sender: RequestSender,
}

impl CommandChannel {
    pub fn new(settings: CommandSettings, sender: RequestSender) -> Self {
        Self { settings, sender }
    }

    /// Handle one written frame.  Returns the request queued for the
    /// control loop, if any.
    pub fn on_write(&self, frame: &[u8]) -> Option<CaptureRequest> {
        let Some(cmd) = decode(frame) else {
            debug!("Ignoring empty command frame");
            return None;
        };

        let kind = cmd.kind(&self.settings);
        match self.sender.submit(cmd.location, kind) {
            Submission::Queued(request) => {
                info!(
                    "Command 0x{:02x} -> {:?} at ({}, {})",
                    cmd.raw_opcode, request.kind, cmd.location.latitude, cmd.location.longitude
                );
                Some(request)
            }
            Submission::LocationOnly => {
                debug!("Unknown opcode 0x{:02x}, location updated only", cmd.raw_opcode);
                None
            }
            Submission::Rejected => None,
        }
    }
}
