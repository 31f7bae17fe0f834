//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one line per application event to
//! the logger (UART / USB-CDC on the device, stderr on the host).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::capture::Delivery;
use crate::sync::SyncReport;
use crate::transfer::TransferReport;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { pending } => {
                info!("START | pending={}", pending);
            }
            AppEvent::CaptureCompleted { kind, delivery } => match delivery {
                Delivery::Streamed(TransferReport::Delivered { chunks, bytes }) => {
                    info!("CAPTURE | {:?} | streamed {} B in {} chunks", kind, bytes, chunks);
                }
                Delivery::Streamed(TransferReport::NoPeer) => {
                    info!("CAPTURE | {:?} | no peer, frame dropped", kind);
                }
                Delivery::Streamed(TransferReport::Interrupted { sent, total }) => {
                    warn!("CAPTURE | {:?} | stream cut at chunk {}/{}", kind, sent, total);
                }
                Delivery::Persisted(key) => {
                    info!("CAPTURE | {:?} | stored as {}", kind, key);
                }
            },
            AppEvent::CaptureFailed { kind, error } => {
                warn!("CAPTURE | {:?} | failed: {}", kind, error);
            }
            AppEvent::SyncFinished(report) => match report {
                SyncReport::Skipped(reason) => info!("SYNC | skipped: {:?}", reason),
                SyncReport::ConnectFailed => warn!("SYNC | could not associate"),
                SyncReport::Drained(stats) => info!(
                    "SYNC | uploaded={} failed={} pending_at_start={}{}",
                    stats.uploaded,
                    stats.failed,
                    stats.pending,
                    if stats.aborted { " (aborted)" } else { "" },
                ),
            },
        }
    }
}
