//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, count them in tests,
//! and so on.

use crate::capture::Delivery;
use crate::error::Error;
use crate::sync::SyncReport;

use super::commands::CaptureKind;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The service is up; carries the number of records already waiting
    /// in flash from previous sessions.
    Started { pending: usize },

    /// A capture request finished and its frame went somewhere.
    CaptureCompleted { kind: CaptureKind, delivery: Delivery },

    /// A capture request was abandoned.
    CaptureFailed { kind: CaptureKind, error: Error },

    /// A sync poll ran a cycle (possibly skipped).
    SyncFinished(SyncReport),
}
