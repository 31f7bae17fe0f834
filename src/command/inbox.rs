//! Request hand-off between the BLE callback context and the control loop.
//!
//! The Bluedroid GATT callback runs on the BLE host task; the control loop
//! runs on the main task. Both sides share one mutex-guarded slot holding a
//! small FIFO of whole [`CaptureRequest`]s together with the latest known
//! location, so opcode and location always cross the boundary as one unit.
//!
//! ```text
//!  BLE task ── RequestSender::submit ──▶ [ Mutex<Shared> ] ──▶ RequestReceiver::take ── loop
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use heapless::Deque;
use log::warn;

use crate::app::commands::{CaptureKind, CaptureRequest, GeoLocation};

/// Requests that may wait while a capture or sync is in progress.
pub const INBOX_CAPACITY: usize = 4;

struct Shared {
    queue: Deque<CaptureRequest, INBOX_CAPACITY>,
    latest: GeoLocation,
    rejected: u32,
}

/// What happened to a submitted frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Submission {
    /// The request is waiting for the control loop.
    Queued(CaptureRequest),
    /// Only the location was updated (unknown opcode).
    LocationOnly,
    /// The inbox was full; the request was dropped.
    Rejected,
}

/// Create a connected sender/receiver pair.
pub fn channel() -> (RequestSender, RequestReceiver) {
    let shared = Arc::new(Mutex::new(Shared {
        queue: Deque::new(),
        latest: GeoLocation::default(),
        rejected: 0,
    }));
    (
        RequestSender {
            shared: Arc::clone(&shared),
        },
        RequestReceiver { shared },
    )
}

// A panic on the other side must not wedge the command path.
fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

// ───────────────────────────────────────────────────────────────
// Sender (BLE callback side)
// ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RequestSender {
    shared: Arc<Mutex<Shared>>,
}

impl RequestSender {
    /// Record `location` as the latest known position and, when `kind` is
    /// present, queue a request bound to that same location.
    pub fn submit(&self, location: GeoLocation, kind: Option<CaptureKind>) -> Submission {
        let mut shared = lock(&self.shared);
        shared.latest = location;

        let Some(kind) = kind else {
            return Submission::LocationOnly;
        };

        let request = CaptureRequest::new(kind, location);
        match shared.queue.push_back(request) {
            Ok(()) => Submission::Queued(request),
            Err(_) => {
                shared.rejected = shared.rejected.saturating_add(1);
                warn!(
                    "Inbox full ({} waiting), dropping {} request",
                    INBOX_CAPACITY,
                    kind.label()
                );
                Submission::Rejected
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Receiver (control loop side)
// ───────────────────────────────────────────────────────────────

pub struct RequestReceiver {
    shared: Arc<Mutex<Shared>>,
}

impl RequestReceiver {
    /// Pop the oldest waiting request.  Each request is returned once.
    pub fn take(&self) -> Option<CaptureRequest> {
        lock(&self.shared).queue.pop_front()
    }

    /// Requests currently waiting.
    pub fn pending(&self) -> usize {
        lock(&self.shared).queue.len()
    }

    /// Position carried by the most recent command frame of any kind.
    pub fn latest_location(&self) -> GeoLocation {
        lock(&self.shared).latest
    }

    /// Requests dropped because the inbox was full.
    pub fn rejected(&self) -> u32 {
        lock(&self.shared).rejected
    }
}
