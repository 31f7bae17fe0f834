//! Chunked image transfer over the BLE notify characteristic.
//!
//! A frame is far larger than one notification, so it is split into
//! sequential chunks and pushed in order with a short pause after each one
//! so the phone's GATT client can drain its queue:
//!
//! ```text
//! Notify 1: bytes[0 .. C]
//! Notify 2: bytes[C .. 2C]
//! Notify N: bytes[(N-1)C .. L]      N = ceil(L / C)
//! ```
//!
//! There is no framing, sequence number or acknowledgement; the link is
//! trusted to deliver in order. The phone treats the stream as finished
//! when notifications stop.

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::app::ports::LinkPort;
use crate::config::SystemConfig;

/// Transfer tuning derived from [`SystemConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSettings {
    pub chunk_size: usize,
    pub pacing_ms: u32,
}

impl TransferSettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            chunk_size: usize::from(config.chunk_size),
            pacing_ms: config.chunk_pacing_ms,
        }
    }
}

/// Outcome of one [`TransferChannel::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferReport {
    /// Nobody was connected; nothing was sent.
    NoPeer,
    /// Every chunk was handed to the link.
    Delivered { chunks: usize, bytes: usize },
    /// The link refused a notify part-way through.
    Interrupted { sent: usize, total: usize },
}

/// Number of chunks needed for `len` bytes at `chunk` bytes each.
pub fn chunk_count(len: usize, chunk: usize) -> usize {
    len.div_ceil(chunk.max(1))
}

pub struct TransferChannel<L> {
    link: L,
    settings: TransferSettings,
}

impl<L: LinkPort> TransferChannel<L> {
    pub fn new(link: L, settings: TransferSettings) -> Self {
        Self { link, settings }
    }

    pub fn is_peer_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Effective chunk size: the configured maximum, further limited by
    /// what the link can carry in one notification.
    pub fn chunk_size(&self) -> usize {
        self.settings.chunk_size.min(self.link.max_payload()).max(1)
    }

    /// Push `data` to the connected peer.  Silently does nothing when no
    /// peer is connected.
    pub fn send(&mut self, data: &[u8], delay: &mut impl DelayNs) -> TransferReport {
        if !self.link.is_connected() {
            debug!("No peer connected, dropping {} byte transfer", data.len());
            return TransferReport::NoPeer;
        }

        let chunk = self.chunk_size();
        let total = chunk_count(data.len(), chunk);

        for (i, part) in data.chunks(chunk).enumerate() {
            if let Err(e) = self.link.notify(part) {
                warn!("Transfer stopped at chunk {}/{}: {}", i, total, e);
                return TransferReport::Interrupted { sent: i, total };
            }
            delay.delay_ms(self.settings.pacing_ms);
        }

        debug!("Sent {} bytes in {} chunks of <= {}", data.len(), total, chunk);
        TransferReport::Delivered {
            chunks: total,
            bytes: data.len(),
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}
