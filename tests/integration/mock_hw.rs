//! Mock adapters for integration tests.
//!
//! Every mock records what the core did to it so tests can assert on the
//! full interaction history without radios, sensors or flash.

use core::ops::Deref;
use std::cell::Cell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use petcam::app::events::AppEvent;
use petcam::app::ports::{BlobStore, CameraPort, EventSink, LinkPort, NetworkPort, UploadPort};
use petcam::config::{Resolution, SystemConfig};
use petcam::error::{CameraError, LinkError, NetworkError, StorageError, UploadError};
use petcam::sync::upload::UploadRequest;

/// Defaults with flushing disabled, so scripted frame sizes map 1:1 onto
/// the frames the controller keeps.
#[allow(dead_code)]
pub fn test_config() -> SystemConfig {
    SystemConfig {
        single_flush_frames: 0,
        burst_flush_frames: 0,
        preview_flush_frames: 0,
        chunk_pacing_ms: 0,
        ..SystemConfig::default()
    }
}

// ── Camera ────────────────────────────────────────────────────

pub struct MockFrame {
    data: Vec<u8>,
    live: Rc<Cell<usize>>,
}

impl Deref for MockFrame {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for MockFrame {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

/// Camera that hands out frames of scripted sizes. `Ok(0)` yields a
/// corrupt frame.
pub struct MockCamera {
    pub script: VecDeque<Result<usize, CameraError>>,
    pub resolution: Resolution,
    pub resolution_log: Vec<Resolution>,
    live: Rc<Cell<usize>>,
    peak: Rc<Cell<usize>>,
    pub acquired: usize,
}

#[allow(dead_code)]
impl MockCamera {
    pub fn new(sizes: &[usize]) -> Self {
        Self {
            script: sizes.iter().map(|&n| Ok(n)).collect(),
            resolution: SystemConfig::default().capture_resolution,
            resolution_log: Vec::new(),
            live: Rc::new(Cell::new(0)),
            peak: Rc::new(Cell::new(0)),
            acquired: 0,
        }
    }

    pub fn push(&mut self, outcome: Result<usize, CameraError>) {
        self.script.push_back(outcome);
    }

    /// Frames not yet returned to the driver.
    pub fn live(&self) -> usize {
        self.live.get()
    }

    /// Most frames held at once.
    pub fn peak(&self) -> usize {
        self.peak.get()
    }
}

impl CameraPort for MockCamera {
    type Frame = MockFrame;

    fn acquire(&mut self) -> Result<MockFrame, CameraError> {
        let len = self.script.pop_front().unwrap_or(Err(CameraError::NoFrame))?;
        self.acquired += 1;
        if len == 0 {
            return Err(CameraError::Corrupt);
        }
        self.live.set(self.live.get() + 1);
        self.peak.set(self.peak.get().max(self.live.get()));
        let mut data = vec![0x5A; len];
        data[0] = 0xFF;
        if len > 1 {
            data[1] = 0xD8;
        }
        Ok(MockFrame {
            data,
            live: Rc::clone(&self.live),
        })
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn set_resolution(&mut self, resolution: Resolution) -> Result<(), CameraError> {
        self.resolution = resolution;
        self.resolution_log.push(resolution);
        Ok(())
    }
}

// ── Link ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockLink {
    pub connected: bool,
    pub mtu_payload: usize,
    pub chunks: Vec<Vec<u8>>,
    /// Refuse the notify after this many chunks.
    pub fail_after: Option<usize>,
}

#[allow(dead_code)]
impl MockLink {
    pub fn connected() -> Self {
        Self {
            connected: true,
            mtu_payload: 509,
            ..Self::default()
        }
    }

    pub fn absent() -> Self {
        Self {
            connected: false,
            mtu_payload: 20,
            ..Self::default()
        }
    }

    pub fn reassembled(&self) -> Vec<u8> {
        self.chunks.concat()
    }
}

impl LinkPort for MockLink {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn max_payload(&self) -> usize {
        self.mtu_payload
    }

    fn notify(&mut self, chunk: &[u8]) -> Result<(), LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        if self.fail_after.is_some_and(|n| self.chunks.len() >= n) {
            return Err(LinkError::NotifyFailed);
        }
        self.chunks.push(chunk.to_vec());
        Ok(())
    }
}

// ── Blob store ────────────────────────────────────────────────

#[derive(Default)]
pub struct MockBlob {
    pub objects: BTreeMap<String, Vec<u8>>,
    pub unmountable: bool,
}

#[allow(dead_code)]
impl MockBlob {
    pub fn images(&self) -> Vec<&str> {
        self.objects
            .keys()
            .filter(|k| k.ends_with(".jpg"))
            .map(String::as_str)
            .collect()
    }
}

impl BlobStore for MockBlob {
    fn mount(&mut self) -> Result<(), StorageError> {
        if self.unmountable {
            Err(StorageError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn list(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.objects.keys().cloned().collect())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.objects.get(name).cloned().ok_or(StorageError::NotFound)
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        self.objects.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        self.objects.remove(name);
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }
}

// ── Network ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNet {
    pub visible: Vec<heapless::String<32>>,
    pub scan_fails: bool,
    /// `None`: association never completes.
    pub associate_after: Option<u32>,
    polls: Cell<u32>,
    pub associating: bool,
    pub scans: u32,
    pub connects: u32,
    pub disconnects: u32,
}

#[allow(dead_code)]
impl MockNet {
    pub fn with_visible(ssids: &[&str]) -> Self {
        let mut net = Self {
            associate_after: Some(0),
            ..Self::default()
        };
        net.set_visible(ssids);
        net
    }

    pub fn set_visible(&mut self, ssids: &[&str]) {
        self.visible = ssids
            .iter()
            .map(|s| {
                let mut name = heapless::String::new();
                name.push_str(s).unwrap();
                name
            })
            .collect();
    }
}

impl NetworkPort for MockNet {
    fn scan(&mut self) -> Result<Vec<heapless::String<32>>, NetworkError> {
        self.scans += 1;
        if self.scan_fails {
            return Err(NetworkError::ScanFailed);
        }
        Ok(self.visible.clone())
    }

    fn begin_connect(&mut self, _ssid: &str, _password: &str) -> Result<(), NetworkError> {
        self.connects += 1;
        self.associating = true;
        self.polls.set(0);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        if !self.associating {
            return false;
        }
        let n = self.polls.get();
        self.polls.set(n + 1);
        self.associate_after.is_some_and(|after| n >= after)
    }

    fn disconnect(&mut self) {
        self.associating = false;
        self.disconnects += 1;
    }
}

// ── Uploader ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockUploader {
    pub script: VecDeque<Result<u16, UploadError>>,
    pub requests: Vec<UploadRequest>,
}

#[allow(dead_code)]
impl MockUploader {
    pub fn answering(outcomes: &[Result<u16, UploadError>]) -> Self {
        Self {
            script: outcomes.iter().copied().collect(),
            requests: Vec::new(),
        }
    }
}

impl UploadPort for MockUploader {
    fn post(&mut self, request: &UploadRequest) -> Result<u16, UploadError> {
        self.requests.push(request.clone());
        self.script.pop_front().unwrap_or(Ok(200))
    }
}

// ── Delay / events ────────────────────────────────────────────

/// Returns immediately; remembers how long it was asked to wait.
#[derive(Default)]
pub struct NoDelay {
    pub total_ns: u64,
}

#[allow(dead_code)]
impl NoDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
