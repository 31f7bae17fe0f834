//! Integration tests for the command → capture → transfer / store path.
//!
//! Requests are written through the [`CommandChannel`] exactly as the BLE
//! write handler does, then picked up by [`AppService::poll`].

use crate::mock_hw::{
    MockBlob, MockCamera, MockLink, MockNet, MockUploader, NoDelay, RecordingSink, test_config,
};

use petcam::app::commands::{CaptureKind, CaptureRequest, GeoLocation};
use petcam::app::events::AppEvent;
use petcam::app::service::AppService;
use petcam::capture::{ControllerState, Delivery};
use petcam::command::inbox::{self, RequestReceiver};
use petcam::command::{CommandChannel, CommandSettings, OP_BURST, OP_PREVIEW, OP_SINGLE, encode};
use petcam::config::{Resolution, SystemConfig};
use petcam::error::{CameraError, Error};
use petcam::transfer::{TransferReport, chunk_count};

struct Rig {
    app: AppService<MockBlob, MockLink>,
    commands: CommandChannel,
    camera: MockCamera,
    net: MockNet,
    uploader: MockUploader,
    delay: NoDelay,
    sink: RecordingSink,
}

impl Rig {
    fn with(config: SystemConfig, link: MockLink, sizes: &[usize]) -> Self {
        let (sender, receiver): (_, RequestReceiver) = inbox::channel();
        let commands = CommandChannel::new(CommandSettings::from_config(&config), sender);
        let mut rig = Self {
            app: AppService::new(config, receiver, link, MockBlob::default()),
            commands,
            camera: MockCamera::new(sizes),
            // Sync never finds the home network in these tests.
            net: MockNet::default(),
            uploader: MockUploader::default(),
            delay: NoDelay::default(),
            sink: RecordingSink::default(),
        };
        rig.app.start(&mut rig.sink);
        rig
    }

    fn new(link: MockLink, sizes: &[usize]) -> Self {
        Self::with(test_config(), link, sizes)
    }

    fn poll(&mut self, now_ms: u64) {
        self.app.poll(
            now_ms,
            &mut self.camera,
            &mut self.net,
            &mut self.uploader,
            &mut self.delay,
            &mut self.sink,
        );
    }

    fn completed(&self) -> Vec<(CaptureKind, Delivery)> {
        self.sink
            .events
            .iter()
            .filter_map(|e| match e {
                AppEvent::CaptureCompleted { kind, delivery } => Some((*kind, *delivery)),
                _ => None,
            })
            .collect()
    }

    fn link(&self) -> &MockLink {
        self.app.transfer().link()
    }
}

const HERE: GeoLocation = GeoLocation::new(47.3769, 8.5417);

// ── Streaming to a connected phone ────────────────────────────

#[test]
fn single_capture_streams_in_fixed_chunks() {
    let mut rig = Rig::new(MockLink::connected(), &[1_234]);

    rig.commands.on_write(&encode(OP_SINGLE, Some(HERE), None));
    rig.poll(10);

    let link = rig.link();
    assert_eq!(link.chunks.len(), chunk_count(1_234, 500));
    assert_eq!(link.chunks.len(), 3);
    assert!(link.chunks[..2].iter().all(|c| c.len() == 500));
    assert_eq!(link.chunks[2].len(), 234);
    assert_eq!(&link.reassembled()[..2], &[0xFF, 0xD8]);

    assert_eq!(
        rig.completed(),
        vec![(
            CaptureKind::Single,
            Delivery::Streamed(TransferReport::Delivered {
                chunks: 3,
                bytes: 1_234
            })
        )]
    );
    assert!(rig.app.store().blob().objects.is_empty());
}

#[test]
fn chunks_shrink_to_negotiated_mtu() {
    let mut link = MockLink::connected();
    link.mtu_payload = 182;
    let mut rig = Rig::new(link, &[1_000]);

    rig.commands.on_write(&encode(OP_SINGLE, None, None));
    rig.poll(10);

    assert_eq!(rig.link().chunks.len(), chunk_count(1_000, 182));
    assert!(rig.link().chunks.iter().all(|c| c.len() <= 182));
}

#[test]
fn burst_streams_largest_frame() {
    let mut rig = Rig::new(MockLink::connected(), &[1_000, 4_000, 2_000]);

    rig.commands.on_write(&encode(OP_BURST, Some(HERE), Some(3)));
    rig.poll(10);

    assert_eq!(rig.link().reassembled().len(), 4_000);
    assert_eq!(rig.camera.acquired, 3);
    assert_eq!(rig.camera.live(), 0, "every frame returned to the driver");
    assert!(rig.camera.peak() <= 2, "best-of-N holds at most two frames");
}

#[test]
fn burst_without_count_uses_configured_default() {
    let config = SystemConfig {
        burst_count: 4,
        ..test_config()
    };
    let mut rig = Rig::with(config, MockLink::connected(), &[10, 20, 30, 40, 50]);

    rig.commands.on_write(&encode(OP_BURST, None, None));
    rig.poll(10);

    assert_eq!(rig.camera.acquired, 4);
    assert_eq!(rig.link().reassembled().len(), 40);
    assert_eq!(rig.completed()[0].0, CaptureKind::Burst(4));
}

#[test]
fn corrupt_frames_are_skipped_in_burst() {
    let mut rig = Rig::new(MockLink::connected(), &[0, 3_000, 0]);

    rig.commands.on_write(&encode(OP_BURST, None, Some(3)));
    rig.poll(10);

    assert_eq!(rig.link().reassembled().len(), 3_000);
}

#[test]
fn interrupted_transfer_is_reported() {
    let mut link = MockLink::connected();
    link.fail_after = Some(1);
    let mut rig = Rig::new(link, &[1_500]);

    rig.commands.on_write(&encode(OP_SINGLE, None, None));
    rig.poll(10);

    assert_eq!(
        rig.completed()[0].1,
        Delivery::Streamed(TransferReport::Interrupted { sent: 1, total: 3 })
    );
    // A partially streamed frame is not kept.
    assert!(rig.app.store().blob().objects.is_empty());
}

// ── Preview ───────────────────────────────────────────────────

#[test]
fn preview_switches_resolution_and_restores_it() {
    let mut rig = Rig::new(MockLink::connected(), &[600]);

    rig.commands.on_write(&encode(OP_PREVIEW, None, None));
    rig.poll(10);

    let config = test_config();
    assert_eq!(
        rig.camera.resolution_log,
        vec![config.preview_resolution, config.capture_resolution]
    );
    assert_eq!(rig.camera.resolution, Resolution::Qvga);
    assert_eq!(rig.link().reassembled().len(), 600);
    assert!(rig.delay.total_ms() >= u64::from(config.preview_settle_ms));
}

#[test]
fn preview_without_peer_is_dropped_not_stored() {
    let mut rig = Rig::new(MockLink::absent(), &[600]);

    rig.commands.on_write(&encode(OP_PREVIEW, Some(HERE), None));
    rig.poll(10);

    assert_eq!(
        rig.completed(),
        vec![(CaptureKind::Preview, Delivery::Streamed(TransferReport::NoPeer))]
    );
    assert!(rig.app.store().blob().objects.is_empty());
    assert_eq!(rig.camera.resolution, Resolution::Qvga);
}

// ── Persisting when nobody listens ────────────────────────────

#[test]
fn single_without_peer_is_persisted_with_location() {
    let mut rig = Rig::new(MockLink::absent(), &[2_048]);

    rig.commands.on_write(&encode(OP_SINGLE, Some(GeoLocation::new(47.5, 8.25)), None));
    rig.poll(42_000);

    let blob = rig.app.store().blob();
    assert_eq!(blob.objects["capture_000000042000.jpg"].len(), 2_048);
    assert_eq!(blob.objects["capture_000000042000.txt"], b"47.5,8.25");
    assert!(matches!(rig.completed()[0].1, Delivery::Persisted(_)));
    assert!(rig.link().chunks.is_empty());
}

#[test]
fn captures_in_the_same_millisecond_get_distinct_records() {
    let mut rig = Rig::new(MockLink::absent(), &[100, 200]);

    rig.commands.on_write(&encode(OP_SINGLE, None, None));
    rig.commands.on_write(&encode(OP_SINGLE, None, None));
    rig.poll(5_000);
    rig.poll(5_000);

    assert_eq!(
        rig.app.store().blob().images(),
        vec!["capture_000000005000.jpg", "capture_000000005000_1.jpg"]
    );
    assert_eq!(rig.app.pending_records().unwrap(), 2);
}

#[test]
fn location_is_bound_to_each_request() {
    let mut rig = Rig::new(MockLink::absent(), &[100, 200]);

    rig.commands.on_write(&encode(OP_SINGLE, Some(GeoLocation::new(1.0, 2.0)), None));
    rig.commands.on_write(&encode(OP_SINGLE, Some(GeoLocation::new(3.0, 4.0)), None));
    rig.poll(1_000);
    rig.poll(2_000);

    let blob = rig.app.store().blob();
    assert_eq!(blob.objects["capture_000000001000.txt"], b"1,2");
    assert_eq!(blob.objects["capture_000000002000.txt"], b"3,4");
}

#[test]
fn one_request_per_poll() {
    let mut rig = Rig::new(MockLink::absent(), &[100, 200, 300]);

    for _ in 0..3 {
        rig.commands.on_write(&encode(OP_SINGLE, None, None));
    }
    rig.poll(1_000);
    assert_eq!(rig.app.queued_requests(), 2);
    rig.poll(1_001);
    rig.poll(1_002);
    assert_eq!(rig.app.queued_requests(), 0);
    assert_eq!(rig.app.capture_counts(), (3, 0));
}

// ── Failures ──────────────────────────────────────────────────

#[test]
fn burst_of_only_corrupt_frames_fails_cleanly() {
    let mut rig = Rig::new(MockLink::connected(), &[0, 0]);

    rig.commands.on_write(&encode(OP_BURST, None, Some(2)));
    rig.poll(10);

    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::CaptureFailed {
            kind: CaptureKind::Burst(2),
            error: Error::Camera(CameraError::NoFrame)
        }
    )));
    assert_eq!(rig.app.controller_state(), ControllerState::Idle);
    assert_eq!(rig.app.capture_counts(), (0, 1));
    assert!(rig.link().chunks.is_empty());
}

#[test]
fn sensor_silence_fails_single_without_storing() {
    let mut rig = Rig::new(MockLink::absent(), &[]);
    rig.camera.push(Err(CameraError::NoFrame));

    let result = rig.app.handle_request(
        CaptureRequest::new(CaptureKind::Single, HERE),
        10,
        &mut rig.camera,
        &mut rig.delay,
        &mut rig.sink,
    );

    assert_eq!(result, Err(Error::Camera(CameraError::NoFrame)));
    assert!(rig.app.store().blob().objects.is_empty());
}

#[test]
fn unmountable_store_fails_capture_but_not_service() {
    let (sender, receiver) = inbox::channel();
    let config = test_config();
    let commands = CommandChannel::new(CommandSettings::from_config(&config), sender);
    let blob = MockBlob {
        unmountable: true,
        ..MockBlob::default()
    };
    let mut app = AppService::new(config, receiver, MockLink::absent(), blob);
    let mut sink = RecordingSink::default();
    app.start(&mut sink);
    assert!(matches!(sink.events[0], AppEvent::Started { pending: 0 }));

    let mut camera = MockCamera::new(&[500]);
    commands.on_write(&encode(OP_SINGLE, None, None));
    app.poll(
        10,
        &mut camera,
        &mut MockNet::default(),
        &mut MockUploader::default(),
        &mut NoDelay::default(),
        &mut sink,
    );

    assert_eq!(app.capture_counts(), (0, 1));
    assert_eq!(camera.live(), 0);
}
