//! Integration tests for store-and-forward: captures persisted while the
//! phone is away are uploaded once the home network shows up.

use crate::mock_hw::{
    MockBlob, MockCamera, MockLink, MockNet, MockUploader, NoDelay, RecordingSink, test_config,
};

use petcam::app::commands::GeoLocation;
use petcam::app::events::AppEvent;
use petcam::app::service::AppService;
use petcam::command::inbox;
use petcam::command::{CommandChannel, CommandSettings, OP_SINGLE, encode};
use petcam::config::{SystemConfig, UploadEncoding};
use petcam::error::UploadError;
use petcam::sync::upload::BOUNDARY;
use petcam::sync::{SkipReason, SyncReport, SyncStats};

const INTERVAL: u64 = 30_000;

struct Rig {
    app: AppService<MockBlob, MockLink>,
    commands: CommandChannel,
    camera: MockCamera,
    net: MockNet,
    uploader: MockUploader,
    delay: NoDelay,
    sink: RecordingSink,
}

fn home_config() -> SystemConfig {
    let mut config = test_config();
    config.wifi_ssid.push_str("HomeNet").unwrap();
    config.wifi_password.push_str("correct-horse").unwrap();
    config.sync_interval_ms = INTERVAL as u32;
    config
}

impl Rig {
    fn new(config: SystemConfig) -> Self {
        let (sender, receiver) = inbox::channel();
        let commands = CommandChannel::new(CommandSettings::from_config(&config), sender);
        let mut rig = Self {
            app: AppService::new(config, receiver, MockLink::absent(), MockBlob::default()),
            commands,
            camera: MockCamera::new(&[]),
            net: MockNet::with_visible(&[]),
            uploader: MockUploader::default(),
            delay: NoDelay::default(),
            sink: RecordingSink::default(),
        };
        rig.app.start(&mut rig.sink);
        rig
    }

    /// Persist one capture per location at `now_ms`, `now_ms + 1`, ...
    fn capture_offline(&mut self, now_ms: u64, locations: &[GeoLocation]) {
        for (i, loc) in locations.iter().enumerate() {
            self.camera.push(Ok(1_000 + i));
            self.commands.on_write(&encode(OP_SINGLE, Some(*loc), None));
            self.app.poll(
                now_ms + i as u64,
                &mut self.camera,
                &mut self.net,
                &mut self.uploader,
                &mut self.delay,
                &mut self.sink,
            );
        }
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

    fn pending(&mut self) -> usize {
        self.app.pending_records().unwrap()
    }

    fn sync_reports(&self) -> Vec<SyncReport> {
        self.sink
            .events
            .iter()
            .filter_map(|e| match e {
                AppEvent::SyncFinished(r) => Some(*r),
                _ => None,
            })
            .collect()
    }
}

fn spots(n: usize) -> Vec<GeoLocation> {
    (0..n)
        .map(|i| GeoLocation::new(47.0 + i as f64, 8.0))
        .collect()
}

// ── Happy path ────────────────────────────────────────────────

#[test]
fn backlog_waits_for_home_network_then_drains() {
    let mut rig = Rig::new(home_config());
    rig.capture_offline(1_000, &spots(3));
    assert_eq!(rig.pending(), 3);

    // Three intervals away from home: nothing moves.
    for k in 1..=3 {
        rig.poll(k * INTERVAL);
        assert_eq!(rig.pending(), 3);
    }
    assert_eq!(rig.net.scans, 3);
    assert_eq!(rig.net.connects, 0);
    assert_eq!(rig.net.disconnects, 3);
    assert!(rig.uploader.requests.is_empty());

    // Home: the fourth check uploads everything.
    rig.net.set_visible(&["Neighbour", "HomeNet"]);
    rig.poll(4 * INTERVAL);

    assert_eq!(rig.pending(), 0);
    assert_eq!(rig.uploader.requests.len(), 3);
    assert_eq!(rig.net.disconnects, 4, "radio goes down after every cycle");
    assert_eq!(
        rig.sync_reports(),
        vec![
            SyncReport::Skipped(SkipReason::NetworkAbsent),
            SyncReport::Skipped(SkipReason::NetworkAbsent),
            SyncReport::Skipped(SkipReason::NetworkAbsent),
            SyncReport::Drained(SyncStats {
                pending: 3,
                uploaded: 3,
                failed: 0,
                aborted: false,
            }),
        ]
    );
}

#[test]
fn uploads_go_oldest_first_with_their_location() {
    let mut rig = Rig::new(home_config());
    rig.capture_offline(5_000, &[GeoLocation::new(1.5, 2.5), GeoLocation::new(3.5, 4.5)]);
    rig.net.set_visible(&["HomeNet"]);

    rig.poll(INTERVAL);

    let urls: Vec<&str> = rig.uploader.requests.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "http://192.168.0.10:8000/upscale?lat=1.5&lng=2.5",
            "http://192.168.0.10:8000/upscale?lat=3.5&lng=4.5",
        ]
    );
    let first = &rig.uploader.requests[0];
    assert!(first.content_type.ends_with(BOUNDARY));
    let body = String::from_utf8_lossy(&first.body);
    assert!(body.contains("filename=\"capture_000000005000.jpg\""));
}

#[test]
fn raw_encoding_posts_bare_jpeg() {
    let config = SystemConfig {
        upload_encoding: UploadEncoding::Raw,
        ..home_config()
    };
    let mut rig = Rig::new(config);
    rig.capture_offline(1_000, &spots(1));
    rig.net.set_visible(&["HomeNet"]);

    rig.poll(INTERVAL);

    let req = &rig.uploader.requests[0];
    assert_eq!(req.content_type, "image/jpeg");
    assert_eq!(req.body.len(), 1_000);
    assert_eq!(&req.body[..2], &[0xFF, 0xD8]);
}

// ── Partial failure ───────────────────────────────────────────

#[test]
fn rejected_uploads_stay_for_next_cycle() {
    let mut rig = Rig::new(home_config());
    rig.capture_offline(1_000, &spots(3));
    rig.net.set_visible(&["HomeNet"]);
    rig.uploader = MockUploader::answering(&[Ok(201), Ok(500), Err(UploadError::Transport)]);

    rig.poll(INTERVAL);
    assert_eq!(rig.pending(), 2);
    assert_eq!(
        rig.sync_reports().last(),
        Some(&SyncReport::Drained(SyncStats {
            pending: 3,
            uploaded: 1,
            failed: 2,
            aborted: false,
        }))
    );

    // Script exhausted: everything answers 200 now.
    rig.poll(2 * INTERVAL);
    assert_eq!(rig.pending(), 0);
    assert_eq!(rig.uploader.requests.len(), 5);
}

#[test]
fn repeated_failures_end_cycle_early() {
    let mut rig = Rig::new(home_config());
    rig.capture_offline(1_000, &spots(6));
    rig.net.set_visible(&["HomeNet"]);
    rig.uploader = MockUploader::answering(&[Ok(503); 6]);

    rig.poll(INTERVAL);

    // max_consecutive_failures defaults to 3.
    assert_eq!(rig.uploader.requests.len(), 3);
    assert_eq!(rig.pending(), 6);
    assert!(matches!(
        rig.sync_reports().last(),
        Some(SyncReport::Drained(SyncStats { aborted: true, .. }))
    ));
    assert_eq!(rig.net.disconnects, 1);
}

#[test]
fn association_timeout_skips_and_disconnects() {
    let mut rig = Rig::new(home_config());
    rig.capture_offline(1_000, &spots(2));
    rig.net.set_visible(&["HomeNet"]);
    rig.net.associate_after = None;
    let before = rig.delay.total_ms();

    rig.poll(INTERVAL);

    assert_eq!(rig.sync_reports().last(), Some(&SyncReport::ConnectFailed));
    assert_eq!(rig.net.disconnects, 1);
    assert_eq!(rig.pending(), 2);
    assert!(rig.uploader.requests.is_empty());

    let config = home_config();
    assert_eq!(
        rig.delay.total_ms() - before,
        u64::from(config.connect_attempts) * u64::from(config.connect_retry_delay_ms)
    );
}

#[test]
fn slow_association_still_connects() {
    let mut rig = Rig::new(home_config());
    rig.capture_offline(1_000, &spots(1));
    rig.net.set_visible(&["HomeNet"]);
    rig.net.associate_after = Some(5);

    rig.poll(INTERVAL);

    assert_eq!(rig.pending(), 0);
}

// ── Skips and scheduling ──────────────────────────────────────

#[test]
fn no_credentials_never_touches_radio() {
    let mut rig = Rig::new(test_config());
    rig.capture_offline(1_000, &spots(1));
    rig.net.set_visible(&["HomeNet"]);

    rig.poll(INTERVAL);

    assert_eq!(
        rig.sync_reports(),
        vec![SyncReport::Skipped(SkipReason::NoCredentials)]
    );
    assert_eq!(rig.net.scans, 0);
    assert_eq!(rig.pending(), 1);
}

#[test]
fn scan_failure_is_a_skip() {
    let mut rig = Rig::new(home_config());
    rig.net.scan_fails = true;

    rig.poll(INTERVAL);

    assert_eq!(
        rig.sync_reports(),
        vec![SyncReport::Skipped(SkipReason::ScanFailed)]
    );
    assert_eq!(rig.net.connects, 0);
    assert_eq!(rig.net.disconnects, 1);
}

#[test]
fn checks_only_once_per_interval() {
    let mut rig = Rig::new(home_config());

    rig.poll(INTERVAL - 1);
    assert!(rig.sync_reports().is_empty());

    rig.poll(INTERVAL);
    rig.poll(INTERVAL + 10);
    rig.poll(2 * INTERVAL - 1);
    assert_eq!(rig.sync_reports().len(), 1);

    rig.poll(2 * INTERVAL);
    assert_eq!(rig.sync_reports().len(), 2);
    assert_eq!(rig.net.scans, 2);
}

#[test]
fn sync_now_ignores_interval() {
    let mut rig = Rig::new(home_config());
    rig.capture_offline(1_000, &spots(2));
    rig.net.set_visible(&["HomeNet"]);

    let report = rig.app.sync_now(
        &mut rig.net,
        &mut rig.uploader,
        &mut rig.delay,
        &mut rig.sink,
    );

    assert!(matches!(report, SyncReport::Drained(SyncStats { uploaded: 2, .. })));
    assert_eq!(rig.pending(), 0);
}

// ── Bounded backlog ───────────────────────────────────────────

#[test]
fn oldest_records_evicted_at_capacity() {
    let config = SystemConfig {
        max_pending_records: 3,
        ..home_config()
    };
    let mut rig = Rig::new(config);
    rig.capture_offline(1_000, &spots(5));

    assert_eq!(rig.pending(), 3);
    assert_eq!(
        rig.app.store().blob().images(),
        vec![
            "capture_000000001002.jpg",
            "capture_000000001003.jpg",
            "capture_000000001004.jpg",
        ]
    );
    // Sidecars go with their images.
    assert_eq!(rig.app.store().blob().objects.len(), 6);
}

#[test]
fn records_from_earlier_session_are_reported_and_synced() {
    let mut blob = MockBlob::default();
    blob.objects
        .insert("capture_000000000777.jpg".into(), vec![0xFF, 0xD8, 0x00]);
    blob.objects
        .insert("capture_000000000777.txt".into(), b"10,20".to_vec());

    let (_sender, receiver) = inbox::channel();
    let mut app = AppService::new(home_config(), receiver, MockLink::absent(), blob);
    let mut sink = RecordingSink::default();
    app.start(&mut sink);
    assert!(matches!(sink.events[0], AppEvent::Started { pending: 1 }));

    let mut net = MockNet::with_visible(&["HomeNet"]);
    let mut uploader = MockUploader::default();
    app.poll(
        INTERVAL,
        &mut MockCamera::new(&[]),
        &mut net,
        &mut uploader,
        &mut NoDelay::default(),
        &mut sink,
    );

    assert_eq!(uploader.requests.len(), 1);
    assert!(uploader.requests[0].url.ends_with("?lat=10&lng=20"));
    assert_eq!(app.pending_records().unwrap(), 0);
}
