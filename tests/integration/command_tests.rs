//! Integration tests for the BLE command path: raw frames in, capture
//! requests out, across the task boundary.

use std::thread;

use petcam::app::commands::{CaptureKind, GeoLocation};
use petcam::command::inbox::{self, INBOX_CAPACITY};
use petcam::command::{
    CommandChannel, CommandSettings, LOCATION_FRAME_LEN, OP_BURST, OP_PREVIEW, OP_SINGLE, decode,
    encode,
};
use petcam::config::SystemConfig;

fn channel() -> (CommandChannel, inbox::RequestReceiver) {
    let (sender, receiver) = inbox::channel();
    let settings = CommandSettings::from_config(&SystemConfig::default());
    (CommandChannel::new(settings, sender), receiver)
}

fn raw_frame(opcode: u8, lat: f64, lng: f64) -> Vec<u8> {
    let mut frame = vec![opcode];
    frame.extend_from_slice(&lat.to_le_bytes());
    frame.extend_from_slice(&lng.to_le_bytes());
    frame
}

#[test]
fn full_frame_carries_location_into_request() {
    let (commands, inbox) = channel();
    let frame = raw_frame(OP_SINGLE, -33.8688, 151.2093);
    assert_eq!(frame.len(), LOCATION_FRAME_LEN);

    commands.on_write(&frame);

    let request = inbox.take().unwrap();
    assert_eq!(request.kind, CaptureKind::Single);
    assert_eq!(request.location, GeoLocation::new(-33.8688, 151.2093));
}

#[test]
fn short_frame_resets_location_to_unknown() {
    let (commands, inbox) = channel();

    commands.on_write(&raw_frame(OP_SINGLE, 10.0, 20.0));
    commands.on_write(&[OP_PREVIEW, 0x01, 0x02]);

    assert_eq!(inbox.take().unwrap().location, GeoLocation::new(10.0, 20.0));
    let preview = inbox.take().unwrap();
    assert_eq!(preview.kind, CaptureKind::Preview);
    assert!(preview.location.is_unknown());
    assert!(inbox.latest_location().is_unknown());
}

#[test]
fn unknown_opcode_only_updates_location() {
    let (commands, inbox) = channel();

    assert!(commands.on_write(&raw_frame(0x7F, 1.0, 2.0)).is_none());

    assert_eq!(inbox.pending(), 0);
    assert_eq!(inbox.latest_location(), GeoLocation::new(1.0, 2.0));
}

#[test]
fn empty_frame_is_ignored() {
    let (commands, inbox) = channel();
    assert!(commands.on_write(&[]).is_none());
    assert_eq!(inbox.pending(), 0);
}

#[test]
fn burst_count_is_clamped() {
    let (commands, inbox) = channel();
    let defaults = SystemConfig::default();

    commands.on_write(&encode(OP_BURST, Some(GeoLocation::default()), Some(200)));
    commands.on_write(&encode(OP_BURST, Some(GeoLocation::default()), Some(0)));
    commands.on_write(&encode(OP_BURST, Some(GeoLocation::default()), Some(5)));

    assert_eq!(
        inbox.take().unwrap().kind,
        CaptureKind::Burst(defaults.max_burst_count)
    );
    assert_eq!(
        inbox.take().unwrap().kind,
        CaptureKind::Burst(defaults.burst_count)
    );
    assert_eq!(inbox.take().unwrap().kind, CaptureKind::Burst(5));
}

#[test]
fn encoder_and_decoder_agree_on_layout() {
    let frame = encode(OP_BURST, Some(GeoLocation::new(0.5, -0.25)), Some(7));
    assert_eq!(frame.len(), LOCATION_FRAME_LEN + 1);

    let cmd = decode(&frame).unwrap();
    assert_eq!(cmd.raw_opcode, OP_BURST);
    assert_eq!(cmd.location, GeoLocation::new(0.5, -0.25));
    assert_eq!(cmd.burst_count, Some(7));
}

#[test]
fn full_inbox_rejects_newest() {
    let (commands, inbox) = channel();

    for i in 0..INBOX_CAPACITY + 2 {
        commands.on_write(&raw_frame(OP_SINGLE, i as f64, 0.0));
    }

    assert_eq!(inbox.pending(), INBOX_CAPACITY);
    assert_eq!(inbox.rejected(), 2);
    // The ones that made it are the oldest, in order.
    for i in 0..INBOX_CAPACITY {
        assert_eq!(inbox.take().unwrap().location.latitude, i as f64);
    }
    // The latest location still tracks the dropped frames.
    assert_eq!(
        inbox.latest_location().latitude,
        (INBOX_CAPACITY + 1) as f64
    );
}

#[test]
fn writes_from_ble_task_reach_control_loop() {
    let (commands, inbox) = channel();

    let writer = {
        let commands = commands.clone();
        thread::spawn(move || {
            for i in 0..INBOX_CAPACITY {
                commands.on_write(&raw_frame(OP_SINGLE, i as f64, i as f64));
            }
        })
    };
    writer.join().unwrap();

    let mut seen = Vec::new();
    while let Some(request) = inbox.take() {
        // Opcode and location always arrive together.
        assert_eq!(request.location.latitude, request.location.longitude);
        seen.push(request.location.latitude);
    }
    assert_eq!(seen, vec![0.0, 1.0, 2.0, 3.0]);
}
