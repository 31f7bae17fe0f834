//! Fuzz target: command frames written by the phone.
//!
//! Arbitrary bytes go through `decode` and then through a live
//! `CommandChannel`, which must never panic and never queue more than the
//! inbox holds.
//!
//! cargo fuzz run fuzz_command_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use petcam::app::commands::CaptureKind;
use petcam::command::inbox::channel;
use petcam::command::{CommandChannel, CommandSettings, decode};

const SETTINGS: CommandSettings = CommandSettings {
    default_burst: 3,
    max_burst: 10,
};

fuzz_target!(|data: &[u8]| {
    if let Some(cmd) = decode(data) {
        if let Some(CaptureKind::Burst(n)) = cmd.kind(&SETTINGS) {
            assert!((1..=SETTINGS.max_burst).contains(&n), "burst count {n} out of range");
        }
    }

    // Treat the input as a stream of frames split on 0xFF boundaries.
    let (tx, rx) = channel();
    let commands = CommandChannel::new(SETTINGS, tx);
    for frame in data.split(|&b| b == 0xFF) {
        let _ = commands.on_write(frame);
    }
    while rx.take().is_some() {}
    assert_eq!(rx.pending(), 0);
});
