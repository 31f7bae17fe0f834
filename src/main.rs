//! PetCam firmware entry point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BleAdapter/BleLink  CameraAdapter  FsBlobStore   NvsAdapter   │
//! │  (commands, Link)    (CameraPort)   (BlobStore)   (ConfigPort) │
//! │  WifiAdapter         HttpUploader   LogEventSink  Uptime       │
//! │  (NetworkPort)       (UploadPort)   (EventSink)                │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Capture · Transfer · Store · Sync                     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! On the device the loop runs forever. On the host, `main` plays a short
//! scripted walk against the simulation adapters and exits.
#![deny(unused_must_use)]

use anyhow::Result;
use log::info;

use petcam::adapters::ble::BleAdapter;
use petcam::adapters::camera::CameraAdapter;
use petcam::adapters::device_id;
use petcam::adapters::fs_store::FsBlobStore;
use petcam::adapters::http::HttpUploader;
use petcam::adapters::log_sink::LogEventSink;
use petcam::adapters::nvs::NvsAdapter;
use petcam::adapters::time::Uptime;
use petcam::adapters::wifi::WifiAdapter;
use petcam::app::service::AppService;
use petcam::command::inbox;
use petcam::command::{CommandChannel, CommandSettings};
use petcam::config::{Provisioning, SystemConfig};

/// Control loop period.
const LOOP_INTERVAL_MS: u32 = 50;

// ── Device ────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn main() -> Result<()> {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::delay::FreeRtos;
    use esp_idf_svc::hal::peripherals::Peripherals;

    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PetCam v{}                          ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Config ─────────────────────────────────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init: {e}"))?;
    let config = SystemConfig::load_or_provision(&nvs, &Provisioning::from_build_env());
    if config.wifi_ssid.is_empty() {
        log::warn!("No home network configured (build with PETCAM_WIFI_SSID); captures stay on flash");
    }

    // ── 3. Adapters ───────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    let mut camera =
        CameraAdapter::new(&config).map_err(|e| anyhow::anyhow!("camera init: {e}"))?;
    let mut wifi = WifiAdapter::new(peripherals.modem, sysloop, None)?;
    let mut uploader = HttpUploader::new(config.upload_timeout_ms);
    let mut sink = LogEventSink::new();
    let mut delay = FreeRtos;
    let clock = Uptime::new();

    let (sender, receiver) = inbox::channel();
    let name = device_id::advertised_name(&device_id::read_mac());
    let mut ble = BleAdapter::new(name);
    ble.start(CommandChannel::new(CommandSettings::from_config(&config), sender));

    // ── 4. App service ────────────────────────────────────────
    let mut app = AppService::new(config, receiver, ble.link(), FsBlobStore::spiffs());
    app.start(&mut sink);
    info!("System ready. Entering control loop.");

    // ── 5. Control loop ───────────────────────────────────────
    loop {
        app.poll(
            clock.uptime_ms(),
            &mut camera,
            &mut wifi,
            &mut uploader,
            &mut delay,
            &mut sink,
        );
        FreeRtos::delay_ms(LOOP_INTERVAL_MS);
    }
}

// ── Host simulation ───────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
fn main() -> Result<()> {
    use petcam::adapters::time::ThreadDelay;
    use petcam::app::commands::GeoLocation;
    use petcam::command::{OP_BURST, OP_PREVIEW, OP_SINGLE, encode};
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("PetCam v{} (host simulation)", env!("CARGO_PKG_VERSION"));

    let nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init: {e}"))?;
    let site = Provisioning {
        wifi_ssid: Some("HomeNet"),
        ..Provisioning::from_build_env()
    };
    let mut config = SystemConfig::load_or_provision(&nvs, &site);
    config.sync_interval_ms = 1_000;

    let root = std::env::temp_dir().join("petcam-sim");
    let mut camera =
        CameraAdapter::new(&config).map_err(|e| anyhow::anyhow!("camera init: {e}"))?;
    let mut wifi = WifiAdapter::new();
    let mut uploader = HttpUploader::new(config.upload_timeout_ms);
    let mut sink = LogEventSink::new();
    let mut delay = ThreadDelay;
    let clock = Uptime::new();

    let (sender, receiver) = inbox::channel();
    let mut ble = BleAdapter::new(device_id::advertised_name(&device_id::read_mac()));
    ble.start(CommandChannel::new(CommandSettings::from_config(&config), sender));

    let mut app = AppService::new(config, receiver, ble.link(), FsBlobStore::new(&root));
    app.start(&mut sink);

    let mut run = |app: &mut AppService<FsBlobStore, _>,
                   camera: &mut CameraAdapter,
                   wifi: &mut WifiAdapter,
                   ticks: u32| {
        for _ in 0..ticks {
            app.poll(clock.uptime_ms(), camera, wifi, &mut uploader, &mut delay, &mut sink);
            std::thread::sleep(std::time::Duration::from_millis(u64::from(LOOP_INTERVAL_MS)));
        }
    };

    // Phone nearby: a preview, a single and a burst stream straight over BLE.
    let here = GeoLocation::new(47.3769, 8.5417);
    ble.sim_connect(512);
    ble.sim_command_write(&encode(OP_PREVIEW, Some(here), None));
    ble.sim_command_write(&encode(OP_SINGLE, Some(here), None));
    camera.sim_queue_sizes(&[1_000, 4_000, 2_000]);
    ble.sim_command_write(&encode(OP_BURST, Some(here), Some(3)));
    run(&mut app, &mut camera, &mut wifi, 4);

    // Phone out of range: captures go to flash.
    ble.sim_disconnect();
    ble.sim_command_write(&encode(OP_SINGLE, Some(GeoLocation::new(47.38, 8.55)), None));
    ble.sim_command_write(&encode(OP_BURST, None, None));
    run(&mut app, &mut camera, &mut wifi, 3);

    // Back home: the next sync drains the backlog.
    wifi.sim_set_visible(&["HomeNet"]);
    run(&mut app, &mut camera, &mut wifi, 25);

    let (ok, failed) = app.capture_counts();
    info!(
        "Simulation done: {} captures ({} failed), {} uploads, {} still pending",
        ok + failed,
        failed,
        uploader.sim_received().len(),
        app.pending_records().unwrap_or(0),
    );
    Ok(())
}
