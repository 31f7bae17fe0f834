//! Camera module pin assignments (ESP32-S3 + OV2640, Freenove/ESP32-S3-EYE
//! style wiring).
//!
//! Single source of truth: the camera adapter builds its driver config from
//! these constants. `-1` means "not connected".

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

/// Power-down line (not wired on this board).
pub const CAM_PWDN_GPIO: i32 = -1;
/// Hardware reset (not wired; software reset over SCCB instead).
pub const CAM_RESET_GPIO: i32 = -1;
/// Sensor master clock output.
pub const CAM_XCLK_GPIO: i32 = 15;
/// XCLK frequency fed to the sensor.
pub const CAM_XCLK_FREQ_HZ: i32 = 20_000_000;

// ---------------------------------------------------------------------------
// SCCB (I2C-like sensor register bus)
// ---------------------------------------------------------------------------

pub const CAM_SIOD_GPIO: i32 = 4;
pub const CAM_SIOC_GPIO: i32 = 5;

// ---------------------------------------------------------------------------
// Parallel pixel bus
// ---------------------------------------------------------------------------

/// D0..D7 in bus order.
pub const CAM_DATA_GPIOS: [i32; 8] = [11, 9, 8, 10, 12, 18, 17, 16];
pub const CAM_VSYNC_GPIO: i32 = 6;
pub const CAM_HREF_GPIO: i32 = 7;
pub const CAM_PCLK_GPIO: i32 = 13;

// ---------------------------------------------------------------------------
// Frame buffers
// ---------------------------------------------------------------------------

/// Driver frame buffers in PSRAM. Two lets the sensor fill one while the
/// other is held by the capture pipeline.
pub const CAM_FB_COUNT: usize = 2;
