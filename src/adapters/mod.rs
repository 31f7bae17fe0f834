//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements     | Connects to                    |
//! |------------|----------------|--------------------------------|
//! | `ble`      | LinkPort       | Bluedroid GATT server          |
//! |            | (command in)   | → `CommandChannel`             |
//! | `camera`   | CameraPort     | esp32-camera (OV2640)          |
//! | `fs_store` | BlobStore      | SPIFFS via VFS / host dir      |
//! | `http`     | UploadPort     | ESP-IDF HTTP client            |
//! | `log_sink` | EventSink      | Serial log output              |
//! | `nvs`      | ConfigPort     | NVS / in-memory store          |
//! | `time`     | (clock)        | ESP32 system timer             |
//! | `wifi`     | NetworkPort    | ESP-IDF WiFi STA               |
//!
//! Every adapter is cfg-gated: real driver calls on `target_os = "espidf"`,
//! simulation everywhere else.

pub mod ble;
pub mod camera;
pub mod device_id;
pub mod fs_store;
pub mod http;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub(crate) mod utils;
pub mod wifi;
