//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`]: the whole [`SystemConfig`] is one postcard
//! blob under `petcam::syscfg`. Every field is range-checked before it is
//! written, and again after it is read back, so a blob from an older
//! firmware with out-of-range values is reported instead of used.
//!
//! ESP-IDF NVS commits are atomic per `nvs_commit()`; the simulation
//! backend keeps blobs in a map.

use crate::adapters::utils::{validate_password, validate_ssid};
use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "petcam";
#[cfg(not(target_os = "espidf"))]
const CONFIG_KEY: &str = "syscfg";
#[cfg(target_os = "espidf")]
const CONFIG_KEY_C: &[u8] = b"syscfg\0";

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.
    ///
    /// On a full partition or after a layout version change the partition
    /// is erased and initialised again.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS use.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
                warn!("NVS: erasing and re-initialising flash partition");
                esp!(unsafe { nvs_flash_erase() }).map_err(|_| ConfigError::IoError)?;
                esp!(unsafe { nvs_flash_init() }).map_err(|_| ConfigError::IoError)?;
            } else {
                esp!(ret).map_err(|_| ConfigError::IoError)?;
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key() -> String {
        format!("{}::{}", CONFIG_NAMESPACE, CONFIG_KEY)
    }

    /// Open the config namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, EspError>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, EspError>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = CONFIG_NAMESPACE.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        esp!(unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) })?;
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let not_found = |e: &EspError| e.code() == ESP_ERR_NVS_NOT_FOUND as i32;

        let result = Self::with_nvs_handle(false, |handle| {
            let mut size: usize = 0;
            esp!(unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY_C.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            })?;
            let mut buf = vec![0u8; size.min(MAX_BLOB_SIZE)];
            let mut read = buf.len();
            esp!(unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY_C.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut read,
                )
            })?;
            buf.truncate(read);
            Ok(buf)
        });

        match result {
            Ok(bytes) => Ok(Some(bytes)),
            // A namespace that was never written cannot be opened read-only.
            Err(e) if not_found(&e) => Ok(None),
            Err(e) => {
                warn!("NvsAdapter: NVS read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self.store.borrow().get(&Self::composite_key()).cloned())
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        Self::with_nvs_handle(true, |handle| {
            esp!(unsafe {
                nvs_set_blob(
                    handle,
                    CONFIG_KEY_C.as_ptr() as *const _,
                    bytes.as_ptr() as *const _,
                    bytes.len(),
                )
            })?;
            esp!(unsafe { nvs_commit(handle) })
        })
        .map_err(|e| {
            warn!("NvsAdapter: NVS write error {}", e);
            ConfigError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(), bytes.to_vec());
        Ok(())
    }

    /// Simulation: overwrite the stored blob with arbitrary bytes.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_write_raw(&self, bytes: &[u8]) {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(), bytes.to_vec());
    }
}

pub(crate) fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigError> {
    if cfg.jpeg_quality > 63 {
        return Err(ConfigError::ValidationFailed("jpeg_quality must be 0–63"));
    }
    if cfg.preview_settle_ms > 5_000 {
        return Err(ConfigError::ValidationFailed(
            "preview_settle_ms must be 0–5000",
        ));
    }
    if cfg.single_flush_frames > 10 || cfg.burst_flush_frames > 10 || cfg.preview_flush_frames > 10 {
        return Err(ConfigError::ValidationFailed("flush frame counts must be 0–10"));
    }
    if !(1..=20).contains(&cfg.max_burst_count) {
        return Err(ConfigError::ValidationFailed("max_burst_count must be 1–20"));
    }
    if cfg.burst_count == 0 || cfg.burst_count > cfg.max_burst_count {
        return Err(ConfigError::ValidationFailed(
            "burst_count must be 1–max_burst_count",
        ));
    }
    if !(20..=512).contains(&cfg.chunk_size) {
        return Err(ConfigError::ValidationFailed("chunk_size must be 20–512"));
    }
    if cfg.chunk_pacing_ms > 1_000 {
        return Err(ConfigError::ValidationFailed("chunk_pacing_ms must be 0–1000"));
    }
    if cfg.max_pending_records == 0 {
        return Err(ConfigError::ValidationFailed(
            "max_pending_records must be at least 1",
        ));
    }
    if !cfg.wifi_ssid.is_empty() {
        validate_ssid(&cfg.wifi_ssid)
            .map_err(|_| ConfigError::ValidationFailed("wifi_ssid must be 1–32 printable bytes"))?;
        validate_password(&cfg.wifi_password)
            .map_err(|_| ConfigError::ValidationFailed("wifi_password must be empty or 8–64 bytes"))?;
    }
    let url = cfg.upload_url.as_str();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationFailed(
            "upload_url must start with http:// or https://",
        ));
    }
    if !(1_000..=120_000).contains(&cfg.upload_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "upload_timeout_ms must be 1000–120000",
        ));
    }
    if !(1_000..=86_400_000).contains(&cfg.sync_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "sync_interval_ms must be 1000–86400000",
        ));
    }
    if cfg.connect_attempts == 0 {
        return Err(ConfigError::ValidationFailed(
            "connect_attempts must be at least 1",
        ));
    }
    if cfg.connect_retry_delay_ms > 10_000 {
        return Err(ConfigError::ValidationFailed(
            "connect_retry_delay_ms must be 0–10000",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let Some(bytes) = self.read_blob()? else {
            info!("NvsAdapter: no stored config");
            return Err(ConfigError::NotFound);
        };
        let cfg: SystemConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        validate_config(&cfg)?;
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.write_blob(&bytes)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
