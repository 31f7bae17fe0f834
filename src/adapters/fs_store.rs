//! Flash filesystem adapter: [`BlobStore`] over a flat directory.
//!
//! On the device the directory is the SPIFFS partition registered into the
//! VFS at `/spiffs`; on the host it is any directory (tests use a temp dir).
//! Everything above this adapter goes through `std::fs`.
//!
//! Writes land in `<name>.tmp` and are renamed into place, so a power cut
//! mid-write leaves either the old object or none, never a truncated one.
//! Stray `.tmp` files are hidden from [`list`](BlobStore::list) and cleared
//! on mount.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::app::ports::BlobStore;
use crate::error::StorageError;

const TMP_SUFFIX: &str = ".tmp";

/// VFS mount point of the capture partition.
#[cfg(target_os = "espidf")]
pub const SPIFFS_BASE: &str = "/spiffs";

pub struct FsBlobStore {
    root: PathBuf,
    mounted: bool,
}

fn map_io(e: &std::io::Error) -> StorageError {
    match e.kind() {
        ErrorKind::NotFound => StorageError::NotFound,
        ErrorKind::StorageFull => StorageError::Full,
        _ => StorageError::Io,
    }
}

impl FsBlobStore {
    /// Objects live directly under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mounted: false,
        }
    }

    /// The SPIFFS capture partition.
    #[cfg(target_os = "espidf")]
    pub fn spiffs() -> Self {
        Self::new(SPIFFS_BASE)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> Result<PathBuf, StorageError> {
        // Flat namespace: no separators, no parent references.
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
            return Err(StorageError::Io);
        }
        Ok(self.root.join(name))
    }

    #[cfg(target_os = "espidf")]
    fn platform_mount(&mut self) -> Result<(), StorageError> {
        use esp_idf_svc::sys::*;

        let base = c"/spiffs";
        let conf = esp_vfs_spiffs_conf_t {
            base_path: base.as_ptr(),
            partition_label: core::ptr::null(),
            max_files: 8,
            format_if_mount_failed: true,
        };
        let ret = unsafe { esp_vfs_spiffs_register(&conf) };
        // Already registered counts as mounted.
        if ret == ESP_ERR_INVALID_STATE as i32 {
            return Ok(());
        }
        esp!(ret).map_err(|e| {
            warn!("SPIFFS: mount failed ({})", e);
            StorageError::Unavailable
        })?;

        let (mut total, mut used) = (0usize, 0usize);
        if unsafe { esp_spiffs_info(core::ptr::null(), &mut total, &mut used) } == ESP_OK as i32 {
            info!("SPIFFS: mounted, {} of {} bytes used", used, total);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_mount(&mut self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).map_err(|e| {
            warn!("Store: cannot create {}: {}", self.root.display(), e);
            StorageError::Unavailable
        })
    }

    fn clear_temporaries(&self) {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            if name.to_string_lossy().ends_with(TMP_SUFFIX) {
                debug!("Store: dropping partial write {:?}", name);
                let _ = fs::remove_file(entry.path());
            }
        }
    }
}

impl BlobStore for FsBlobStore {
    fn mount(&mut self) -> Result<(), StorageError> {
        if self.mounted {
            return Ok(());
        }
        self.platform_mount()?;
        self.clear_temporaries();
        self.mounted = true;
        info!("Store: mounted at {}", self.root.display());
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StorageError> {
        let entries = fs::read_dir(&self.root).map_err(|e| map_io(&e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| map_io(&e))?;
            // Non-UTF-8 names are not ours.
            if let Ok(name) = entry.file_name().into_string() {
                if !name.ends_with(TMP_SUFFIX) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        fs::read(self.path(name)?).map_err(|e| map_io(&e))
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        let target = self.path(name)?;
        let tmp = self.path(&format!("{name}{TMP_SUFFIX}"))?;
        fs::write(&tmp, data).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            map_io(&e)
        })?;
        fs::rename(&tmp, &target).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            map_io(&e)
        })
    }

    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path(name)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io(&e)),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).is_ok_and(|p| p.is_file())
    }
}
