//! Scoped sensor resolution override.
//!
//! [`ResolutionOverride`] switches the sensor to a temporary frame size and
//! puts the original back when it goes out of scope, whether the capture
//! inside succeeded, failed or returned early.

use core::ops::{Deref, DerefMut};

use log::{debug, error};

use crate::app::ports::CameraPort;
use crate::config::Resolution;
use crate::error::CameraError;

pub struct ResolutionOverride<'a, C: CameraPort> {
    camera: &'a mut C,
    original: Resolution,
}

impl<'a, C: CameraPort> ResolutionOverride<'a, C> {
    pub fn apply(camera: &'a mut C, target: Resolution) -> Result<Self, CameraError> {
        let original = camera.resolution();
        if original != target {
            if let Err(e) = camera.set_resolution(target) {
                // Sensor may be half-configured; put it back before bailing.
                let _ = camera.set_resolution(original);
                return Err(e);
            }
            debug!("Sensor {:?} -> {:?}", original, target);
        }
        Ok(Self { camera, original })
    }

    pub fn original(&self) -> Resolution {
        self.original
    }
}

impl<C: CameraPort> Deref for ResolutionOverride<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.camera
    }
}

impl<C: CameraPort> DerefMut for ResolutionOverride<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.camera
    }
}

impl<C: CameraPort> Drop for ResolutionOverride<'_, C> {
    fn drop(&mut self) {
        if self.camera.resolution() == self.original {
            return;
        }
        match self.camera.set_resolution(self.original) {
            Ok(()) => debug!("Sensor restored to {:?}", self.original),
            Err(e) => error!("Failed to restore {:?}: {}", self.original, e),
        }
    }
}
