//! Monotonic time since boot.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` (microseconds).
//! - **all other targets**: `std::time::Instant` from construction.
//!
//! Capture record names and the sync interval are both derived from
//! [`uptime_ms`](Uptime::uptime_ms), so it must never go backwards.

#[cfg(not(target_os = "espidf"))]
use embedded_hal::delay::DelayNs;

pub struct Uptime {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Uptime {
    fn default() -> Self {
        Self::new()
    }
}

impl Uptime {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot.
    #[cfg(target_os = "espidf")]
    pub fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    /// Milliseconds since construction.
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Thread-sleep delay for host runs. The device uses
/// `esp_idf_svc::hal::delay::FreeRtos`.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDelay;

#[cfg(not(target_os = "espidf"))]
impl DelayNs for ThreadDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}
