//! PetCam firmware library.
//!
//! Exposes the capture, transfer, store and sync logic for integration
//! testing and host simulation. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each adapter.

#![deny(unused_must_use)]

pub mod app;
pub mod capture;
pub mod command;
pub mod config;
pub mod error;
pub mod pins;
pub mod store;
pub mod sync;
pub mod transfer;

// Adapters compile on every target; the device paths are cfg-gated inside.
pub mod adapters;
