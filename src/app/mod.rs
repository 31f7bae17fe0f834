//! Application core: domain logic behind port traits.
//!
//! This module contains the business rules for the PetCam node: request
//! types, outbound events, and the service that sequences capture and
//! sync. All interaction with hardware happens through **port traits**
//! defined in [`ports`], keeping this layer fully testable without real
//! peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
