//! Application core: domain logic behind port traits.
//!
//! This module contains the business rules for the fill-level sensor:
//! boot sequencing, FSM orchestration, alert handling and reporting.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
