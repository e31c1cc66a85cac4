//! TrashPanda firmware library.
//!
//! Exposes the lifecycle core, the record store and the adapters for
//! integration testing and for the device binary. All ESP-IDF-specific
//! code is guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod alerts;
pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod schedule;
pub mod signals;
pub mod status;
pub mod storage;
pub mod telemetry;

pub mod pins;

// Hardware-facing modules; the ESP-IDF paths are cfg-gated inside.
pub mod adapters;
pub mod drivers;
pub mod sensors;

#[cfg(target_os = "espidf")]
mod critical_section_shim;
