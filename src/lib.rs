//! Macropad Bridge
//!
//! Keeps a 12-key RGB macropad and a smart-home host in sync. The
//! [`engine`] owns per-key light state; [`device`] links talk to the
//! hardware; the [`accessory`] adapter and its [`api`] face the host.

pub mod accessory;
pub mod api;
pub mod cli;
pub mod color;
pub mod config;
pub mod device;
pub mod engine;
pub mod keys;
pub mod midi;
