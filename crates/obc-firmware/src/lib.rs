#![no_std]
//! Cooperative core of the on-board computer firmware.
//!
//! A [`Scheduler`] owns the [`EventBus`](event_bus::EventBus) and the
//! [`I2cEngine`](i2c_engine::I2cEngine) and runs one cycle at a time:
//! interrupt events are absorbed, drivers are stepped, then components and
//! applications, then stale events are cleaned up. When nothing is pending
//! the core halts until the next interrupt.

extern crate alloc;

mod component;
mod config;
mod error;
pub mod imu;
mod kernel;
mod scheduler;

pub use component::{Component, FaultChain, Services};
pub use config::FirmwareConfig;
pub use error::FirmwareError;
pub use imu::Imu;
pub use kernel::Kernel;
pub use scheduler::{CycleReport, InterruptQueue, Scheduler};
