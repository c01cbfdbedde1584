#![no_std]
//! Cycle-stepped I2C master engine.
//!
//! Callers enqueue send and receive actions against a [`Device`]; the
//! scheduler calls [`I2cEngine::step`] once per cycle and every in-flight
//! action advances as far as the hardware allows without blocking. Access to
//! a bus module is exclusive: while one device has an action on a module,
//! other devices on the same module are turned away instead of queued.
//!
//! Results are collected by polling [`I2cEngine::status`] and must be
//! released with [`I2cEngine::clear`] before the device can be reused.

extern crate alloc;

mod action;
mod config;
mod controller;
mod engine;
mod error;
mod locks;
pub mod sim;

pub use action::{ActionKind, ActionStatus};
pub use config::{I2cConfig, ModuleConfig, Speed};
pub use controller::{
    Command, Device, Direction, I2cController, MasterStatus, Peripheral,
    Register,
};
pub use engine::{I2cEngine, I2C_ACTION_FINISHED, I2C_NEW_ACTION};
pub use error::{ActionFault, I2cError};
