#![no_std]
//! Process-wide table of raised events for a cooperative, cycle-stepped
//! scheduler.
//!
//! Hardware completions are turned into [`Event`]s that the scheduler
//! observes synchronously. The table grows and shrinks with demand between a
//! configured minimum and maximum, and [`EventBus::cleanup`] expires events
//! nobody consumed so that unserviced events cannot accumulate.
//!
//! Interrupt handlers never touch the [`EventBus`] directly. They push into
//! an [`InterruptEvents`] queue, which the scheduler drains with
//! [`EventBus::absorb`] at the start of each cycle.

extern crate alloc;

mod bus;
mod config;
mod error;
mod isr;

pub use bus::{CleanupReport, EventBus};
pub use config::EventBusConfig;
pub use error::EventBusError;
pub use isr::InterruptEvents;
pub use obc_kernel::Event;
