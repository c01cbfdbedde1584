#![no_std]
//! Shared vocabulary of the on-board computer firmware.
//!
//! Every software module owns an 8-bit [`ModuleId`]. Error codes and events
//! are both 16-bit values whose high byte is the owning module and whose low
//! byte is a module-local code, so a raw value read out of telemetry can
//! always be traced back to the module that produced it.

mod error;
mod event;
mod fmt;
mod module;

pub use error::{BufferTooSmall, ErrorChain, ErrorCode};
pub use event::Event;
pub use module::{ModuleId, UnknownModule};
