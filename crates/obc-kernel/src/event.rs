use core::fmt;

use crate::module::{ModuleId, UnknownModule};

/// A numeric signal that something happened.
///
/// Events are plain values: two events are the same event iff their codes
/// match. [`Event::NONE`] is reserved and is never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Event(u16);

impl Event {
    pub const NONE: Event = Event(0);

    /// Build an event owned by `module` with the module-local `code`.
    pub const fn new(module: ModuleId, code: u8) -> Self {
        Self(((module as u16) << 8) | code as u16)
    }

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Raw module byte. See [`Event::module`] for the decoded form.
    pub const fn module_bits(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn module(self) -> Result<ModuleId, UnknownModule> {
        ModuleId::try_from(self.module_bits())
    }

    pub const fn code(self) -> u8 {
        self.0 as u8
    }
}

impl From<u16> for Event {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<Event> for u16 {
    fn from(event: Event) -> Self {
        event.0
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Event {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=u16:#06x}", self.0)
    }
}
