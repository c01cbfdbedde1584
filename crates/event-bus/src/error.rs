use obc_kernel::{ErrorCode, ModuleId};

/// Errors reported by the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventBusError {
    /// Raising another event would need more than the maximum capacity.
    CapacityExceeded,
    /// The table could not be grown.
    OutOfMemory,
    /// The sizing policy was rejected by `EventBusConfig::validate`.
    InvalidConfig,
    /// `Event::NONE` cannot be raised.
    NoneEvent,
    /// The interrupt-side queue was full and the event was dropped.
    IsrQueueFull,
}

impl EventBusError {
    pub const fn code(self) -> ErrorCode {
        let local = match self {
            EventBusError::CapacityExceeded => 1,
            EventBusError::OutOfMemory => 2,
            EventBusError::InvalidConfig => 3,
            EventBusError::NoneEvent => 4,
            EventBusError::IsrQueueFull => 5,
        };
        ErrorCode::new(ModuleId::EventManager, local)
    }
}

impl From<EventBusError> for ErrorCode {
    fn from(err: EventBusError) -> Self {
        err.code()
    }
}

impl core::fmt::Display for EventBusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EventBusError::CapacityExceeded => {
                write!(f, "maximum number of raised events reached")
            }
            EventBusError::OutOfMemory => {
                write!(f, "could not allocate memory for the event table")
            }
            EventBusError::InvalidConfig => {
                write!(f, "invalid event bus configuration")
            }
            EventBusError::NoneEvent => {
                write!(f, "cannot raise the none event")
            }
            EventBusError::IsrQueueFull => {
                write!(f, "interrupt event queue is full")
            }
        }
    }
}
