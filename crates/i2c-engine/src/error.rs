use derive_more::From;
use event_bus::EventBusError;
use obc_kernel::{ErrorCode, ModuleId};

/// Errors returned synchronously by the I2C engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, From)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cError {
    /// The engine has not been brought up with `init`.
    NotInitialised,
    /// `init` was called on a running engine.
    AlreadyInitialised,
    /// The device names a module that has no configuration entry.
    InvalidModule,
    /// The device's module is configured but disabled.
    ModuleDisabled,
    /// Another device has an action in flight on the same module.
    ModuleLockedByAnotherDevice,
    ZeroLengthSend,
    ZeroLengthReceive,
    /// Every slot of the action table is occupied.
    MaxActionsReached,
    /// The transfer buffer of a burst action could not be allocated.
    AllocationFailed,
    /// No action in the table belongs to the device.
    NoActionForDevice,
    /// Received bytes were requested from a send action.
    GetRecvedBytesFromSend,
    /// Received bytes were requested before the action succeeded.
    GetRecvedBytesOnNonSuccessAction,
    /// A failure cause was requested from an action that has not failed.
    ActionNotFailed,
    /// The output buffer is shorter than the received data.
    OutputTooSmall,
    /// The I2C peripheral never reported ready during bring-up.
    PeripheralEnableFailed,
    /// The GPIO port carrying SDA/SCL never reported ready during bring-up.
    GpioEnableFailed,
    /// An enabled module stopped reporting ready while running.
    PeripheralNotResponding,
    /// A readiness or busy-wait budget of the configuration is zero.
    InvalidConfig,
    /// The event bus refused an engine event.
    #[from]
    EventBus(EventBusError),
}

impl I2cError {
    pub fn code(self) -> ErrorCode {
        let local = match self {
            I2cError::NotInitialised => 0x01,
            I2cError::AlreadyInitialised => 0x02,
            I2cError::InvalidModule => 0x03,
            I2cError::ModuleDisabled => 0x04,
            I2cError::ModuleLockedByAnotherDevice => 0x05,
            I2cError::ZeroLengthSend => 0x06,
            I2cError::ZeroLengthReceive => 0x07,
            I2cError::MaxActionsReached => 0x08,
            I2cError::AllocationFailed => 0x09,
            I2cError::NoActionForDevice => 0x0A,
            I2cError::GetRecvedBytesFromSend => 0x0B,
            I2cError::GetRecvedBytesOnNonSuccessAction => 0x0C,
            I2cError::ActionNotFailed => 0x0D,
            I2cError::OutputTooSmall => 0x0E,
            I2cError::PeripheralEnableFailed => 0x0F,
            I2cError::GpioEnableFailed => 0x10,
            I2cError::PeripheralNotResponding => 0x11,
            I2cError::EventBus(_) => 0x12,
            I2cError::InvalidConfig => 0x13,
        };
        ErrorCode::new(ModuleId::I2c, local)
    }
}

impl From<I2cError> for ErrorCode {
    fn from(err: I2cError) -> Self {
        err.code()
    }
}

impl core::fmt::Display for I2cError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            I2cError::NotInitialised => write!(f, "i2c engine not initialised"),
            I2cError::AlreadyInitialised => {
                write!(f, "i2c engine already initialised")
            }
            I2cError::InvalidModule => write!(f, "no such i2c module"),
            I2cError::ModuleDisabled => write!(f, "i2c module is disabled"),
            I2cError::ModuleLockedByAnotherDevice => {
                write!(f, "i2c module locked by another device")
            }
            I2cError::ZeroLengthSend => write!(f, "cannot send zero bytes"),
            I2cError::ZeroLengthReceive => {
                write!(f, "cannot receive zero bytes")
            }
            I2cError::MaxActionsReached => write!(f, "i2c action table full"),
            I2cError::AllocationFailed => {
                write!(f, "could not allocate i2c transfer buffer")
            }
            I2cError::NoActionForDevice => {
                write!(f, "no i2c action for device")
            }
            I2cError::GetRecvedBytesFromSend => {
                write!(f, "send actions have no received bytes")
            }
            I2cError::GetRecvedBytesOnNonSuccessAction => {
                write!(f, "i2c action has not succeeded")
            }
            I2cError::ActionNotFailed => write!(f, "i2c action has not failed"),
            I2cError::OutputTooSmall => {
                write!(f, "output buffer too small for received bytes")
            }
            I2cError::PeripheralEnableFailed => {
                write!(f, "i2c peripheral failed to enable")
            }
            I2cError::GpioEnableFailed => {
                write!(f, "i2c gpio port failed to enable")
            }
            I2cError::PeripheralNotResponding => {
                write!(f, "i2c peripheral stopped responding")
            }
            I2cError::EventBus(err) => write!(f, "event bus: {}", err),
            I2cError::InvalidConfig => {
                write!(f, "invalid i2c configuration")
            }
        }
    }
}

/// Hardware-level cause of a failed action, reported by the master's status
/// register or by the busy-wait budget running out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActionFault {
    /// The addressed device did not acknowledge its address.
    AddressNack,
    /// The device did not acknowledge a data byte.
    DataNack,
    /// Another master won arbitration.
    ArbitrationLost,
    /// The master flagged an error without a more specific cause.
    Bus,
    /// The master stayed busy for longer than the configured budget.
    BusyTimeout,
}

impl ActionFault {
    pub const fn code(self) -> ErrorCode {
        let local = match self {
            ActionFault::AddressNack => 0x40,
            ActionFault::DataNack => 0x41,
            ActionFault::ArbitrationLost => 0x42,
            ActionFault::Bus => 0x43,
            ActionFault::BusyTimeout => 0x44,
        };
        ErrorCode::new(ModuleId::I2c, local)
    }
}

impl From<ActionFault> for ErrorCode {
    fn from(fault: ActionFault) -> Self {
        fault.code()
    }
}

impl core::fmt::Display for ActionFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ActionFault::AddressNack => write!(f, "address not acknowledged"),
            ActionFault::DataNack => write!(f, "data not acknowledged"),
            ActionFault::ArbitrationLost => write!(f, "arbitration lost"),
            ActionFault::Bus => write!(f, "bus error"),
            ActionFault::BusyTimeout => write!(f, "master busy timeout"),
        }
    }
}
