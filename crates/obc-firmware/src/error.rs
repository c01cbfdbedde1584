use derive_more::From;
use event_bus::EventBusError;
use i2c_engine::I2cError;
use obc_kernel::{ErrorChain, ErrorCode, ModuleId};

/// Errors that stop the firmware cycle or bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, From)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FirmwareError {
    #[from]
    EventBus(EventBusError),
    #[from]
    I2c(I2cError),
    /// The configuration failed validation.
    InvalidConfig,
    /// The persisted configuration could not be encoded or decoded.
    ConfigEncoding,
    /// A component refused to initialise; carries its top-level code.
    ComponentInit(ErrorCode),
}

impl FirmwareError {
    pub const fn code(self) -> ErrorCode {
        let local = match self {
            FirmwareError::EventBus(_) => 0x01,
            FirmwareError::I2c(_) => 0x02,
            FirmwareError::InvalidConfig => 0x03,
            FirmwareError::ConfigEncoding => 0x04,
            FirmwareError::ComponentInit(_) => 0x05,
        };
        ErrorCode::new(ModuleId::Firmware, local)
    }

    /// This error followed by the code of the layer that caused it.
    pub fn chain<const N: usize>(self) -> ErrorChain<N> {
        let mut chain = ErrorChain::from_code(self.code());
        let cause = match self {
            FirmwareError::EventBus(err) => Some(err.code()),
            FirmwareError::I2c(err) => Some(err.code()),
            FirmwareError::ComponentInit(code) => Some(code),
            FirmwareError::InvalidConfig | FirmwareError::ConfigEncoding => {
                None
            }
        };
        if let Some(cause) = cause {
            // Truncated chains keep the top-level error.
            let _ = chain.push_cause(cause);
        }
        chain
    }
}

impl From<FirmwareError> for ErrorCode {
    fn from(err: FirmwareError) -> Self {
        err.code()
    }
}

impl core::fmt::Display for FirmwareError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FirmwareError::EventBus(err) => write!(f, "event bus: {}", err),
            FirmwareError::I2c(err) => write!(f, "i2c: {}", err),
            FirmwareError::InvalidConfig => {
                write!(f, "invalid firmware configuration")
            }
            FirmwareError::ConfigEncoding => {
                write!(f, "could not encode or decode configuration")
            }
            FirmwareError::ComponentInit(code) => {
                write!(f, "component failed to initialise ({})", code)
            }
        }
    }
}
