//! Hardware access collaborator of the engine.

use bitflags::bitflags;

/// A logical endpoint on an I2C bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Device {
    /// Index of the I2C module (bus) the device is wired to.
    pub module: u8,
    /// 7-bit slave address.
    pub address: u8,
}

impl Device {
    pub const fn new(module: u8, address: u8) -> Self {
        Self { module, address }
    }
}

/// Peripherals that must be powered before a module can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Peripheral {
    /// The GPIO port carrying the module's SDA and SCL pins.
    Gpio,
    /// The I2C module itself.
    I2c,
}

/// Master registers the engine touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// `address << 1 | R/W`, see [`Direction`].
    SlaveAddress,
    /// Byte to transmit on write, last received byte on read.
    Data,
    /// [`MasterStatus`] bits. Read only.
    Status,
}

/// R/W bit of the slave address register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Transmit = 0,
    Receive = 1,
}

impl Direction {
    /// Value written to [`Register::SlaveAddress`] to address `address` in
    /// this direction.
    pub const fn address_byte(self, address: u8) -> u8 {
        (address << 1) | self as u8
    }
}

/// Strobes accepted by the master's control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    SingleSend,
    SingleReceive,
    BurstSendStart,
    BurstSendCont,
    BurstSendFinish,
    BurstSendErrorStop,
    BurstReceiveStart,
    BurstReceiveCont,
    BurstReceiveFinish,
    BurstReceiveErrorStop,
}

bitflags! {
    /// Contents of [`Register::Status`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MasterStatus: u8 {
        /// The master is executing a command.
        const BUSY = 1 << 0;
        /// The last command failed; see the more specific bits.
        const ERROR = 1 << 1;
        const ADDR_NACK = 1 << 2;
        const DATA_NACK = 1 << 3;
        const ARB_LOST = 1 << 4;
        /// Another master holds the bus.
        const BUS_BUSY = 1 << 6;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MasterStatus {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "MasterStatus({=u8:#04x})", self.bits())
    }
}

/// Register-level access to the I2C masters of the chip.
///
/// Register accesses cannot fail; protocol errors show up in the status
/// register and timeouts are detected by the engine.
pub trait I2cController {
    /// Whether `peripheral` of `module` has finished powering up.
    fn peripheral_ready(&mut self, module: u8, peripheral: Peripheral)
        -> bool;

    /// Start powering `peripheral` of `module`.
    fn enable_peripheral(&mut self, module: u8, peripheral: Peripheral);

    /// Route the pins and clock the master of `module` at `speed`.
    fn configure_master(&mut self, module: u8, speed: crate::Speed);

    fn write_register(&mut self, module: u8, register: Register, value: u8);

    fn read_register(&mut self, module: u8, register: Register) -> u8;

    fn issue_command(&mut self, module: u8, command: Command);

    fn status(&mut self, module: u8) -> MasterStatus {
        MasterStatus::from_bits_truncate(
            self.read_register(module, Register::Status),
        )
    }
}
