/// Identifier of a software module.
///
/// Occupies the high byte of every [`ErrorCode`](crate::ErrorCode) and
/// [`Event`](crate::Event). Zero is never a valid module so that the all-zero
/// code can mean "no error" / "no event".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ModuleId {
    Kernel = 0x01,
    EventManager = 0x02,
    I2c = 0x10,
    Imu = 0x20,
    Firmware = 0x30,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnknownModule(pub u8);

impl TryFrom<u8> for ModuleId {
    type Error = UnknownModule;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(ModuleId::Kernel),
            0x02 => Ok(ModuleId::EventManager),
            0x10 => Ok(ModuleId::I2c),
            0x20 => Ok(ModuleId::Imu),
            0x30 => Ok(ModuleId::Firmware),
            _ => Err(UnknownModule(value)),
        }
    }
}

impl From<ModuleId> for u8 {
    fn from(value: ModuleId) -> Self {
        value as u8
    }
}
