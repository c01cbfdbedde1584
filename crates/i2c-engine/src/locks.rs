use crate::controller::Device;
use crate::error::I2cError;

/// Per-module ownership flags.
///
/// A module is owned by at most one device; the owner may take it again.
pub(crate) struct ModuleLocks<const MODULES: usize> {
    owners: [Option<Device>; MODULES],
}

impl<const MODULES: usize> ModuleLocks<MODULES> {
    pub(crate) const fn new() -> Self {
        Self { owners: [None; MODULES] }
    }

    /// Whether `device` could take its module right now.
    pub(crate) fn check(&self, device: Device) -> Result<(), I2cError> {
        match self.owners.get(device.module as usize) {
            None => Err(I2cError::InvalidModule),
            Some(Some(owner)) if *owner != device => {
                Err(I2cError::ModuleLockedByAnotherDevice)
            }
            Some(_) => Ok(()),
        }
    }

    pub(crate) fn acquire(&mut self, device: Device) -> Result<(), I2cError> {
        self.check(device)?;
        self.owners[device.module as usize] = Some(device);
        Ok(())
    }

    pub(crate) fn release(&mut self, module: u8) {
        if let Some(owner) = self.owners.get_mut(module as usize) {
            *owner = None;
        }
    }

    pub(crate) fn owner(&self, module: u8) -> Option<Device> {
        self.owners.get(module as usize).copied().flatten()
    }

    pub(crate) fn release_all(&mut self) {
        self.owners = [None; MODULES];
    }
}
