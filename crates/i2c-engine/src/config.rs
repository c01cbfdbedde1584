use heapless::Vec;

/// SCL clock rate of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Speed {
    /// 100 kHz.
    #[default]
    Standard,
    /// 400 kHz.
    Fast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModuleConfig {
    pub enabled: bool,
    pub speed: Speed,
}

impl ModuleConfig {
    pub const fn enabled(speed: Speed) -> Self {
        Self { enabled: true, speed }
    }

    pub const fn disabled() -> Self {
        Self { enabled: false, speed: Speed::Standard }
    }
}

/// Configuration of the I2C engine.
///
/// Entry `i` of `modules` configures module `i`; modules past the end are
/// treated as not present.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct I2cConfig<const MODULES: usize = 4> {
    pub modules: Vec<ModuleConfig, MODULES>,
    /// Readiness polls of each peripheral during bring-up.
    pub ready_checks: u8,
    /// Status reads per cycle while waiting for the master.
    pub busy_minor_checks: u8,
    /// Cycles a wait may last before the action times out.
    pub busy_major_checks: u8,
}

impl<const MODULES: usize> I2cConfig<MODULES> {
    pub const DEFAULT_READY_CHECKS: u8 = 10;
    pub const DEFAULT_BUSY_MINOR_CHECKS: u8 = 5;
    pub const DEFAULT_BUSY_MAJOR_CHECKS: u8 = 3;

    /// Configuration with every module present but disabled.
    pub fn all_disabled() -> Self {
        let mut modules = Vec::new();
        while modules.push(ModuleConfig::disabled()).is_ok() {}
        Self {
            modules,
            ready_checks: Self::DEFAULT_READY_CHECKS,
            busy_minor_checks: Self::DEFAULT_BUSY_MINOR_CHECKS,
            busy_major_checks: Self::DEFAULT_BUSY_MAJOR_CHECKS,
        }
    }

    /// Enable `module` at `speed`. Out-of-range modules are ignored.
    pub fn with_module(mut self, module: u8, speed: Speed) -> Self {
        if let Some(entry) = self.modules.get_mut(module as usize) {
            *entry = ModuleConfig::enabled(speed);
        }
        self
    }

    pub fn module(&self, module: u8) -> Option<&ModuleConfig> {
        self.modules.get(module as usize)
    }

    /// Indices of the enabled modules.
    pub fn enabled_modules(&self) -> impl Iterator<Item = u8> + '_ {
        self.modules
            .iter()
            .enumerate()
            .filter(|(_, m)| m.enabled)
            .map(|(i, _)| i as u8)
    }

    /// All check budgets must be non-zero.
    pub fn is_valid(&self) -> bool {
        self.ready_checks > 0
            && self.busy_minor_checks > 0
            && self.busy_major_checks > 0
    }
}

impl<const MODULES: usize> Default for I2cConfig<MODULES> {
    /// Modules 0 and 2 enabled at standard speed.
    fn default() -> Self {
        Self::all_disabled()
            .with_module(0, Speed::Standard)
            .with_module(2, Speed::Standard)
    }
}
