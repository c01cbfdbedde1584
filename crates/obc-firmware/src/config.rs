use alloc::vec::Vec;

use event_bus::EventBusConfig;
use i2c_engine::{Device, I2cConfig};
use serde::{Deserialize, Serialize};

use crate::error::FirmwareError;
use crate::imu;

/// Persisted configuration of the firmware, stored with postcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareConfig {
    pub event_bus: EventBusConfig,
    pub i2c: I2cConfig,
    /// Bus position of the IMU.
    pub imu_device: Device,
    /// Idle cycles between two accelerometer reads.
    pub imu_poll_cycles: u16,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            event_bus: EventBusConfig::default(),
            i2c: I2cConfig::default(),
            imu_device: imu::DEFAULT_DEVICE,
            imu_poll_cycles: 10,
        }
    }
}

impl FirmwareConfig {
    /// Reject configurations the firmware cannot run with, including an
    /// IMU on a disabled module.
    pub fn validate(&self) -> Result<(), FirmwareError> {
        self.event_bus
            .validate()
            .map_err(|_| FirmwareError::InvalidConfig)?;
        if !self.i2c.is_valid() {
            return Err(FirmwareError::InvalidConfig);
        }
        match self.i2c.module(self.imu_device.module) {
            Some(module) if module.enabled => Ok(()),
            _ => Err(FirmwareError::InvalidConfig),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FirmwareError> {
        let config: Self = postcard::from_bytes(bytes)
            .map_err(|_| FirmwareError::ConfigEncoding)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialise into `buffer`, returning the number of bytes used.
    pub fn to_slice(&self, buffer: &mut [u8]) -> Result<usize, FirmwareError> {
        postcard::to_slice(self, buffer)
            .map(|used| used.len())
            .map_err(|_| FirmwareError::ConfigEncoding)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, FirmwareError> {
        postcard::to_allocvec(self).map_err(|_| FirmwareError::ConfigEncoding)
    }
}
