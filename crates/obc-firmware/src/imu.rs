//! Accelerometer component.
//!
//! Probes the IMU identity register once, then reads the six-byte
//! accelerometer block every `poll_cycles` cycles through the I2C engine.

use i2c_engine::{ActionStatus, Device, I2cController, I2cError};
use obc_kernel::{debug, trace, warn, ErrorCode, Event, ModuleId};

use crate::component::{Component, FaultChain, Services};

/// IMU on module 0, AP_AD0 low.
pub const DEFAULT_DEVICE: Device = Device::new(0, 0x68);

pub const WHO_AM_I: u8 = 0x72;
pub const EXPECTED_WHO_AM_I: u8 = 0xE5;
/// First of the big-endian X/Y/Z accelerometer registers.
pub const ACCEL_DATA_X1: u8 = 0x00;
const ACCEL_BLOCK_LEN: usize = 6;

pub const IMU_DATA_READY: Event = Event::new(ModuleId::Imu, 0x01);
pub const IMU_READ_FAILED: Event = Event::new(ModuleId::Imu, 0x02);

/// The identity register did not hold the expected value.
pub const ERR_WRONG_IDENTITY: ErrorCode = ErrorCode::new(ModuleId::Imu, 0x01);
/// A transfer was accepted but failed on the bus.
pub const ERR_TRANSFER_FAILED: ErrorCode = ErrorCode::new(ModuleId::Imu, 0x02);
/// The engine refused to queue a transfer.
pub const ERR_TRANSFER_REJECTED: ErrorCode =
    ErrorCode::new(ModuleId::Imu, 0x03);

/// One accelerometer reading in raw counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AccelSample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl AccelSample {
    fn from_be_bytes(raw: &[u8; ACCEL_BLOCK_LEN]) -> Self {
        Self {
            x: i16::from_be_bytes([raw[0], raw[1]]),
            y: i16::from_be_bytes([raw[2], raw[3]]),
            z: i16::from_be_bytes([raw[4], raw[5]]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ImuState {
    /// Queue the identity read.
    Probe,
    AwaitProbe,
    /// Wait `n` more cycles before the next read.
    Idle(u16),
    AwaitSample,
    /// Wrong identity; the component stops touching the bus.
    Halted,
}

pub struct Imu {
    device: Device,
    poll_cycles: u16,
    state: ImuState,
    sample: Option<AccelSample>,
    samples: u32,
}

impl Imu {
    pub fn new(device: Device, poll_cycles: u16) -> Self {
        Self {
            device,
            poll_cycles,
            state: ImuState::Probe,
            sample: None,
            samples: 0,
        }
    }

    pub fn state(&self) -> ImuState {
        self.state
    }

    /// Latest successful reading.
    pub fn sample(&self) -> Option<AccelSample> {
        self.sample
    }

    /// Number of successful readings so far.
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Queue a read; a busy module or full table is retried next cycle.
    fn request<C: I2cController>(
        &mut self,
        services: &mut Services<'_, C>,
        register: u8,
        length: usize,
        next: ImuState,
    ) -> Result<(), FaultChain> {
        match services.i2c.recv(services.events, self.device, register, length)
        {
            Ok(()) => {
                self.state = next;
                Ok(())
            }
            Err(
                I2cError::ModuleLockedByAnotherDevice
                | I2cError::MaxActionsReached,
            ) => {
                trace!("IMU transfer deferred");
                Ok(())
            }
            Err(err) => Err(chain(ERR_TRANSFER_REJECTED, err.code())),
        }
    }

    /// Collect a finished transfer into `out`. Returns `Ok(false)` while the
    /// transfer is still running.
    fn collect<C: I2cController>(
        &mut self,
        services: &mut Services<'_, C>,
        out: &mut [u8],
    ) -> Result<bool, FaultChain> {
        let i2c = &mut *services.i2c;
        match i2c.status(self.device).map_err(rejected)? {
            ActionStatus::InProgress => Ok(false),
            ActionStatus::Success => {
                let copied = i2c.recved_bytes(self.device, out);
                i2c.clear(self.device).map_err(rejected)?;
                copied.map_err(rejected)?;
                Ok(true)
            }
            ActionStatus::Failure => {
                let fault = i2c.failure_cause(self.device).map_err(rejected)?;
                i2c.clear(self.device).map_err(rejected)?;
                warn!("IMU transfer failed: {:?}", fault.code().raw());
                services
                    .events
                    .raise(IMU_READ_FAILED)
                    .map_err(|err| rejected(err.into()))?;
                Err(chain(ERR_TRANSFER_FAILED, fault.code()))
            }
            ActionStatus::NoAction => Err(chain(
                ERR_TRANSFER_FAILED,
                I2cError::NoActionForDevice.code(),
            )),
        }
    }
}

fn chain(code: ErrorCode, cause: ErrorCode) -> FaultChain {
    let mut chain = FaultChain::from_code(code);
    let _ = chain.push_cause(cause);
    chain
}

fn rejected(err: I2cError) -> FaultChain {
    chain(ERR_TRANSFER_REJECTED, err.code())
}

impl<C: I2cController> Component<C> for Imu {
    fn name(&self) -> &'static str {
        "imu"
    }

    fn step(
        &mut self,
        services: &mut Services<'_, C>,
    ) -> Result<(), FaultChain> {
        match self.state {
            ImuState::Probe => {
                self.request(services, WHO_AM_I, 1, ImuState::AwaitProbe)
            }
            ImuState::AwaitProbe => {
                let mut id = [0u8; 1];
                let done = self.collect(services, &mut id).inspect_err(|_| {
                    self.state = ImuState::Probe;
                })?;
                if !done {
                    return Ok(());
                }
                if id[0] != EXPECTED_WHO_AM_I {
                    warn!("IMU identity {:?} not recognised", id[0]);
                    self.state = ImuState::Halted;
                    return Err(FaultChain::from_code(ERR_WRONG_IDENTITY));
                }
                debug!("IMU identified");
                self.state = ImuState::Idle(0);
                Ok(())
            }
            ImuState::Idle(0) => self.request(
                services,
                ACCEL_DATA_X1,
                ACCEL_BLOCK_LEN,
                ImuState::AwaitSample,
            ),
            ImuState::Idle(n) => {
                self.state = ImuState::Idle(n - 1);
                Ok(())
            }
            ImuState::AwaitSample => {
                let mut raw = [0u8; ACCEL_BLOCK_LEN];
                let done = self.collect(services, &mut raw).inspect_err(|_| {
                    self.state = ImuState::Idle(self.poll_cycles);
                })?;
                if !done {
                    return Ok(());
                }
                let sample = AccelSample::from_be_bytes(&raw);
                trace!(
                    "IMU sample {:?} {:?} {:?}",
                    sample.x,
                    sample.y,
                    sample.z
                );
                self.sample = Some(sample);
                self.samples += 1;
                self.state = ImuState::Idle(self.poll_cycles);
                services
                    .events
                    .raise(IMU_DATA_READY)
                    .map_err(|err| rejected(err.into()))
            }
            ImuState::Halted => Ok(()),
        }
    }
}
