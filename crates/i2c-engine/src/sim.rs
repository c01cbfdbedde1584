//! Host model of the I2C masters.
//!
//! [`SimController`] implements [`I2cController`] on top of a set of
//! [`SimDevice`]s with a register file each. Devices auto-increment their
//! register pointer; the first byte written in a transaction sets the
//! pointer. Every command keeps the master busy for the device's latency,
//! counted in status register reads.

use alloc::vec::Vec;

use crate::config::Speed;
use crate::controller::{
    Command, I2cController, MasterStatus, Peripheral, Register,
};

/// What happened on a simulated bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusActivity {
    Written(u8),
    Read(u8),
    AddressNack,
    DataNack,
    ArbitrationLost,
    /// A burst was aborted with an error-stop strobe.
    ErrorStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry {
    pub module: u8,
    pub address: u8,
    pub activity: BusActivity,
}

/// A simulated slave with 256 byte-wide registers.
#[derive(Debug, Clone)]
pub struct SimDevice {
    address: u8,
    registers: [u8; 256],
    pointer: u8,
    latency: u8,
    nack_after: Option<usize>,
    lose_arbitration: bool,
    written: usize,
    first_write: bool,
}

impl SimDevice {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            registers: [0; 256],
            pointer: 0,
            latency: 1,
            nack_after: None,
            lose_arbitration: false,
            written: 0,
            first_write: true,
        }
    }

    /// Preload registers starting at `start`.
    pub fn with_registers(mut self, start: u8, values: &[u8]) -> Self {
        for (offset, value) in values.iter().enumerate() {
            self.registers[start.wrapping_add(offset as u8) as usize] = *value;
        }
        self
    }

    /// Status reads for which the master stays busy after each command.
    pub fn with_latency(mut self, latency: u8) -> Self {
        self.latency = latency;
        self
    }

    /// Acknowledge the first `count` written bytes, then refuse every
    /// further one.
    pub fn with_nack_after(mut self, count: usize) -> Self {
        self.nack_after = Some(count);
        self
    }

    /// Lose arbitration on the next transaction addressed to this device.
    pub fn with_arbitration_loss(mut self) -> Self {
        self.lose_arbitration = true;
        self
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn register(&self, register: u8) -> u8 {
        self.registers[register as usize]
    }

    pub fn set_register(&mut self, register: u8, value: u8) {
        self.registers[register as usize] = value;
    }

    /// Data bytes written to the device, register selects included.
    pub fn bytes_written(&self) -> usize {
        self.written
    }

    fn begin(&mut self) {
        self.first_write = true;
    }

    fn write(&mut self, byte: u8) -> bool {
        if self.nack_after.is_some_and(|limit| self.written >= limit) {
            return false;
        }
        self.written += 1;
        if self.first_write {
            self.pointer = byte;
            self.first_write = false;
        } else {
            self.registers[self.pointer as usize] = byte;
            self.pointer = self.pointer.wrapping_add(1);
        }
        true
    }

    fn read(&mut self) -> u8 {
        let byte = self.registers[self.pointer as usize];
        self.pointer = self.pointer.wrapping_add(1);
        byte
    }
}

#[derive(Debug, Clone, Default)]
struct SimPeripheral {
    enabled: bool,
    polls_until_ready: u8,
    broken: bool,
}

impl SimPeripheral {
    fn poll(&mut self) -> bool {
        if !self.enabled || self.broken {
            return false;
        }
        if self.polls_until_ready > 0 {
            self.polls_until_ready -= 1;
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
struct SimModule {
    gpio: SimPeripheral,
    i2c: SimPeripheral,
    speed: Option<Speed>,
    slave_address: u8,
    data: u8,
    status: MasterStatus,
    busy_reads: u8,
    /// Device index of the open transaction.
    open: Option<usize>,
    devices: Vec<SimDevice>,
}

impl SimModule {
    fn peripheral(&mut self, peripheral: Peripheral) -> &mut SimPeripheral {
        match peripheral {
            Peripheral::Gpio => &mut self.gpio,
            Peripheral::I2c => &mut self.i2c,
        }
    }
}

/// Simulated I2C masters, one per module.
#[derive(Debug, Clone)]
pub struct SimController {
    modules: Vec<SimModule>,
    ready_delay: u8,
    log: Vec<LogEntry>,
}

impl SimController {
    pub fn new(modules: usize) -> Self {
        let mut all = Vec::with_capacity(modules);
        all.resize_with(modules, SimModule::default);
        Self { modules: all, ready_delay: 1, log: Vec::new() }
    }

    /// Readiness polls a peripheral fails after being enabled.
    pub fn with_ready_delay(mut self, polls: u8) -> Self {
        self.ready_delay = polls;
        self
    }

    pub fn attach(&mut self, module: u8, device: SimDevice) {
        if let Some(m) = self.modules.get_mut(module as usize) {
            m.devices.push(device);
        }
    }

    pub fn device(&self, module: u8, address: u8) -> Option<&SimDevice> {
        self.modules
            .get(module as usize)?
            .devices
            .iter()
            .find(|d| d.address == address)
    }

    pub fn device_mut(
        &mut self,
        module: u8,
        address: u8,
    ) -> Option<&mut SimDevice> {
        self.modules
            .get_mut(module as usize)?
            .devices
            .iter_mut()
            .find(|d| d.address == address)
    }

    /// Make `peripheral` of `module` never come up.
    pub fn break_peripheral(&mut self, module: u8, peripheral: Peripheral) {
        if let Some(m) = self.modules.get_mut(module as usize) {
            m.peripheral(peripheral).broken = true;
        }
    }

    /// Speed the master of `module` was configured at, if it was.
    pub fn speed(&self, module: u8) -> Option<Speed> {
        self.modules.get(module as usize)?.speed
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    fn record(&mut self, module: u8, address: u8, activity: BusActivity) {
        self.log.push(LogEntry { module, address, activity });
    }

    fn open(&mut self, module: u8) -> Result<usize, MasterStatus> {
        let m = &mut self.modules[module as usize];
        let address = m.slave_address >> 1;
        let Some(index) = m.devices.iter().position(|d| d.address == address)
        else {
            m.open = None;
            self.record(module, address, BusActivity::AddressNack);
            return Err(MasterStatus::ERROR | MasterStatus::ADDR_NACK);
        };

        let device = &mut m.devices[index];
        if device.lose_arbitration {
            device.lose_arbitration = false;
            m.open = None;
            self.record(module, address, BusActivity::ArbitrationLost);
            return Err(MasterStatus::ERROR
                | MasterStatus::ARB_LOST
                | MasterStatus::BUS_BUSY);
        }

        device.begin();
        m.open = Some(index);
        Ok(index)
    }

    fn transmit(&mut self, module: u8, index: usize) -> MasterStatus {
        let m = &mut self.modules[module as usize];
        let byte = m.data;
        let device = &mut m.devices[index];
        let address = device.address;
        if device.write(byte) {
            self.record(module, address, BusActivity::Written(byte));
            MasterStatus::empty()
        } else {
            m.open = None;
            self.record(module, address, BusActivity::DataNack);
            MasterStatus::ERROR | MasterStatus::DATA_NACK
        }
    }

    fn receive(&mut self, module: u8, index: usize) -> MasterStatus {
        let m = &mut self.modules[module as usize];
        let device = &mut m.devices[index];
        let address = device.address;
        let byte = device.read();
        m.data = byte;
        self.record(module, address, BusActivity::Read(byte));
        MasterStatus::empty()
    }
}

impl I2cController for SimController {
    fn peripheral_ready(&mut self, module: u8, peripheral: Peripheral) -> bool {
        self.modules
            .get_mut(module as usize)
            .is_some_and(|m| m.peripheral(peripheral).poll())
    }

    fn enable_peripheral(&mut self, module: u8, peripheral: Peripheral) {
        let delay = self.ready_delay;
        if let Some(m) = self.modules.get_mut(module as usize) {
            let p = m.peripheral(peripheral);
            p.enabled = true;
            p.polls_until_ready = delay;
        }
    }

    fn configure_master(&mut self, module: u8, speed: Speed) {
        if let Some(m) = self.modules.get_mut(module as usize) {
            m.speed = Some(speed);
        }
    }

    fn write_register(&mut self, module: u8, register: Register, value: u8) {
        let Some(m) = self.modules.get_mut(module as usize) else {
            return;
        };
        match register {
            Register::SlaveAddress => m.slave_address = value,
            Register::Data => m.data = value,
            Register::Status => {}
        }
    }

    fn read_register(&mut self, module: u8, register: Register) -> u8 {
        let Some(m) = self.modules.get_mut(module as usize) else {
            return 0;
        };
        match register {
            Register::SlaveAddress => m.slave_address,
            Register::Data => m.data,
            Register::Status if m.busy_reads > 0 => {
                m.busy_reads -= 1;
                (m.status | MasterStatus::BUSY).bits()
            }
            Register::Status => m.status.bits(),
        }
    }

    fn issue_command(&mut self, module: u8, command: Command) {
        if module as usize >= self.modules.len() {
            return;
        }

        let starts = matches!(
            command,
            Command::SingleSend
                | Command::SingleReceive
                | Command::BurstSendStart
                | Command::BurstReceiveStart
        );
        let closes = matches!(
            command,
            Command::SingleSend
                | Command::SingleReceive
                | Command::BurstSendFinish
                | Command::BurstReceiveFinish
        );

        if matches!(
            command,
            Command::BurstSendErrorStop | Command::BurstReceiveErrorStop
        ) {
            let m = &mut self.modules[module as usize];
            let address = m.slave_address >> 1;
            m.open = None;
            m.busy_reads = 0;
            self.record(module, address, BusActivity::ErrorStop);
            return;
        }

        let opened = if starts {
            self.open(module)
        } else {
            self.modules[module as usize].open.ok_or(MasterStatus::ERROR)
        };

        let status = match opened {
            Err(status) => status,
            Ok(index) => match command {
                Command::SingleSend
                | Command::BurstSendStart
                | Command::BurstSendCont
                | Command::BurstSendFinish => self.transmit(module, index),
                _ => self.receive(module, index),
            },
        };

        let m = &mut self.modules[module as usize];
        if closes {
            m.open = None;
        }
        m.status = status;
        m.busy_reads = match opened {
            Ok(index) => m.devices[index].latency,
            Err(_) => 1,
        };
    }
}
