//! Action records and their protocol steppers.
//!
//! Every stepper runs its phases back to back until the master is busy, so a
//! fast device can finish a whole transfer in a single cycle.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::slice;

use crate::controller::{
    Command, Device, Direction, I2cController, MasterStatus, Register,
};
use crate::error::{ActionFault, I2cError};

/// Lifecycle of the action belonging to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActionStatus {
    /// The device has no action in the table.
    NoAction,
    InProgress,
    Success,
    Failure,
}

/// Transfer shape of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActionKind {
    SingleSend,
    SingleRecv,
    BurstSend,
    BurstRecv,
}

impl ActionKind {
    pub const fn is_send(self) -> bool {
        matches!(self, ActionKind::SingleSend | ActionKind::BurstSend)
    }
}

/// Outcome of one stepper invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    /// The master is busy; try again next cycle.
    Pending,
    Done,
}

/// View of one module's master for the duration of a step.
pub(crate) struct Bus<'a, C> {
    controller: &'a mut C,
    module: u8,
    minor_checks: u8,
    major_checks: u8,
}

impl<'a, C: I2cController> Bus<'a, C> {
    pub(crate) fn new(
        controller: &'a mut C,
        module: u8,
        minor_checks: u8,
        major_checks: u8,
    ) -> Self {
        Self { controller, module, minor_checks, major_checks }
    }

    fn select(&mut self, address: u8, direction: Direction) {
        self.controller.write_register(
            self.module,
            Register::SlaveAddress,
            direction.address_byte(address),
        );
    }

    fn put(&mut self, byte: u8) {
        self.controller.write_register(self.module, Register::Data, byte);
    }

    fn get(&mut self) -> u8 {
        self.controller.read_register(self.module, Register::Data)
    }

    fn command(&mut self, command: Command) {
        self.controller.issue_command(self.module, command);
    }

    /// Wait for the last command to complete.
    ///
    /// Reads the status register up to `minor_checks` times. Returns
    /// `Ok(false)` if the master is still busy, `Ok(true)` once it is idle
    /// and error free. A wait that spans `major_checks` cycles times out.
    fn settle(&mut self, wait: &mut BusyWait) -> Result<bool, ActionFault> {
        for _ in 0..self.minor_checks {
            let status = self.controller.status(self.module);
            if !status.contains(MasterStatus::BUSY) {
                wait.cycles = 0;
                return fault_of(status).map_or(Ok(true), Err);
            }
        }

        wait.cycles = wait.cycles.saturating_add(1);
        if wait.cycles >= self.major_checks {
            wait.cycles = 0;
            Err(ActionFault::BusyTimeout)
        } else {
            Ok(false)
        }
    }
}

fn fault_of(status: MasterStatus) -> Option<ActionFault> {
    if status.contains(MasterStatus::ARB_LOST) {
        Some(ActionFault::ArbitrationLost)
    } else if !status.contains(MasterStatus::ERROR) {
        None
    } else if status.contains(MasterStatus::ADDR_NACK) {
        Some(ActionFault::AddressNack)
    } else if status.contains(MasterStatus::DATA_NACK) {
        Some(ActionFault::DataNack)
    } else {
        Some(ActionFault::Bus)
    }
}

/// Cycles spent in the current busy wait.
#[derive(Debug, Default)]
struct BusyWait {
    cycles: u8,
}

// ---------------------------------------------------------------------------
// Single send
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SingleSendPhase {
    Issue,
    Await,
}

#[derive(Debug)]
struct SingleSend {
    byte: u8,
    phase: SingleSendPhase,
}

impl SingleSend {
    fn step<C: I2cController>(
        &mut self,
        bus: &mut Bus<'_, C>,
        device: Device,
        wait: &mut BusyWait,
    ) -> Result<Progress, ActionFault> {
        loop {
            match self.phase {
                SingleSendPhase::Issue => {
                    bus.select(device.address, Direction::Transmit);
                    bus.put(self.byte);
                    bus.command(Command::SingleSend);
                    self.phase = SingleSendPhase::Await;
                }
                SingleSendPhase::Await => {
                    return Ok(if bus.settle(wait)? {
                        Progress::Done
                    } else {
                        Progress::Pending
                    });
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Single receive
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SingleRecvPhase {
    /// Write the register address to the device.
    SelectRegister,
    AwaitSelect,
    Receive,
    AwaitReceive,
}

#[derive(Debug)]
struct SingleRecv {
    register: u8,
    byte: u8,
    phase: SingleRecvPhase,
}

impl SingleRecv {
    fn step<C: I2cController>(
        &mut self,
        bus: &mut Bus<'_, C>,
        device: Device,
        wait: &mut BusyWait,
    ) -> Result<Progress, ActionFault> {
        loop {
            match self.phase {
                SingleRecvPhase::SelectRegister => {
                    bus.select(device.address, Direction::Transmit);
                    bus.put(self.register);
                    bus.command(Command::SingleSend);
                    self.phase = SingleRecvPhase::AwaitSelect;
                }
                SingleRecvPhase::AwaitSelect => {
                    if !bus.settle(wait)? {
                        return Ok(Progress::Pending);
                    }
                    self.phase = SingleRecvPhase::Receive;
                }
                SingleRecvPhase::Receive => {
                    bus.select(device.address, Direction::Receive);
                    bus.command(Command::SingleReceive);
                    self.phase = SingleRecvPhase::AwaitReceive;
                }
                SingleRecvPhase::AwaitReceive => {
                    if !bus.settle(wait)? {
                        return Ok(Progress::Pending);
                    }
                    self.byte = bus.get();
                    return Ok(Progress::Done);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Burst send
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BurstSendPhase {
    /// Put byte `n` on the bus.
    Issue(usize),
    /// Wait for byte `n` to be acknowledged.
    Await(usize),
}

#[derive(Debug)]
struct BurstSend {
    bytes: Box<[u8]>,
    phase: BurstSendPhase,
}

impl BurstSend {
    fn step<C: I2cController>(
        &mut self,
        bus: &mut Bus<'_, C>,
        device: Device,
        wait: &mut BusyWait,
    ) -> Result<Progress, ActionFault> {
        self.advance(bus, device, wait).inspect_err(|_| {
            bus.command(Command::BurstSendErrorStop);
        })
    }

    fn advance<C: I2cController>(
        &mut self,
        bus: &mut Bus<'_, C>,
        device: Device,
        wait: &mut BusyWait,
    ) -> Result<Progress, ActionFault> {
        let last = self.bytes.len() - 1;
        loop {
            match self.phase {
                BurstSendPhase::Issue(n) => {
                    let command = if n == 0 {
                        bus.select(device.address, Direction::Transmit);
                        Command::BurstSendStart
                    } else if n == last {
                        Command::BurstSendFinish
                    } else {
                        Command::BurstSendCont
                    };
                    bus.put(self.bytes[n]);
                    bus.command(command);
                    self.phase = BurstSendPhase::Await(n);
                }
                BurstSendPhase::Await(n) => {
                    if !bus.settle(wait)? {
                        return Ok(Progress::Pending);
                    }
                    if n == last {
                        return Ok(Progress::Done);
                    }
                    self.phase = BurstSendPhase::Issue(n + 1);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Burst receive
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BurstRecvPhase {
    SelectRegister,
    AwaitSelect,
    /// Clock in byte `n`.
    Issue(usize),
    /// Wait for byte `n` and store it.
    Await(usize),
}

#[derive(Debug)]
struct BurstRecv {
    register: u8,
    bytes: Box<[u8]>,
    phase: BurstRecvPhase,
}

impl BurstRecv {
    fn step<C: I2cController>(
        &mut self,
        bus: &mut Bus<'_, C>,
        device: Device,
        wait: &mut BusyWait,
    ) -> Result<Progress, ActionFault> {
        let started = matches!(
            self.phase,
            BurstRecvPhase::Issue(_) | BurstRecvPhase::Await(_)
        );
        self.advance(bus, device, wait).inspect_err(|_| {
            if started {
                bus.command(Command::BurstReceiveErrorStop);
            }
        })
    }

    fn advance<C: I2cController>(
        &mut self,
        bus: &mut Bus<'_, C>,
        device: Device,
        wait: &mut BusyWait,
    ) -> Result<Progress, ActionFault> {
        let last = self.bytes.len() - 1;
        loop {
            match self.phase {
                BurstRecvPhase::SelectRegister => {
                    bus.select(device.address, Direction::Transmit);
                    bus.put(self.register);
                    bus.command(Command::SingleSend);
                    self.phase = BurstRecvPhase::AwaitSelect;
                }
                BurstRecvPhase::AwaitSelect => {
                    if !bus.settle(wait)? {
                        return Ok(Progress::Pending);
                    }
                    self.phase = BurstRecvPhase::Issue(0);
                }
                BurstRecvPhase::Issue(n) => {
                    let command = if n == 0 {
                        bus.select(device.address, Direction::Receive);
                        Command::BurstReceiveStart
                    } else if n == last {
                        Command::BurstReceiveFinish
                    } else {
                        Command::BurstReceiveCont
                    };
                    bus.command(command);
                    self.phase = BurstRecvPhase::Await(n);
                }
                BurstRecvPhase::Await(n) => {
                    if !bus.settle(wait)? {
                        return Ok(Progress::Pending);
                    }
                    self.bytes[n] = bus.get();
                    if n == last {
                        return Ok(Progress::Done);
                    }
                    self.phase = BurstRecvPhase::Issue(n + 1);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Action record
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Transfer {
    SingleSend(SingleSend),
    SingleRecv(SingleRecv),
    BurstSend(BurstSend),
    BurstRecv(BurstRecv),
}

/// One occupied slot of the action table. Owns its transfer buffer.
#[derive(Debug)]
pub(crate) struct ActionRecord {
    pub(crate) device: Device,
    pub(crate) status: ActionStatus,
    pub(crate) fault: Option<ActionFault>,
    transfer: Transfer,
    wait: BusyWait,
}

impl ActionRecord {
    fn in_progress(device: Device, transfer: Transfer) -> Self {
        Self {
            device,
            status: ActionStatus::InProgress,
            fault: None,
            transfer,
            wait: BusyWait::default(),
        }
    }

    /// A send of `bytes`, which must not be empty.
    pub(crate) fn send(device: Device, bytes: &[u8]) -> Result<Self, I2cError> {
        let transfer = match bytes {
            [byte] => Transfer::SingleSend(SingleSend {
                byte: *byte,
                phase: SingleSendPhase::Issue,
            }),
            _ => {
                let mut buffer = Vec::new();
                buffer
                    .try_reserve_exact(bytes.len())
                    .map_err(|_| I2cError::AllocationFailed)?;
                buffer.extend_from_slice(bytes);
                Transfer::BurstSend(BurstSend {
                    bytes: buffer.into_boxed_slice(),
                    phase: BurstSendPhase::Issue(0),
                })
            }
        };
        Ok(Self::in_progress(device, transfer))
    }

    /// A read of `length` bytes starting at `register`; `length` must not be
    /// zero.
    pub(crate) fn recv(
        device: Device,
        register: u8,
        length: usize,
    ) -> Result<Self, I2cError> {
        let transfer = if length == 1 {
            Transfer::SingleRecv(SingleRecv {
                register,
                byte: 0,
                phase: SingleRecvPhase::SelectRegister,
            })
        } else {
            let mut buffer = Vec::new();
            buffer
                .try_reserve_exact(length)
                .map_err(|_| I2cError::AllocationFailed)?;
            buffer.resize(length, 0);
            Transfer::BurstRecv(BurstRecv {
                register,
                bytes: buffer.into_boxed_slice(),
                phase: BurstRecvPhase::SelectRegister,
            })
        };
        Ok(Self::in_progress(device, transfer))
    }

    pub(crate) fn kind(&self) -> ActionKind {
        match self.transfer {
            Transfer::SingleSend(_) => ActionKind::SingleSend,
            Transfer::SingleRecv(_) => ActionKind::SingleRecv,
            Transfer::BurstSend(_) => ActionKind::BurstSend,
            Transfer::BurstRecv(_) => ActionKind::BurstRecv,
        }
    }

    /// Bytes read by a receive action. Only meaningful after success.
    pub(crate) fn received(&self) -> Option<&[u8]> {
        match &self.transfer {
            Transfer::SingleRecv(recv) => Some(slice::from_ref(&recv.byte)),
            Transfer::BurstRecv(recv) => Some(&recv.bytes),
            Transfer::SingleSend(_) | Transfer::BurstSend(_) => None,
        }
    }

    /// Advance an in-progress action. Returns true if it reached a terminal
    /// state during this call.
    pub(crate) fn step<C: I2cController>(
        &mut self,
        bus: &mut Bus<'_, C>,
    ) -> bool {
        if self.status != ActionStatus::InProgress {
            return false;
        }

        let device = self.device;
        let wait = &mut self.wait;
        let progress = match &mut self.transfer {
            Transfer::SingleSend(t) => t.step(bus, device, wait),
            Transfer::SingleRecv(t) => t.step(bus, device, wait),
            Transfer::BurstSend(t) => t.step(bus, device, wait),
            Transfer::BurstRecv(t) => t.step(bus, device, wait),
        };

        match progress {
            Ok(Progress::Pending) => false,
            Ok(Progress::Done) => {
                self.status = ActionStatus::Success;
                true
            }
            Err(fault) => {
                self.status = ActionStatus::Failure;
                self.fault = Some(fault);
                true
            }
        }
    }
}
