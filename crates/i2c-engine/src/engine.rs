use event_bus::EventBus;
use obc_kernel::{debug, error, info, trace, warn, Event, ModuleId};

use crate::action::{ActionRecord, ActionStatus, Bus};
use crate::config::I2cConfig;
use crate::controller::{Device, I2cController, Peripheral};
use crate::error::{ActionFault, I2cError};
use crate::locks::ModuleLocks;

/// Raised whenever an action is enqueued.
pub const I2C_NEW_ACTION: Event = Event::new(ModuleId::I2c, 0x01);
/// Raised whenever an action reaches success or failure.
pub const I2C_ACTION_FINISHED: Event = Event::new(ModuleId::I2c, 0x02);

/// Lifecycle of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// `init` has not run, or `shutdown` has.
    Down,
    Running,
}

/// I2C action engine over `ACTIONS` slots and `MODULES` bus modules.
///
/// All state lives in this value; the scheduler owns it and passes the
/// [`EventBus`] to every call that may raise an event.
pub struct I2cEngine<C, const ACTIONS: usize = 2, const MODULES: usize = 4> {
    controller: C,
    config: I2cConfig<MODULES>,
    phase: Phase,
    locks: ModuleLocks<MODULES>,
    actions: [Option<ActionRecord>; ACTIONS],
}

impl<C: I2cController, const ACTIONS: usize, const MODULES: usize>
    I2cEngine<C, ACTIONS, MODULES>
{
    pub fn new(controller: C, config: I2cConfig<MODULES>) -> Self {
        Self {
            controller,
            config,
            phase: Phase::Down,
            locks: ModuleLocks::new(),
            actions: [const { None }; ACTIONS],
        }
    }

    /// Power up and configure every enabled module.
    ///
    /// Each peripheral gets `ready_checks` polls to come up. A configuration
    /// with a zero check budget is refused. On failure the engine stays down
    /// and `init` may be retried.
    pub fn init(&mut self) -> Result<(), I2cError> {
        if self.phase == Phase::Running {
            return Err(I2cError::AlreadyInitialised);
        }
        if !self.config.is_valid() {
            error!("I2C configuration has a zero check budget");
            return Err(I2cError::InvalidConfig);
        }

        for index in 0..self.config.modules.len() {
            let module = self.config.modules[index];
            if !module.enabled {
                continue;
            }
            let index = index as u8;

            if !self.bring_up(index, Peripheral::Gpio) {
                return Err(I2cError::GpioEnableFailed);
            }
            if !self.bring_up(index, Peripheral::I2c) {
                return Err(I2cError::PeripheralEnableFailed);
            }
            self.controller.configure_master(index, module.speed);
            debug!("I2C module {:?} configured", index);
        }

        self.phase = Phase::Running;
        info!("I2C engine initialised");
        Ok(())
    }

    fn bring_up(&mut self, module: u8, peripheral: Peripheral) -> bool {
        self.controller.enable_peripheral(module, peripheral);
        for _ in 0..self.config.ready_checks {
            if self.controller.peripheral_ready(module, peripheral) {
                return true;
            }
        }
        error!(
            "I2C module {:?} peripheral {:?} not ready",
            module, peripheral
        );
        false
    }

    /// Drop every action, release every lock and stop the engine.
    pub fn shutdown(&mut self) -> Result<(), I2cError> {
        self.ensure_running()?;
        let dropped = self.in_flight();
        if dropped > 0 {
            warn!("I2C shutdown dropped {:?} actions", dropped);
        }
        self.actions.iter_mut().for_each(|slot| *slot = None);
        self.locks.release_all();
        self.phase = Phase::Down;
        info!("I2C engine shut down");
        Ok(())
    }

    pub fn is_initialised(&self) -> bool {
        self.phase == Phase::Running
    }

    /// Advance every in-progress action. Call once per cycle.
    ///
    /// Hardware failures of individual actions are recorded on the action
    /// and do not fail the step.
    pub fn step(&mut self, bus: &mut EventBus) -> Result<(), I2cError> {
        self.ensure_running()?;
        bus.poll(I2C_NEW_ACTION);

        let minor = self.config.busy_minor_checks;
        let major = self.config.busy_major_checks;
        let mut finished = 0usize;
        let mut fatal = None;
        // One transfer per master per cycle, in table order.
        let mut claimed = [false; MODULES];

        for record in self.actions.iter_mut().flatten() {
            if record.status != ActionStatus::InProgress {
                continue;
            }

            let module = record.device.module;
            if core::mem::replace(&mut claimed[module as usize], true) {
                continue;
            }
            if !self.controller.peripheral_ready(module, Peripheral::I2c) {
                error!("I2C module {:?} stopped responding", module);
                fatal = Some(I2cError::PeripheralNotResponding);
                break;
            }

            let mut master =
                Bus::new(&mut self.controller, module, minor, major);
            if record.step(&mut master) {
                match record.fault {
                    Some(fault) => warn!(
                        "I2C action for device {:?} failed: {:?}",
                        record.device.address,
                        fault.code().raw()
                    ),
                    None => trace!(
                        "I2C action for device {:?} succeeded",
                        record.device.address
                    ),
                }
                finished += 1;
            }
        }

        // Actions finished before a dead module still announce themselves.
        if finished > 0 {
            bus.raise(I2C_ACTION_FINISHED)?;
        }
        fatal.map_or(Ok(()), Err)
    }

    /// Queue a write of `bytes` to `device`.
    pub fn send(
        &mut self,
        bus: &mut EventBus,
        device: Device,
        bytes: &[u8],
    ) -> Result<(), I2cError> {
        self.admit(device)?;
        if bytes.is_empty() {
            return Err(I2cError::ZeroLengthSend);
        }
        let slot = self.free_slot()?;
        let record = ActionRecord::send(device, bytes)?;
        self.enqueue(bus, slot, record)
    }

    /// Queue a read of `length` bytes from `device`, starting at `register`.
    pub fn recv(
        &mut self,
        bus: &mut EventBus,
        device: Device,
        register: u8,
        length: usize,
    ) -> Result<(), I2cError> {
        self.admit(device)?;
        if length == 0 {
            return Err(I2cError::ZeroLengthReceive);
        }
        let slot = self.free_slot()?;
        let record = ActionRecord::recv(device, register, length)?;
        self.enqueue(bus, slot, record)
    }

    /// Status of the first action in the table belonging to `device`.
    pub fn status(&self, device: Device) -> Result<ActionStatus, I2cError> {
        self.ensure_running()?;
        Ok(self
            .find(device)
            .map_or(ActionStatus::NoAction, |record| record.status))
    }

    /// Hardware cause of a failed action.
    pub fn failure_cause(
        &self,
        device: Device,
    ) -> Result<ActionFault, I2cError> {
        self.ensure_running()?;
        let record = self.find(device).ok_or(I2cError::NoActionForDevice)?;
        match (record.status, record.fault) {
            (ActionStatus::Failure, Some(fault)) => Ok(fault),
            _ => Err(I2cError::ActionNotFailed),
        }
    }

    /// Copy the bytes of a successful receive into `out` and return how many
    /// were copied.
    pub fn recved_bytes(
        &self,
        device: Device,
        out: &mut [u8],
    ) -> Result<usize, I2cError> {
        self.ensure_running()?;
        let record = self.find(device).ok_or(I2cError::NoActionForDevice)?;
        let received =
            record.received().ok_or(I2cError::GetRecvedBytesFromSend)?;
        if record.status != ActionStatus::Success {
            return Err(I2cError::GetRecvedBytesOnNonSuccessAction);
        }
        let out = out
            .get_mut(..received.len())
            .ok_or(I2cError::OutputTooSmall)?;
        out.copy_from_slice(received);
        Ok(received.len())
    }

    /// Remove the first action belonging to `device`.
    ///
    /// The module lock is released once the device has no other action on
    /// it. Clearing an in-progress action abandons the transfer.
    pub fn clear(&mut self, device: Device) -> Result<(), I2cError> {
        self.ensure_running()?;
        let slot = self
            .actions
            .iter_mut()
            .find(|slot| matches!(slot, Some(r) if r.device == device))
            .ok_or(I2cError::NoActionForDevice)?;

        if let Some(record) = slot.take() {
            if record.status == ActionStatus::InProgress {
                warn!(
                    "Clearing in-progress I2C action for device {:?}",
                    device.address
                );
            }
        }

        let still_owned = self
            .actions
            .iter()
            .flatten()
            .any(|r| r.device == device);
        if !still_owned {
            self.locks.release(device.module);
        }
        Ok(())
    }

    /// Whether any action still needs stepping.
    pub fn has_pending_work(&self) -> bool {
        self.actions
            .iter()
            .flatten()
            .any(|r| r.status == ActionStatus::InProgress)
    }

    /// Number of occupied slots, terminal actions included.
    pub fn in_flight(&self) -> usize {
        self.actions.iter().flatten().count()
    }

    /// Device currently holding `module`, if any.
    pub fn lock_owner(&self, module: u8) -> Option<Device> {
        self.locks.owner(module)
    }

    pub fn config(&self) -> &I2cConfig<MODULES> {
        &self.config
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    fn ensure_running(&self) -> Result<(), I2cError> {
        match self.phase {
            Phase::Running => Ok(()),
            Phase::Down => Err(I2cError::NotInitialised),
        }
    }

    /// Lifecycle, module and lock checks shared by both enqueue paths.
    fn admit(&self, device: Device) -> Result<(), I2cError> {
        self.ensure_running()?;
        let module =
            self.config.module(device.module).ok_or(I2cError::InvalidModule)?;
        if !module.enabled {
            return Err(I2cError::ModuleDisabled);
        }
        self.locks.check(device)
    }

    fn free_slot(&self) -> Result<usize, I2cError> {
        self.actions
            .iter()
            .position(Option::is_none)
            .ok_or(I2cError::MaxActionsReached)
    }

    /// Commit a fully built action. Nothing is changed if raising the
    /// new-action event fails.
    fn enqueue(
        &mut self,
        bus: &mut EventBus,
        slot: usize,
        record: ActionRecord,
    ) -> Result<(), I2cError> {
        bus.raise(I2C_NEW_ACTION)?;
        self.locks.acquire(record.device)?;
        trace!(
            "I2C {:?} action queued for device {:?} in slot {:?}",
            record.kind(),
            record.device.address,
            slot
        );
        self.actions[slot] = Some(record);
        Ok(())
    }

    fn find(&self, device: Device) -> Option<&ActionRecord> {
        self.actions.iter().flatten().find(|r| r.device == device)
    }
}
