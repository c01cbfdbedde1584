use alloc::boxed::Box;
use alloc::vec::Vec;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use event_bus::{EventBus, InterruptEvents};
use i2c_engine::{I2cController, I2cEngine};
use obc_kernel::{debug, error, info, trace, ErrorCode};

use crate::component::{Component, FaultChain, Services};
use crate::config::FirmwareConfig;
use crate::error::FirmwareError;
use crate::kernel::Kernel;

/// Queue through which interrupt handlers raise events.
pub type InterruptQueue<const N: usize> =
    InterruptEvents<CriticalSectionRawMutex, N>;

/// Summary of one scheduler cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleReport {
    /// Cycle number, starting at 1.
    pub cycle: u64,
    /// Events moved in from interrupt context.
    pub absorbed: usize,
    /// Components and applications whose step failed.
    pub faults: usize,
    /// Events dropped by cleanup.
    pub expired: usize,
    /// Whether the core halted waiting for an interrupt.
    pub idled: bool,
}

pub struct Scheduler<'a, C, K, const Q: usize> {
    events: EventBus,
    i2c: I2cEngine<C>,
    kernel: K,
    interrupts: &'a InterruptQueue<Q>,
    components: Vec<Box<dyn Component<C> + 'a>>,
    applications: Vec<Box<dyn Component<C> + 'a>>,
    last_fault: Option<FaultChain>,
    fault_count: u32,
    cycle: u64,
}

impl<'a, C: I2cController, K: Kernel, const Q: usize> Scheduler<'a, C, K, Q> {
    pub fn new(
        config: &FirmwareConfig,
        controller: C,
        kernel: K,
        interrupts: &'a InterruptQueue<Q>,
    ) -> Result<Self, FirmwareError> {
        config.validate()?;
        Ok(Self {
            events: EventBus::new(config.event_bus)?,
            i2c: I2cEngine::new(controller, config.i2c.clone()),
            kernel,
            interrupts,
            components: Vec::new(),
            applications: Vec::new(),
            last_fault: None,
            fault_count: 0,
            cycle: 0,
        })
    }

    /// Components run after the drivers, in registration order.
    pub fn add_component(&mut self, component: impl Component<C> + 'a) {
        self.components.push(Box::new(component));
    }

    /// Applications run after every component.
    pub fn add_application(&mut self, application: impl Component<C> + 'a) {
        self.applications.push(Box::new(application));
    }

    /// Bring up the drivers, then every component and application.
    pub fn init(&mut self) -> Result<(), FirmwareError> {
        self.i2c.init()?;

        let mut services =
            Services { events: &mut self.events, i2c: &mut self.i2c };
        let units =
            self.components.iter_mut().chain(self.applications.iter_mut());
        for unit in units {
            unit.init(&mut services).map_err(|chain| {
                error!("{:?} failed to initialise", unit.name());
                let code = chain.code().unwrap_or(ErrorCode::NONE);
                FirmwareError::ComponentInit(code)
            })?;
        }

        info!(
            "Firmware up with {:?} components and {:?} applications",
            self.components.len(),
            self.applications.len()
        );
        Ok(())
    }

    /// Run one cycle.
    ///
    /// Driver errors abort the cycle. Component failures are logged and
    /// recorded, and the remaining components still run.
    pub fn cycle(&mut self) -> Result<CycleReport, FirmwareError> {
        self.cycle += 1;
        let absorbed = self.events.absorb(self.interrupts)?;

        self.i2c.step(&mut self.events)?;

        let mut faults = 0;
        let mut services =
            Services { events: &mut self.events, i2c: &mut self.i2c };
        let units =
            self.components.iter_mut().chain(self.applications.iter_mut());
        for unit in units {
            if let Err(chain) = unit.step(&mut services) {
                error!(
                    "{:?} failed: {:?} (root cause {:?})",
                    unit.name(),
                    chain.code().map(ErrorCode::raw),
                    chain.root_cause().map(ErrorCode::raw)
                );
                self.last_fault = Some(chain);
                self.fault_count = self.fault_count.saturating_add(1);
                faults += 1;
            }
        }

        let cleanup = self.events.cleanup();
        if cleanup.expired > 0 {
            debug!("{:?} events expired unserviced", cleanup.expired);
        }

        let idled = self.idle();
        trace!("Cycle {:?} done", self.cycle);

        Ok(CycleReport {
            cycle: self.cycle,
            absorbed,
            faults,
            expired: cleanup.expired,
            idled,
        })
    }

    /// Run `cycles` cycles, stopping at the first driver error.
    pub fn run(&mut self, cycles: u64) -> Result<(), FirmwareError> {
        for _ in 0..cycles {
            self.cycle()?;
        }
        Ok(())
    }

    /// Halt if nothing is left to do.
    ///
    /// The check and the halt happen in one critical section, so an event
    /// raised from an interrupt in between cannot be missed.
    fn idle(&mut self) -> bool {
        let events = &self.events;
        let i2c = &self.i2c;
        let interrupts = self.interrupts;
        let kernel = &mut self.kernel;

        critical_section::with(|_| {
            let busy = !events.is_empty()
                || !interrupts.is_empty()
                || i2c.has_pending_work();
            if !busy {
                kernel.wait_for_interrupt();
            }
            !busy
        })
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn i2c(&self) -> &I2cEngine<C> {
        &self.i2c
    }

    pub fn i2c_mut(&mut self) -> &mut I2cEngine<C> {
        &mut self.i2c
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Most recent component failure.
    pub fn last_fault(&self) -> Option<&FaultChain> {
        self.last_fault.as_ref()
    }

    /// Component failures since start-up.
    pub fn fault_count(&self) -> u32 {
        self.fault_count
    }

    pub fn cycles(&self) -> u64 {
        self.cycle
    }
}
