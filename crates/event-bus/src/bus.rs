use alloc::vec::Vec;
use core::fmt;

use embassy_sync::blocking_mutex::raw::RawMutex;
use obc_kernel::{debug, error, trace, Event};

use crate::config::EventBusConfig;
use crate::error::EventBusError;
use crate::isr::InterruptEvents;

/// A raised event together with the number of cleanup cycles it has
/// survived without being polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Raised {
    event: Event,
    cycles: u8,
}

/// Outcome of one [`EventBus::cleanup`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CleanupReport {
    /// Events dropped because nobody polled them in time.
    pub expired: usize,
    /// Table capacity after the pass.
    pub capacity: usize,
}

/// Table of currently raised events.
///
/// Insertion order is preserved. The logical `capacity` doubles when the
/// table is one short of full and halves once it is at most a quarter used
/// (both factors configurable), always staying within the configured bounds.
pub struct EventBus {
    config: EventBusConfig,
    raised: Vec<Raised>,
    capacity: usize,
}

impl EventBus {
    /// Create an empty bus at the minimum capacity.
    pub fn new(config: EventBusConfig) -> Result<Self, EventBusError> {
        config.validate()?;

        let mut raised = Vec::new();
        raised
            .try_reserve_exact(config.min_capacity)
            .map_err(|_| EventBusError::OutOfMemory)?;

        Ok(Self { config, raised, capacity: config.min_capacity })
    }

    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    /// Mark `event` as raised.
    ///
    /// Raising an event that is already raised succeeds without changing
    /// anything, including its age.
    pub fn raise(&mut self, event: Event) -> Result<(), EventBusError> {
        if event.is_none() {
            return Err(EventBusError::NoneEvent);
        }
        if self.is_raised(event) {
            return Ok(());
        }

        if self.raised.len() >= self.capacity - 1 {
            self.grow()?;
        }

        self.raised.push(Raised { event, cycles: 0 });
        trace!("Raised event {:?}", event.raw());
        Ok(())
    }

    pub fn is_raised(&self, event: Event) -> bool {
        self.position(event).is_some()
    }

    /// Consume `event`: returns whether it was raised and, if so, removes it.
    pub fn poll(&mut self, event: Event) -> bool {
        match self.position(event) {
            Some(idx) => {
                self.raised.remove(idx);
                self.shrink();
                true
            }
            None => false,
        }
    }

    /// Drop every raised event and return the table to its minimum size.
    pub fn clear_all(&mut self) {
        self.raised.clear();
        let min = self.config.min_capacity;
        if self.capacity != min {
            self.raised.shrink_to(min);
            debug!("Event table reset from {:?} to {:?}", self.capacity, min);
            self.capacity = min;
        }
    }

    /// End-of-cycle pass: age every raised event and drop the ones that have
    /// now gone `stale_cycles` cycles without being polled.
    pub fn cleanup(&mut self) -> CleanupReport {
        for raised in self.raised.iter_mut() {
            raised.cycles = raised.cycles.saturating_add(1);
        }

        let mut expired = 0;
        let mut idx = 0;
        while idx < self.raised.len() {
            if self.raised[idx].cycles >= self.config.stale_cycles {
                let stale = self.raised.remove(idx);
                trace!("Event {:?} expired during cleanup", stale.event.raw());
                expired += 1;
                self.shrink();
            } else {
                idx += 1;
            }
        }
        self.shrink();

        CleanupReport { expired, capacity: self.capacity }
    }

    /// Move every event queued from interrupt context into the table.
    ///
    /// Must only be called from the cooperative context. Stops at the first
    /// event that cannot be raised; that event is lost.
    pub fn absorb<M: RawMutex, const N: usize>(
        &mut self,
        isr: &InterruptEvents<M, N>,
    ) -> Result<usize, EventBusError> {
        let mut absorbed = 0;
        while let Some(event) = isr.take() {
            self.raise(event)?;
            absorbed += 1;
        }
        Ok(absorbed)
    }

    /// Number of cleanup cycles `event` has survived, if it is raised.
    pub fn cycles_raised(&self, event: Event) -> Option<u8> {
        self.position(event).map(|idx| self.raised[idx].cycles)
    }

    pub fn len(&self) -> usize {
        self.raised.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raised.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Raised events in the order they were raised.
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.raised.iter().map(|raised| raised.event)
    }

    fn position(&self, event: Event) -> Option<usize> {
        self.raised.iter().position(|raised| raised.event == event)
    }

    fn grow(&mut self) -> Result<(), EventBusError> {
        let new_capacity = self.capacity * 2;
        if new_capacity > self.config.max_capacity {
            error!(
                "Maximum number of events reached ({:?})",
                self.raised.len()
            );
            return Err(EventBusError::CapacityExceeded);
        }

        self.raised
            .try_reserve_exact(new_capacity - self.raised.len())
            .map_err(|_| {
                error!("Could not grow event table to {:?}", new_capacity);
                EventBusError::OutOfMemory
            })?;

        debug!("Event table grown to {:?}", new_capacity);
        self.capacity = new_capacity;
        Ok(())
    }

    fn shrink(&mut self) {
        if self.raised.len() * self.config.shrink_multiplier > self.capacity {
            return;
        }

        let new_capacity = (self.capacity / self.config.shrink_divisor)
            .max(self.config.min_capacity);
        if new_capacity != self.capacity {
            self.raised.shrink_to(new_capacity);
            debug!("Event table shrunk to {:?}", new_capacity);
            self.capacity = new_capacity;
        }
    }
}

impl fmt::Display for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, event) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", event)?;
        }
        f.write_str("]")
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("raised", &format_args!("{}", self))
            .finish()
    }
}
