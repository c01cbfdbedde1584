use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use obc_kernel::Event;
use portable_atomic::{AtomicU32, Ordering};

use crate::error::EventBusError;

/// Bounded queue of events raised from interrupt context.
///
/// Interrupt handlers may only call [`raise_from_isr`](Self::raise_from_isr);
/// the table itself is mutated exclusively by the scheduler through
/// [`EventBus::absorb`](crate::EventBus::absorb). Use a
/// `CriticalSectionRawMutex` when handlers and the scheduler share it.
pub struct InterruptEvents<M: RawMutex, const N: usize> {
    queue: Channel<M, Event, N>,
    dropped: AtomicU32,
}

impl<M: RawMutex, const N: usize> InterruptEvents<M, N> {
    pub const fn new() -> Self {
        Self { queue: Channel::new(), dropped: AtomicU32::new(0) }
    }

    /// Queue `event` for the next cycle. Never blocks.
    pub fn raise_from_isr(&self, event: Event) -> Result<(), EventBusError> {
        if event.is_none() {
            return Err(EventBusError::NoneEvent);
        }
        self.queue.try_send(event).map_err(|_| {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            EventBusError::IsrQueueFull
        })
    }

    /// True if no interrupt has queued an event since the last drain.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Number of events lost because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn take(&self) -> Option<Event> {
        self.queue.try_receive().ok()
    }
}

impl<M: RawMutex, const N: usize> Default for InterruptEvents<M, N> {
    fn default() -> Self {
        Self::new()
    }
}
