use crate::error::EventBusError;

/// Sizing policy of an [`EventBus`](crate::EventBus).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventBusConfig {
    /// Capacity the table starts at and never shrinks below.
    pub min_capacity: usize,
    /// Capacity the table may never grow beyond. Bounds the number of
    /// simultaneously raised events to `max_capacity - 1`.
    pub max_capacity: usize,
    /// The table shrinks once `len * shrink_multiplier <= capacity`.
    pub shrink_multiplier: usize,
    /// Divisor applied to the capacity when shrinking.
    pub shrink_divisor: usize,
    /// Number of cleanup cycles after which an unpolled event is dropped.
    pub stale_cycles: u8,
}

impl EventBusConfig {
    pub const DEFAULT_MIN_CAPACITY: usize = 8;
    pub const DEFAULT_MAX_CAPACITY: usize = 256;
    pub const DEFAULT_SHRINK_MULTIPLIER: usize = 4;
    pub const DEFAULT_SHRINK_DIVISOR: usize = 2;
    pub const DEFAULT_STALE_CYCLES: u8 = 2;

    pub const fn new() -> Self {
        Self {
            min_capacity: Self::DEFAULT_MIN_CAPACITY,
            max_capacity: Self::DEFAULT_MAX_CAPACITY,
            shrink_multiplier: Self::DEFAULT_SHRINK_MULTIPLIER,
            shrink_divisor: Self::DEFAULT_SHRINK_DIVISOR,
            stale_cycles: Self::DEFAULT_STALE_CYCLES,
        }
    }

    /// Check that the policy keeps capacities powers of two and that the
    /// table can hold at least one event.
    pub fn validate(&self) -> Result<(), EventBusError> {
        let valid = self.min_capacity >= 2
            && self.min_capacity.is_power_of_two()
            && self.max_capacity.is_power_of_two()
            && self.min_capacity <= self.max_capacity
            && self.shrink_multiplier >= 1
            && self.shrink_divisor >= 2
            && self.shrink_divisor.is_power_of_two()
            && self.stale_cycles > 0;

        if valid {
            Ok(())
        } else {
            Err(EventBusError::InvalidConfig)
        }
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self::new()
    }
}
