/// Platform hooks used by the scheduler.
pub trait Kernel {
    /// Halt the core until an interrupt is pending.
    ///
    /// Called inside a critical section. Implementations must still return
    /// when an interrupt becomes pending, as `WFI` does on Cortex-M.
    fn wait_for_interrupt(&mut self);
}
