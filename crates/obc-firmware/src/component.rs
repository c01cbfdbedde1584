use event_bus::EventBus;
use i2c_engine::{I2cController, I2cEngine};
use obc_kernel::ErrorChain;

/// Error chain reported by a component, top-level code first.
pub type FaultChain = ErrorChain<4>;

/// Shared services handed to every component step.
pub struct Services<'a, C> {
    pub events: &'a mut EventBus,
    pub i2c: &'a mut I2cEngine<C>,
}

/// A unit of work stepped once per cycle.
///
/// Components must never block: anything that cannot finish now is picked up
/// again on the next call to `step`.
pub trait Component<C: I2cController> {
    fn name(&self) -> &'static str;

    fn init(
        &mut self,
        _services: &mut Services<'_, C>,
    ) -> Result<(), FaultChain> {
        Ok(())
    }

    fn step(
        &mut self,
        services: &mut Services<'_, C>,
    ) -> Result<(), FaultChain>;
}
