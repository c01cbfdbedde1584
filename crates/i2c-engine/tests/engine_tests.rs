use event_bus::{EventBus, EventBusConfig, EventBusError};
use i2c_engine::sim::{BusActivity, SimController, SimDevice};
use i2c_engine::{
    ActionFault, ActionStatus, Device, I2cConfig, I2cEngine, I2cError,
    Peripheral, Speed, I2C_ACTION_FINISHED, I2C_NEW_ACTION,
};
use obc_kernel::{ErrorCode, ModuleId};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Two devices sharing module 0.
const TEMP_A: Device = Device::new(0, 0x48);
const TEMP_B: Device = Device::new(0, 0x49);
/// Device on module 2 with a known register block at 0x10.
const ACCEL: Device = Device::new(2, 0x1D);
/// Nothing answers at this address.
const GHOST: Device = Device::new(0, 0x50);

const ACCEL_BLOCK: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

fn sim() -> SimController {
    let mut sim = SimController::new(4);
    sim.attach(0, SimDevice::new(TEMP_A.address));
    sim.attach(0, SimDevice::new(TEMP_B.address));
    sim.attach(
        2,
        SimDevice::new(ACCEL.address).with_registers(0x10, &ACCEL_BLOCK),
    );
    sim
}

fn event_bus() -> EventBus {
    EventBus::new(EventBusConfig::default()).unwrap()
}

fn running(sim: SimController) -> (I2cEngine<SimController>, EventBus) {
    let mut engine = I2cEngine::new(sim, I2cConfig::default());
    engine.init().unwrap();
    (engine, event_bus())
}

/// Step until `device`'s action leaves `InProgress`, at most `limit` times.
fn run_until_done<const A: usize, const M: usize>(
    engine: &mut I2cEngine<SimController, A, M>,
    bus: &mut EventBus,
    device: Device,
    limit: usize,
) -> ActionStatus {
    for _ in 0..limit {
        engine.step(bus).unwrap();
        let status = engine.status(device).unwrap();
        if status != ActionStatus::InProgress {
            return status;
        }
    }
    engine.status(device).unwrap()
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn operations_before_init_are_rejected() {
    let mut engine: I2cEngine<SimController> =
        I2cEngine::new(sim(), I2cConfig::default());
    let mut bus = event_bus();

    assert_eq!(
        engine.send(&mut bus, TEMP_A, &[1]),
        Err(I2cError::NotInitialised)
    );
    assert_eq!(engine.step(&mut bus), Err(I2cError::NotInitialised));
    assert_eq!(engine.status(TEMP_A), Err(I2cError::NotInitialised));
    assert_eq!(engine.shutdown(), Err(I2cError::NotInitialised));
    assert!(bus.is_empty());
}

#[test]
fn init_configures_only_enabled_modules() {
    let (engine, _) = running(sim());

    assert!(engine.is_initialised());
    assert_eq!(engine.controller().speed(0), Some(Speed::Standard));
    assert_eq!(engine.controller().speed(1), None);
    assert_eq!(engine.controller().speed(2), Some(Speed::Standard));
    assert_eq!(engine.controller().speed(3), None);
}

#[test]
fn init_twice_fails() {
    let (mut engine, _) = running(sim());
    assert_eq!(engine.init(), Err(I2cError::AlreadyInitialised));
}

#[test]
fn init_rejects_zero_budgets() {
    let config = I2cConfig {
        busy_minor_checks: 0,
        ..I2cConfig::default()
    };
    let mut engine: I2cEngine<SimController> = I2cEngine::new(sim(), config);

    assert_eq!(engine.init(), Err(I2cError::InvalidConfig));
    assert!(!engine.is_initialised());
    assert_eq!(engine.controller().speed(0), None);
}

#[test]
fn init_reports_gpio_that_never_comes_up() {
    let mut sim = sim();
    sim.break_peripheral(2, Peripheral::Gpio);
    let mut engine: I2cEngine<SimController> =
        I2cEngine::new(sim, I2cConfig::default());

    assert_eq!(engine.init(), Err(I2cError::GpioEnableFailed));
    assert!(!engine.is_initialised());
}

#[test]
fn init_gives_up_after_ready_checks() {
    // Ready on the 11th poll; the default budget is 10.
    let sim = sim().with_ready_delay(10);
    let mut engine: I2cEngine<SimController> =
        I2cEngine::new(sim, I2cConfig::default());
    assert_eq!(engine.init(), Err(I2cError::GpioEnableFailed));

    let sim = self::sim().with_ready_delay(9);
    let mut engine: I2cEngine<SimController> =
        I2cEngine::new(sim, I2cConfig::default());
    assert_eq!(engine.init(), Ok(()));
}

#[test]
fn init_reports_i2c_peripheral_that_never_comes_up() {
    let mut sim = sim();
    sim.break_peripheral(0, Peripheral::I2c);
    let mut engine: I2cEngine<SimController> =
        I2cEngine::new(sim, I2cConfig::default());

    assert_eq!(engine.init(), Err(I2cError::PeripheralEnableFailed));
}

#[test]
fn shutdown_drops_actions_and_locks() {
    let (mut engine, mut bus) = running(sim());
    engine.send(&mut bus, TEMP_A, &[0x01]).unwrap();

    engine.shutdown().unwrap();
    assert_eq!(engine.in_flight(), 0);
    assert_eq!(engine.lock_owner(0), None);
    assert_eq!(engine.status(TEMP_A), Err(I2cError::NotInitialised));

    engine.init().unwrap();
    assert_eq!(engine.send(&mut bus, TEMP_B, &[0x01]), Ok(()));
}

#[test]
fn peripheral_dropping_out_fails_the_step() {
    let (mut engine, mut bus) = running(sim());
    engine.send(&mut bus, TEMP_A, &[0x01]).unwrap();
    engine.controller_mut().break_peripheral(0, Peripheral::I2c);

    assert_eq!(
        engine.step(&mut bus),
        Err(I2cError::PeripheralNotResponding)
    );
}

#[test]
fn finished_actions_are_announced_even_when_a_module_drops_out() {
    let (mut engine, mut bus) = running(sim());
    engine.send(&mut bus, TEMP_A, &[0x42]).unwrap();
    engine.recv(&mut bus, ACCEL, 0x10, 4).unwrap();
    engine.controller_mut().break_peripheral(2, Peripheral::I2c);

    assert_eq!(
        engine.step(&mut bus),
        Err(I2cError::PeripheralNotResponding)
    );
    assert_eq!(engine.status(TEMP_A), Ok(ActionStatus::Success));
    assert_eq!(engine.status(ACCEL), Ok(ActionStatus::InProgress));
    assert!(bus.is_raised(I2C_ACTION_FINISHED));
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

#[test]
fn unknown_and_disabled_modules_are_rejected() {
    let (mut engine, mut bus) = running(sim());

    assert_eq!(
        engine.send(&mut bus, Device::new(7, 0x10), &[1]),
        Err(I2cError::InvalidModule)
    );
    assert_eq!(
        engine.recv(&mut bus, Device::new(1, 0x10), 0x00, 2),
        Err(I2cError::ModuleDisabled)
    );
}

#[test]
fn zero_length_requests_are_rejected() {
    let (mut engine, mut bus) = running(sim());

    assert_eq!(
        engine.send(&mut bus, TEMP_A, &[]),
        Err(I2cError::ZeroLengthSend)
    );
    assert_eq!(
        engine.recv(&mut bus, TEMP_A, 0x00, 0),
        Err(I2cError::ZeroLengthReceive)
    );
    assert_eq!(engine.in_flight(), 0);
    assert_eq!(engine.lock_owner(0), None);
}

#[test]
fn module_is_exclusive_to_one_device() {
    let (mut engine, mut bus) = running(sim());

    engine.send(&mut bus, TEMP_A, &[0x42]).unwrap();
    assert_eq!(engine.lock_owner(0), Some(TEMP_A));
    assert_eq!(
        engine.send(&mut bus, TEMP_B, &[0x42]),
        Err(I2cError::ModuleLockedByAnotherDevice)
    );

    // Other modules are unaffected.
    assert_eq!(engine.recv(&mut bus, ACCEL, 0x10, 1), Ok(()));

    engine.clear(TEMP_A).unwrap();
    assert_eq!(engine.lock_owner(0), None);
    assert_eq!(engine.send(&mut bus, TEMP_B, &[0x42]), Ok(()));
}

#[test]
fn owner_may_queue_again_on_its_module() {
    let (mut engine, mut bus) = running(sim());

    engine.send(&mut bus, TEMP_A, &[0x01]).unwrap();
    engine.send(&mut bus, TEMP_A, &[0x02]).unwrap();
    assert_eq!(engine.in_flight(), 2);

    // Only one transfer per module and cycle.
    engine.step(&mut bus).unwrap();
    assert!(engine.has_pending_work());
    engine.step(&mut bus).unwrap();
    assert!(!engine.has_pending_work());

    engine.clear(TEMP_A).unwrap();
    assert_eq!(engine.lock_owner(0), Some(TEMP_A));
    assert_eq!(
        engine.send(&mut bus, TEMP_B, &[0x01]),
        Err(I2cError::ModuleLockedByAnotherDevice)
    );

    engine.clear(TEMP_A).unwrap();
    assert_eq!(engine.lock_owner(0), None);
}

#[test]
fn full_table_rejects_without_taking_the_lock() {
    let mut sim = SimController::new(8);
    for module in 0..5 {
        sim.attach(module, SimDevice::new(0x20 + module));
    }
    let mut config = I2cConfig::<8>::all_disabled();
    for module in 0..5 {
        config = config.with_module(module, Speed::Fast);
    }
    let mut engine: I2cEngine<SimController, 4, 8> =
        I2cEngine::new(sim, config);
    engine.init().unwrap();
    let mut bus = event_bus();

    let devices: Vec<Device> =
        (0..5).map(|m| Device::new(m, 0x20 + m)).collect();
    for device in &devices[..4] {
        engine.recv(&mut bus, *device, 0x00, 3).unwrap();
    }

    assert_eq!(
        engine.recv(&mut bus, devices[4], 0x00, 3),
        Err(I2cError::MaxActionsReached)
    );
    assert_eq!(engine.lock_owner(4), None);

    engine.clear(devices[1]).unwrap();
    assert_eq!(engine.recv(&mut bus, devices[4], 0x00, 3), Ok(()));
    assert_eq!(engine.lock_owner(4), Some(devices[4]));
}

#[test]
fn enqueue_raises_new_action_and_step_consumes_it() {
    let (mut engine, mut bus) = running(sim());

    engine.send(&mut bus, TEMP_A, &[0x42]).unwrap();
    assert!(bus.is_raised(I2C_NEW_ACTION));
    assert!(engine.has_pending_work());

    engine.step(&mut bus).unwrap();
    assert!(!bus.is_raised(I2C_NEW_ACTION));
    assert!(bus.is_raised(I2C_ACTION_FINISHED));
}

#[test]
fn failed_event_raise_leaves_engine_untouched() {
    let (mut engine, _) = running(sim());
    let config = EventBusConfig {
        min_capacity: 2,
        max_capacity: 2,
        ..EventBusConfig::default()
    };
    let mut bus = EventBus::new(config).unwrap();
    bus.raise(obc_kernel::Event::from_raw(0x0201)).unwrap();

    assert_eq!(
        engine.send(&mut bus, TEMP_A, &[0x42]),
        Err(I2cError::EventBus(EventBusError::CapacityExceeded))
    );
    assert_eq!(engine.in_flight(), 0);
    assert_eq!(engine.lock_owner(0), None);
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

#[test]
fn single_send_round_trip_releases_the_lock() {
    let (mut engine, mut bus) = running(sim());

    engine.send(&mut bus, TEMP_A, &[0x42]).unwrap();
    assert_eq!(
        run_until_done(&mut engine, &mut bus, TEMP_A, 5),
        ActionStatus::Success
    );
    engine.clear(TEMP_A).unwrap();
    assert_eq!(engine.status(TEMP_A), Ok(ActionStatus::NoAction));

    assert_eq!(engine.send(&mut bus, TEMP_A, &[0x43]), Ok(()));
    run_until_done(&mut engine, &mut bus, TEMP_A, 5);

    let written: Vec<_> = engine
        .controller()
        .log()
        .iter()
        .map(|entry| entry.activity)
        .collect();
    assert_eq!(
        written,
        vec![BusActivity::Written(0x42), BusActivity::Written(0x43)]
    );
}

#[test]
fn received_bytes_of_a_send_are_refused() {
    let (mut engine, mut bus) = running(sim());
    engine.send(&mut bus, TEMP_A, &[0x42]).unwrap();
    run_until_done(&mut engine, &mut bus, TEMP_A, 5);

    let mut out = [0u8; 4];
    assert_eq!(
        engine.recved_bytes(TEMP_A, &mut out),
        Err(I2cError::GetRecvedBytesFromSend)
    );
}

#[test]
fn burst_receive_returns_register_block() {
    let (mut engine, mut bus) = running(sim());

    engine.recv(&mut bus, ACCEL, 0x10, 4).unwrap();
    assert_eq!(
        run_until_done(&mut engine, &mut bus, ACCEL, 5),
        ActionStatus::Success
    );

    let mut out = [0u8; 8];
    assert_eq!(engine.recved_bytes(ACCEL, &mut out), Ok(4));
    assert_eq!(out[..4], ACCEL_BLOCK);
    assert_eq!(out[4..], [0; 4]);
}

#[test]
fn single_receive_reads_one_register() {
    let (mut engine, mut bus) = running(sim());

    engine.recv(&mut bus, ACCEL, 0x12, 1).unwrap();
    assert_eq!(
        run_until_done(&mut engine, &mut bus, ACCEL, 5),
        ActionStatus::Success
    );

    let mut out = [0u8; 1];
    assert_eq!(engine.recved_bytes(ACCEL, &mut out), Ok(1));
    assert_eq!(out, [0xBE]);
}

#[test]
fn burst_send_writes_consecutive_registers() {
    let (mut engine, mut bus) = running(sim());

    engine.send(&mut bus, TEMP_B, &[0x20, 0x01, 0x02, 0x03]).unwrap();
    assert_eq!(
        run_until_done(&mut engine, &mut bus, TEMP_B, 5),
        ActionStatus::Success
    );

    let device = engine.controller().device(0, TEMP_B.address).unwrap();
    assert_eq!(device.register(0x20), 0x01);
    assert_eq!(device.register(0x21), 0x02);
    assert_eq!(device.register(0x22), 0x03);
}

#[test]
fn short_output_buffer_is_refused() {
    let (mut engine, mut bus) = running(sim());
    engine.recv(&mut bus, ACCEL, 0x10, 4).unwrap();
    run_until_done(&mut engine, &mut bus, ACCEL, 5);

    let mut out = [0u8; 3];
    assert_eq!(
        engine.recved_bytes(ACCEL, &mut out),
        Err(I2cError::OutputTooSmall)
    );
}

#[test]
fn slow_device_spans_several_cycles() {
    let mut sim = SimController::new(4);
    sim.attach(
        2,
        SimDevice::new(ACCEL.address)
            .with_registers(0x10, &ACCEL_BLOCK)
            .with_latency(7),
    );
    let (mut engine, mut bus) = running(sim);

    engine.recv(&mut bus, ACCEL, 0x10, 4).unwrap();
    engine.step(&mut bus).unwrap();
    assert_eq!(engine.status(ACCEL), Ok(ActionStatus::InProgress));

    let mut out = [0u8; 4];
    assert_eq!(
        engine.recved_bytes(ACCEL, &mut out),
        Err(I2cError::GetRecvedBytesOnNonSuccessAction)
    );
    assert!(!bus.is_raised(I2C_ACTION_FINISHED));

    assert_eq!(
        run_until_done(&mut engine, &mut bus, ACCEL, 20),
        ActionStatus::Success
    );
    assert_eq!(engine.recved_bytes(ACCEL, &mut out), Ok(4));
    assert_eq!(out, ACCEL_BLOCK);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn missing_device_fails_with_address_nack() {
    let (mut engine, mut bus) = running(sim());

    engine.recv(&mut bus, GHOST, 0x00, 1).unwrap();
    assert_eq!(
        run_until_done(&mut engine, &mut bus, GHOST, 5),
        ActionStatus::Failure
    );
    assert_eq!(engine.failure_cause(GHOST), Ok(ActionFault::AddressNack));
    assert!(bus.is_raised(I2C_ACTION_FINISHED));

    let mut out = [0u8; 1];
    assert_eq!(
        engine.recved_bytes(GHOST, &mut out),
        Err(I2cError::GetRecvedBytesOnNonSuccessAction)
    );
}

#[test]
fn failure_cause_requires_a_failed_action() {
    let (mut engine, mut bus) = running(sim());
    assert_eq!(engine.failure_cause(TEMP_A), Err(I2cError::NoActionForDevice));

    engine.send(&mut bus, TEMP_A, &[0x42]).unwrap();
    assert_eq!(engine.failure_cause(TEMP_A), Err(I2cError::ActionNotFailed));
    run_until_done(&mut engine, &mut bus, TEMP_A, 5);
    assert_eq!(engine.failure_cause(TEMP_A), Err(I2cError::ActionNotFailed));
}

#[test]
fn data_nack_aborts_burst_with_error_stop() {
    let mut sim = SimController::new(4);
    sim.attach(0, SimDevice::new(TEMP_A.address).with_nack_after(2));
    let (mut engine, mut bus) = running(sim);

    engine.send(&mut bus, TEMP_A, &[0x20, 0x01, 0x02, 0x03]).unwrap();
    assert_eq!(
        run_until_done(&mut engine, &mut bus, TEMP_A, 5),
        ActionStatus::Failure
    );
    assert_eq!(engine.failure_cause(TEMP_A), Ok(ActionFault::DataNack));

    let log = engine.controller().log();
    assert_eq!(log.last().map(|e| e.activity), Some(BusActivity::ErrorStop));
    let device = engine.controller().device(0, TEMP_A.address).unwrap();
    assert_eq!(device.register(0x20), 0x01);
    assert_eq!(device.register(0x21), 0x00);
}

#[test]
fn lost_arbitration_is_reported_and_retry_succeeds() {
    let mut sim = SimController::new(4);
    sim.attach(0, SimDevice::new(TEMP_A.address).with_arbitration_loss());
    let (mut engine, mut bus) = running(sim);

    engine.send(&mut bus, TEMP_A, &[0x42]).unwrap();
    assert_eq!(
        run_until_done(&mut engine, &mut bus, TEMP_A, 5),
        ActionStatus::Failure
    );
    assert_eq!(engine.failure_cause(TEMP_A), Ok(ActionFault::ArbitrationLost));

    engine.clear(TEMP_A).unwrap();
    engine.send(&mut bus, TEMP_A, &[0x42]).unwrap();
    assert_eq!(
        run_until_done(&mut engine, &mut bus, TEMP_A, 5),
        ActionStatus::Success
    );
}

#[test]
fn master_stuck_busy_times_out() {
    let mut sim = SimController::new(4);
    sim.attach(0, SimDevice::new(TEMP_A.address).with_latency(20));
    let (mut engine, mut bus) = running(sim);

    engine.send(&mut bus, TEMP_A, &[0x42]).unwrap();
    engine.step(&mut bus).unwrap();
    engine.step(&mut bus).unwrap();
    assert_eq!(engine.status(TEMP_A), Ok(ActionStatus::InProgress));

    engine.step(&mut bus).unwrap();
    assert_eq!(engine.status(TEMP_A), Ok(ActionStatus::Failure));
    assert_eq!(engine.failure_cause(TEMP_A), Ok(ActionFault::BusyTimeout));
}

#[test]
fn per_action_failure_does_not_block_other_modules() {
    let (mut engine, mut bus) = running(sim());

    engine.recv(&mut bus, GHOST, 0x00, 2).unwrap();
    engine.recv(&mut bus, ACCEL, 0x10, 2).unwrap();
    engine.step(&mut bus).unwrap();

    assert_eq!(engine.status(GHOST), Ok(ActionStatus::Failure));
    assert_eq!(engine.status(ACCEL), Ok(ActionStatus::Success));
}

// ---------------------------------------------------------------------------
// Queries and error codes
// ---------------------------------------------------------------------------

#[test]
fn queries_for_unknown_devices() {
    let (mut engine, _) = running(sim());
    let mut out = [0u8; 1];

    assert_eq!(engine.status(TEMP_B), Ok(ActionStatus::NoAction));
    assert_eq!(engine.clear(TEMP_B), Err(I2cError::NoActionForDevice));
    assert_eq!(
        engine.recved_bytes(TEMP_B, &mut out),
        Err(I2cError::NoActionForDevice)
    );
}

#[test]
fn errors_map_to_i2c_codes() {
    let code: ErrorCode = I2cError::ModuleLockedByAnotherDevice.into();
    assert_eq!(code.module(), Ok(ModuleId::I2c));

    let code: ErrorCode = ActionFault::BusyTimeout.into();
    assert_eq!(code.module(), Ok(ModuleId::I2c));
    assert_ne!(code, I2cError::PeripheralNotResponding.code());

    assert_eq!(
        I2cError::InvalidConfig.code(),
        ErrorCode::new(ModuleId::I2c, 0x13)
    );

    let wrapped: I2cError = EventBusError::CapacityExceeded.into();
    assert_eq!(wrapped, I2cError::EventBus(EventBusError::CapacityExceeded));
}
