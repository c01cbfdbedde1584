//! OBC firmware simulator
//!
//! Runs the firmware cycle on the host, with the I2C masters replaced by
//! simulated devices and the idle instruction replaced by a timer tick.
//!
//! # Example
//!
//! ```bash
//! # Run 100 cycles with a slow IMU
//! obc-sim --cycles 100 --latency 4
//!
//! # Save the default configuration, then run from it
//! obc-sim --write-config obc.cfg
//! obc-sim --config obc.cfg
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;
use i2c_engine::sim::{SimController, SimDevice};
use i2c_engine::I2cController;
use obc_firmware::imu::{self, IMU_DATA_READY, IMU_READ_FAILED};
use obc_firmware::{
    Component, FaultChain, FirmwareConfig, Imu, InterruptQueue, Kernel,
    Scheduler, Services,
};
use obc_kernel::{Event, ModuleId};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Raised by the simulated timer each time the core idles.
const TIMER_TICK: Event = Event::new(ModuleId::Kernel, 0x01);

/// Accelerometer block served by the simulated IMU: x = 16, y = -16, z = 1 g.
const ACCEL_BLOCK: [u8; 6] = [0x00, 0x10, 0xFF, 0xF0, 0x40, 0x00];

static INTERRUPTS: InterruptQueue<8> = InterruptQueue::<8>::new();

/// OBC firmware simulator
#[derive(Parser, Debug)]
#[command(name = "obc-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of scheduler cycles to run
    #[arg(short = 'n', long, default_value = "50")]
    cycles: u64,

    /// Postcard-encoded firmware configuration to run with
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Write the configuration in use to this file and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Status reads the simulated IMU stays busy after each command
    #[arg(short = 'l', long, default_value = "1")]
    latency: u8,

    /// Make the IMU refuse every byte after this many writes
    #[arg(long)]
    nack_after: Option<usize>,

    /// Leave the IMU off the bus
    #[arg(long)]
    no_imu: bool,
}

/// Stands in for the wait-for-interrupt instruction: the timer fires at
/// once.
#[derive(Default)]
struct SimKernel {
    idles: u64,
}

impl Kernel for SimKernel {
    fn wait_for_interrupt(&mut self) {
        self.idles += 1;
        if INTERRUPTS.raise_from_isr(TIMER_TICK).is_err() {
            warn!(dropped = INTERRUPTS.dropped(), "Timer tick lost");
        }
    }
}

/// Reports accelerometer readings as they arrive.
#[derive(Default)]
struct Telemetry {
    ticks: u64,
    readings: u64,
}

impl<C: I2cController> Component<C> for Telemetry {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    fn step(
        &mut self,
        services: &mut Services<'_, C>,
    ) -> Result<(), FaultChain> {
        if services.events.poll(TIMER_TICK) {
            self.ticks += 1;
        }
        if services.events.poll(IMU_DATA_READY) {
            self.readings += 1;
            info!(readings = self.readings, ticks = self.ticks, "IMU reading");
        }
        if services.events.poll(IMU_READ_FAILED) {
            warn!(ticks = self.ticks, "IMU read failed");
        }
        Ok(())
    }
}

fn load_config(args: &Args) -> anyhow::Result<FirmwareConfig> {
    let Some(path) = &args.config else {
        return Ok(FirmwareConfig::default());
    };
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    FirmwareConfig::from_bytes(&bytes)
        .map_err(|err| anyhow!("{}: {}", path.display(), err))
}

fn controller(args: &Args, config: &FirmwareConfig) -> SimController {
    let mut sim = SimController::new(config.i2c.modules.len());
    if args.no_imu {
        return sim;
    }

    let mut device = SimDevice::new(config.imu_device.address)
        .with_registers(imu::WHO_AM_I, &[imu::EXPECTED_WHO_AM_I])
        .with_registers(imu::ACCEL_DATA_X1, &ACCEL_BLOCK)
        .with_latency(args.latency);
    if let Some(count) = args.nack_after {
        device = device.with_nack_after(count);
    }
    sim.attach(config.imu_device.module, device);
    sim
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    if let Some(path) = &args.write_config {
        let bytes = config.to_vec().map_err(|err| anyhow!("{}", err))?;
        std::fs::write(path, &bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(
            path = %path.display(),
            bytes = bytes.len(),
            "Configuration written"
        );
        return Ok(());
    }

    let mut scheduler = Scheduler::new(
        &config,
        controller(&args, &config),
        SimKernel::default(),
        &INTERRUPTS,
    )
    .map_err(|err| anyhow!("{}", err))?;
    let imu = Imu::new(config.imu_device, config.imu_poll_cycles);
    scheduler.add_component(imu);
    scheduler.add_application(Telemetry::default());
    scheduler.init().map_err(|err| anyhow!("bring-up failed: {}", err))?;

    info!(cycles = args.cycles, "Starting simulation");
    for _ in 0..args.cycles {
        let report = scheduler.cycle().map_err(|err| {
            let cycle = scheduler.cycles();
            anyhow!("cycle {} aborted: {}", cycle, err.chain::<4>())
        })?;
        if report.faults > 0 {
            if let Some(chain) = scheduler.last_fault() {
                warn!(cycle = report.cycle, fault = %chain, "Component fault");
            }
        }
    }

    info!(
        cycles = scheduler.cycles(),
        idles = scheduler.kernel().idles,
        faults = scheduler.fault_count(),
        bus_transfers = scheduler.i2c().controller().log().len(),
        "Simulation finished"
    );
    Ok(())
}
