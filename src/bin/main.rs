use std::path::PathBuf;
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use linux_embedded_hal::I2cdev;
use log::{info, warn};
use ninedof::board::{self, Board, DynSensor};
use ninedof::{calibration_file, linux_bus};
use ninedof_core::bus::with_bus;
use ninedof_core::{BusRegistry, Profile};

#[derive(Parser)]
#[command(name = "ninedof")]
#[command(about = "Sample calibrated inertial and environmental sensors over I2C")]
struct Cli {
    /// I2C bus number, opened as /dev/i2c-<n>
    #[arg(long, env = "NINEDOF_I2C_BUS", default_value_t = 0)]
    bus: u8,

    /// Poll rate in Hz
    #[arg(
        long,
        env = "NINEDOF_SAMPLE_RATE",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    rate: u32,

    /// Calibration profile
    #[arg(long, default_value = "calibration.ini")]
    calibration: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Poll every sensor of a board and print its quantities")]
    Run(RunArgs),
    #[command(about = "List the addresses answering on the bus")]
    Scan,
    #[command(about = "Capture offsets that null a resting sensor")]
    Zero(ZeroArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    #[arg(long, value_enum, default_value_t = Board::NineDof)]
    board: Board,

    /// Stop after this many ticks
    #[arg(long)]
    samples: Option<u64>,
}

#[derive(clap::Args)]
struct ZeroArgs {
    #[arg(long, value_enum, default_value_t = Board::NineDof)]
    board: Board,

    /// Profile section of the sensor to zero, e.g. `gyroscope`
    section: String,

    /// Ticks to average
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    samples: u64,
}

/// Fixed-rate deadline scheduler. A tick that overruns its deadline restarts
/// the schedule from now instead of bursting to catch up.
struct Ticker {
    period: Duration,
    next: Instant,
}

impl Ticker {
    fn new(rate: u32) -> Self {
        Self {
            period: Duration::from_secs(1) / rate,
            next: Instant::now(),
        }
    }

    fn wait(&mut self) {
        self.next += self.period;
        let now = Instant::now();
        match self.next.checked_duration_since(now) {
            Some(remaining) => sleep(remaining),
            None => self.next = now,
        }
    }
}

fn initialize<I>(sensors: &mut [DynSensor<I>], profile: &Profile) -> Result<()>
where
    I: embedded_hal::i2c::I2c,
{
    board::initialize_all::<I>(sensors, profile).map_err(|e| anyhow!("{e}"))
}

fn poll_all<I>(sensors: &mut [DynSensor<I>]) -> String
where
    I: embedded_hal::i2c::I2c,
{
    let mut fields = Vec::new();
    for sensor in sensors.iter_mut() {
        if let Err(e) = sensor.poll() {
            warn!("{e}");
        }
        fields.extend(sensor.quantities().iter().map(|q| q.to_string()));
    }
    fields.join(" ## ")
}

fn run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let profile = calibration_file::load_profile(&cli.calibration)?;
    let mut registry = BusRegistry::new();
    let bus = linux_bus::open(&mut registry, cli.bus)?;
    let mut sensors = args.board.sensors(&bus);

    let result = initialize::<I2cdev>(&mut sensors, &profile).map(|_| {
        info!("sampling {:?} at {} Hz", args.board, cli.rate);
        let start = Instant::now();
        let mut ticker = Ticker::new(cli.rate);
        let mut ticks = 0u64;

        while args.samples.is_none_or(|limit| ticks < limit) {
            let line = poll_all::<I2cdev>(&mut sensors);
            println!("{:10.3} {line}", start.elapsed().as_secs_f64());
            ticks += 1;
            ticker.wait();
        }
    });

    board::finalize_ready::<I2cdev>(&mut sensors);
    result
}

fn scan(cli: &Cli) -> Result<()> {
    let mut registry = BusRegistry::new();
    let bus = linux_bus::open(&mut registry, cli.bus)?;

    for address in with_bus(&bus, |bus| bus.scan()) {
        match board::known_chip(address) {
            Some(chip) => println!("{address:#04x}  {chip}"),
            None => println!("{address:#04x}"),
        }
    }
    Ok(())
}

fn zero(cli: &Cli, args: &ZeroArgs) -> Result<()> {
    let profile = calibration_file::load_profile(&cli.calibration)?;
    let mut registry = BusRegistry::new();
    let bus = linux_bus::open(&mut registry, cli.bus)?;

    let mut sensors = args.board.sensors(&bus);
    sensors.retain(|sensor| sensor.state().section() == args.section);
    if sensors.is_empty() {
        return Err(anyhow!(
            "board {:?} has no sensor calibrated from [{}]",
            args.board,
            args.section
        ));
    }

    let result = initialize::<I2cdev>(&mut sensors, &profile).and_then(|_| {
        info!("averaging {} samples of [{}], keep the sensor still", args.samples, args.section);
        let mut ticker = Ticker::new(cli.rate);
        for _ in 0..args.samples {
            poll_all::<I2cdev>(&mut sensors);
            ticker.wait();
        }

        let sensor = &sensors[0];
        let mean = sensor
            .history()
            .mean(args.samples as usize)
            .ok_or_else(|| anyhow!("{}: no samples captured", sensor.name()))?;
        info!("{}: resting mean {mean}", sensor.name());

        let zeroed = sensor.calibration().zeroed_at(&mean);
        calibration_file::save_calibration(&cli.calibration, &args.section, &zeroed)
    });

    board::finalize_ready::<I2cdev>(&mut sensors);
    result
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run(args) => run(&cli, args),
        Commands::Scan => scan(&cli),
        Commands::Zero(args) => zero(&cli, args),
    }
}
