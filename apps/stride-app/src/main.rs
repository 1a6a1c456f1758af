//! Stride biped controller CLI.
//!
//! - `check`: validate a controller config and an inertial table
//! - `run`: drive the control loop against bench hardware and print statistics
//! - `info`: print crate versions and defaults

mod bench;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use stride_control::Runner;
use stride_core::config::StrideConfig;
use stride_core::error::StrideError;
use stride_core::types::LegSide;
use stride_model::{InertialTable, RobotModel, UrdfLegMap};

use crate::bench::BenchHardware;

const DEFAULT_CONFIG: &str = "config/stride.toml";
const DEFAULT_TABLE: &str = "config/biped.toml";

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Real-time locomotion controller for a two-leg robot.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the controller config and the inertial table.
    Check {
        /// Controller config (TOML). Defaults apply when the file is absent.
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Inertial table: TOML `[[link]]` entries, or a `.urdf` file.
        #[arg(short, long, default_value = DEFAULT_TABLE)]
        table: PathBuf,
    },

    /// Run the control loop against bench hardware.
    Run {
        /// Number of control ticks.
        #[arg(short = 'n', long, default_value_t = 1000)]
        ticks: u64,

        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Inertial table: TOML `[[link]]` entries, or a `.urdf` file.
        #[arg(short, long, default_value = DEFAULT_TABLE)]
        table: PathBuf,

        /// Pace ticks to wall-clock time (overrides the config).
        #[arg(long)]
        realtime: Option<bool>,
    },

    /// Print crate information.
    Info,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<StrideConfig, StrideError> {
    if path.exists() {
        info!(path = %path.display(), "loading controller config");
        Ok(StrideConfig::from_file(path)?)
    } else {
        info!(path = %path.display(), "config not found; using defaults");
        let config = StrideConfig::default();
        config.validate()?;
        Ok(config)
    }
}

/// Load the inertial table: URDF when the file ends in `.urdf` (links named
/// by `legs.*.urdf_links`), the TOML link table otherwise.
fn load_model(path: &Path, config: &StrideConfig) -> Result<RobotModel, StrideError> {
    let is_urdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("urdf"));
    let table = if is_urdf {
        info!(path = %path.display(), "loading inertial table from URDF");
        InertialTable::from_urdf_file(path, &UrdfLegMap::from(&config.legs))?
    } else {
        info!(path = %path.display(), "loading inertial table");
        InertialTable::from_file(path)?
    };
    Ok(RobotModel::new(table, config.body.gravity))
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

fn run_check(config: &Path, table: &Path) -> Result<(), StrideError> {
    let config = load_config(config)?;
    let model = load_model(table, &config)?;
    let samples = config.swing_samples()?;

    println!("config ok");
    println!(
        "  dt={}s period={}s switch={} swing_samples={samples}",
        config.control.dt, config.gait.period, config.gait.switch_fraction
    );
    println!("table ok");
    println!(
        "  leg mass={:.3}kg reach={:.3}m",
        model.table().total_mass() / 2.0,
        model.table().leg_length(LegSide::Left)
    );
    Ok(())
}

fn run_loop(ticks: u64, config: &Path, table: &Path, realtime: Option<bool>) -> Result<(), StrideError> {
    let mut config = load_config(config)?;
    if let Some(realtime) = realtime {
        config.control.realtime = realtime;
    }
    let model = load_model(table, &config)?;

    let mut runner = Runner::new(&config, &model, BenchHardware::new())?;
    let result = runner.run_for(ticks);
    runner.shutdown();
    let stats = result?;

    print!("{stats}");
    println!(
        "commands={} peak_torque={:.3}Nm",
        runner.hardware().commands(),
        runner.hardware().peak_torque()
    );
    Ok(())
}

fn run_info() {
    println!("stride v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("crates:");
    println!("  stride-core    {}", env!("CARGO_PKG_VERSION"));
    println!("  stride-model   {}", env!("CARGO_PKG_VERSION"));
    println!("  stride-control {}", env!("CARGO_PKG_VERSION"));
    println!();
    let defaults = StrideConfig::default();
    println!(
        "defaults: dt={}s period={}s switch={} threshold={}N",
        defaults.control.dt,
        defaults.gait.period,
        defaults.gait.switch_fraction,
        defaults.contact.force_threshold
    );
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Some(Commands::Check { config, table }) => run_check(&config, &table),
        Some(Commands::Run {
            ticks,
            config,
            table,
            realtime,
        }) => run_loop(ticks, &config, &table, realtime),
        Some(Commands::Info) => {
            run_info();
            Ok(())
        }
        None => run_loop(1000, Path::new(DEFAULT_CONFIG), Path::new(DEFAULT_TABLE), None),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
