//! CLI Entry Point for planck-daq
//!
//! Provides command-line interface for:
//! - Acquiring one sweep from the photodiode rig (serial or simulated) and estimating h
//! - Error analysis of a dataset of repeated measurements
//! - Listing serial ports
//!
//! # Usage
//!
//! ```bash
//! planck-daq acquire --port /dev/rfcomm0
//! planck-daq acquire --simulate --policy adaptive
//! planck-daq analyze config/red_led.toml --seed 7
//! planck-daq ports
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use planck_daq::acquisition::{Acquisition, AcquisitionRunner, RunReport};
use planck_daq::analysis::{analyze, AnalysisDataset, AnalysisReport};
use planck_daq::config::{DaqConfig, DEFAULT_CONFIG_PATH};
use planck_daq::estimation::{DetectionSignal, ThresholdEstimator, ThresholdPolicy};
use planck_daq::logging;
use planck_daq::storage::SessionWriter;
use planck_daq::transport::{LineTransport, SimulatedRig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "planck-daq")]
#[command(about = "Photoelectric-effect acquisition and Planck's constant estimation", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect one sweep and estimate the stopping voltage
    Acquire {
        /// Serial port (overrides [serial] port)
        #[arg(long)]
        port: Option<String>,

        /// Baud rate (overrides [serial] baud_rate)
        #[arg(long)]
        baud: Option<u32>,

        /// Use the simulated rig instead of a serial port
        #[arg(long)]
        simulate: bool,

        /// Threshold policy (overrides [estimator] policy)
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,

        /// Series the policy runs on (overrides [estimator] signal)
        #[arg(long, value_enum)]
        signal: Option<SignalArg>,

        /// Maximum collection time, e.g. "10s" (overrides [acquisition] max_duration)
        #[arg(long, value_parser = parse_duration)]
        duration: Option<Duration>,

        /// Write CSV/JSON files for the finished run
        #[arg(long)]
        save: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Error analysis of repeated measurements
    Analyze {
        /// Dataset TOML file
        dataset: PathBuf,

        /// Bootstrap resamples (overrides the dataset)
        #[arg(long)]
        iterations: Option<usize>,

        /// Bootstrap RNG seed (overrides the dataset)
        #[arg(long)]
        seed: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List serial ports visible to the OS
    Ports,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Difference below a fixed decay threshold
    Fixed,
    /// Difference exceeding a multiple of the baseline noise
    Adaptive,
}

#[derive(Clone, Copy, ValueEnum)]
enum SignalArg {
    Voltage,
    Current,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = DaqConfig::load_from(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    logging::init_from_config(&config)?;

    match cli.command {
        Commands::Acquire {
            port,
            baud,
            simulate,
            policy,
            signal,
            duration,
            save,
            json,
        } => {
            let mut config = config;
            if let Some(port) = port {
                config.serial.port = port;
            }
            if let Some(baud) = baud {
                config.serial.baud_rate = baud;
            }
            if let Some(policy) = policy {
                config.estimator.policy = match policy {
                    PolicyArg::Fixed => ThresholdPolicy::default(),
                    PolicyArg::Adaptive => ThresholdPolicy::adaptive(),
                };
            }
            if let Some(signal) = signal {
                config.estimator.signal = match signal {
                    SignalArg::Voltage => DetectionSignal::Voltage,
                    SignalArg::Current => DetectionSignal::Current,
                };
            }
            if let Some(duration) = duration {
                config.acquisition.max_duration = duration;
            }
            if save {
                config.storage.enabled = true;
            }
            config.validate()?;
            acquire(&config, simulate, json).await
        }
        Commands::Analyze {
            dataset,
            iterations,
            seed,
            json,
        } => run_analysis(dataset, iterations, seed, json),
        Commands::Ports => list_ports(),
    }
}

fn open_transport(config: &DaqConfig, simulate: bool) -> Result<Box<dyn LineTransport>> {
    if simulate {
        return Ok(Box::new(SimulatedRig::new(&config.simulation)));
    }

    #[cfg(feature = "instrument_serial")]
    {
        let transport = planck_daq::transport::SerialTransport::open(
            &config.serial.port,
            config.serial.baud_rate,
            config.serial.read_timeout,
        )?;
        Ok(Box::new(transport))
    }

    #[cfg(not(feature = "instrument_serial"))]
    {
        Err(planck_daq::DaqError::FeatureNotEnabled("instrument_serial".to_string()).into())
    }
}

async fn acquire(config: &DaqConfig, simulate: bool, json: bool) -> Result<()> {
    let transport = open_transport(config, simulate)?;
    let estimator = ThresholdEstimator::new(config.estimator.clone())?;
    let acquisition = Acquisition::new(config.acquisition.max_duration, estimator);
    let mut runner = AcquisitionRunner::new(transport, acquisition, config.acquisition.poll_interval);

    let outcome = tokio::select! {
        result = runner.run() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    let Some(result) = outcome else {
        let session = runner.acquisition().session();
        tracing::warn!(
            state = ?session.state(),
            readings = session.readings().len(),
            "interrupted, session discarded"
        );
        return Ok(());
    };
    let report = result?;

    if config.storage.enabled {
        let files = SessionWriter::from_config(&config.storage)
            .write(&report)
            .context("failed to write session files")?;
        println!("Saved {} and {}", files.csv.display(), files.summary.display());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report.estimation)?);
    } else {
        print_run(&report);
    }
    Ok(())
}

fn print_run(report: &RunReport) {
    let session = &report.session;
    println!("Readings:          {}", session.readings().len());
    if let Some(cause) = session.finish_cause() {
        println!("Finished by:       {:?}", cause);
    }
    println!(
        "Dropped:           {} segments, {} lines",
        session.rejected_segments(),
        session.discarded_lines()
    );
    println!("Policy:            {:?}", report.estimation.policy);
    match (
        report.estimation.threshold_voltage,
        report.estimation.planck_constant,
    ) {
        (Some(voltage), Some(h)) => {
            println!("Stopping voltage:  {:.4} V", voltage);
            println!("Planck's constant: {:.4e} J*s", h);
        }
        _ => println!("No threshold:      {:?}", report.estimation.reason),
    }
}

fn run_analysis(
    path: PathBuf,
    iterations: Option<usize>,
    seed: Option<u64>,
    json: bool,
) -> Result<()> {
    let mut dataset = AnalysisDataset::load(&path)
        .with_context(|| format!("failed to load dataset {}", path.display()))?;
    if let Some(iterations) = iterations {
        dataset.bootstrap.iterations = iterations;
    }
    if seed.is_some() {
        dataset.bootstrap.seed = seed;
    }

    let report = analyze(&dataset)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    println!("{}", report.label);
    println!(
        "  Stopping voltage: {:.4} +/- {:.4} V (sigma_adc {:.2e} V, combined {:.4} V)",
        report.stopping_voltage.mean,
        report.stopping_voltage.std_dev,
        report.sigma_adc,
        report.sigma_voltage
    );
    println!(
        "  Wavelength:       {:.2} +/- {:.2} nm",
        report.spectral_line.wavelength_m * 1e9,
        report.spectral_line.sigma_wavelength_m * 1e9
    );
    println!(
        "  Frequency:        {:.4e} +/- {:.2e} Hz",
        report.spectral_line.frequency_hz, report.spectral_line.sigma_frequency_hz
    );
    println!(
        "  h:                {:.4e} +/- {:.2e} J*s",
        report.planck.mean, report.planck.std_dev
    );
    println!(
        "  t-test vs {:.4e}: t = {:.3}, df = {}, p = {:.3e}",
        report.accepted_planck,
        report.t_test.t_statistic,
        report.t_test.degrees_of_freedom,
        report.t_test.p_value
    );
    println!(
        "  Bootstrap {:.0}% CI: [{:.4e}, {:.4e}] ({} resamples)",
        report.bootstrap.confidence_level * 100.0,
        report.bootstrap.lower,
        report.bootstrap.upper,
        report.bootstrap.iterations
    );
    println!();
    println!("  {:>8}  {:>12}  {:>10}", "V_s (V)", "h (J*s)", "sigma_h");
    for row in &report.measurements {
        println!(
            "  {:>8.3}  {:>12.4e}  {:>10.2e}",
            row.stopping_voltage, row.planck_constant, row.sigma_planck
        );
    }
}

#[cfg(feature = "instrument_serial")]
fn list_ports() -> Result<()> {
    let ports = planck_daq::transport::list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{:<24} {}", port.name, port.kind);
    }
    Ok(())
}

#[cfg(not(feature = "instrument_serial"))]
fn list_ports() -> Result<()> {
    Err(planck_daq::DaqError::FeatureNotEnabled("instrument_serial".to_string()).into())
}
