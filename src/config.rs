//! Configuration parsing and validation

use crate::constants::settings::{MAX_SENSITIVITY, MIN_SENSITIVITY};
use crate::constants::timing::{DEFAULT_TICK_INTERVAL_MS, MIN_TICK_INTERVAL_MS};
use crate::error::{AppError, AppResult};
use crate::settings::{FileStore, PartialConfiguration};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Command line arguments for the adaptive-volume application
#[derive(Parser)]
#[command(name = "adaptive-volume")]
#[command(about = "Boost media playback as the room gets louder")]
pub struct Args {
    /// Log level when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Play media and adapt its volume to ambient noise
    Run(RunArgs),
    /// List available audio input devices
    List(ListArgs),
    /// Measure ambient loudness and report the gain it maps to
    Measure(MeasureArgs),
    /// Show or change per-domain settings
    Settings(SettingsArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// URL whose domain settings apply (uses the "default" settings if omitted)
    #[arg(long)]
    pub url: Option<String>,

    /// Audio input device name (optional, uses default if not specified)
    #[arg(long)]
    pub device: Option<String>,

    /// Sampling period in milliseconds
    #[arg(long, default_value_t = DEFAULT_TICK_INTERVAL_MS)]
    pub interval_ms: u64,

    /// Settings file (defaults to the platform config directory)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Start sampling right away instead of waiting for `enable`
    #[arg(long)]
    pub enable: bool,

    /// Media files to play
    pub media: Vec<PathBuf>,
}

#[derive(Parser)]
pub struct MeasureArgs {
    /// Measuring duration in seconds
    #[arg(long, default_value_t = 3.0)]
    pub seconds: f32,

    /// Audio input device name (optional, uses default if not specified)
    #[arg(long)]
    pub device: Option<String>,

    /// URL whose domain settings the reported gain uses
    #[arg(long)]
    pub url: Option<String>,

    /// Settings file (defaults to the platform config directory)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Output only the numbers without labels
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Parser)]
pub struct ListArgs {}

#[derive(Parser)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub action: SettingsAction,
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the effective settings for a URL's domain
    Show(SettingsTarget),
    /// Change settings for a URL's domain
    Set(SetArgs),
}

#[derive(ClapArgs)]
pub struct SettingsTarget {
    /// URL whose domain to address (the "default" settings if omitted)
    #[arg(long)]
    pub url: Option<String>,

    /// Settings file (defaults to the platform config directory)
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

#[derive(ClapArgs)]
pub struct SetArgs {
    #[command(flatten)]
    pub target: SettingsTarget,

    /// Turn adaptive volume on or off for the domain
    #[arg(long)]
    pub enabled: Option<bool>,

    /// Extra gain at full ambient loudness (0.5 - 3.0)
    #[arg(long)]
    pub sensitivity: Option<f32>,

    /// Equalization on or off
    #[arg(long)]
    pub eq: Option<bool>,
}

/// Configuration of the `run` command
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub url: Option<String>,
    pub device_name: Option<String>,
    pub tick_interval: Duration,
    pub settings_path: Option<PathBuf>,
    pub enable_on_start: bool,
    pub media: Vec<PathBuf>,
}

impl RunConfig {
    /// Create configuration from run arguments
    pub fn from_run_args(run_args: RunArgs) -> AppResult<Self> {
        if run_args.interval_ms < MIN_TICK_INTERVAL_MS {
            return Err(AppError::Config(format!(
                "Interval must be at least {} ms, got {}",
                MIN_TICK_INTERVAL_MS, run_args.interval_ms
            )));
        }

        Ok(RunConfig {
            url: run_args.url,
            device_name: run_args.device,
            tick_interval: Duration::from_millis(run_args.interval_ms),
            settings_path: run_args.settings,
            enable_on_start: run_args.enable,
            media: run_args.media,
        })
    }
}

/// Configuration of the `measure` command
#[derive(Debug, Clone)]
pub struct MeasureConfig {
    pub duration: Duration,
    pub device_name: Option<String>,
    pub url: Option<String>,
    pub settings_path: Option<PathBuf>,
}

impl MeasureConfig {
    /// Create configuration from measure arguments
    pub fn from_measure_args(measure_args: &MeasureArgs) -> AppResult<Self> {
        if !(measure_args.seconds > 0.0 && measure_args.seconds.is_finite()) {
            return Err(AppError::Config("Seconds must be positive".to_string()));
        }

        Ok(MeasureConfig {
            duration: Duration::from_secs_f32(measure_args.seconds),
            device_name: measure_args.device.clone(),
            url: measure_args.url.clone(),
            settings_path: measure_args.settings.clone(),
        })
    }
}

/// The settings update a `settings set` invocation asks for
pub fn partial_from_set_args(set_args: &SetArgs) -> AppResult<PartialConfiguration> {
    if let Some(sensitivity) = set_args.sensitivity
        && !(MIN_SENSITIVITY..=MAX_SENSITIVITY).contains(&sensitivity)
    {
        return Err(AppError::Config(format!(
            "Sensitivity must be between {} and {}, got {}",
            MIN_SENSITIVITY, MAX_SENSITIVITY, sensitivity
        )));
    }

    Ok(PartialConfiguration {
        enabled: set_args.enabled,
        sensitivity: set_args.sensitivity,
        equalization_enabled: set_args.eq,
    })
}

/// Settings store at `path`, or at the platform default location
pub fn open_store(path: Option<PathBuf>) -> AppResult<FileStore> {
    match path {
        Some(path) => Ok(FileStore::new(path)),
        None => FileStore::at_default_location(),
    }
}
