//! Logging setup

use crate::error::{AppError, AppResult};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
/// Logs go to stderr; stdout is reserved for command output.
pub fn init(level: &str) -> AppResult<()> {
    let default_level: LevelFilter = level
        .parse()
        .map_err(|_| AppError::Config(format!("Unknown log level '{}'", level)))?;

    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to initialize logging: {}", e)))
}
