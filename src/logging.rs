//! Log output setup for the binary.

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;

pub const LOG_LEVELS: [&str; 4] = ["info", "warn", "error", "debug"];

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("unknown log level '{0}'\nSuggestion: use one of info, warn, error, debug")]
    UnknownLevel(String),

    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Maps a configured level name to a tracing level.
///
/// `debug` forces [`Level::DEBUG`] regardless of `name`.
pub fn parse_level(name: &str, debug: bool) -> Result<Level, LoggingError> {
    if debug {
        return Ok(Level::DEBUG);
    }
    match name.trim().to_ascii_lowercase().as_str() {
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        "debug" => Ok(Level::DEBUG),
        _ => Err(LoggingError::UnknownLevel(name.to_string())),
    }
}

/// Installs the global fmt subscriber on stderr.
///
/// `RUST_LOG`, when set, replaces the level filter. At debug level file and
/// line numbers are included.
pub fn init_logging(name: &str, debug: bool) -> Result<Level, LoggingError> {
    let level = parse_level(name, debug)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
    let verbose = level == Level::DEBUG;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_file(verbose)
        .with_line_number(verbose)
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))?;

    tracing::debug!(level = %level, "log init");
    Ok(level)
}
