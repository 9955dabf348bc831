//! Logging initialization.
//!
//! Structured logging via `tracing`, written to stderr so stdout stays free
//! for command output. The configured `[logging]` section picks the level
//! and format; CLI flags and `RUST_LOG` override it.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use triage_core::config::LoggingConfig;

/// Initialize the logging subsystem.
///
/// The level comes from `config.level` unless `verbose` forces debug;
/// `RUST_LOG`, when set, wins over both. JSON output is used when either
/// `json` or `config.format` asks for it, pretty output otherwise.
pub fn init(config: &LoggingConfig, verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json || config.format == "json" {
        // One JSON object per line, for collection by a log shipper.
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}
