//! Tracing infrastructure.
//!
//! Structured, async-aware logging built on `tracing` and
//! `tracing-subscriber`:
//! - Environment-based filtering (`RUST_LOG` wins over configuration)
//! - Pretty output for development, compact output for headless runs
//!
//! # Example
//! ```no_run
//! use arm_bridge::{config::Settings, logging};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::new(None)?;
//! logging::init(&settings.log_level, logging::OutputFormat::Compact)?;
//! tracing::info!("bridge started");
//! # Ok(())
//! # }
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed with colors, for interactive development.
    Pretty,
    /// Compact single-line output, for headless runs.
    Compact,
}

/// Initializes the global subscriber.
///
/// `default_filter` is used when `RUST_LOG` is unset. Returns an error if a
/// global subscriber is already installed.
pub fn init(default_filter: &str, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)?,
    };

    match format {
        OutputFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .try_init()?;
        }
        OutputFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_ansi(false))
                .try_init()?;
        }
    }

    Ok(())
}
