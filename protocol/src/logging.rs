//! # Structured Logging
//!
//! Contracts log through `tracing` macros; nothing in the library installs
//! a subscriber on its own. Embedders call [`init_logging`] once at startup,
//! tests call [`try_init_logging`] as often as they like.
//!
//! Filtering follows `RUST_LOG` when set, e.g.
//!
//! ```text
//! RUST_LOG=strata_contracts=debug,strata_protocol=info
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output for local development.
    Pretty,
    /// JSON lines for log aggregation.
    Json,
}

impl LogFormat {
    /// Parse a format string. Accepts "json" or "pretty" (case-insensitive).
    /// Returns `Pretty` for any unrecognized value.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Installs the global subscriber, returning an error if one is already set.
pub fn try_init_logging(
    default_level: &str,
    format: LogFormat,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true))
            .try_init()?,
    }

    tracing::info!("logging initialized (format={:?})", format);
    Ok(())
}

/// Installs the global subscriber. A second call is logged and ignored.
pub fn init_logging(default_level: &str, format: LogFormat) {
    if let Err(e) = try_init_logging(default_level, format) {
        tracing::debug!(error = %e, "logging already initialized");
    }
}
