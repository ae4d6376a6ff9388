//! Logging setup
//!
//! Diagnostics go to stderr through a non-blocking writer so stdout carries
//! nothing but command output.

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "stiq=warn,stiq_rs=warn,stiq_core=warn";

/// Initialize tracing
///
/// Returns a guard that must be kept alive to ensure logs are flushed
pub fn init_telemetry() -> Result<WorkerGuard> {
    let (non_blocking_stderr, guard) = tracing_appender::non_blocking(std::io::stderr());

    // Environment filter for log levels
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stderr_layer = fmt::layer()
        .with_writer(non_blocking_stderr)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()?;

    tracing::debug!("Telemetry initialized, logging to stderr");

    Ok(guard)
}
