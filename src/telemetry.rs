//! Logging setup for binaries. The library only emits events.

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
#[error("Telemetry error: {0}")]
pub struct TelemetryError(String);

/// Install a global subscriber writing to stderr, filtered by `RUST_LOG`
/// (falling back to `default_directive`). stdout stays reserved for JSON output.
pub fn init(default_directive: &str) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|err| TelemetryError(format!("invalid log filter: {err}")))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|err| TelemetryError(format!("failed to install tracing subscriber: {err}")))
}
