//! Log output setup

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_DIRECTIVES: &str = "warn";
const VERBOSE_LOG_DIRECTIVES: &str = "emimeter=debug,warn";

/// Log to stderr so stdout carries only reports. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) -> Result<()> {
    let fallback = if verbose {
        VERBOSE_LOG_DIRECTIVES
    } else {
        DEFAULT_LOG_DIRECTIVES
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .map_err(|err| anyhow!("invalid log filter: {err}"))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .try_init()
        .map_err(|err| anyhow!("logging already initialized: {err}"))?;

    Ok(())
}
