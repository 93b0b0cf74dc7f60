//! Tracing subscriber setup for binaries and tests that embed the client.

use crate::config::LoggingSettings;

/// Install a global fmt subscriber filtered by `settings.level`.
///
/// `RUST_LOG` wins over the configured level when set. Calling this twice is
/// harmless; the second call reports an error that callers may ignore.
#[cfg(feature = "logging")]
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| anyhow::anyhow!("invalid log filter '{}': {e}", settings.level))?;

    let builder = fmt().with_env_filter(filter).with_target(true);
    let result = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// Without the `logging` feature the embedding application owns the subscriber.
#[cfg(not(feature = "logging"))]
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    tracing::debug!(level = %settings.level, "logging feature disabled; subscriber not installed");
    Ok(())
}
