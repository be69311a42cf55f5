use crate::{config::LogLevel, errors::Error, Result};

/// Initialize logging/tracing for the bot.
///
/// `RUST_LOG` wins when set; otherwise the configured `LOG_LEVEL` applies to
/// our crates and chatty dependencies are capped at `warn`.
pub fn init(service_name: &str, level: LogLevel) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(service_name, level)));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::External(format!("failed to init logging: {e}")))
}

fn default_directives(service_name: &str, level: LogLevel) -> String {
    let lvl = level.as_directive();
    // Dependencies never log below warn unless the operator asks via RUST_LOG.
    let deps = if level > LogLevel::Warn {
        lvl
    } else {
        "warn"
    };
    format!(
        "{lvl},{service_name}={lvl},lgb_core={lvl},lgb_telegram={lvl},\
teloxide={deps},teloxide_core={deps},reqwest={deps},hyper={deps}"
    )
}
