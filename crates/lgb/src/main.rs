use std::sync::Arc;

use lgb_core::config::{Config, LogLevel};

#[tokio::main]
async fn main() -> Result<(), lgb_core::Error> {
    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            // Nothing is processed with a bad config; report it and exit.
            let _ = lgb_core::logging::init("lgb", LogLevel::Info);
            tracing::error!(error = %e, "invalid configuration");
            return Err(e);
        }
    };
    lgb_core::logging::init("lgb", cfg.log_level)?;
    tracing::debug!(config = ?cfg, "configuration loaded");

    lgb_telegram::router::run_polling(Arc::new(cfg))
        .await
        .map_err(|e| lgb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
