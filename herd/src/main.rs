use anyhow::Context;
use herd_config::{DEFAULT_CONFIG_FILE, HerdConfig};
use herd_core::master::Master;
use tracing::{info, warn};
use utils::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

    // `.env` is optional and never overrides variables already set.
    let dotenv = dotenvy::dotenv();

    // Logging is not up yet; anyhow reports a bad config on stderr.
    let cfg = HerdConfig::load(&config_path)
        .with_context(|| format!("failed to load configuration from {config_path}"))?;

    init_tracing(cfg.global().log_level());
    match dotenv {
        Ok(path) => info!(target: "herd::config", path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(target: "herd::config", error = %e, "Ignoring unreadable .env"),
    }
    for warning in cfg.validate().warnings() {
        warn!(target: "herd::config", "{warning}");
    }
    cfg.print();

    let master = Master::new(cfg);
    tokio::select! {
        result = master.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!(target: "herd::master", "Ctrl+C received, shutting down");
            Ok(())
        }
    }
}
