use std::path::{Path, PathBuf};

use streetsim::adapters::outbound::{init_combined_logger, init_tracing};
use streetsim::application::{RunSummary, Simulation};
use streetsim::config::LoggingConfig;
use streetsim::Config;
use tracing::{error, info};

const DEFAULT_CONFIG: &str = "streetsim.toml";

/// Usage: `streetsim [config.toml]`. Without an argument `streetsim.toml` is
/// read when present; `STREETSIM__*` variables override either way.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG)).filter(|p| p.exists()));

    let config = match Config::load(path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&LoggingConfig::default());
            error!("{}", e);
            return Ok(());
        }
    };
    init_tracing(&config.logging);
    let (logger, file_log) =
        init_combined_logger(config.logging.log_file.as_deref(), config.logging.debug);

    info!(
        "Starting streetsim with {}",
        path.as_deref()
            .map(Path::display)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "defaults".to_string())
    );

    match Simulation::new(config, logger.clone()).run().await {
        Ok(RunSummary::Local { vehicles }) => {
            logger.info(&format!("{} vehicles reached their destination", vehicles.len()))
        }
        Ok(RunSummary::Root(report)) => logger.info(&format!(
            "{} vehicles parked, {} abandoned after {} migrations",
            report.parked.len(),
            report.abandoned.len(),
            report.migrations
        )),
        Ok(RunSummary::Leaf(summary)) => logger.info(&format!(
            "leaf finished: {} received, {} parked, {} migrated, {} failed",
            summary.received, summary.parked, summary.migrated, summary.failed
        )),
        Err(e) => logger.error(&format!("simulation failed: {}", e)),
    }

    drop(logger);
    if let Some(file_log) = file_log {
        file_log.finish().await;
    }
    Ok(())
}
