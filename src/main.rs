//! Subsift - Entry Point
//!
//! Runs a single check-and-select pass over the configured descriptor list.

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use subsift::config::LogConfig;
use subsift::{Config, Pipeline, SiftError};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("subsift: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    init_tracing(&config.log);

    if let Err(e) = run(&config).await {
        error!("{}", e);
        if e.preserves_previous_output() {
            warn!("No output files were updated");
        }
        std::process::exit(e.exit_code());
    }
}

async fn run(config: &Config) -> Result<(), SiftError> {
    info!("Starting subsift");

    let pipeline = Pipeline::from_config(config);
    let outcome = pipeline.execute(&config.io).await?;

    info!(
        "Done: {} alive, {} restrictive",
        outcome.alive.len(),
        outcome.restrictive.as_ref().map_or(0, Vec::len)
    );
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("subsift={}", log.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
