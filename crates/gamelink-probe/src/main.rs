#![doc = include_str!("../README.md")]

mod probe;

use clap::Parser;
use gamelink::Client;
use probe::config::{CliArgs, ProbeConfig};
use probe::telemetry::init_telemetry;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ProbeConfig::try_from(args)?;

    let providers = init_telemetry()?;
    log_startup_info(&config);

    let client = Client::from_config(config.cluster)?;
    let result = probe::commands::run(&client, config.action).await;

    #[cfg(feature = "tracing")]
    if let Err(e) = &result {
        tracing::error!("Probe failed: {e:#}");
    }

    providers.shutdown();
    result
}

fn log_startup_info(_config: &ProbeConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::debug!("Probe config: {:#?}", _config);
    } else {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Probe running as {} against {} nodes",
            _config.cluster.name,
            _config.cluster.cluster.len()
        );
    }
}
