/// One-shot option scan: prints the ScanResult as JSON
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use optscan::{
    broker::{InstrumentCache, KiteClient},
    config::load_config,
    trading::Scanner,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("optscan=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Usage: optscan [config.toml] [budget]
    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "config.toml".to_string());
    let budget = args
        .next()
        .map(|b| b.parse::<f64>())
        .transpose()
        .context("budget must be a number")?;

    let config = Arc::new(
        load_config(&config_path).with_context(|| format!("loading {}", config_path))?,
    );
    info!("Configuration loaded from {}", config_path);

    let provider = Arc::new(KiteClient::new(&config.kite)?);
    let cache = Arc::new(InstrumentCache::new());
    let scanner = Scanner::new(provider, cache, Arc::clone(&config));

    let result = scanner.scan(budget).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
