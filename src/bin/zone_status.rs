/// Show order-block zone status for each configured underlying
use anyhow::Context;
use chrono::{Duration, Utc};
use tracing_subscriber::EnvFilter;

use optscan::{
    broker::{KiteClient, MarketDataProvider},
    config::load_config,
    strategy::{assess_zone_status, ZoneLocation},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("optscan=warn")),
        )
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = load_config(&config_path).with_context(|| format!("loading {}", config_path))?;
    let client = KiteClient::new(&config.kite)?;

    println!("📍 Zone Status ({} {})", config.zones.timeframe.as_str(), Utc::now().format("%Y-%m-%d %H:%M"));
    println!("==============================\n");

    let to = Utc::now();
    let from = to - Duration::days(config.zones.lookback_days);

    for spec in &config.underlyings {
        let candles = match client
            .historical_candles(&spec.spot_token, from, to, config.zones.timeframe)
            .await
        {
            Ok(candles) => candles,
            Err(e) => {
                println!("❌ {}: {}", spec.name, e);
                continue;
            }
        };

        let Some(signal) = assess_zone_status(&spec.name, &candles, &config.zones) else {
            println!("⚠️  {}: only {} candles (need {})", spec.name, candles.len(), config.zones.min_candles);
            continue;
        };

        let icon = match signal.status {
            ZoneLocation::InDemandZone => "🟢",
            ZoneLocation::InSupplyZone => "🔴",
            ZoneLocation::Outside => "⚪",
        };
        let zone = signal
            .zone
            .as_ref()
            .map(|z| format!(" [{:.2} - {:.2}]", z.low, z.high))
            .unwrap_or_default();

        println!("{} {} @ {:.2}: {:?}{}", icon, signal.underlying, signal.price, signal.status, zone);
        println!("   EMA20: {:.2}, EMA50: {:.2}, RSI: {}, Volume spike: {}, Trend: {:?}",
                 signal.ema20,
                 signal.ema50,
                 signal.rsi.map(|r| format!("{:.1}", r)).unwrap_or_else(|| "-".to_string()),
                 if signal.volume_spike { "yes" } else { "no" },
                 signal.trend);
    }

    Ok(())
}
