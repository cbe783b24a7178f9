/// Configuration loading from TOML file
use std::path::Path;
use crate::error::{Result, ScanError};
use crate::types::{Config, ExitPolicy};

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ScanError::ConfigError(format!("Failed to read config file: {}", e)))?;

    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config);

    Ok(config)
}

/// Parse and validate config text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)
        .map_err(|e| ScanError::ConfigError(format!("Failed to parse config: {}", e)))?;

    validate_config(&config)?;

    Ok(config)
}

/// Credentials are issued out of band, so the environment wins over the file
fn apply_env_overrides(config: &mut Config) {
    if let Ok(api_key) = std::env::var("KITE_API_KEY") {
        config.kite.api_key = api_key;
    }
    if let Ok(token) = std::env::var("KITE_ACCESS_TOKEN") {
        config.kite.access_token = token;
    }
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.underlyings.is_empty() {
        return Err(ScanError::ConfigError("at least one underlying is required".to_string()));
    }

    if config.default_budget <= 0.0 {
        return Err(ScanError::ConfigError(
            format!("Invalid default_budget: {}", config.default_budget)
        ));
    }

    if config.tick_size <= 0.0 {
        return Err(ScanError::ConfigError(format!("Invalid tick_size: {}", config.tick_size)));
    }

    if config.max_picks == 0 {
        return Err(ScanError::ConfigError("max_picks must be >= 1".to_string()));
    }

    // Validate periods
    let bias = &config.bias;
    if bias.ema_fast == 0 || bias.ema_slow == 0 || bias.rsi_period < 2 {
        return Err(ScanError::ConfigError("EMA periods must be >= 1 and RSI period >= 2".to_string()));
    }
    if bias.ema_fast >= bias.ema_slow {
        return Err(ScanError::ConfigError(
            format!("ema_fast ({}) must be < ema_slow ({})", bias.ema_fast, bias.ema_slow)
        ));
    }
    if bias.stoch_k_period == 0 || bias.stoch_d_period == 0 || bias.atr_period == 0 {
        return Err(ScanError::ConfigError("stochastic and ATR periods must be >= 1".to_string()));
    }

    if config.zones.confirmation_bars == 0 {
        return Err(ScanError::ConfigError("zones.confirmation_bars must be >= 1".to_string()));
    }

    // Validate solver bracket
    let pricing = &config.pricing;
    if pricing.iv_lower <= 0.0 || pricing.iv_upper <= pricing.iv_lower {
        return Err(ScanError::ConfigError(format!(
            "Invalid IV bracket: ({}, {})",
            pricing.iv_lower, pricing.iv_upper
        )));
    }
    if pricing.price_tolerance <= 0.0 || pricing.max_iterations == 0 {
        return Err(ScanError::ConfigError("IV solver tolerance and iterations must be positive".to_string()));
    }

    // Validate gate bands
    let gates = &config.gates;
    if gates.long_iv_min > gates.long_iv_max {
        return Err(ScanError::ConfigError("gates.long_iv_min must be <= long_iv_max".to_string()));
    }
    if gates.call_delta_min > gates.call_delta_max || gates.put_delta_min > gates.put_delta_max {
        return Err(ScanError::ConfigError("delta bands must be ordered min <= max".to_string()));
    }
    if gates.gamma_max <= 0.0 || gates.theta_pct_max <= 0.0 {
        return Err(ScanError::ConfigError("gamma_max and theta_pct_max must be positive".to_string()));
    }

    match config.exits {
        ExitPolicy::Percent { target, stop } => {
            if target <= 0.0 || stop <= 0.0 || stop >= 1.0 {
                return Err(ScanError::ConfigError(
                    format!("Invalid percent exits: target {}, stop {}", target, stop)
                ));
            }
        }
        ExitPolicy::Multiple { target, stop } => {
            if target <= 1.0 || stop <= 0.0 || stop >= 1.0 {
                return Err(ScanError::ConfigError(
                    format!("Invalid multiple exits: target {}, stop {}", target, stop)
                ));
            }
        }
    }

    if config.quotes.batch_sizes.is_empty() || config.quotes.batch_sizes.contains(&0) {
        return Err(ScanError::ConfigError("quotes.batch_sizes must be non-empty and positive".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MissingGreeksPolicy, Timeframe, ZoneBounds};

    const MINIMAL: &str = r#"
        [[underlyings]]
        name = "NIFTY"
        spot_token = "256265"
        spot_symbol = "NSE:NIFTY 50"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.exchange_segment, "NFO");
        assert_eq!(config.underlyings.len(), 1);
        assert_eq!(config.bias.ema_fast, 5);
        assert_eq!(config.zones.timeframe, Timeframe::FifteenMinute);
        assert_eq!(config.quotes.batch_sizes, vec![200, 50, 10]);
        assert_eq!(config.gates.missing_greeks, MissingGreeksPolicy::PassThrough);
    }

    #[test]
    fn test_sections_override() {
        let text = format!(
            "{}\n{}",
            r#"
            max_picks = 3
            [zones]
            timeframe = "day"
            confirmation_bars = 2
            bounds = "full_range"
            [gates]
            missing_greeks = "demote_to_short"
            [exits]
            mode = "multiple"
            target = 1.5
            stop = 0.7
            "#,
            MINIMAL
        );
        let config = parse_config(&text).unwrap();
        assert_eq!(config.max_picks, 3);
        assert_eq!(config.zones.timeframe, Timeframe::Daily);
        assert_eq!(config.zones.bounds, ZoneBounds::FullRange);
        assert_eq!(config.gates.missing_greeks, MissingGreeksPolicy::DemoteToShort);
        assert_eq!(config.exits, ExitPolicy::Multiple { target: 1.5, stop: 0.7 });
    }

    #[test]
    fn test_example_config_parses() {
        let config = parse_config(include_str!("../../config.example.toml")).unwrap();
        assert_eq!(config.underlyings.len(), 2);
        assert_eq!(config.exits, ExitPolicy::default());
        assert_eq!(config.kite.historical_requests_per_sec, 3);
    }

    #[test]
    fn test_rejects_no_underlyings() {
        let err = parse_config("underlyings = []").unwrap_err();
        assert_eq!(err.error_code(), "CFG_001");
    }

    #[test]
    fn test_rejects_inverted_bands() {
        let text = format!("{}\n[gates]\nlong_iv_min = 0.9\nlong_iv_max = 0.2\n", MINIMAL);
        assert!(parse_config(&text).is_err());
    }
}
