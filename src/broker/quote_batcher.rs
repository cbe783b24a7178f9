/// Batched quote fetching with a shrinking batch ladder
use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use crate::broker::MarketDataProvider;
use crate::types::{Quote, QuoteBatchConfig};

/// Batch sizes tried in order, then per-symbol retries
#[derive(Debug, Clone)]
pub struct QuoteBatchPolicy {
    batch_sizes: Vec<usize>,
    per_symbol_retries: u32,
}

impl QuoteBatchPolicy {
    pub fn new(batch_sizes: Vec<usize>, per_symbol_retries: u32) -> Self {
        let mut batch_sizes: Vec<usize> = batch_sizes.into_iter().filter(|s| *s > 0).collect();
        if batch_sizes.is_empty() {
            batch_sizes.push(1);
        }
        QuoteBatchPolicy {
            batch_sizes,
            per_symbol_retries,
        }
    }

    pub fn from_config(config: &QuoteBatchConfig) -> Self {
        Self::new(config.batch_sizes.clone(), config.per_symbol_retries)
    }
}

impl Default for QuoteBatchPolicy {
    fn default() -> Self {
        Self::from_config(&QuoteBatchConfig::default())
    }
}

/// Quotes obtained plus one message per symbol that never resolved
#[derive(Debug, Default)]
pub struct QuoteFetch {
    pub quotes: HashMap<String, Quote>,
    pub errors: Vec<String>,
}

/// Fetch quotes for `symbols`. A failing batch is split at the next ladder
/// size; symbols still missing afterwards are retried one at a time.
pub async fn fetch_quotes(
    provider: &dyn MarketDataProvider,
    symbols: &[String],
    policy: &QuoteBatchPolicy,
) -> QuoteFetch {
    let mut seen = HashSet::new();
    let unique: Vec<String> = symbols
        .iter()
        .filter(|s| seen.insert(s.as_str()))
        .cloned()
        .collect();

    let mut fetch = QuoteFetch::default();
    if unique.is_empty() {
        return fetch;
    }

    let mut pending: VecDeque<(Vec<String>, usize)> = unique
        .chunks(policy.batch_sizes[0])
        .map(|chunk| (chunk.to_vec(), 0))
        .collect();
    let mut leftovers: Vec<(String, Option<String>)> = Vec::new();

    while let Some((chunk, level)) = pending.pop_front() {
        match provider.batched_quote(&chunk).await {
            Ok(mut returned) => {
                for symbol in chunk {
                    match returned.remove(&symbol) {
                        Some(quote) => {
                            fetch.quotes.insert(symbol, quote);
                        }
                        None => leftovers.push((symbol, None)),
                    }
                }
            }
            Err(e) => {
                let next = level + 1;
                if let Some(&size) = policy.batch_sizes.get(next) {
                    warn!(
                        "⚠️ Quote batch of {} failed ({}), retrying in batches of {}",
                        chunk.len(),
                        e,
                        size
                    );
                    for sub in chunk.chunks(size) {
                        pending.push_back((sub.to_vec(), next));
                    }
                } else {
                    warn!("⚠️ Quote batch of {} failed ({}), falling back to single symbols", chunk.len(), e);
                    let reason = e.to_string();
                    leftovers.extend(chunk.into_iter().map(|s| (s, Some(reason.clone()))));
                }
            }
        }
    }

    for (symbol, mut last_error) in leftovers {
        let mut resolved = false;
        for attempt in 1..=policy.per_symbol_retries {
            debug!("Retrying quote for {} (attempt {})", symbol, attempt);
            match provider.batched_quote(std::slice::from_ref(&symbol)).await {
                Ok(mut returned) => {
                    if let Some(quote) = returned.remove(&symbol) {
                        fetch.quotes.insert(symbol.clone(), quote);
                        resolved = true;
                        break;
                    }
                }
                Err(e) => last_error = Some(e.to_string()),
            }
        }

        if !resolved {
            let message = match last_error {
                Some(reason) => format!("{}: quote unavailable ({})", symbol, reason),
                None => format!("{}: quote unavailable", symbol),
            };
            fetch.errors.push(message);
        }
    }

    fetch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::testing::{quote, MockProvider};

    fn symbols(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("NFO:SYM{}", i)).collect()
    }

    #[tokio::test]
    async fn test_partial_batch_retries_missing_symbols() {
        let all = symbols(5);
        let mut provider = MockProvider::new(Vec::new());
        for s in &all[..3] {
            provider = provider.with_quote(s, quote(100.0, 1_000));
        }

        let fetch = fetch_quotes(&provider, &all, &QuoteBatchPolicy::default()).await;
        assert_eq!(fetch.quotes.len(), 3);
        assert_eq!(fetch.errors.len(), 2);
        assert!(fetch.errors[0].starts_with("NFO:SYM3"));
        // one batch then two retries for each missing symbol
        assert_eq!(provider.quote_batches(), vec![5, 1, 1, 1, 1]);
    }

    #[tokio::test]
    async fn test_failed_batch_shrinks_through_ladder() {
        let all = symbols(25);
        let mut provider = MockProvider::new(Vec::new()).with_max_batch(10);
        for s in &all {
            provider = provider.with_quote(s, quote(50.0, 10));
        }

        let policy = QuoteBatchPolicy::new(vec![200, 50, 10], 2);
        let fetch = fetch_quotes(&provider, &all, &policy).await;
        assert_eq!(fetch.quotes.len(), 25);
        assert!(fetch.errors.is_empty());
        assert_eq!(provider.quote_batches(), vec![25, 25, 10, 10, 5]);
    }

    #[tokio::test]
    async fn test_last_rung_failure_goes_per_symbol() {
        let all = symbols(3);
        let mut provider = MockProvider::new(Vec::new()).with_max_batch(1);
        provider = provider.with_quote(&all[0], quote(10.0, 1));

        let policy = QuoteBatchPolicy::new(vec![3], 1);
        let fetch = fetch_quotes(&provider, &all, &policy).await;
        assert_eq!(fetch.quotes.len(), 1);
        assert_eq!(fetch.errors.len(), 2);
        assert!(fetch.errors[0].contains("too many instruments"));
    }

    #[tokio::test]
    async fn test_duplicates_and_empty_input() {
        let provider = MockProvider::new(Vec::new()).with_quote("NFO:A", quote(10.0, 1));
        let requested = vec!["NFO:A".to_string(), "NFO:A".to_string()];
        let fetch = fetch_quotes(&provider, &requested, &QuoteBatchPolicy::default()).await;
        assert_eq!(fetch.quotes.len(), 1);
        assert_eq!(provider.quote_batches(), vec![1]);

        let fetch = fetch_quotes(&provider, &[], &QuoteBatchPolicy::default()).await;
        assert!(fetch.quotes.is_empty() && fetch.errors.is_empty());
    }
}
