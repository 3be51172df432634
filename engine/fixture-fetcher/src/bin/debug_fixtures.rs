//! Fetch one fixture page and show what the normalizer makes of it.
//!
//! Usage: debug-fixtures [division] [YYYY-MM-DD]

use chrono::{NaiveDate, Utc};
use fixture_fetcher::backoff::{BackoffPolicy, TokioSleeper};
use fixture_fetcher::config::{DivisionConfig, LoggingConfig};
use fixture_fetcher::fetcher::{JsonFetcher, ReqwestTransport, UpstreamClient};
use fixture_fetcher::logging::initialize_logging;
use fixture_fetcher::{Aggregator, Division, FetcherConfig, PageSource, RankCache, RankResolver};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Logging first so configuration warnings are not lost
    initialize_logging(&LoggingConfig::from_env())?;
    let config = FetcherConfig::from_env()?;

    let mut args = std::env::args().skip(1);
    let division_key = args.next().unwrap_or_else(|| "atp".to_string());
    let date = match args.next() {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")?,
        None => Utc::now().date_naive(),
    };
    let division = config
        .upstream
        .divisions
        .iter()
        .find(|d| d.key == division_key)
        .cloned()
        .unwrap_or_else(|| DivisionConfig {
            label: division_key.to_uppercase(),
            key: division_key.clone(),
        });

    info!("Debugging {} fixtures for {}", division.key, date);

    let transport = Arc::new(ReqwestTransport::for_upstream(&config)?);
    let fetcher = JsonFetcher::new(
        transport,
        BackoffPolicy::from(&config.retry),
        Arc::new(TokioSleeper),
    );
    let upstream = UpstreamClient::new(&config, fetcher);

    let Some(records) = upstream.fetch_page(&division, date, 1).await else {
        error!("No data returned for {} on {}", division.key, date);
        return Ok(());
    };

    info!("Fetched {} raw records", records.len());
    if let Some(first) = records.first().and_then(|r| r.as_object()) {
        let keys: Vec<&str> = first.keys().map(String::as_str).collect();
        info!("Top-level keys of the first record: {}", keys.join(", "));
    }

    let mut aggregator = Aggregator::new(
        &config.aggregation,
        &upstream,
        RankResolver::new(Some(&upstream)),
    );
    let mut cache = RankCache::new();
    let mut normalized = Division::new(division.key.clone(), division.label.clone());
    for record in &records {
        let outcome = aggregator.ingest(&mut normalized, record, date, &mut cache).await;
        info!("  {:?}", outcome);
    }
    normalized.sort_fixtures();

    for (tournament, bucket) in &normalized.tournaments {
        info!("{} ({:?})", tournament, bucket.surface);
        for fixture in &bucket.fixtures {
            info!(
                "  [{}] {} ({:?}) vs {} ({:?}) sort_key={}",
                fixture.id,
                fixture.participant_a.name,
                fixture.participant_a.rank,
                fixture.participant_b.name,
                fixture.participant_b.rank,
                fixture.sort_key
            );
        }
    }

    info!("Debug completed: {:?}", aggregator.stats());
    Ok(())
}
