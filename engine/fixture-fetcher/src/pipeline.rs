//! One batch run: fetch, aggregate, fall back to the snapshot, predict, report.

use crate::aggregator::{AggregationStats, Aggregator, PageSource};
use crate::backoff::{BackoffPolicy, Sleeper, TokioSleeper};
use crate::cache::SnapshotCache;
use crate::config::FetcherConfig;
use crate::debug_dump::DebugDump;
use crate::error::Result;
use crate::fetcher::{JsonFetcher, ReqwestTransport, UpstreamClient};
use crate::models::{MatchBoard, Report};
use crate::prediction::{enrich_board, GeminiPredictor, Predictor};
use crate::rank::{RankCache, RankLookup, RankResolver};
use chrono::{DateTime, NaiveDate, Utc};
use persistence::{create_local_store_with_config, PersistenceConfig, SnapshotStore};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Result of a run
#[derive(Debug)]
pub struct RunOutcome {
    pub report: Report,
    pub stats: AggregationStats,
}

/// Collaborators of a run, injected so runs can be tested offline
pub struct RunContext<'a, S: SnapshotStore> {
    pub source: &'a dyn PageSource,
    pub lookup: Option<&'a dyn RankLookup>,
    pub cache: &'a SnapshotCache<S>,
    pub predictor: Option<&'a dyn Predictor>,
    pub sleeper: &'a dyn Sleeper,
}

/// Aggregate every configured division around `today`
pub async fn collect_board(
    config: &FetcherConfig,
    source: &dyn PageSource,
    lookup: Option<&dyn RankLookup>,
    today: NaiveDate,
) -> (MatchBoard, AggregationStats) {
    let mut aggregator = Aggregator::new(&config.aggregation, source, RankResolver::new(lookup));
    if config.debug.dump {
        aggregator = aggregator.with_debug_dump(DebugDump::new(&config.debug.dir));
    }

    // One rank cache per run
    let mut rank_cache = RankCache::new();
    let board = aggregator.run(&config.upstream.divisions, today, &mut rank_cache).await;
    (board, aggregator.stats().clone())
}

/// Run the whole batch and build the report
pub async fn run<S: SnapshotStore>(
    config: &FetcherConfig,
    ctx: RunContext<'_, S>,
    now: DateTime<Utc>,
) -> RunOutcome {
    info!("Collecting {:?} fixtures for {}", config.aggregation.mode, now.date_naive());
    let (fresh, stats) = collect_board(config, ctx.source, ctx.lookup, now.date_naive()).await;

    let (board, source) = ctx.cache.get_matches(fresh).await;
    info!("Publishing {} fixtures from {:?} board", board.total_fixtures(), source);

    let predictions = match ctx.predictor {
        Some(predictor) if !board.is_empty() => {
            enrich_board(
                &board,
                predictor,
                ctx.sleeper,
                Duration::from_millis(config.prediction.delay_ms),
                config.prediction.max_predictions,
            )
            .await
        }
        _ => HashMap::new(),
    };

    RunOutcome {
        report: Report::build(board, predictions, source, now),
        stats,
    }
}

/// Write the report for the renderer as pretty JSON
pub async fn write_report(report: &Report, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let bytes = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(path, bytes).await?;
    info!("Wrote report to {}", path.display());
    Ok(())
}

/// Wire the production collaborators and run once
pub async fn run_from_config(config: &FetcherConfig) -> Result<RunOutcome> {
    let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);
    let transport = Arc::new(ReqwestTransport::for_upstream(config)?);
    let fetcher = JsonFetcher::new(transport, BackoffPolicy::from(&config.retry), sleeper.clone());
    let upstream = UpstreamClient::new(config, fetcher);

    let store = create_local_store_with_config(PersistenceConfig {
        snapshot_path: config.snapshot.path.clone(),
        compress: config.snapshot.compress,
        ..PersistenceConfig::default()
    })?;
    let cache = SnapshotCache::new(store);
    let predictor = GeminiPredictor::from_config(config)?;

    let ctx = RunContext {
        source: &upstream,
        lookup: Some(&upstream),
        cache: &cache,
        predictor: predictor.as_ref().map(|p| p as &dyn Predictor),
        sleeper: sleeper.as_ref(),
    };
    let outcome = run(config, ctx, Utc::now()).await;

    write_report(&outcome.report, &config.output.report_path).await?;
    Ok(outcome)
}
