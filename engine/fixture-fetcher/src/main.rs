use fixture_fetcher::config::LoggingConfig;
use fixture_fetcher::logging::initialize_logging;
use fixture_fetcher::{run_from_config, FetcherConfig};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Logging first so configuration warnings are not lost
    initialize_logging(&LoggingConfig::from_env())?;
    let config = FetcherConfig::from_env()?;

    info!("Starting fixture fetcher ({:?} window)", config.aggregation.mode);

    let outcome = run_from_config(&config).await?;

    info!(
        "Done: {} fixtures from {:?} board, {} predictions, last updated {}",
        outcome
            .report
            .divisions
            .iter()
            .map(|d| d.fixture_count())
            .sum::<usize>(),
        outcome.report.source,
        outcome.report.predictions.len(),
        outcome.report.last_updated
    );

    Ok(())
}
