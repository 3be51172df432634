//! Fixture Fetcher
//!
//! Batch job that pulls upcoming ATP/WTA fixtures from a schema-inconsistent
//! upstream API, normalizes them into a grouped and ranked board, falls back
//! to the last good snapshot when the upstream returns nothing, and writes a
//! report for the static page renderer.
//!
//! Data flows in one direction:
//! fetcher → raw pages → aggregator (extract, rank, image, filter, dedup)
//! → snapshot cache → predictions → report.

pub mod aggregator;
pub mod backoff;
pub mod cache;
pub mod config;
pub mod debug_dump;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod image;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod prediction;
pub mod rank;
pub mod raw;

pub use aggregator::{Aggregator, AggregationStats, PageSource};
pub use cache::SnapshotCache;
pub use config::FetcherConfig;
pub use error::{FetcherError, Result};
pub use fetcher::{JsonFetcher, UpstreamClient};
pub use models::*;
pub use pipeline::{run, run_from_config, RunContext, RunOutcome};
pub use rank::{RankCache, RankResolver};
