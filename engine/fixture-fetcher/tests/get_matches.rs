//! End-to-end runs against a file-backed snapshot

use chrono::{NaiveDate, TimeZone, Utc};
use fixture_fetcher::backoff::TokioSleeper;
use fixture_fetcher::config::{DayWindow, DivisionConfig};
use fixture_fetcher::pipeline::write_report;
use fixture_fetcher::{
    run, BoardSource, FetcherConfig, PageSource, Rank, RunContext, SnapshotCache,
};
use persistence::{create_local_store, SnapshotStore};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

/// Upstream that answers every page from a fixed list, or fails every request
struct FakeUpstream {
    records: Vec<Value>,
    down: AtomicBool,
}

#[async_trait::async_trait]
impl PageSource for FakeUpstream {
    fn page_size(&self) -> u32 {
        50
    }

    async fn fetch_page(
        &self,
        division: &DivisionConfig,
        _date: NaiveDate,
        page: u32,
    ) -> Option<Vec<Value>> {
        if self.down.load(Ordering::SeqCst) {
            return None;
        }
        if division.key != "atp" || page > 1 {
            return Some(Vec::new());
        }
        Some(self.records.clone())
    }
}

fn offline<'a, S: SnapshotStore>(
    upstream: &'a FakeUpstream,
    cache: &'a SnapshotCache<S>,
) -> RunContext<'a, S> {
    RunContext {
        source: upstream,
        lookup: None,
        cache,
        predictor: None,
        sleeper: &TokioSleeper,
    }
}

fn config() -> FetcherConfig {
    let mut config = FetcherConfig::default();
    config.aggregation.mode = DayWindow::Reduced;
    config
}

#[tokio::test]
async fn test_snapshot_survives_upstream_outage() {
    let temp = TempDir::new().unwrap();
    let store = create_local_store(temp.path().join("last_good_snapshot.json")).unwrap();
    let cache = SnapshotCache::new(store);
    let upstream = FakeUpstream {
        records: vec![
            json!({
                "tournament": "ATP Finals",
                "player1": {"name": "A", "rank": 5, "image": "//img.example.com/a.jpg"},
                "player2": {"name": "B", "rank": "N/A"}
            }),
            json!({
                "tournament": {"name": "Challenger Lyon"},
                "player1": {"name": "C", "rank": 150},
                "player2": {"name": "D", "rank": 160}
            }),
        ],
        down: AtomicBool::new(false),
    };
    let now = Utc.with_ymd_and_hms(2026, 11, 15, 9, 0, 0).unwrap();

    let fresh = run(&config(), offline(&upstream, &cache), now).await.report;

    assert_eq!(fresh.source, BoardSource::Fresh);
    let atp = &fresh.divisions[0];
    assert_eq!(atp.tournaments.len(), 1);
    let fixture = &atp.tournaments["ATP Finals"].fixtures[0];
    assert_eq!(fixture.participant_a.rank, Rank::Ranked(5));
    assert_eq!(fixture.participant_b.rank, Rank::Unranked);
    assert_eq!(fixture.sort_key, 5);
    assert_eq!(fixture.participant_a.image_url, "https://img.example.com/a.jpg");
    assert!(fixture.participant_b.image_url.starts_with("https://"));

    upstream.down.store(true, Ordering::SeqCst);
    let fallback = run(&config(), offline(&upstream, &cache), now).await.report;

    assert_eq!(fallback.source, BoardSource::Cache);
    assert_eq!(fallback.divisions, fresh.divisions);
    assert_eq!(fallback.predictions["ATP Finals|A|B|2026-11-15"].winner, "TBD");
}

#[tokio::test]
async fn test_outage_without_snapshot_writes_empty_report() {
    let temp = TempDir::new().unwrap();
    let store = create_local_store(temp.path().join("snapshot.json")).unwrap();
    let cache = SnapshotCache::new(store);
    let upstream = FakeUpstream {
        records: Vec::new(),
        down: AtomicBool::new(true),
    };

    let report = run(&config(), offline(&upstream, &cache), Utc::now()).await.report;

    assert_eq!(report.source, BoardSource::Empty);
    assert_eq!(report.divisions.iter().map(|d| d.fixture_count()).sum::<usize>(), 0);
    assert!(!temp.path().join("snapshot.json").exists());

    let output = temp.path().join("site").join("matches.json");
    write_report(&report, &output).await.unwrap();
    let written: Value = serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
    assert_eq!(written["source"], "empty");
}
