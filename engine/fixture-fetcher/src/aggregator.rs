//! Match aggregation.
//!
//! Walks divisions, days and pages in a fixed order and turns raw upstream
//! records into a deduplicated, grouped and sorted [`MatchBoard`]. Nothing in
//! a record can make a run fail: unusable records are skipped and missing
//! fields fall back to defaults.

use crate::config::{AggregationConfig, DayWindow, DivisionConfig};
use crate::debug_dump::DebugDump;
use crate::extract::{extract_text_or, extract_with, resolve_node};
use crate::image::{normalize_image_url, ImageRef};
use crate::models::{Division, Fixture, MatchBoard, Participant, Surface};
use crate::rank::{ParticipantRef, RankCache, RankResolver};
use crate::raw::RawValue;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub const DEFAULT_TOURNAMENT: &str = "Unknown Tournament";

/// Characters marking a doubles pairing or team entry
pub const TEAM_SEPARATORS: &[char] = &['/', '&'];

const TOURNAMENT_PATHS: &[&[&str]] = &[
    &["tournament", "name"],
    &["tournamentName"],
    &["tournament_name"],
    &["tournament"],
    &["event", "tournament", "name"],
    &["league", "name"],
    &["competition", "name"],
];

const TOURNAMENT_OBJECT_PATHS: &[&[&str]] = &[
    &["tournament"],
    &["event", "tournament"],
    &["league"],
    &["competition"],
];

const SURFACE_PATHS: &[&[&str]] = &[
    &["surface"],
    &["tournament", "surface"],
    &["tournament", "surface", "name"],
    &["tournament", "court", "surface"],
    &["tournament", "ground"],
    &["court", "surface"],
    &["event", "tournament", "surface"],
    &["groundType"],
];

const IDENTITY_PATHS: &[&[&str]] = &[&["id"], &["matchId"], &["fixtureId"], &["event_id"]];

const SCHEDULE_PATHS: &[&[&str]] = &[
    &["date"],
    &["startDate"],
    &["startTime"],
    &["start_time"],
    &["scheduled"],
];

const FIRST_PARTICIPANT_PATHS: &[&[&str]] =
    &[&["player1"], &["homeTeam"], &["home"], &["participant1"]];
const SECOND_PARTICIPANT_PATHS: &[&[&str]] =
    &[&["player2"], &["awayTeam"], &["away"], &["participant2"]];

const NAME_PATHS: &[&[&str]] = &[
    &["name"],
    &["fullName"],
    &["full_name"],
    &["displayName"],
    &["shortName"],
];

/// Fixture-level name keys; `{}` is replaced by the participant prefix
const FIXTURE_NAME_TEMPLATES: &[&str] = &["{}Name", "{}_name", "{}"];

const IMAGE_PATHS: &[&[&str]] =
    &[&["image"], &["imageUrl"], &["image_url"], &["photo"], &["headshot"], &["avatar"]];

/// Fixture-level image keys; `{}` is replaced by the participant prefix
const FIXTURE_IMAGE_TEMPLATES: &[&str] = &["{}Image", "{}_image", "{}ImageUrl"];

/// One page of raw fixture records
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    /// Requested records per page; a shorter page is the last one
    fn page_size(&self) -> u32;

    /// Records of one page (1-based), or `None` when the request was abandoned
    async fn fetch_page(
        &self,
        division: &DivisionConfig,
        date: NaiveDate,
        page: u32,
    ) -> Option<Vec<Value>>;
}

/// Counters for one aggregation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationStats {
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub records_seen: usize,
    pub excluded: usize,
    pub team_events: usize,
    pub duplicates: usize,
    pub accepted: usize,
}

/// What happened to a single record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Accepted(Box<Fixture>),
    /// Tournament matched an exclusion keyword
    Excluded,
    /// A participant name looked like a pairing
    TeamEvent,
    /// Identity key already seen in this run
    Duplicate,
}

/// Case-insensitive substring match against the exclusion list
pub fn is_excluded(tournament: &str, keywords: &[String]) -> bool {
    let tournament = tournament.to_lowercase();
    keywords
        .iter()
        .map(|keyword| keyword.trim().to_lowercase())
        .any(|keyword| !keyword.is_empty() && tournament.contains(&keyword))
}

pub fn is_team_name(name: &str) -> bool {
    name.contains(TEAM_SEPARATORS)
}

fn expand(templates: &[&str], prefix: &str) -> Vec<Vec<String>> {
    templates
        .iter()
        .map(|template| vec![template.replace("{}", prefix)])
        .collect()
}

fn first_object<'v>(record: &'v Value, paths: &[&[&str]]) -> Option<&'v Value> {
    paths
        .iter()
        .filter_map(|path| resolve_node(record, *path))
        .find(|node| node.is_object())
}

/// Identity key: the upstream id, else tournament, names and date
pub fn identity_key(
    record: &Value,
    tournament: &str,
    name_a: &str,
    name_b: &str,
    date: &str,
) -> String {
    extract_with(record, IDENTITY_PATHS, |v| v.as_identifier())
        .unwrap_or_else(|| format!("{tournament}|{name_a}|{name_b}|{date}"))
}

/// Surface from the first textual label found, normalized
pub fn surface_of(record: &Value) -> Surface {
    extract_with(record, SURFACE_PATHS, |v| v.as_text())
        .map(Surface::normalize)
        .unwrap_or_default()
}

struct Side<'v> {
    object: Option<&'v Value>,
    prefix: &'static str,
    name: String,
}

impl<'v> Side<'v> {
    fn read(
        record: &'v Value,
        paths: &[&[&str]],
        prefix: &'static str,
        default_name: &str,
    ) -> Self {
        let object = first_object(record, paths);
        let name = object
            .and_then(|object| {
                extract_with(object, NAME_PATHS, |v| v.as_text().map(str::to_string))
            })
            .unwrap_or_else(|| {
                extract_text_or(record, &expand(FIXTURE_NAME_TEMPLATES, prefix), default_name)
            });
        Self {
            object,
            prefix,
            name,
        }
    }

    /// First image candidate holding a usable reference; other shapes fall through
    fn image(&self, record: &'v Value) -> RawValue<'v> {
        let usable = |v: RawValue<'v>| matches!(ImageRef::from(v), ImageRef::Url(_)).then_some(v);
        self.object
            .and_then(|object| extract_with(object, IMAGE_PATHS, usable))
            .or_else(|| extract_with(record, &expand(FIXTURE_IMAGE_TEMPLATES, self.prefix), usable))
            .unwrap_or(RawValue::Missing)
    }

    fn participant_ref(&self, record: &'v Value) -> ParticipantRef<'v> {
        ParticipantRef {
            participant: self.object,
            fixture: record,
            prefix: self.prefix,
        }
    }
}

/// Builds a [`MatchBoard`] from paginated upstream results
pub struct Aggregator<'a> {
    config: AggregationConfig,
    source: &'a dyn PageSource,
    resolver: RankResolver<'a>,
    debug_dump: Option<DebugDump>,
    seen: HashSet<String>,
    stats: AggregationStats,
}

impl<'a> Aggregator<'a> {
    pub fn new(
        config: &AggregationConfig,
        source: &'a dyn PageSource,
        resolver: RankResolver<'a>,
    ) -> Self {
        Self {
            config: config.clone(),
            source,
            resolver,
            debug_dump: None,
            seen: HashSet::new(),
            stats: AggregationStats::default(),
        }
    }

    /// Dump the first raw record of the run to `dump`'s directory
    pub fn with_debug_dump(mut self, dump: DebugDump) -> Self {
        self.debug_dump = Some(dump);
        self
    }

    pub fn stats(&self) -> &AggregationStats {
        &self.stats
    }

    /// Aggregate all divisions around `today`.
    ///
    /// `cache` lives as long as the caller wants remote rank lookups shared.
    pub async fn run(
        &mut self,
        divisions: &[DivisionConfig],
        today: NaiveDate,
        cache: &mut RankCache,
    ) -> MatchBoard {
        let mut board = MatchBoard::default();
        for division in divisions {
            let collected = self.collect_division(division, today, cache).await;
            info!(
                "Division {}: {} fixtures in {} tournaments",
                division.key,
                collected.fixture_count(),
                collected.tournaments.len()
            );
            board.divisions.push(collected);
        }

        info!(
            "Aggregation finished: {} fixtures, {} records seen, {} excluded, {} team events, \
             {} duplicates, {} remote rank lookups",
            board.total_fixtures(),
            self.stats.records_seen,
            self.stats.excluded,
            self.stats.team_events,
            self.stats.duplicates,
            cache.remote_lookups()
        );
        board
    }

    /// All days and pages of one division, capped at the configured maximum
    pub async fn collect_division(
        &mut self,
        division: &DivisionConfig,
        today: NaiveDate,
        cache: &mut RankCache,
    ) -> Division {
        let mut collected = Division::new(division.key.clone(), division.label.clone());
        let mode: DayWindow = self.config.mode;
        let page_cap = mode.page_cap(self.config.max_pages);
        let page_size = self.source.page_size() as usize;
        let cap = self.config.max_matches_per_division;

        'days: for date in mode.days(today) {
            for page in 1..=page_cap {
                if collected.fixture_count() >= cap {
                    info!("Division {} reached the cap of {} fixtures", division.key, cap);
                    break 'days;
                }
                let Some(records) = self.source.fetch_page(division, date, page).await else {
                    self.stats.pages_failed += 1;
                    warn!("Skipping {} {} from page {}: no data", division.key, date, page);
                    break;
                };
                self.stats.pages_fetched += 1;

                for record in &records {
                    if collected.fixture_count() >= cap {
                        info!("Division {} reached the cap of {} fixtures", division.key, cap);
                        break 'days;
                    }
                    self.ingest(&mut collected, record, date, cache).await;
                }

                if records.len() < page_size {
                    break;
                }
            }
        }

        collected.sort_fixtures();
        collected
    }

    /// Normalize one record into `division`
    pub async fn ingest(
        &mut self,
        division: &mut Division,
        record: &Value,
        date: NaiveDate,
        cache: &mut RankCache,
    ) -> RecordOutcome {
        self.stats.records_seen += 1;
        let outcome = self.normalize(&division.key, record, date, cache).await;

        match &outcome {
            RecordOutcome::Accepted(fixture) => {
                self.stats.accepted += 1;
                division.insert(fixture.as_ref().clone());
            }
            RecordOutcome::Excluded => self.stats.excluded += 1,
            RecordOutcome::TeamEvent => self.stats.team_events += 1,
            RecordOutcome::Duplicate => self.stats.duplicates += 1,
        }
        outcome
    }

    async fn normalize(
        &mut self,
        division: &str,
        record: &Value,
        date: NaiveDate,
        cache: &mut RankCache,
    ) -> RecordOutcome {
        let first = Side::read(record, FIRST_PARTICIPANT_PATHS, "player1", "Player 1");
        let second = Side::read(record, SECOND_PARTICIPANT_PATHS, "player2", "Player 2");

        if let Some(dump) = self.debug_dump.as_mut() {
            let tournament = first_object(record, TOURNAMENT_OBJECT_PATHS);
            if let Err(e) = dump.capture(record, first.object, tournament).await {
                warn!("Failed to write raw payload dump: {}", e);
            }
        }

        let tournament = extract_text_or(record, TOURNAMENT_PATHS, DEFAULT_TOURNAMENT);
        if is_excluded(&tournament, &self.config.exclude_keywords) {
            debug!("Excluded tournament {}", tournament);
            return RecordOutcome::Excluded;
        }

        if is_team_name(&first.name) || is_team_name(&second.name) {
            debug!("Dropped team event {} vs {}", first.name, second.name);
            return RecordOutcome::TeamEvent;
        }

        let scheduled = extract_with(record, SCHEDULE_PATHS, |v| v.as_text().map(str::to_string));
        let day = date.format("%Y-%m-%d").to_string();
        let date_key = scheduled.as_deref().unwrap_or(&day);
        let id = identity_key(record, &tournament, &first.name, &second.name, date_key);
        if !self.seen.insert(id.clone()) {
            return RecordOutcome::Duplicate;
        }

        let rank_a = self.resolver.resolve(cache, division, first.participant_ref(record)).await;
        let rank_b = self.resolver.resolve(cache, division, second.participant_ref(record)).await;

        let participant_a = Participant {
            image_url: normalize_image_url(first.image(record), &first.name),
            name: first.name,
            rank: rank_a,
        };
        let participant_b = Participant {
            image_url: normalize_image_url(second.image(record), &second.name),
            name: second.name,
            rank: rank_b,
        };

        let fixture = Fixture::new(
            id,
            tournament,
            surface_of(record),
            participant_a,
            participant_b,
            scheduled,
        );
        RecordOutcome::Accepted(Box::new(fixture))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::TablePages;
    use super::*;
    use crate::config::FetcherConfig;
    use crate::image::placeholder_url;
    use crate::models::{Rank, UNRANKED_SORT_KEY};
    use crate::rank::testing::TableLookup;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, 14).unwrap()
    }

    fn atp() -> DivisionConfig {
        DivisionConfig {
            key: "atp".to_string(),
            label: "ATP Tour".to_string(),
        }
    }

    fn config(mode: DayWindow) -> AggregationConfig {
        let mut config = FetcherConfig::default().aggregation;
        config.mode = mode;
        config
    }

    fn record(id: u32, tournament: &str, a: (&str, u32), b: (&str, u32)) -> Value {
        json!({
            "id": id,
            "tournament": {"name": tournament},
            "player1": {"name": a.0, "rank": a.1},
            "player2": {"name": b.0, "rank": b.1}
        })
    }

    async fn aggregate(source: &TablePages, mode: DayWindow) -> (MatchBoard, AggregationStats) {
        let config = config(mode);
        let mut aggregator = Aggregator::new(&config, source, RankResolver::offline());
        let mut cache = RankCache::new();
        let board = aggregator.run(&[atp()], today(), &mut cache).await;
        (board, aggregator.stats().clone())
    }

    #[tokio::test]
    async fn test_atp_finals_scenario() {
        let source = TablePages::new(50).page(
            "atp",
            today(),
            1,
            vec![json!({
                "tournament": "ATP Finals",
                "player1": {"name": "A", "rank": 5},
                "player2": {"name": "B", "rank": "N/A"}
            })],
        );

        let (board, _) = aggregate(&source, DayWindow::Reduced).await;

        let bucket = &board.divisions[0].tournaments["ATP Finals"];
        assert_eq!(bucket.surface, Surface::Unknown);
        let fixture = &bucket.fixtures[0];
        assert_eq!(fixture.participant_a.rank, Rank::Ranked(5));
        assert_eq!(fixture.participant_b.rank, Rank::Unranked);
        assert_eq!(fixture.sort_key, 5);
        assert_eq!(fixture.id, "ATP Finals|A|B|2026-11-14");
    }

    #[tokio::test]
    async fn test_excluded_tournament_dropped() {
        let source = TablePages::new(50).page(
            "atp",
            today(),
            1,
            vec![
                record(1, "Challenger Lyon", ("A", 100), ("B", 200)),
                record(2, "Paris Masters", ("C", 1), ("D", 2)),
            ],
        );

        let (board, stats) = aggregate(&source, DayWindow::Reduced).await;

        let division = &board.divisions[0];
        assert!(!division.tournaments.contains_key("Challenger Lyon"));
        assert_eq!(division.fixture_count(), 1);
        assert_eq!(stats.excluded, 1);
    }

    #[test]
    fn test_exclusion_is_case_insensitive() {
        let keywords = vec!["challenger".to_string(), " ITF ".to_string(), String::new()];
        assert!(is_excluded("ATP CHALLENGER Tour Lyon", &keywords));
        assert!(is_excluded("M25 itf Antalya", &keywords));
        assert!(!is_excluded("Wimbledon", &keywords));
    }

    #[tokio::test]
    async fn test_team_events_dropped() {
        let source = TablePages::new(50).page(
            "atp",
            today(),
            1,
            vec![
                record(1, "Davis Cup", ("Granollers / Zeballos", 1), ("Krawietz & Puetz", 2)),
                record(2, "Davis Cup", ("Alcaraz", 2), ("Sinner", 1)),
            ],
        );

        let (board, stats) = aggregate(&source, DayWindow::Reduced).await;

        assert_eq!(board.total_fixtures(), 1);
        assert_eq!(stats.team_events, 1);
    }

    #[tokio::test]
    async fn test_duplicates_first_occurrence_wins() {
        let no_id = json!({
            "tournament": {"name": "Basel"},
            "date": "2026-11-14",
            "player1": {"name": "X"},
            "player2": {"name": "Y"}
        });
        let source = TablePages::new(50).page(
            "atp",
            today(),
            1,
            vec![
                record(7, "Basel", ("A", 10), ("B", 20)),
                record(7, "Basel", ("A", 99), ("B", 98)),
                record(8, "Basel", ("A", 10), ("B", 20)),
                no_id.clone(),
                no_id,
            ],
        );

        let (board, stats) = aggregate(&source, DayWindow::Reduced).await;

        let fixtures = &board.divisions[0].tournaments["Basel"].fixtures;
        assert_eq!(fixtures.len(), 3);
        assert_eq!(stats.duplicates, 2);
        let first = fixtures.iter().find(|f| f.id == "7").unwrap();
        assert_eq!(first.participant_a.rank, Rank::Ranked(10));
    }

    #[tokio::test]
    async fn test_buckets_sorted_with_unranked_last() {
        let source = TablePages::new(50).page(
            "atp",
            today(),
            1,
            vec![
                json!({
                    "id": 1,
                    "tournament": {"name": "Vienna"},
                    "player1": {"name": "A"},
                    "player2": {"name": "B"}
                }),
                record(2, "Vienna", ("C", 40), ("D", 12)),
                record(3, "Vienna", ("E", 3), ("F", 4000)),
                record(4, "Vienna", ("G", 12), ("H", 70)),
            ],
        );

        let (board, _) = aggregate(&source, DayWindow::Reduced).await;

        let fixtures = &board.divisions[0].tournaments["Vienna"].fixtures;
        let keys: Vec<u16> = fixtures.iter().map(|f| f.sort_key).collect();
        assert_eq!(keys, vec![3, 12, 12, UNRANKED_SORT_KEY]);
        // Stable for equal keys
        assert_eq!(fixtures[1].id, "2");
        assert_eq!(fixtures[2].id, "4");
    }

    #[tokio::test]
    async fn test_surface_upgraded_and_normalized() {
        let source = TablePages::new(50).page(
            "atp",
            today(),
            1,
            vec![
                record(1, "Madrid", ("A", 1), ("B", 2)),
                json!({
                    "id": 2,
                    "tournament": {"name": "Madrid", "surface": "Red clay court"},
                    "player1": {"name": "C"},
                    "player2": {"name": "D"}
                }),
            ],
        );

        let (board, _) = aggregate(&source, DayWindow::Reduced).await;

        let bucket = &board.divisions[0].tournaments["Madrid"];
        assert_eq!(bucket.surface, Surface::Clay);
        assert_eq!(bucket.fixtures[0].surface, Surface::Unknown);
    }

    #[tokio::test]
    async fn test_defaults_for_malformed_record() {
        let malformed = json!({"id": "x1", "player1": 17});
        let source = TablePages::new(50).page("atp", today(), 1, vec![malformed]);

        let (board, _) = aggregate(&source, DayWindow::Reduced).await;

        let fixture = &board.divisions[0].tournaments[DEFAULT_TOURNAMENT].fixtures[0];
        assert_eq!(fixture.participant_a.name, "Player 1");
        assert_eq!(fixture.participant_b.name, "Player 2");
        assert_eq!(fixture.participant_a.image_url, placeholder_url("Player 1"));
        assert_eq!(fixture.sort_key, UNRANKED_SORT_KEY);
    }

    #[tokio::test]
    async fn test_alternative_participant_shapes() {
        let source = TablePages::new(50).page(
            "atp",
            today(),
            1,
            vec![json!({
                "matchId": "m-1",
                "tournamentName": "Shanghai Masters",
                "homeTeam": {
                    "fullName": "Daniil Medvedev",
                    "ranking": {"rank": 5},
                    "photo": "//img.test/dm.png"
                },
                "awayTeam": {"name": "Holger Rune"},
                "player2Rank": 13,
                "player2Image": "http://img.test/hr.png"
            })],
        );

        let (board, _) = aggregate(&source, DayWindow::Reduced).await;

        let fixture = &board.divisions[0].tournaments["Shanghai Masters"].fixtures[0];
        assert_eq!(fixture.id, "m-1");
        assert_eq!(fixture.participant_a.name, "Daniil Medvedev");
        assert_eq!(fixture.participant_a.rank, Rank::Ranked(5));
        assert_eq!(fixture.participant_a.image_url, "https://img.test/dm.png");
        assert_eq!(fixture.participant_b.rank, Rank::Ranked(13));
        assert_eq!(fixture.participant_b.image_url, "https://img.test/hr.png");
    }

    #[tokio::test]
    async fn test_reduced_mode_fetches_one_page_today() {
        let full_page: Vec<Value> = (0..2).map(|i| record(i, "Metz", ("A", 1), ("B", 2))).collect();
        let source = TablePages::new(2).page("atp", today(), 1, full_page);

        aggregate(&source, DayWindow::Reduced).await;

        assert_eq!(source.calls(), vec![("atp".to_string(), today(), 1)]);
    }

    #[tokio::test]
    async fn test_full_mode_pages_until_short_page() {
        let yesterday = today().pred_opt().unwrap();
        let tomorrow = today().succ_opt().unwrap();
        let source = TablePages::new(2)
            .page("atp", yesterday, 1, vec![record(1, "Metz", ("A", 1), ("B", 2))])
            .page(
                "atp",
                today(),
                1,
                vec![record(2, "Metz", ("C", 3), ("D", 4)), record(3, "Metz", ("E", 5), ("F", 6))],
            )
            .page("atp", today(), 2, vec![record(4, "Metz", ("G", 7), ("H", 8))])
            .failing("atp", tomorrow, 1);

        let (board, stats) = aggregate(&source, DayWindow::Full).await;

        assert_eq!(
            source.calls(),
            vec![
                ("atp".to_string(), yesterday, 1),
                ("atp".to_string(), today(), 1),
                ("atp".to_string(), today(), 2),
                ("atp".to_string(), tomorrow, 1),
            ]
        );
        assert_eq!(board.total_fixtures(), 4);
        assert_eq!(stats.pages_failed, 1);
    }

    #[tokio::test]
    async fn test_full_mode_respects_page_cap() {
        let mut source = TablePages::new(1);
        for page in 1..=10 {
            let records = vec![record(page, "Metz", ("A", 1), ("B", 2))];
            source = source.page("atp", today(), page, records);
        }
        let mut config = config(DayWindow::Full);
        config.max_pages = 3;

        let mut aggregator = Aggregator::new(&config, &source, RankResolver::offline());
        let board = aggregator.run(&[atp()], today(), &mut RankCache::new()).await;

        let today_calls = source
            .calls()
            .into_iter()
            .filter(|(_, date, _)| *date == today())
            .count();
        assert_eq!(today_calls, 3);
        assert_eq!(board.total_fixtures(), 3);
    }

    #[tokio::test]
    async fn test_division_cap_stops_ingestion() {
        let records: Vec<Value> = (0..10).map(|i| record(i, "Tokyo", ("A", 1), ("B", 2))).collect();
        let source = TablePages::new(50).page("atp", today(), 1, records);
        let mut config = config(DayWindow::Full);
        config.max_matches_per_division = 4;

        let mut aggregator = Aggregator::new(&config, &source, RankResolver::offline());
        let board = aggregator.run(&[atp()], today(), &mut RankCache::new()).await;

        assert_eq!(board.divisions[0].fixture_count(), 4);
        // Cap reached on the first day; no further days requested
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_exactly_filled_cap_requests_no_more_pages() {
        let yesterday = today().pred_opt().unwrap();
        let source = TablePages::new(2).page(
            "atp",
            yesterday,
            1,
            vec![record(1, "Tokyo", ("A", 1), ("B", 2)), record(2, "Tokyo", ("C", 3), ("D", 4))],
        );
        let mut config = config(DayWindow::Full);
        config.max_matches_per_division = 2;

        let mut aggregator = Aggregator::new(&config, &source, RankResolver::offline());
        let board = aggregator.run(&[atp()], today(), &mut RankCache::new()).await;

        assert_eq!(board.divisions[0].fixture_count(), 2);
        assert_eq!(source.calls(), vec![("atp".to_string(), yesterday, 1)]);
        assert_eq!(aggregator.stats().pages_fetched, 1);
    }

    #[tokio::test]
    async fn test_unusable_image_shape_falls_through() {
        let source = TablePages::new(50).page(
            "atp",
            today(),
            1,
            vec![json!({
                "id": 1,
                "tournament": "Stockholm",
                "player1": {"name": "A", "image": {"id": 5}, "imageUrl": "https://img.test/a.png"},
                "player2": {"name": "B", "image": 42},
                "player2Image": "//img.test/b.png"
            })],
        );

        let (board, _) = aggregate(&source, DayWindow::Reduced).await;

        let fixture = &board.divisions[0].tournaments["Stockholm"].fixtures[0];
        assert_eq!(fixture.participant_a.image_url, "https://img.test/a.png");
        assert_eq!(fixture.participant_b.image_url, "https://img.test/b.png");
    }

    #[tokio::test]
    async fn test_remote_rank_lookup_shared_across_fixtures() {
        let lookup = TableLookup::with(&[("501", json!({"data": {"ranking": 9}}))]);
        let source = TablePages::new(50).page(
            "atp",
            today(),
            1,
            vec![
                json!({
                    "id": 1,
                    "tournament": "Doha",
                    "player1": {"id": 501, "name": "A"},
                    "player2": {"name": "B", "rank": 30}
                }),
                json!({
                    "id": 2,
                    "tournament": "Doha",
                    "player1": {"name": "C", "rank": 40},
                    "player2": {"id": 501, "name": "A"}
                }),
            ],
        );
        let config = config(DayWindow::Reduced);
        let mut cache = RankCache::new();

        let mut aggregator = Aggregator::new(&config, &source, RankResolver::new(Some(&lookup)));
        let board = aggregator.run(&[atp()], today(), &mut cache).await;

        let fixtures = &board.divisions[0].tournaments["Doha"].fixtures;
        assert!(fixtures.iter().all(|f| f.sort_key == 9));
        assert_eq!(lookup.call_count(), 1);
        assert_eq!(cache.remote_lookups(), 1);
    }

    #[tokio::test]
    async fn test_debug_dump_written_once() {
        let temp = tempfile::TempDir::new().unwrap();
        let source = TablePages::new(50).page(
            "atp",
            today(),
            1,
            vec![record(1, "Turin", ("A", 1), ("B", 2)), record(2, "Turin", ("C", 3), ("D", 4))],
        );
        let config = config(DayWindow::Reduced);

        let mut aggregator = Aggregator::new(&config, &source, RankResolver::offline())
            .with_debug_dump(DebugDump::new(temp.path()));
        aggregator.run(&[atp()], today(), &mut RankCache::new()).await;

        let dumped: Value = serde_json::from_slice(
            &std::fs::read(temp.path().join(crate::debug_dump::RECORD_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(dumped["id"], 1);
        assert!(temp.path().join(crate::debug_dump::TOURNAMENT_FILE).exists());
    }
}
