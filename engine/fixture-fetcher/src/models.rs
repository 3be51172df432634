use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

/// Exclusive lower bound for a valid ranking
pub const RANK_MIN_EXCLUSIVE: i64 = 0;

/// Exclusive upper bound for a valid ranking
pub const RANK_MAX_EXCLUSIVE: i64 = 5000;

/// Sort key used when neither participant is ranked
pub const UNRANKED_SORT_KEY: u16 = 9999;

/// A participant's ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rank {
    /// Ranking between 1 and 4999
    Ranked(u16),
    /// No usable ranking was found
    Unranked,
}

impl Rank {
    /// Validate a raw integer against the ranking bounds
    pub fn new(value: i64) -> Option<Self> {
        (value > RANK_MIN_EXCLUSIVE && value < RANK_MAX_EXCLUSIVE)
            .then(|| Rank::Ranked(value as u16))
    }

    pub fn value(&self) -> Option<u16> {
        match self {
            Rank::Ranked(n) => Some(*n),
            Rank::Unranked => None,
        }
    }

    /// Value used for ordering fixtures; lower is better
    pub fn sort_value(&self) -> u16 {
        self.value().unwrap_or(UNRANKED_SORT_KEY)
    }
}

impl Serialize for Rank {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Rank::Ranked(n) => serializer.serialize_u16(*n),
            Rank::Unranked => serializer.serialize_str("unranked"),
        }
    }
}

impl<'de> Deserialize<'de> for Rank {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(i64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(Rank::new(n).unwrap_or(Rank::Unranked)),
            Repr::Text(_) => Ok(Rank::Unranked),
        }
    }
}

/// Court surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Surface {
    Hard,
    Clay,
    Grass,
    #[default]
    Unknown,
}

impl Surface {
    /// Collapse verbose upstream labels ("Hardcourt outdoor", "I.hard",
    /// "Red clay court", ...) onto the canonical surfaces
    pub fn normalize(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        if label.contains("hard") || label.contains("acrylic") {
            Surface::Hard
        } else if label.contains("clay") {
            Surface::Clay
        } else if label.contains("grass") || label.contains("lawn") {
            Surface::Grass
        } else {
            Surface::Unknown
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Surface::Unknown)
    }
}

/// One side of a fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub rank: Rank,
    /// Absolute https URL, safe to render as-is
    pub image_url: String,
}

/// One scheduled match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    /// Identity key used for deduplication
    pub id: String,
    pub tournament_name: String,
    pub surface: Surface,
    pub participant_a: Participant,
    pub participant_b: Participant,
    /// Best (lowest) rank among the participants
    pub sort_key: u16,
    /// Scheduled date or start time as reported upstream
    pub scheduled: Option<String>,
}

impl Fixture {
    pub fn new(
        id: String,
        tournament_name: String,
        surface: Surface,
        participant_a: Participant,
        participant_b: Participant,
        scheduled: Option<String>,
    ) -> Self {
        let sort_key = participant_a.rank.sort_value().min(participant_b.rank.sort_value());
        Self {
            id,
            tournament_name,
            surface,
            participant_a,
            participant_b,
            sort_key,
            scheduled,
        }
    }
}

/// Fixtures of one tournament inside a division
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TournamentBucket {
    pub surface: Surface,
    pub fixtures: Vec<Fixture>,
}

impl TournamentBucket {
    /// First known surface wins; Unknown is always replaced
    pub fn observe_surface(&mut self, surface: Surface) {
        if !self.surface.is_known() && surface.is_known() {
            self.surface = surface;
        }
    }

    /// Stable sort by sort key, unranked pairs last
    pub fn sort(&mut self) {
        self.fixtures.sort_by_key(|fixture| fixture.sort_key);
    }
}

/// A tour grouping such as the ATP or WTA tour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Division {
    pub key: String,
    pub label: String,
    pub tournaments: BTreeMap<String, TournamentBucket>,
}

impl Division {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            tournaments: BTreeMap::new(),
        }
    }

    /// Add a fixture to its tournament bucket, upgrading the bucket surface
    pub fn insert(&mut self, fixture: Fixture) {
        let bucket = self.tournaments.entry(fixture.tournament_name.clone()).or_default();
        bucket.observe_surface(fixture.surface);
        bucket.fixtures.push(fixture);
    }

    pub fn sort_fixtures(&mut self) {
        for bucket in self.tournaments.values_mut() {
            bucket.sort();
        }
    }

    pub fn fixture_count(&self) -> usize {
        self.tournaments
            .values()
            .map(|bucket| bucket.fixtures.len())
            .sum()
    }
}

/// Everything one run produced: the state captured in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MatchBoard {
    pub divisions: Vec<Division>,
}

impl MatchBoard {
    pub fn total_fixtures(&self) -> usize {
        self.divisions.iter().map(Division::fixture_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_fixtures() == 0
    }

    /// All fixtures in board order: division, tournament, sort key
    pub fn fixtures(&self) -> impl Iterator<Item = &Fixture> {
        self.divisions
            .iter()
            .flat_map(|division| division.tournaments.values())
            .flat_map(|bucket| bucket.fixtures.iter())
    }
}

/// Predicted outcome of one fixture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub winner: String,
    /// 0 to 100
    pub confidence: u8,
    /// One sentence
    pub reasoning: String,
}

impl Prediction {
    /// Placeholder used whenever a prediction could not be produced
    pub fn unavailable() -> Self {
        Self {
            winner: "TBD".to_string(),
            confidence: 0,
            reasoning: "Analysis unavailable".to_string(),
        }
    }
}

/// Where the board in a report came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardSource {
    /// Fetched during this run
    Fresh,
    /// Last good snapshot, served because this run fetched nothing
    Cache,
    /// Nothing fetched and no snapshot available
    Empty,
}

/// Hand-off to the page renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    /// `generated_at` formatted for display
    pub last_updated: String,
    pub source: BoardSource,
    pub divisions: Vec<Division>,
    /// Keyed by fixture id; every fixture on the board has an entry
    pub predictions: BTreeMap<String, Prediction>,
}

impl Report {
    pub fn build(
        board: MatchBoard,
        mut predictions: HashMap<String, Prediction>,
        source: BoardSource,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let predictions = board
            .fixtures()
            .map(|fixture| {
                let prediction = predictions
                    .remove(&fixture.id)
                    .unwrap_or_else(Prediction::unavailable);
                (fixture.id.clone(), prediction)
            })
            .collect();

        Self {
            generated_at,
            last_updated: generated_at.format("%Y-%m-%d %H:%M").to_string(),
            source,
            divisions: board.divisions,
            predictions,
        }
    }
}
