//! Participant rank resolution.
//!
//! Rankings show up in many places depending on the upstream revision. The
//! candidate list below is ordered from the most specific source to the least;
//! the first candidate holding a valid ranking wins, even when a later one
//! would also be valid.

use crate::extract::{extract_with, resolve_node};
use crate::models::Rank;
use crate::raw::RawValue;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Rank locations inside a participant object, in priority order
const PARTICIPANT_RANK_PATHS: &[&[&str]] = &[
    // direct fields
    &["ranking"],
    &["rank"],
    &["currentRank"],
    &["singlesRanking"],
    &["atpRanking"],
    &["wtaRanking"],
    // nested ranking objects
    &["ranking", "rank"],
    &["ranking", "position"],
    &["rankings", "current"],
    // singles-specific nesting
    &["ranking", "singles"],
    &["rankings", "singles"],
    &["rankings", "singles", "rank"],
    &["singles", "rank"],
    &["singles", "ranking"],
];

/// Fixture-level rank keys; `{}` is replaced by the participant prefix
const FIXTURE_RANK_TEMPLATES: &[&[&str]] =
    &[&["{}Rank"], &["{}Ranking"], &["{}_rank"], &["{}", "ranking"]];

/// Identifier locations inside a participant object
const PARTICIPANT_ID_PATHS: &[&[&str]] = &[&["id"], &["playerId"], &["player_id"], &["key"]];

/// Fixture-level identifier keys; `{}` is replaced by the participant prefix
const FIXTURE_ID_TEMPLATES: &[&[&str]] = &[&["{}Id"], &["{}_id"]];

/// Wrappers a lookup payload may put around the player object
const LOOKUP_ROOTS: &[&[&str]] = &[&["data"], &["player"], &["data", "player"], &[]];

/// Remote per-participant lookup used when a record carries no rank
#[async_trait::async_trait]
pub trait RankLookup: Send + Sync {
    /// First parseable payload for the participant, trying endpoints in order
    async fn lookup(&self, division: &str, participant_id: &str) -> Option<Value>;
}

/// Cached outcome of a remote lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachedRank {
    Found(Rank),
    NotFound,
}

/// Per-run cache of remote lookups, keyed by participant identifier.
///
/// Created empty for each aggregation run and dropped with it.
#[derive(Debug, Default)]
pub struct RankCache {
    entries: HashMap<String, CachedRank>,
    remote_lookups: usize,
}

impl RankCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, participant_id: &str) -> Option<CachedRank> {
        self.entries.get(participant_id).copied()
    }

    pub fn insert(&mut self, participant_id: &str, rank: CachedRank) {
        self.entries.insert(participant_id.to_string(), rank);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of lookups that actually went to the remote source
    pub fn remote_lookups(&self) -> usize {
        self.remote_lookups
    }
}

/// Which side of a fixture a participant is on
#[derive(Debug, Clone, Copy)]
pub struct ParticipantRef<'a> {
    /// The participant object, if the record has one
    pub participant: Option<&'a Value>,
    /// The whole fixture record
    pub fixture: &'a Value,
    /// Key prefix for fixture-level fields, e.g. "player1"
    pub prefix: &'a str,
}

fn expand(templates: &[&[&str]], prefix: &str) -> Vec<Vec<String>> {
    templates
        .iter()
        .map(|path| {
            path.iter()
                .map(|segment| segment.replace("{}", prefix))
                .collect()
        })
        .collect()
}

fn valid_rank(value: RawValue<'_>) -> Option<Rank> {
    value.as_integer().and_then(Rank::new)
}

/// First valid rank embedded in the fixture record
pub fn embedded_rank(side: ParticipantRef<'_>) -> Option<Rank> {
    if let Some(participant) = side.participant {
        if let Some(rank) = extract_with(participant, PARTICIPANT_RANK_PATHS, valid_rank) {
            return Some(rank);
        }
    }
    extract_with(side.fixture, &expand(FIXTURE_RANK_TEMPLATES, side.prefix), valid_rank)
}

/// Stable participant identifier, if the record has one
pub fn participant_id(side: ParticipantRef<'_>) -> Option<String> {
    if let Some(participant) = side.participant {
        if let Some(id) = extract_with(participant, PARTICIPANT_ID_PATHS, |v| v.as_identifier()) {
            return Some(id);
        }
    }
    extract_with(side.fixture, &expand(FIXTURE_ID_TEMPLATES, side.prefix), |v| v.as_identifier())
}

/// First valid rank in a lookup payload
pub fn rank_from_payload(payload: &Value) -> Option<Rank> {
    LOOKUP_ROOTS.iter().find_map(|root| {
        let node = resolve_node(payload, *root)?;
        extract_with(node, PARTICIPANT_RANK_PATHS, valid_rank)
    })
}

/// Resolves ranks from records, falling back to a remote lookup
pub struct RankResolver<'a> {
    lookup: Option<&'a dyn RankLookup>,
}

impl<'a> RankResolver<'a> {
    pub fn new(lookup: Option<&'a dyn RankLookup>) -> Self {
        Self { lookup }
    }

    /// Resolver that never goes to the network
    pub fn offline() -> Self {
        Self { lookup: None }
    }

    /// Rank of one participant. Never fails: the worst case is `Unranked`.
    pub async fn resolve(
        &self,
        cache: &mut RankCache,
        division: &str,
        side: ParticipantRef<'_>,
    ) -> Rank {
        if let Some(rank) = embedded_rank(side) {
            return rank;
        }

        let Some(id) = participant_id(side) else {
            return Rank::Unranked;
        };

        match cache.get(&id) {
            Some(CachedRank::Found(rank)) => return rank,
            Some(CachedRank::NotFound) => return Rank::Unranked,
            None => {}
        }

        let Some(lookup) = self.lookup else {
            return Rank::Unranked;
        };

        cache.remote_lookups += 1;
        let found = lookup.lookup(division, &id).await.as_ref().and_then(rank_from_payload);
        debug!("Rank lookup for participant {}: {:?}", id, found);

        match found {
            Some(rank) => {
                cache.insert(&id, CachedRank::Found(rank));
                rank
            }
            None => {
                cache.insert(&id, CachedRank::NotFound);
                Rank::Unranked
            }
        }
    }
}
