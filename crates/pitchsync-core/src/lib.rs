//! Core domain model for the pitchsync event/stats pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CRATE_NAME: &str = "pitchsync-core";

/// Canonical classification of a match event, independent of which vendor
/// reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventType {
    Goal,
    Penalty,
    MissedPenalty,
    /// Credited to the scoring team, never to the scorer's personal tally.
    OwnGoal,
    YellowCard,
    RedCard,
    Substitution,
    /// Explicit "played in this match" marker emitted from lineup records.
    Appearance,
}

impl EventType {
    /// Event types that put the ball in the net for the actor's team and
    /// count toward the scorer's personal `goals`.
    pub fn counts_as_goal(self) -> bool {
        matches!(self, EventType::Goal | EventType::Penalty)
    }

    /// Event types whose `assist_player_id` credits an assist.
    pub fn carries_assist(self) -> bool {
        matches!(self, EventType::Goal | EventType::Penalty)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventType::Goal => "goal",
            EventType::Penalty => "penalty",
            EventType::MissedPenalty => "missed-penalty",
            EventType::OwnGoal => "own-goal",
            EventType::YellowCard => "yellow-card",
            EventType::RedCard => "red-card",
            EventType::Substitution => "substitution",
            EventType::Appearance => "appearance",
        };
        f.write_str(label)
    }
}

/// A `(competitionId, seasonLabel)` pair: the unit of independent,
/// concurrently-runnable aggregation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeId {
    pub competition_id: String,
    pub season: String,
}

impl ScopeId {
    pub fn new(competition_id: impl Into<String>, season: impl Into<String>) -> Self {
        Self {
            competition_id: competition_id.into(),
            season: season.into(),
        }
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.competition_id, self.season)
    }
}

/// One occurrence inside a match, normalized from a vendor payload.
///
/// Immutable once normalized: the dedup stage either keeps or discards a
/// record, it never edits one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub match_id: String,
    pub scope: ScopeId,
    pub minute: u16,
    /// Injury time. `None` when the vendor omitted it; a genuine `Some(0)`
    /// is distinct and must stay distinct to avoid false key collisions.
    pub minute_extra: Option<u16>,
    pub event_type: EventType,
    /// Vendor sub-classification, e.g. "Normal Goal" or "Penalty Missed".
    pub detail: Option<String>,
    pub team_id: String,
    /// The actor: scorer, carded player, substituted player. Absent only for
    /// team-level events.
    pub player_id: Option<String>,
    pub player_name: Option<String>,
    /// Assisting player on goal-type events.
    pub assist_player_id: Option<String>,
    pub assist_player_name: Option<String>,
    pub source_id: String,
    /// The vendor's own row id, kept for traceability and tie-breaking.
    pub source_record_id: String,
    pub ingested_at: Option<DateTime<Utc>>,
}

impl MatchEvent {
    /// Derive the natural key identifying the real-world occurrence this
    /// record describes, independent of vendor and ingestion time.
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            match_id: self.match_id.clone(),
            player_id: self.player_id.clone(),
            event_type: self.event_type,
            minute: self.minute,
            minute_extra: self.minute_extra,
            detail: self.detail.clone(),
        }
    }
}

/// Deterministic identity of a real-world event occurrence. Two events with
/// equal keys are the same occurrence regardless of source.
///
/// `event_type` is part of the key, so an own goal never merges with a
/// regular goal at the same minute by the same player.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub match_id: String,
    pub player_id: Option<String>,
    pub event_type: EventType,
    pub minute: u16,
    pub minute_extra: Option<u16>,
    pub detail: Option<String>,
}

/// Named statistic on a stat line, used by reconciliation reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatName {
    Goals,
    Assists,
    YellowCards,
    RedCards,
    Appearances,
}

impl fmt::Display for StatName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StatName::Goals => "goals",
            StatName::Assists => "assists",
            StatName::YellowCards => "yellow_cards",
            StatName::RedCards => "red_cards",
            StatName::Appearances => "appearances",
        };
        f.write_str(label)
    }
}

/// One row per `(playerId, competitionId, seasonLabel)`, fully recomputed
/// from the deduplicated event set on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatLine {
    pub player_id: String,
    pub player_name: Option<String>,
    pub scope: ScopeId,
    pub goals: u32,
    pub assists: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
    pub appearances: u32,
}

impl PlayerStatLine {
    pub fn empty(player_id: impl Into<String>, scope: ScopeId) -> Self {
        Self {
            player_id: player_id.into(),
            player_name: None,
            scope,
            goals: 0,
            assists: 0,
            yellow_cards: 0,
            red_cards: 0,
            appearances: 0,
        }
    }

    pub fn stat(&self, name: StatName) -> u32 {
        match name {
            StatName::Goals => self.goals,
            StatName::Assists => self.assists,
            StatName::YellowCards => self.yellow_cards,
            StatName::RedCards => self.red_cards,
            StatName::Appearances => self.appearances,
        }
    }
}

/// Ephemeral reconciliation finding; reported, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationDiff {
    pub player_id: String,
    pub stat: StatName,
    pub computed: i64,
    pub official: i64,
    /// `computed - official`.
    pub delta: i64,
}

/// Operational input for one pipeline run over a single scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpec {
    pub scope: ScopeId,
    /// Source ids to pull from, in registry trust order.
    pub sources: Vec<String>,
    pub rate_limit_ms: u64,
    pub max_retries: usize,
}

/// Whether a scope run saw every page it asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Clean,
    /// At least one page was skipped after exhausting retries; a later run
    /// should retry the scope.
    Partial,
}

/// Operator-facing summary emitted at the end of every scope run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub scope: ScopeId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub events_fetched: usize,
    pub invalid_events: usize,
    pub duplicates_collapsed: usize,
    pub stat_lines_written: usize,
    pub reconciliation_diffs: usize,
    pub skipped_pages: Vec<SkippedPage>,
}

/// A page the source client gave up on after exhausting retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPage {
    pub source_id: String,
    pub offset: u32,
    pub reason: String,
}
