//! Versioned state snapshots and the persistence seam
//!
//! A [`StateSnapshot`] is the complete serialized form of the engine:
//! teams, rounds, presets, the asked-exclusion set, the frozen
//! scoreboard, and the active session (including its countdown
//! deadline, so a mid-round reload resumes the clock). Undo history is
//! deliberately absent; it is process-local.
//!
//! Older saved states are upgraded through one explicit, version-keyed
//! path in [`StateSnapshot::from_json`] rather than scattered field
//! shims: version 1 states carried a `questions_per_round` total, which
//! is converted to `questions_per_team` using the saved team count.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::SystemTime;

use crate::{
    bank::QuestionId,
    host::ScoreboardSnapshot,
    round::{PresetId, Round, RoundConfig, RoundId, RoundKind, RoundPreset},
    session::ActiveSession,
    teams::{TeamId, TeamRegistry},
};

/// The snapshot format version this build writes
pub const SNAPSHOT_VERSION: u32 = 2;

/// Errors produced while reading a snapshot
#[derive(Debug, Error)]
pub enum Error {
    /// The snapshot is not valid JSON or misses required structure
    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),
    /// The snapshot was written by a newer build
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}

/// The full persisted state of the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Format version, [`SNAPSHOT_VERSION`] when written by this build
    pub version: u32,
    /// The team registry, scores included
    pub teams: TeamRegistry,
    /// All round records, newest first
    pub rounds: Vec<Round>,
    /// Saved presets, in sequence order
    pub presets: Vec<RoundPreset>,
    /// The asked-exclusion set
    pub asked: HashSet<QuestionId>,
    /// The in-progress session, if a round was active
    pub session: Option<ActiveSession>,
    /// The frozen scoreboard, if one was taken
    pub scoreboard: Option<ScoreboardSnapshot>,
}

impl StateSnapshot {
    /// Reads a snapshot of any supported version, upgrading as needed
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed input and
    /// [`Error::UnsupportedVersion`] for versions newer than
    /// [`SNAPSHOT_VERSION`].
    pub fn from_json(text: &str) -> Result<Self, Error> {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(default)]
            version: u32,
        }

        let probe: Probe = serde_json::from_str(text)?;
        match probe.version {
            // Version 1 states predate the version field.
            0 | 1 => Ok(serde_json::from_str::<SnapshotV1>(text)?.upgrade()),
            SNAPSHOT_VERSION => Ok(serde_json::from_str(text)?),
            newer => Err(Error::UnsupportedVersion(newer)),
        }
    }

    /// Serializes the snapshot
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

/// The persistence seam the engine saves through
///
/// Implementations wrap whatever key-value storage the host environment
/// offers (browser local storage, a file, a test buffer). Persistence
/// is best-effort; the engine never depends on a save having landed.
pub trait SnapshotStore {
    /// Returns the stored snapshot text, if any
    fn load(&self) -> Option<String>;

    /// Stores the snapshot text, replacing any previous one
    fn save(&mut self, snapshot: &str);
}

/// A [`SnapshotStore`] holding the snapshot in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    stored: Option<String>,
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Option<String> {
        self.stored.clone()
    }

    fn save(&mut self, snapshot: &str) {
        self.stored = Some(snapshot.to_owned());
    }
}

fn default_true() -> bool {
    true
}

fn default_points_per_correct() -> i64 {
    10
}

fn default_question_time() -> u64 {
    30
}

fn default_quick_fire_count() -> usize {
    5
}

/// Round configuration as version 1 states stored it
#[derive(Deserialize)]
struct RoundConfigV1 {
    #[serde(default)]
    name: String,
    #[serde(default = "RoundConfigV1::default_kind")]
    kind: RoundKind,
    #[serde(default = "default_points_per_correct")]
    points_per_correct: i64,
    #[serde(default)]
    points_per_wrong: i64,
    #[serde(default)]
    questions_per_team: Option<usize>,
    /// Legacy total per round, superseded by `questions_per_team`
    #[serde(default)]
    questions_per_round: Option<usize>,
    #[serde(default = "default_question_time")]
    question_time: u64,
    #[serde(default)]
    sections: Vec<String>,
    #[serde(default = "default_quick_fire_count")]
    quick_fire_count: usize,
    #[serde(default)]
    quick_fire_all_or_none: bool,
    #[serde(default = "default_true")]
    allow_skip: bool,
    #[serde(default = "default_true")]
    allow_pass: bool,
    #[serde(default)]
    offline_prompt: String,
}

impl RoundConfigV1 {
    fn default_kind() -> RoundKind {
        RoundKind::Normal
    }

    fn upgrade(self, team_count: usize) -> RoundConfig {
        let questions_per_team = self.questions_per_team.unwrap_or_else(|| {
            self.questions_per_round
                .map_or(1, |total| {
                    let teams = team_count.max(1);
                    ((total + teams / 2) / teams).clamp(1, 1000)
                })
        });

        RoundConfig {
            name: self.name,
            kind: self.kind,
            points_per_correct: self.points_per_correct,
            points_per_wrong: self.points_per_wrong,
            questions_per_team,
            question_time: std::time::Duration::from_secs(self.question_time),
            sections: self.sections,
            quick_fire_count: self.quick_fire_count,
            quick_fire_all_or_none: self.quick_fire_all_or_none,
            allow_skip: self.allow_skip,
            allow_pass: self.allow_pass,
            offline_prompt: self.offline_prompt,
        }
    }
}

#[derive(Deserialize)]
struct RoundV1 {
    id: RoundId,
    #[serde(default)]
    preset_id: Option<PresetId>,
    name: String,
    config: RoundConfigV1,
    created_at: SystemTime,
    questions_count: usize,
    #[serde(default)]
    results_by_team: HashMap<TeamId, i64>,
    #[serde(default)]
    completed_at: Option<SystemTime>,
    #[serde(default)]
    cleared_at: Option<SystemTime>,
    #[serde(default)]
    cleared_results: Option<HashMap<TeamId, i64>>,
}

#[derive(Deserialize)]
struct RoundPresetV1 {
    id: PresetId,
    config: RoundConfigV1,
}

#[derive(Deserialize)]
struct SnapshotV1 {
    #[serde(default)]
    teams: TeamRegistry,
    #[serde(default)]
    rounds: Vec<RoundV1>,
    #[serde(default)]
    presets: Vec<RoundPresetV1>,
    #[serde(default)]
    asked: HashSet<QuestionId>,
    #[serde(default)]
    session: Option<ActiveSession>,
    #[serde(default)]
    scoreboard: Option<ScoreboardSnapshot>,
}

impl SnapshotV1 {
    fn upgrade(self) -> StateSnapshot {
        let team_count = self.teams.len();
        StateSnapshot {
            version: SNAPSHOT_VERSION,
            rounds: self
                .rounds
                .into_iter()
                .map(|r| Round {
                    id: r.id,
                    preset_id: r.preset_id,
                    name: r.name,
                    config: r.config.upgrade(team_count),
                    created_at: r.created_at,
                    questions_count: r.questions_count,
                    results_by_team: r.results_by_team,
                    completed_at: r.completed_at,
                    cleared_at: r.cleared_at,
                    cleared_results: r.cleared_results,
                })
                .collect(),
            presets: self
                .presets
                .into_iter()
                .map(|p| RoundPreset {
                    id: p.id,
                    config: p.config.upgrade(team_count),
                })
                .collect(),
            teams: self.teams,
            asked: self.asked,
            session: self.session,
            scoreboard: self.scoreboard,
        }
    }
}
