//! Round records and the round builder
//!
//! A [`Round`] is the persisted record of one configured play-through:
//! its frozen configuration, per-team result map, and completion/cleared
//! stamps. [`build`] constructs a round together with its live
//! [`ActiveSession`](crate::session::ActiveSession), drawing questions
//! through the selector and reserving them in the asked-exclusion set at
//! build time.

pub mod config;
pub mod quickfire;

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;
use web_time::SystemTime;

use crate::{
    bank::{QuestionBank, QuestionId},
    selector,
    session::ActiveSession,
    teams::{TeamId, TeamRegistry},
};

pub use config::{PresetId, RoundConfig, RoundKind, RoundPreset};
pub use quickfire::{Judgement, QuickFireItem, QuickFireSet, SetScore};

/// A unique identifier for a round
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct RoundId(Uuid);

impl RoundId {
    /// Creates a new random round ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoundId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RoundId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RoundId {
    type Err = uuid::Error;

    /// Parses a round ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The stable identifier of one scoreable unit within a round
///
/// The format depends on the round kind and is part of the persisted
/// state: a normal unit is the underlying question id, a quick-fire unit
/// is `QFSET::<round id>::<n>` (1-based), and an offline unit is the id
/// of the team whose turn it is.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// The unit id of a normal round's question unit
    pub fn question(id: &QuestionId) -> Self {
        Self(id.as_str().to_owned())
    }

    /// The unit id of a quick-fire set, 1-based within its round
    pub fn quick_fire_set(round_id: RoundId, index: usize) -> Self {
        Self(format!("QFSET::{round_id}::{n}", n = index + 1))
    }

    /// The unit id of an offline turn, which is the team itself
    pub fn offline_turn(team_id: TeamId) -> Self {
        Self(team_id.to_string())
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// How a unit was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerOutcome {
    /// The answering team scored `points_per_correct`
    Correct,
    /// The answering team scored `points_per_wrong`
    Wrong,
    /// The countdown expired before a submission; no points
    Timeout,
    /// The presenter skipped or the team passed; no points
    Skip,
}

/// The immutable record of one answered unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// The team whose turn the unit was
    pub team_id: TeamId,
    /// The option label that was submitted, if any
    pub selected_key: Option<String>,
    /// How the unit was resolved
    pub outcome: AnswerOutcome,
    /// The point delta that was applied
    pub delta: i64,
    /// Extra context for the presentation layer (quick-fire item tally)
    pub detail: Option<String>,
}

/// The persisted record of one round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    /// The round's unique identifier
    pub id: RoundId,
    /// The preset this round was started from, if any
    pub preset_id: Option<PresetId>,
    /// Display name, defaulted to "Round N" when the config left it blank
    pub name: String,
    /// The configuration the round was built from, frozen
    pub config: RoundConfig,
    /// When the round was started
    pub created_at: SystemTime,
    /// Number of units in the round
    pub questions_count: usize,
    /// Accumulated per-team point deltas, mutated only by the ledger
    pub results_by_team: HashMap<TeamId, i64>,
    /// Set exactly once when the round ends
    pub completed_at: Option<SystemTime>,
    /// Set when the round's scores were explicitly cleared
    pub cleared_at: Option<SystemTime>,
    /// The result map as it stood at the moment of clearing
    pub cleared_results: Option<HashMap<TeamId, i64>>,
}

impl Round {
    /// Whether the round has ended
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Whether the round's scores were cleared; cleared rounds do not
    /// count toward team totals
    pub fn is_cleared(&self) -> bool {
        self.cleared_at.is_some()
    }

    /// Stamps the round as completed; a second call is a no-op
    pub(crate) fn complete(&mut self, now: SystemTime) {
        if self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
    }

    /// Snapshots the result map into `cleared_results`, zeroes it, and
    /// stamps `cleared_at`
    pub(crate) fn clear_scores(&mut self, now: SystemTime) {
        self.cleared_results = Some(self.results_by_team.clone());
        for delta in self.results_by_team.values_mut() {
            *delta = 0;
        }
        self.cleared_at = Some(now);
    }
}

/// Errors reported while building a round
#[derive(Debug, Error)]
pub enum BuildError {
    /// The configuration failed field-level validation
    #[error("invalid round configuration: {0}")]
    InvalidConfig(#[from] garde::Report),
    /// No teams are registered
    #[error("register at least one team before starting a round")]
    NoTeams,
    /// A non-offline round was started without any sections selected
    #[error("select at least one section")]
    NoSections,
    /// The selector could not supply enough unused questions
    #[error("not enough questions available ({available} of {needed} needed)")]
    NotEnoughQuestions {
        /// Unused questions the selector could find
        available: usize,
        /// The minimum the round kind requires
        needed: usize,
    },
    /// An offline round was started with a blank prompt
    #[error("enter an offline prompt")]
    EmptyPrompt,
    /// A selected question id no longer resolves in the bank
    #[error("question {0} not found in the bank")]
    UnknownQuestion(QuestionId),
}

/// Builds a round and its live session from a configuration
///
/// Chosen question ids are reserved in `asked` immediately, so an
/// abandoned round cannot leak its questions into the next one.
/// `round_number` is only used for the fallback display name.
///
/// # Errors
///
/// Returns a [`BuildError`] when the configuration fails validation, no
/// teams are registered, sections are missing or exhausted, or an
/// offline round has a blank prompt.
#[allow(clippy::too_many_lines)]
pub fn build(
    config: RoundConfig,
    preset_id: Option<PresetId>,
    round_number: usize,
    teams: &TeamRegistry,
    bank: &impl QuestionBank,
    asked: &mut HashSet<QuestionId>,
    rng: &mut fastrand::Rng,
    now: SystemTime,
) -> Result<(Round, ActiveSession), BuildError> {
    config.validate()?;

    let turn_order = teams.turn_order();
    if turn_order.is_empty() {
        return Err(BuildError::NoTeams);
    }

    let id = RoundId::new();
    let name = if config.name.trim().is_empty() {
        format!("Round {round_number}")
    } else {
        config.name.trim().to_owned()
    };

    let (config, units, unit_teams, quick_fire_sets) = match config.kind {
        RoundKind::Offline => {
            if config.offline_prompt.trim().is_empty() {
                return Err(BuildError::EmptyPrompt);
            }
            let config = RoundConfig {
                sections: Vec::new(),
                allow_skip: false,
                allow_pass: false,
                ..config
            };
            let units = turn_order.iter().copied().map(UnitId::offline_turn).collect();
            (config, units, turn_order.clone(), Vec::new())
        }
        RoundKind::Normal => {
            if config.sections.is_empty() {
                return Err(BuildError::NoSections);
            }
            let desired = config.questions_per_team * turn_order.len();
            let chosen = selector::select(bank, &config.sections, desired, asked, rng);
            if chosen.is_empty() {
                return Err(BuildError::NotEnoughQuestions {
                    available: 0,
                    needed: 1,
                });
            }

            asked.extend(chosen.iter().cloned());

            let unit_teams = (0..chosen.len())
                .map(|i| turn_order[i % turn_order.len()])
                .collect();
            let units = chosen.iter().map(UnitId::question).collect();
            (config, units, unit_teams, Vec::new())
        }
        RoundKind::QuickFire => {
            if config.sections.is_empty() {
                return Err(BuildError::NoSections);
            }
            let per_set = config.quick_fire_count;
            let desired = config.questions_per_team * turn_order.len() * per_set;
            let chosen = selector::select(bank, &config.sections, desired, asked, rng);
            if chosen.len() < per_set {
                return Err(BuildError::NotEnoughQuestions {
                    available: chosen.len(),
                    needed: per_set,
                });
            }

            // A trailing partial chunk is dropped and stays unreserved.
            let used = &chosen[..(chosen.len() / per_set) * per_set];
            asked.extend(used.iter().cloned());

            let mut sets = Vec::with_capacity(used.len() / per_set);
            for chunk in used.chunks_exact(per_set) {
                let mut questions = Vec::with_capacity(per_set);
                for qid in chunk {
                    let question = bank
                        .question(qid)
                        .ok_or_else(|| BuildError::UnknownQuestion(qid.clone()))?;
                    questions.push((qid.clone(), question));
                }
                sets.push(QuickFireSet::draw(questions, rng));
            }

            let units: Vec<UnitId> = (0..sets.len())
                .map(|i| UnitId::quick_fire_set(id, i))
                .collect();
            let unit_teams = (0..units.len())
                .map(|i| turn_order[i % turn_order.len()])
                .collect();
            let config = RoundConfig {
                allow_skip: false,
                allow_pass: false,
                ..config
            };
            (config, units, unit_teams, sets)
        }
    };

    let round = Round {
        id,
        preset_id,
        name,
        config,
        created_at: now,
        questions_count: units.len(),
        results_by_team: turn_order.iter().map(|tid| (*tid, 0)).collect(),
        completed_at: None,
        cleared_at: None,
        cleared_results: None,
    };
    let session = ActiveSession::new(id, units, unit_teams, quick_fire_sets);

    Ok((round, session))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::bank::InMemoryBank;

    fn bank(sections: &[(&str, usize)]) -> InMemoryBank {
        let value = serde_json::json!({
            "sections": sections
                .iter()
                .map(|(title, count)| serde_json::json!({
                    "title": title,
                    "questions": (1..=*count)
                        .map(|n| serde_json::json!({
                            "number": n,
                            "question": format!("{title} q{n}"),
                            "options": {"a": "yes", "b": "no", "c": "maybe"},
                            "correct_option": "a"
                        }))
                        .collect::<Vec<_>>()
                }))
                .collect::<Vec<_>>()
        });
        InMemoryBank::from_json(&value.to_string()).unwrap()
    }

    fn two_teams() -> TeamRegistry {
        let mut teams = TeamRegistry::default();
        teams.add("A", vec![]).unwrap();
        teams.add("B", vec![]).unwrap();
        teams
    }

    fn normal_config(sections: Vec<String>) -> RoundConfig {
        RoundConfig {
            questions_per_team: 2,
            sections,
            ..RoundConfig::default()
        }
    }

    #[test]
    fn test_normal_round_turn_rotation() {
        let bank = bank(&[("A", 10)]);
        let teams = two_teams();
        let mut asked = HashSet::new();
        let mut rng = fastrand::Rng::with_seed(5);

        let (round, session) = build(
            normal_config(bank.section_keys()),
            None,
            1,
            &teams,
            &bank,
            &mut asked,
            &mut rng,
            SystemTime::now(),
        )
        .unwrap();

        let order = teams.turn_order();
        assert_eq!(round.questions_count, 4);
        assert_eq!(
            session.unit_teams(),
            &[order[0], order[1], order[0], order[1]]
        );
        assert_eq!(round.name, "Round 1");
        assert_eq!(round.results_by_team.len(), 2);
        assert!(round.results_by_team.values().all(|d| *d == 0));
    }

    #[test]
    fn test_build_reserves_questions_immediately() {
        let bank = bank(&[("A", 4)]);
        let teams = two_teams();
        let mut asked = HashSet::new();
        let mut rng = fastrand::Rng::with_seed(5);

        build(
            normal_config(bank.section_keys()),
            None,
            1,
            &teams,
            &bank,
            &mut asked,
            &mut rng,
            SystemTime::now(),
        )
        .unwrap();
        assert_eq!(asked.len(), 4);

        // Pool exhausted: a second identical round cannot be built.
        let err = build(
            normal_config(bank.section_keys()),
            None,
            2,
            &teams,
            &bank,
            &mut asked,
            &mut rng,
            SystemTime::now(),
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::NotEnoughQuestions { .. }));
    }

    #[test]
    fn test_quick_fire_chunks_and_reserves_only_used() {
        let bank = bank(&[("A", 7)]);
        let teams = two_teams();
        let mut asked = HashSet::new();
        let mut rng = fastrand::Rng::with_seed(9);

        let config = RoundConfig {
            kind: RoundKind::QuickFire,
            questions_per_team: 1,
            quick_fire_count: 3,
            sections: bank.section_keys(),
            ..RoundConfig::default()
        };
        // 2 sets of 3 wanted (6 questions); 7 available, 6 reserved.
        let (round, session) = build(
            config,
            None,
            1,
            &teams,
            &bank,
            &mut asked,
            &mut rng,
            SystemTime::now(),
        )
        .unwrap();

        assert_eq!(round.questions_count, 2);
        assert_eq!(asked.len(), 6);
        assert_eq!(session.quick_fire_sets().len(), 2);
        assert!(session.quick_fire_sets().iter().all(|s| s.items.len() == 3));
        assert_eq!(
            session.units()[0].as_str(),
            format!("QFSET::{id}::1", id = round.id)
        );
        assert!(!round.config.allow_skip);
    }

    #[test]
    fn test_quick_fire_needs_one_full_set() {
        let bank = bank(&[("A", 2)]);
        let teams = two_teams();
        let mut asked = HashSet::new();
        let mut rng = fastrand::Rng::with_seed(9);

        let config = RoundConfig {
            kind: RoundKind::QuickFire,
            quick_fire_count: 5,
            sections: bank.section_keys(),
            ..RoundConfig::default()
        };
        let err = build(
            config,
            None,
            1,
            &teams,
            &bank,
            &mut asked,
            &mut rng,
            SystemTime::now(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            BuildError::NotEnoughQuestions {
                available: 2,
                needed: 5
            }
        ));
        // Nothing reserved on failure.
        assert!(asked.is_empty());
    }

    #[test]
    fn test_offline_round_one_unit_per_team() {
        let bank = bank(&[]);
        let teams = two_teams();
        let mut asked = HashSet::new();
        let mut rng = fastrand::Rng::with_seed(2);

        let config = RoundConfig {
            kind: RoundKind::Offline,
            offline_prompt: "Name all the moons".into(),
            ..RoundConfig::default()
        };
        let (round, session) = build(
            config,
            None,
            3,
            &teams,
            &bank,
            &mut asked,
            &mut rng,
            SystemTime::now(),
        )
        .unwrap();

        let order = teams.turn_order();
        assert_eq!(round.questions_count, 2);
        assert_eq!(session.unit_teams(), order.as_slice());
        assert_eq!(session.units()[0].as_str(), order[0].to_string());
        assert!(asked.is_empty());
    }

    #[test]
    fn test_offline_round_requires_prompt() {
        let bank = bank(&[]);
        let teams = two_teams();
        let mut asked = HashSet::new();
        let mut rng = fastrand::Rng::with_seed(2);

        let config = RoundConfig {
            kind: RoundKind::Offline,
            offline_prompt: "   ".into(),
            ..RoundConfig::default()
        };
        let err = build(
            config,
            None,
            1,
            &teams,
            &bank,
            &mut asked,
            &mut rng,
            SystemTime::now(),
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::EmptyPrompt));
    }

    #[test]
    fn test_no_teams_rejected() {
        let bank = bank(&[("A", 4)]);
        let teams = TeamRegistry::default();
        let mut asked = HashSet::new();
        let mut rng = fastrand::Rng::with_seed(2);

        let err = build(
            normal_config(bank.section_keys()),
            None,
            1,
            &teams,
            &bank,
            &mut asked,
            &mut rng,
            SystemTime::now(),
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::NoTeams));
    }
}
