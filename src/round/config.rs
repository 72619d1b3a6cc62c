//! Round configuration and saved presets
//!
//! A [`RoundConfig`] captures everything a presenter chooses before
//! starting a round. Field-level bounds are validated here; cross-field
//! rules that depend on the round type (sections required, offline
//! prompt required) are enforced by the round builder.

use std::{fmt::Display, str::FromStr, time::Duration};

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;

use crate::constants;

/// The three round variants the engine supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundKind {
    /// One multiple-choice question per unit, one team's turn each
    Normal,
    /// One set of rapid yes/no judgment items per unit
    #[serde(rename = "quickfire")]
    QuickFire,
    /// One self-graded turn per team, no question bank involved
    Offline,
}

type ValidationResult = garde::Result;

/// Validates that a duration falls within specified second bounds
fn validate_duration<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    field: &'static str,
    val: &Duration,
) -> ValidationResult {
    if (MIN_SECONDS..=MAX_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "{field} is outside of the bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

/// Validates the per-question time limit
fn validate_question_time(val: &Duration) -> ValidationResult {
    validate_duration::<
        { crate::constants::round::MIN_QUESTION_TIME },
        { crate::constants::round::MAX_QUESTION_TIME },
    >("question_time", val)
}

/// Configuration for one round, immutable once a round is built from it
#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RoundConfig {
    /// Display name of the round; an empty name gets a fallback at build time
    #[garde(length(max = constants::round::MAX_NAME_LENGTH))]
    pub name: String,
    /// Which round variant to run
    #[garde(skip)]
    pub kind: RoundKind,
    /// Points awarded for a correct answer
    #[garde(range(
        min = constants::round::MIN_POINTS_PER_CORRECT,
        max = constants::round::MAX_POINTS_PER_CORRECT,
    ))]
    pub points_per_correct: i64,
    /// Points applied for a wrong answer (zero or negative marking)
    #[garde(range(
        min = constants::round::MIN_POINTS_PER_WRONG,
        max = constants::round::MAX_POINTS_PER_WRONG,
    ))]
    pub points_per_wrong: i64,
    /// How many units each team gets a turn on
    #[garde(range(
        min = constants::round::MIN_QUESTIONS_PER_TEAM,
        max = constants::round::MAX_QUESTIONS_PER_TEAM,
    ))]
    pub questions_per_team: usize,
    /// Countdown duration per question unit
    #[garde(custom(|v, _| validate_question_time(v)))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub question_time: Duration,
    /// Section keys to draw questions from (ignored for offline rounds)
    #[garde(skip)]
    pub sections: Vec<String>,
    /// Yes/no items per quick-fire set (quick-fire rounds only)
    #[garde(range(
        min = constants::quickfire::MIN_SET_SIZE,
        max = constants::quickfire::MAX_SET_SIZE,
    ))]
    pub quick_fire_count: usize,
    /// Whether a quick-fire set scores all-or-none instead of per item
    #[garde(skip)]
    pub quick_fire_all_or_none: bool,
    /// Whether the presenter may skip a question (normal rounds only)
    #[garde(skip)]
    pub allow_skip: bool,
    /// Whether a team may pass (alias of skip, normal rounds only)
    #[garde(skip)]
    pub allow_pass: bool,
    /// Free-text prompt shown to every team (offline rounds only)
    #[garde(skip)]
    pub offline_prompt: String,
}

impl Default for RoundConfig {
    /// Defaults mirror the host tool's fresh-state settings
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: RoundKind::Normal,
            points_per_correct: 10,
            points_per_wrong: 0,
            questions_per_team: 1,
            question_time: Duration::from_secs(30),
            sections: Vec::new(),
            quick_fire_count: 5,
            quick_fire_all_or_none: false,
            allow_skip: true,
            allow_pass: true,
            offline_prompt: String::new(),
        }
    }
}

/// A unique identifier for a saved round preset
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct PresetId(Uuid);

impl PresetId {
    /// Creates a new random preset ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PresetId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for PresetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PresetId {
    type Err = uuid::Error;

    /// Parses a preset ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// A saved round configuration that can be started repeatedly
///
/// Presets form the round sequence: the host walks them in list order
/// and offers the first one without a completed, non-cleared round
/// instance as "next up".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundPreset {
    /// The preset's unique identifier
    pub id: PresetId,
    /// The configuration a round started from this preset uses
    pub config: RoundConfig,
}

impl RoundPreset {
    /// Wraps a configuration as a new saved preset
    pub fn new(config: RoundConfig) -> Self {
        Self {
            id: PresetId::new(),
            config,
        }
    }
}
