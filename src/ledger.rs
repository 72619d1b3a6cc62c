//! Scoring ledger and undo history
//!
//! The ledger is the only path allowed to mutate team scores and a
//! round's per-team result map. Every application pushes a matching
//! [`UndoEntry`]; reversing the most recent entry restores both totals
//! exactly. The history is process-local and never persisted, so a
//! reload starts with an empty undo stack.

use thiserror::Error;

use crate::{
    round::{AnswerOutcome, Round, RoundId, UnitId},
    teams::{TeamId, TeamRegistry},
};

/// One reversible scoring action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoEntry {
    /// The round the delta was applied to
    pub round_id: RoundId,
    /// The unit that was answered
    pub unit_id: UnitId,
    /// The team the delta was applied to
    pub team_id: TeamId,
    /// The applied point delta
    pub delta: i64,
    /// The outcome that was recorded
    pub outcome: AnswerOutcome,
}

/// Errors reported by ledger operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Undo was requested with nothing to undo
    #[error("nothing to undo")]
    Empty,
    /// The round handed to `reverse_last` is not the entry's round
    #[error("undo entry belongs to a different round")]
    RoundMismatch,
}

/// The undo stack plus the score-mutation discipline around it
#[derive(Debug, Default, Clone)]
pub struct ScoreLedger {
    history: Vec<UndoEntry>,
}

impl ScoreLedger {
    /// Applies a scoring delta to the team total and the round's result
    /// map, pushing the matching undo entry
    ///
    /// A team removed since the round started is tolerated, matching
    /// [`ScoreLedger::reverse_last`]: the round map and the history
    /// still record the delta so the unit resolves, and reversal stays
    /// symmetric.
    pub fn apply(
        &mut self,
        teams: &mut TeamRegistry,
        round: &mut Round,
        unit_id: UnitId,
        team_id: TeamId,
        outcome: AnswerOutcome,
        delta: i64,
    ) {
        if let Some(team) = teams.get_mut(team_id) {
            team.score += delta;
        }
        *round.results_by_team.entry(team_id).or_insert(0) += delta;

        self.history.push(UndoEntry {
            round_id: round.id,
            unit_id,
            team_id,
            delta,
            outcome,
        });
    }

    /// The entry that would be reversed next
    pub fn last(&self) -> Option<&UndoEntry> {
        self.history.last()
    }

    /// Whether there is anything to undo
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Clears the history (on round end and on snapshot restore)
    pub(crate) fn clear(&mut self) {
        self.history.clear();
    }

    /// Pops and reverses the most recent entry
    ///
    /// A team removed since the apply is tolerated: its result-map entry
    /// was cascaded away with it, so only what still exists is reversed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Empty`] with nothing to undo and
    /// [`Error::RoundMismatch`] if `round` is not the entry's round;
    /// the entry stays on the stack in both cases.
    pub fn reverse_last(
        &mut self,
        teams: &mut TeamRegistry,
        round: &mut Round,
    ) -> Result<UndoEntry, Error> {
        let entry = self.history.last().ok_or(Error::Empty)?;
        if entry.round_id != round.id {
            return Err(Error::RoundMismatch);
        }
        let entry = self.history.pop().ok_or(Error::Empty)?;

        if let Some(team) = teams.get_mut(entry.team_id) {
            team.score -= entry.delta;
        }
        if let Some(total) = round.results_by_team.get_mut(&entry.team_id) {
            *total -= entry.delta;
        }
        Ok(entry)
    }
}
