//! Quick-fire sets and their yes/no judgment items
//!
//! A quick-fire unit is a set of statements derived from bank questions:
//! for each underlying question, either its correct option or a random
//! wrong option becomes the displayed statement, and the team judges it
//! YES (correct) or NO (wrong). Items lock one at a time, driven by the
//! countdown; the set finalizes into a single score once every item is
//! locked.

use serde::{Deserialize, Serialize};

use crate::bank::{OptionKey, Question, QuestionId};

use super::AnswerOutcome;

/// A team's yes/no call on a displayed statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Judgement {
    /// The statement names the correct option
    Yes,
    /// The statement names a wrong option
    No,
}

/// One yes/no item within a quick-fire set
///
/// `statement_truth` is fixed when the round is built so that locking an
/// item never needs the question bank again; a bank reload mid-round
/// cannot change what was already on screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickFireItem {
    /// The underlying bank question the statement was derived from
    pub source: QuestionId,
    /// Which option is displayed as "the correct answer is …"
    pub statement_key: OptionKey,
    /// Whether the displayed statement actually names the correct option
    pub statement_truth: bool,
    /// The team's current (or locked-in) judgment
    pub selection: Option<Judgement>,
    /// Whether this item has been locked by the countdown
    pub locked: bool,
    /// Judged correctness, set at lock time
    pub is_correct: Option<bool>,
}

impl QuickFireItem {
    /// Draws the statement for a question: 50/50 its correct option or a
    /// uniformly-random wrong option, falling back to the correct option
    /// when the question has no wrong options
    pub fn draw(source: QuestionId, question: &Question, rng: &mut fastrand::Rng) -> Self {
        let wrong = question.wrong_options();
        let statement_key = if wrong.is_empty() || rng.bool() {
            question.correct_option
        } else {
            wrong[rng.usize(..wrong.len())]
        };

        Self {
            source,
            statement_truth: question.is_correct(statement_key),
            statement_key,
            selection: None,
            locked: false,
            is_correct: None,
        }
    }

    /// Locks the item, judging the current selection against the
    /// statement truth; no selection counts as incorrect
    pub(crate) fn lock(&mut self) {
        let expected = if self.statement_truth {
            Judgement::Yes
        } else {
            Judgement::No
        };
        self.is_correct = Some(self.selection == Some(expected));
        self.locked = true;
    }
}

/// The final score of a completed quick-fire set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetScore {
    /// Aggregate outcome recorded on the unit's answer record
    pub outcome: AnswerOutcome,
    /// Point delta applied to the team
    pub delta: i64,
    /// Number of correctly judged items
    pub correct_count: usize,
    /// Number of incorrectly judged items
    pub wrong_count: usize,
}

/// One quick-fire set: the items a single team judges on its turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickFireSet {
    /// The set's items, judged in order
    pub items: Vec<QuickFireItem>,
}

impl QuickFireSet {
    /// Builds a set by drawing one statement per underlying question
    pub fn draw<'a>(
        questions: impl IntoIterator<Item = (QuestionId, &'a Question)>,
        rng: &mut fastrand::Rng,
    ) -> Self {
        Self {
            items: questions
                .into_iter()
                .map(|(id, q)| QuickFireItem::draw(id, q, rng))
                .collect(),
        }
    }

    /// Index of the item currently being judged (first unlocked one)
    pub fn active_index(&self) -> Option<usize> {
        self.items.iter().position(|item| !item.locked)
    }

    /// Whether every item in the set has been locked
    pub fn is_complete(&self) -> bool {
        self.items.iter().all(|item| item.locked)
    }

    /// Number of items judged correctly so far
    pub fn correct_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.is_correct == Some(true))
            .count()
    }

    /// Scores the completed set under the round's quick-fire mode
    ///
    /// All-or-none: the full `points_per_correct` only for a perfect set,
    /// else `points_per_wrong`. Per-item: correct and wrong item counts
    /// multiplied by their respective point values.
    pub fn score(
        &self,
        all_or_none: bool,
        points_per_correct: i64,
        points_per_wrong: i64,
    ) -> SetScore {
        let correct_count = self.correct_count();
        let wrong_count = self.items.len() - correct_count;
        let all_correct = wrong_count == 0;

        let (outcome, delta) = if all_or_none {
            if all_correct {
                (AnswerOutcome::Correct, points_per_correct)
            } else {
                (AnswerOutcome::Wrong, points_per_wrong)
            }
        } else {
            let delta = correct_count as i64 * points_per_correct
                + wrong_count as i64 * points_per_wrong;
            let outcome = if delta > 0 {
                AnswerOutcome::Correct
            } else {
                AnswerOutcome::Wrong
            };
            (outcome, delta)
        };

        SetScore {
            outcome,
            delta,
            correct_count,
            wrong_count,
        }
    }
}
