//! The live round session state machine
//!
//! An [`ActiveSession`] is the in-progress instantiation of a round:
//! the ordered units, whose turn each unit is, the current position and
//! stage, the per-unit answer records, and the countdown. Every scoring
//! transition funnels through the [`ScoreLedger`], and every transition
//! either fully applies or leaves the session untouched.
//!
//! Stages: a unit starts `ready` (queued, clock held so the presenter
//! can set up), moves to `shown` (clock running, team may answer), locks
//! when an answer record is created, and leaves via `advance`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::SystemTime;

use crate::{
    bank::{QuestionBank, QuestionId},
    ledger::ScoreLedger,
    round::{AnswerOutcome, AnswerRecord, Judgement, QuickFireSet, Round, RoundId, RoundKind, UnitId},
    teams::{TeamId, TeamRegistry},
    timer::Countdown,
};

/// Presentation stage of the current unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Unit queued, countdown held, answer hidden
    Ready,
    /// Unit on screen, countdown running
    Shown,
}

/// Errors reported by session transitions
///
/// All of these are recoverable rejections: the operation was a no-op
/// and the session is unchanged.
#[derive(Debug, Error)]
pub enum Error {
    /// The current unit already has an answer record
    #[error("already locked")]
    AlreadyLocked,
    /// Submit was called with no pending selection
    #[error("select an option first")]
    NothingSelected,
    /// An offline submission used an unrecognized self-graded value
    #[error("\"{0}\" is not a valid self-graded outcome")]
    InvalidSelection(String),
    /// Submit was called on a quick-fire round
    #[error("quick fire locks items on the timer, not on submit")]
    SubmitNotSupported,
    /// Skip is disabled by config or unsupported by the round kind
    #[error("skip is not available in this round")]
    SkipNotAvailable,
    /// Pass is disabled by config or unsupported by the round kind
    #[error("pass is not available in this round")]
    PassNotAvailable,
    /// Advance was called before the current unit was answered
    #[error("finish the current unit before advancing")]
    NotAnswered,
    /// A judgement was selected outside a quick-fire round
    #[error("there is no quick fire item to judge")]
    NotQuickFire,
    /// The current unit's question vanished from the bank
    #[error("question {0} not found in the bank")]
    UnknownQuestion(QuestionId),
}

/// What `advance` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved to the next unit, back in the `ready` stage
    Next,
    /// The answered unit was the last one; the round is over
    Completed,
}

/// The live state of one in-progress round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSession {
    round_id: RoundId,
    units: Vec<UnitId>,
    unit_teams: Vec<TeamId>,
    position: usize,
    stage: Stage,
    revealed: bool,
    answered: HashMap<UnitId, AnswerRecord>,
    selected_key: Option<String>,
    quick_fire_sets: Vec<QuickFireSet>,
    countdown: Option<Countdown>,
}

impl ActiveSession {
    pub(crate) fn new(
        round_id: RoundId,
        units: Vec<UnitId>,
        unit_teams: Vec<TeamId>,
        quick_fire_sets: Vec<QuickFireSet>,
    ) -> Self {
        Self {
            round_id,
            units,
            unit_teams,
            position: 0,
            stage: Stage::Ready,
            revealed: false,
            answered: HashMap::new(),
            selected_key: None,
            quick_fire_sets,
            countdown: None,
        }
    }

    /// The round this session belongs to
    pub fn round_id(&self) -> RoundId {
        self.round_id
    }

    /// All unit ids, in play order
    pub fn units(&self) -> &[UnitId] {
        &self.units
    }

    /// Whose turn each unit is, parallel to [`ActiveSession::units`]
    pub fn unit_teams(&self) -> &[TeamId] {
        &self.unit_teams
    }

    /// Index of the current unit
    pub fn position(&self) -> usize {
        self.position
    }

    /// Stage of the current unit
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Whether the current unit's resolution is on screen
    pub fn revealed(&self) -> bool {
        self.revealed
    }

    /// The pending, not-yet-submitted selection
    pub fn selected_key(&self) -> Option<&str> {
        self.selected_key.as_deref()
    }

    /// Answer records by unit id
    pub fn answered(&self) -> &HashMap<UnitId, AnswerRecord> {
        &self.answered
    }

    /// Per-unit quick-fire sets; empty for other round kinds
    pub fn quick_fire_sets(&self) -> &[QuickFireSet] {
        &self.quick_fire_sets
    }

    /// The running countdown, if any
    pub fn countdown(&self) -> Option<&Countdown> {
        self.countdown.as_ref()
    }

    /// The current unit's id
    pub fn current_unit(&self) -> &UnitId {
        &self.units[self.position]
    }

    /// The team whose turn the current unit is
    pub fn current_team(&self) -> TeamId {
        self.unit_teams[self.position]
    }

    /// The current unit's answer record, once locked
    pub fn current_record(&self) -> Option<&AnswerRecord> {
        self.answered.get(self.current_unit())
    }

    /// Whether the current unit is locked
    pub fn is_current_locked(&self) -> bool {
        self.current_record().is_some()
    }

    /// Whether the current unit is the round's last
    pub fn is_last_unit(&self) -> bool {
        self.position + 1 >= self.units.len()
    }

    /// The countdown key for the current unit: the unit id itself, or
    /// `<unit>::<item index>` for the active quick-fire item. `None`
    /// when nothing is left to time on this unit.
    fn timer_unit_key(&self) -> Option<String> {
        let unit = self.current_unit();
        if self.answered.contains_key(unit) {
            return None;
        }
        if self.quick_fire_sets.is_empty() {
            Some(unit.to_string())
        } else {
            let set = self.quick_fire_sets.get(self.position)?;
            let item = set.active_index()?;
            Some(format!("{unit}::{item}"))
        }
    }

    /// Arms, restarts, or clears the countdown to match the current
    /// timer unit key
    ///
    /// Held in the `ready` stage and cleared once the unit has nothing
    /// left to time. A key change always restarts; `force` restarts
    /// even under the same key (used when undo re-opens a unit).
    pub(crate) fn sync_countdown(
        &mut self,
        question_time: std::time::Duration,
        now: SystemTime,
        force: bool,
    ) {
        if self.stage == Stage::Ready {
            self.countdown = None;
            return;
        }
        match self.timer_unit_key() {
            None => self.countdown = None,
            Some(key) => {
                let stale = self
                    .countdown
                    .as_ref()
                    .is_none_or(|c| c.unit_key() != key);
                if stale || force {
                    self.countdown = Some(Countdown::arm(key, question_time, now));
                }
            }
        }
    }

    /// Reveals the current unit: `ready` becomes `shown` and the
    /// countdown starts. A repeat call is a no-op.
    pub fn reveal(&mut self, question_time: std::time::Duration, now: SystemTime) {
        if self.stage == Stage::Shown {
            return;
        }
        self.stage = Stage::Shown;
        self.countdown = None;
        self.sync_countdown(question_time, now, true);
    }

    /// Records a pending option choice; repeat calls overwrite it
    ///
    /// No scoring side effect. For offline rounds the key is one of
    /// `correct`, `wrong`, or `skip`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyLocked`] once the unit is answered.
    pub fn select_option(&mut self, key: &str) -> Result<(), Error> {
        if self.is_current_locked() {
            return Err(Error::AlreadyLocked);
        }
        self.selected_key = Some(key.to_owned());
        Ok(())
    }

    /// Records the yes/no call on the active quick-fire item; repeat
    /// calls overwrite it until the item locks
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotQuickFire`] outside a quick-fire round or
    /// with no item left, and [`Error::AlreadyLocked`] once the whole
    /// set is answered.
    pub fn select_judgement(&mut self, judgement: Judgement) -> Result<(), Error> {
        if self.is_current_locked() {
            return Err(Error::AlreadyLocked);
        }
        let set = self
            .quick_fire_sets
            .get_mut(self.position)
            .ok_or(Error::NotQuickFire)?;
        let index = set.active_index().ok_or(Error::NotQuickFire)?;
        set.items[index].selection = Some(judgement);
        Ok(())
    }

    /// Submits the pending selection, locking the current unit
    ///
    /// Normal rounds judge the selection against the bank's correct
    /// option; offline rounds take the presenter's self-graded value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SubmitNotSupported`] for quick-fire rounds,
    /// [`Error::AlreadyLocked`] or [`Error::NothingSelected`] on a bad
    /// state, [`Error::InvalidSelection`] for an unrecognized offline
    /// value, and [`Error::UnknownQuestion`] if the bank lost the
    /// current question. Nothing is mutated on any error.
    pub fn submit(
        &mut self,
        round: &mut Round,
        teams: &mut TeamRegistry,
        ledger: &mut ScoreLedger,
        bank: &impl QuestionBank,
    ) -> Result<&AnswerRecord, Error> {
        if round.config.kind == RoundKind::QuickFire {
            return Err(Error::SubmitNotSupported);
        }
        if self.is_current_locked() {
            return Err(Error::AlreadyLocked);
        }
        let selected = self.selected_key.clone().ok_or(Error::NothingSelected)?;

        let (outcome, delta) = match round.config.kind {
            RoundKind::Normal => {
                let qid = QuestionId::from(self.current_unit().as_str().to_owned());
                let question = bank
                    .question(&qid)
                    .ok_or_else(|| Error::UnknownQuestion(qid.clone()))?;
                if selected == question.correct_option.to_string() {
                    (AnswerOutcome::Correct, round.config.points_per_correct)
                } else {
                    (AnswerOutcome::Wrong, round.config.points_per_wrong)
                }
            }
            RoundKind::Offline => match selected.as_str() {
                "correct" => (AnswerOutcome::Correct, round.config.points_per_correct),
                "wrong" => (AnswerOutcome::Wrong, round.config.points_per_wrong),
                "skip" => (AnswerOutcome::Skip, 0),
                other => return Err(Error::InvalidSelection(other.to_owned())),
            },
            RoundKind::QuickFire => return Err(Error::SubmitNotSupported),
        };

        Ok(self.lock_current(round, teams, ledger, Some(selected), outcome, delta, None))
    }

    /// Skips the current unit for zero points (presenter action)
    ///
    /// # Errors
    ///
    /// Returns [`Error::SkipNotAvailable`] when disabled by config or
    /// for quick-fire/offline rounds, and [`Error::AlreadyLocked`] once
    /// answered.
    pub fn skip(
        &mut self,
        round: &mut Round,
        teams: &mut TeamRegistry,
        ledger: &mut ScoreLedger,
    ) -> Result<&AnswerRecord, Error> {
        if round.config.kind != RoundKind::Normal || !round.config.allow_skip {
            return Err(Error::SkipNotAvailable);
        }
        if self.is_current_locked() {
            return Err(Error::AlreadyLocked);
        }
        Ok(self.lock_current(round, teams, ledger, None, AnswerOutcome::Skip, 0, None))
    }

    /// Passes the team's turn; behaviorally a skip under its own gate
    ///
    /// # Errors
    ///
    /// Returns [`Error::PassNotAvailable`] when disabled by config or
    /// for quick-fire/offline rounds, and [`Error::AlreadyLocked`] once
    /// answered.
    pub fn pass(
        &mut self,
        round: &mut Round,
        teams: &mut TeamRegistry,
        ledger: &mut ScoreLedger,
    ) -> Result<&AnswerRecord, Error> {
        if round.config.kind != RoundKind::Normal || !round.config.allow_pass {
            return Err(Error::PassNotAvailable);
        }
        if self.is_current_locked() {
            return Err(Error::AlreadyLocked);
        }
        Ok(self.lock_current(round, teams, ledger, None, AnswerOutcome::Skip, 0, None))
    }

    /// Handles countdown expiry for the current unit; idempotent
    ///
    /// Normal rounds lock the unit as a timeout with whatever selection
    /// was pending, for zero points. Quick-fire rounds lock exactly the
    /// active item and finalize the set's score once its last item
    /// locks. Offline rounds treat the clock as advisory: it stops, but
    /// no outcome is recorded. A unit that is already answered makes
    /// this a no-op. A team removed mid-round is tolerated, so the unit
    /// always resolves.
    pub fn timeout(
        &mut self,
        round: &mut Round,
        teams: &mut TeamRegistry,
        ledger: &mut ScoreLedger,
    ) {
        if self.is_current_locked() {
            self.countdown = None;
            return;
        }

        match round.config.kind {
            RoundKind::Offline => {
                self.countdown = None;
            }
            RoundKind::Normal => {
                let selected = self.selected_key.clone();
                self.lock_current(
                    round,
                    teams,
                    ledger,
                    selected,
                    AnswerOutcome::Timeout,
                    0,
                    None,
                );
            }
            RoundKind::QuickFire => {
                let Some(set) = self.quick_fire_sets.get_mut(self.position) else {
                    self.countdown = None;
                    return;
                };
                if let Some(index) = set.active_index() {
                    set.items[index].lock();
                }
                self.countdown = None;

                let set = &self.quick_fire_sets[self.position];
                if set.is_complete() {
                    let score = set.score(
                        round.config.quick_fire_all_or_none,
                        round.config.points_per_correct,
                        round.config.points_per_wrong,
                    );
                    let detail = format!(
                        "{correct} correct \u{2022} {wrong} wrong",
                        correct = score.correct_count,
                        wrong = score.wrong_count,
                    );
                    self.lock_current(
                        round,
                        teams,
                        ledger,
                        None,
                        score.outcome,
                        score.delta,
                        Some(detail),
                    );
                }
            }
        }
    }

    /// Moves past the answered current unit
    ///
    /// Returns [`Advance::Completed`] on the last unit; ending the
    /// round record is the caller's responsibility.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAnswered`] while the current unit is open.
    pub fn advance(&mut self) -> Result<Advance, Error> {
        if !self.is_current_locked() {
            return Err(Error::NotAnswered);
        }
        if self.is_last_unit() {
            return Ok(Advance::Completed);
        }
        self.position += 1;
        self.stage = Stage::Ready;
        self.revealed = false;
        self.selected_key = None;
        self.countdown = None;
        Ok(Advance::Next)
    }

    /// Removes a unit's answer record after its ledger entry was
    /// reversed; returns whether it was the current unit, in which case
    /// the lock state is reset so it can be re-answered
    pub(crate) fn clear_answer(&mut self, unit: &UnitId) -> bool {
        self.answered.remove(unit);
        let current = self.current_unit() == unit;
        if current {
            self.revealed = false;
            self.selected_key = None;
            self.countdown = None;
        }
        current
    }

    /// Applies a resolution through the ledger and locks the unit
    #[allow(clippy::too_many_arguments)]
    fn lock_current(
        &mut self,
        round: &mut Round,
        teams: &mut TeamRegistry,
        ledger: &mut ScoreLedger,
        selected_key: Option<String>,
        outcome: AnswerOutcome,
        delta: i64,
        detail: Option<String>,
    ) -> &AnswerRecord {
        let unit = self.current_unit().clone();
        let team_id = self.current_team();

        ledger.apply(teams, round, unit.clone(), team_id, outcome, delta);

        let record = AnswerRecord {
            team_id,
            selected_key,
            outcome,
            delta,
            detail,
        };
        self.revealed = true;
        self.countdown = None;
        self.answered.entry(unit).or_insert(record)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{
        bank::InMemoryBank,
        round::{self, RoundConfig},
    };
    use std::{collections::HashSet, time::Duration};

    fn bank(count: usize) -> InMemoryBank {
        let value = serde_json::json!({
            "sections": [{
                "title": "S",
                "questions": (1..=count)
                    .map(|n| serde_json::json!({
                        "number": n,
                        "question": format!("q{n}"),
                        "options": {"a": "right", "b": "wrong", "c": "also wrong"},
                        "correct_option": "a"
                    }))
                    .collect::<Vec<_>>()
            }]
        });
        InMemoryBank::from_json(&value.to_string()).unwrap()
    }

    fn two_teams() -> TeamRegistry {
        let mut teams = TeamRegistry::default();
        teams.add("A", vec![]).unwrap();
        teams.add("B", vec![]).unwrap();
        teams
    }

    fn start_normal(
        bank: &InMemoryBank,
        teams: &TeamRegistry,
        config: RoundConfig,
    ) -> (Round, ActiveSession) {
        let mut asked = HashSet::new();
        let mut rng = fastrand::Rng::with_seed(17);
        round::build(
            RoundConfig {
                sections: bank.section_keys(),
                ..config
            },
            None,
            1,
            teams,
            bank,
            &mut asked,
            &mut rng,
            SystemTime::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_correct_submit_scores_and_locks() {
        let bank = bank(4);
        let mut teams = two_teams();
        let config = RoundConfig {
            questions_per_team: 2,
            points_per_wrong: -5,
            ..RoundConfig::default()
        };
        let (mut round, mut session) = start_normal(&bank, &teams, config);
        let mut ledger = ScoreLedger::default();
        let now = SystemTime::now();

        session.reveal(Duration::from_secs(30), now);
        assert!(session.countdown().is_some());

        session.select_option("a").unwrap();
        let record = session
            .submit(&mut round, &mut teams, &mut ledger, &bank)
            .unwrap();
        assert_eq!(record.outcome, AnswerOutcome::Correct);
        assert_eq!(record.delta, 10);

        let team = session.current_team();
        assert_eq!(teams.get(team).unwrap().score, 10);
        assert_eq!(round.results_by_team[&team], 10);
        assert!(session.revealed());
        assert!(session.countdown().is_none());
    }

    #[test]
    fn test_at_most_once_answer() {
        let bank = bank(2);
        let mut teams = two_teams();
        let (mut round, mut session) =
            start_normal(&bank, &teams, RoundConfig::default());
        let mut ledger = ScoreLedger::default();

        session.reveal(Duration::from_secs(30), SystemTime::now());
        session.select_option("a").unwrap();
        session
            .submit(&mut round, &mut teams, &mut ledger, &bank)
            .unwrap();

        let team = session.current_team();
        let score_after_first = teams.get(team).unwrap().score;

        assert!(matches!(
            session.submit(&mut round, &mut teams, &mut ledger, &bank),
            Err(Error::AlreadyLocked)
        ));
        assert!(matches!(
            session.select_option("b"),
            Err(Error::AlreadyLocked)
        ));
        assert_eq!(teams.get(team).unwrap().score, score_after_first);
    }

    #[test]
    fn test_submit_requires_selection() {
        let bank = bank(2);
        let mut teams = two_teams();
        let (mut round, mut session) =
            start_normal(&bank, &teams, RoundConfig::default());
        let mut ledger = ScoreLedger::default();

        assert!(matches!(
            session.submit(&mut round, &mut teams, &mut ledger, &bank),
            Err(Error::NothingSelected)
        ));
        assert!(session.answered().is_empty());
    }

    #[test]
    fn test_skip_and_pass_gates() {
        let bank = bank(2);
        let mut teams = two_teams();
        let config = RoundConfig {
            allow_skip: false,
            allow_pass: true,
            ..RoundConfig::default()
        };
        let (mut round, mut session) = start_normal(&bank, &teams, config);
        let mut ledger = ScoreLedger::default();

        assert!(matches!(
            session.skip(&mut round, &mut teams, &mut ledger),
            Err(Error::SkipNotAvailable)
        ));

        let record = session.pass(&mut round, &mut teams, &mut ledger).unwrap();
        assert_eq!(record.outcome, AnswerOutcome::Skip);
        assert_eq!(record.delta, 0);
    }

    #[test]
    fn test_timeout_locks_with_pending_selection() {
        let bank = bank(2);
        let mut teams = two_teams();
        let (mut round, mut session) =
            start_normal(&bank, &teams, RoundConfig::default());
        let mut ledger = ScoreLedger::default();

        session.reveal(Duration::from_secs(30), SystemTime::now());
        session.select_option("b").unwrap();
        session.timeout(&mut round, &mut teams, &mut ledger);

        let record = session.current_record().unwrap();
        assert_eq!(record.outcome, AnswerOutcome::Timeout);
        assert_eq!(record.delta, 0);
        assert_eq!(record.selected_key.as_deref(), Some("b"));

        // Expiry after the lock is a no-op.
        let team = session.current_team();
        let score = teams.get(team).unwrap().score;
        session.timeout(&mut round, &mut teams, &mut ledger);
        assert_eq!(teams.get(team).unwrap().score, score);
        assert_eq!(session.answered().len(), 1);
    }

    #[test]
    fn test_advance_requires_answer_then_completes() {
        let bank = bank(2);
        let mut teams = two_teams();
        let config = RoundConfig {
            questions_per_team: 1,
            ..RoundConfig::default()
        };
        let (mut round, mut session) = start_normal(&bank, &teams, config);
        let mut ledger = ScoreLedger::default();

        assert!(matches!(session.advance(), Err(Error::NotAnswered)));

        session.reveal(Duration::from_secs(30), SystemTime::now());
        session.select_option("a").unwrap();
        session
            .submit(&mut round, &mut teams, &mut ledger, &bank)
            .unwrap();
        assert_eq!(session.advance().unwrap(), Advance::Next);
        assert_eq!(session.position(), 1);
        assert_eq!(session.stage(), Stage::Ready);
        assert!(session.selected_key().is_none());

        session.reveal(Duration::from_secs(30), SystemTime::now());
        session.select_option("c").unwrap();
        session
            .submit(&mut round, &mut teams, &mut ledger, &bank)
            .unwrap();
        assert_eq!(session.advance().unwrap(), Advance::Completed);
        // Completion does not move the position anywhere.
        assert_eq!(session.position(), 1);
    }

    #[test]
    fn test_quick_fire_item_flow_and_set_finalization() {
        let bank = bank(6);
        let mut teams = two_teams();
        let mut asked = HashSet::new();
        let mut rng = fastrand::Rng::with_seed(23);
        let config = RoundConfig {
            kind: RoundKind::QuickFire,
            questions_per_team: 1,
            quick_fire_count: 3,
            points_per_wrong: -5,
            quick_fire_all_or_none: false,
            sections: bank.section_keys(),
            ..RoundConfig::default()
        };
        let (mut round, mut session) = round::build(
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
        let mut ledger = ScoreLedger::default();
        let now = SystemTime::now();

        assert!(matches!(
            session.submit(&mut round, &mut teams, &mut ledger, &bank),
            Err(Error::SubmitNotSupported)
        ));
        assert!(matches!(
            session.skip(&mut round, &mut teams, &mut ledger),
            Err(Error::SkipNotAvailable)
        ));

        session.reveal(Duration::from_secs(30), now);
        let first_key = session.countdown().unwrap().unit_key().to_owned();
        assert!(first_key.ends_with("::0"));

        // Judge every item correctly; each timeout locks one item.
        for _ in 0..3 {
            let set = &session.quick_fire_sets()[0];
            let index = set.active_index().unwrap();
            let truth = set.items[index].statement_truth;
            session
                .select_judgement(if truth { Judgement::Yes } else { Judgement::No })
                .unwrap();
            session.timeout(&mut round, &mut teams, &mut ledger);
            session.sync_countdown(Duration::from_secs(30), now, false);
        }

        let record = session.current_record().unwrap();
        assert_eq!(record.outcome, AnswerOutcome::Correct);
        assert_eq!(record.delta, 30);
        assert_eq!(record.detail.as_deref(), Some("3 correct \u{2022} 0 wrong"));
        assert!(session.countdown().is_none());

        let team = session.current_team();
        assert_eq!(teams.get(team).unwrap().score, 30);
    }

    #[test]
    fn test_quick_fire_timer_key_changes_per_item() {
        let bank = bank(4);
        let mut teams = two_teams();
        let mut asked = HashSet::new();
        let mut rng = fastrand::Rng::with_seed(31);
        let config = RoundConfig {
            kind: RoundKind::QuickFire,
            questions_per_team: 1,
            quick_fire_count: 2,
            sections: bank.section_keys(),
            ..RoundConfig::default()
        };
        let (mut round, mut session) = round::build(
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
        let mut ledger = ScoreLedger::default();
        let now = SystemTime::now();

        session.reveal(Duration::from_secs(30), now);
        let first = session.countdown().unwrap().unit_key().to_owned();

        session.timeout(&mut round, &mut teams, &mut ledger);
        session.sync_countdown(Duration::from_secs(30), now, false);
        let second = session.countdown().unwrap().unit_key().to_owned();

        assert_ne!(first, second);
        assert!(first.ends_with("::0"));
        assert!(second.ends_with("::1"));
    }

    #[test]
    fn test_quick_fire_set_finalizes_for_vanished_team() {
        let bank = bank(4);
        let mut teams = two_teams();
        let mut asked = HashSet::new();
        let mut rng = fastrand::Rng::with_seed(23);
        let config = RoundConfig {
            kind: RoundKind::QuickFire,
            questions_per_team: 1,
            quick_fire_count: 2,
            sections: bank.section_keys(),
            ..RoundConfig::default()
        };
        let (mut round, mut session) = round::build(
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
        let mut ledger = ScoreLedger::default();
        let now = SystemTime::now();

        // The team whose turn it is disappears mid-round.
        let team = session.current_team();
        teams.remove(team).unwrap();
        round.results_by_team.remove(&team);

        session.reveal(Duration::from_secs(30), now);
        for _ in 0..2 {
            session.timeout(&mut round, &mut teams, &mut ledger);
            session.sync_countdown(Duration::from_secs(30), now, false);
        }

        // The set still finalizes into a record, so the round can
        // advance past the vanished team's turn.
        assert!(session.quick_fire_sets()[0].is_complete());
        assert_eq!(session.answered().len(), 1);
        let record = session.current_record().unwrap();
        assert_eq!(record.team_id, team);
        assert_eq!(record.outcome, AnswerOutcome::Wrong);
        assert_eq!(round.results_by_team[&team], record.delta);
        assert_eq!(session.advance().unwrap(), Advance::Next);
    }

    #[test]
    fn test_offline_submit_self_graded() {
        let bank = bank(0);
        let mut teams = two_teams();
        let mut asked = HashSet::new();
        let mut rng = fastrand::Rng::with_seed(3);
        let config = RoundConfig {
            kind: RoundKind::Offline,
            offline_prompt: "Estimate the year".into(),
            points_per_wrong: -2,
            ..RoundConfig::default()
        };
        let (mut round, mut session) = round::build(
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
        let mut ledger = ScoreLedger::default();

        session.select_option("sideways").unwrap();
        assert!(matches!(
            session.submit(&mut round, &mut teams, &mut ledger, &bank),
            Err(Error::InvalidSelection(_))
        ));

        session.select_option("wrong").unwrap();
        let record = session
            .submit(&mut round, &mut teams, &mut ledger, &bank)
            .unwrap();
        assert_eq!(record.outcome, AnswerOutcome::Wrong);
        assert_eq!(record.delta, -2);
    }

    #[test]
    fn test_offline_timeout_is_advisory() {
        let bank = bank(0);
        let mut teams = two_teams();
        let mut asked = HashSet::new();
        let mut rng = fastrand::Rng::with_seed(3);
        let config = RoundConfig {
            kind: RoundKind::Offline,
            offline_prompt: "Estimate the year".into(),
            ..RoundConfig::default()
        };
        let (mut round, mut session) = round::build(
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
        let mut ledger = ScoreLedger::default();
        let now = SystemTime::now();

        session.reveal(Duration::from_secs(30), now);
        assert!(session.countdown().is_some());

        session.timeout(&mut round, &mut teams, &mut ledger);
        // Clock stopped, nothing recorded.
        assert!(session.countdown().is_none());
        assert!(session.answered().is_empty());
    }

    #[test]
    fn test_clear_answer_reopens_current_unit() {
        let bank = bank(2);
        let mut teams = two_teams();
        let (mut round, mut session) =
            start_normal(&bank, &teams, RoundConfig::default());
        let mut ledger = ScoreLedger::default();

        session.reveal(Duration::from_secs(30), SystemTime::now());
        session.select_option("a").unwrap();
        session
            .submit(&mut round, &mut teams, &mut ledger, &bank)
            .unwrap();

        let unit = session.current_unit().clone();
        assert!(session.clear_answer(&unit));
        assert!(!session.is_current_locked());
        assert!(!session.revealed());
        assert!(session.selected_key().is_none());
        // Re-answerable after the undo.
        session.select_option("b").unwrap();
        let record = session
            .submit(&mut round, &mut teams, &mut ledger, &bank)
            .unwrap();
        assert_eq!(record.outcome, AnswerOutcome::Wrong);
    }
}
