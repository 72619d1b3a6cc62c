//! The quiz host context object
//!
//! [`QuizHost`] owns all engine state: the team registry, round
//! records, saved presets, the asked-exclusion set, the frozen
//! scoreboard, the scoring ledger, and the one active session. Every
//! operation the presentation layer can trigger goes through a method
//! here; there is no ambient state anywhere in the crate, and exactly
//! one host instance exists per presenter tab.
//!
//! The host is also the timer driver's entry point: poll
//! [`QuizHost::tick`] on a short interval (see
//! [`constants::timer::TICK_INTERVAL_MS`](crate::constants::timer::TICK_INTERVAL_MS))
//! and expiry fires the same timeout transition a presenter action
//! would, guarded against double application.

use std::collections::{HashMap, HashSet};

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::SystemTime;

use crate::{
    bank::{QuestionBank, QuestionId},
    ledger::{self, ScoreLedger, UndoEntry},
    round::{self, AnswerRecord, Judgement, PresetId, Round, RoundConfig, RoundId, RoundPreset},
    session::{self, ActiveSession, Advance, Stage},
    snapshot::{self, SnapshotStore, StateSnapshot, SNAPSHOT_VERSION},
    teams::{self, Team, TeamId, TeamRegistry},
};

/// Standings frozen at round start so the scoreboard can hold still
/// while a round is in progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreboardSnapshot {
    /// The round that was starting when the freeze was taken
    pub round_id: Option<RoundId>,
    /// When the freeze was taken
    pub updated_at: SystemTime,
    /// Team ids ordered by score at freeze time, highest first
    pub order_team_ids: Vec<TeamId>,
    /// Each team's score at freeze time
    pub scores_by_team: HashMap<TeamId, i64>,
}

/// How stale the frozen scoreboard is relative to live scores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreboardStatus {
    /// Whether a round is currently active
    pub is_round_active: bool,
    /// Whether live scores have moved since the freeze
    pub is_outdated: bool,
    /// Number of teams whose score differs from the freeze
    pub changed_teams: usize,
    /// Sum of all score movement since the freeze
    pub delta_sum: i64,
}

/// Errors surfaced by host operations
#[derive(Debug, Error)]
pub enum Error {
    /// A round was started while another is active
    #[error("a round is already active; end it first")]
    RoundActive,
    /// A session transition was requested with no round running
    #[error("no active round")]
    NoActiveRound,
    /// The referenced round does not exist
    #[error("round not found")]
    RoundNotFound,
    /// The referenced preset does not exist
    #[error("preset not found")]
    PresetNotFound,
    /// The round's scores were already cleared
    #[error("that round's scores are already cleared")]
    AlreadyCleared,
    /// A preset failed validation on save
    #[error("invalid round configuration: {0}")]
    InvalidConfig(#[from] garde::Report),
    /// Round building failed
    #[error(transparent)]
    Build(#[from] round::BuildError),
    /// A session transition was rejected
    #[error(transparent)]
    Session(#[from] session::Error),
    /// A registry operation was rejected
    #[error(transparent)]
    Teams(#[from] teams::Error),
    /// The ledger rejected an undo
    #[error(transparent)]
    Ledger(#[from] ledger::Error),
    /// Snapshot serialization failed
    #[error(transparent)]
    Snapshot(#[from] snapshot::Error),
}

/// The engine's single context object
#[derive(Debug)]
pub struct QuizHost {
    teams: TeamRegistry,
    rounds: Vec<Round>,
    presets: Vec<RoundPreset>,
    asked: HashSet<QuestionId>,
    session: Option<ActiveSession>,
    scoreboard: Option<ScoreboardSnapshot>,
    ledger: ScoreLedger,
    rng: fastrand::Rng,
}

impl Default for QuizHost {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizHost {
    /// Creates an empty host
    pub fn new() -> Self {
        Self::with_rng(fastrand::Rng::new())
    }

    /// Creates an empty host with an injected random source, so tests
    /// can make question selection and statement draws deterministic
    pub fn with_rng(rng: fastrand::Rng) -> Self {
        Self {
            teams: TeamRegistry::default(),
            rounds: Vec::new(),
            presets: Vec::new(),
            asked: HashSet::new(),
            session: None,
            scoreboard: None,
            ledger: ScoreLedger::default(),
            rng,
        }
    }

    /// Reconstructs a host from a snapshot; undo history starts empty
    pub fn from_snapshot(snapshot: StateSnapshot, rng: fastrand::Rng) -> Self {
        Self {
            teams: snapshot.teams,
            rounds: snapshot.rounds,
            presets: snapshot.presets,
            asked: snapshot.asked,
            session: snapshot.session,
            scoreboard: snapshot.scoreboard,
            ledger: ScoreLedger::default(),
            rng,
        }
    }

    /// Loads a host from the store, falling back to a fresh empty
    /// state when nothing is stored or the snapshot is corrupt
    pub fn load(store: &impl SnapshotStore, rng: fastrand::Rng) -> Self {
        match store.load().map(|text| StateSnapshot::from_json(&text)) {
            Some(Ok(snapshot)) => Self::from_snapshot(snapshot, rng),
            Some(Err(_)) | None => Self::with_rng(rng),
        }
    }

    /// Captures the persistable state
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            version: SNAPSHOT_VERSION,
            teams: self.teams.clone(),
            rounds: self.rounds.clone(),
            presets: self.presets.clone(),
            asked: self.asked.clone(),
            session: self.session.clone(),
            scoreboard: self.scoreboard.clone(),
        }
    }

    /// Serializes the current state into the store
    ///
    /// # Errors
    ///
    /// Returns [`Error::Snapshot`] if serialization fails.
    pub fn save(&self, store: &mut impl SnapshotStore) -> Result<(), Error> {
        store.save(&self.snapshot().to_json()?);
        Ok(())
    }

    /// The team registry
    pub fn teams(&self) -> &TeamRegistry {
        &self.teams
    }

    /// All round records, newest first
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// Saved presets, in sequence order
    pub fn presets(&self) -> &[RoundPreset] {
        &self.presets
    }

    /// The asked-exclusion set
    pub fn asked(&self) -> &HashSet<QuestionId> {
        &self.asked
    }

    /// The live session, if a round is in progress
    pub fn session(&self) -> Option<&ActiveSession> {
        self.session.as_ref()
    }

    /// The record of the active round, if one is in progress
    pub fn active_round(&self) -> Option<&Round> {
        let session = self.session.as_ref()?;
        self.rounds.iter().find(|r| r.id == session.round_id())
    }

    /// The frozen scoreboard, if one was taken
    pub fn scoreboard(&self) -> Option<&ScoreboardSnapshot> {
        self.scoreboard.as_ref()
    }

    // ---- teams ----

    /// Registers a team
    ///
    /// # Errors
    ///
    /// Returns [`Error::Teams`] for an empty or over-long name.
    pub fn add_team(&mut self, name: &str, members: Vec<String>) -> Result<TeamId, Error> {
        Ok(self.teams.add(name, members)?.id)
    }

    /// Removes a team, cascading it out of every round's result maps,
    /// then reconciles scores
    ///
    /// Removal is allowed mid-round: the team's pending units still
    /// resolve normally, they just no longer have a total to score
    /// into.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Teams`] for an unknown id.
    pub fn remove_team(&mut self, id: TeamId) -> Result<Team, Error> {
        let team = self.teams.remove(id)?;
        for round in &mut self.rounds {
            round.results_by_team.remove(&id);
            if let Some(cleared) = round.cleared_results.as_mut() {
                cleared.remove(&id);
            }
        }
        self.recompute_scores();
        Ok(team)
    }

    /// Renames a team
    ///
    /// # Errors
    ///
    /// Returns [`Error::Teams`] for an unknown id or invalid name.
    pub fn rename_team(&mut self, id: TeamId, new_name: &str) -> Result<(), Error> {
        Ok(self.teams.rename(id, new_name)?)
    }

    // ---- presets ----

    /// Saves a configuration as a preset at the front of the sequence
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the configuration fails
    /// validation.
    pub fn save_preset(&mut self, config: RoundConfig) -> Result<PresetId, Error> {
        config.validate()?;
        let preset = RoundPreset::new(config);
        let id = preset.id;
        self.presets.insert(0, preset);
        Ok(id)
    }

    /// Deletes a preset
    ///
    /// # Errors
    ///
    /// Returns [`Error::PresetNotFound`] for an unknown id.
    pub fn delete_preset(&mut self, id: PresetId) -> Result<(), Error> {
        let index = self
            .presets
            .iter()
            .position(|p| p.id == id)
            .ok_or(Error::PresetNotFound)?;
        self.presets.remove(index);
        Ok(())
    }

    /// The next preset to start: the first one, in sequence order,
    /// without a completed and not-cleared round instance
    ///
    /// Clearing rounds restarts the sequence, since cleared instances
    /// no longer count as done.
    pub fn next_preset(&self) -> Option<&RoundPreset> {
        let done: HashSet<PresetId> = self
            .rounds
            .iter()
            .filter(|r| r.is_completed() && !r.is_cleared())
            .filter_map(|r| r.preset_id)
            .collect();
        self.presets.iter().find(|p| !done.contains(&p.id))
    }

    // ---- round lifecycle ----

    /// Starts a round, building it from the configuration and freezing
    /// the scoreboard
    ///
    /// # Errors
    ///
    /// Returns [`Error::RoundActive`] while a session exists (the
    /// caller must [`QuizHost::end_round`] first) and [`Error::Build`]
    /// for a configuration the builder rejects.
    pub fn start_round(
        &mut self,
        config: RoundConfig,
        preset_id: Option<PresetId>,
        bank: &impl QuestionBank,
        now: SystemTime,
    ) -> Result<RoundId, Error> {
        if self.session.is_some() {
            return Err(Error::RoundActive);
        }

        let (round, session) = round::build(
            config,
            preset_id,
            self.rounds.len() + 1,
            &self.teams,
            bank,
            &mut self.asked,
            &mut self.rng,
            now,
        )?;
        let id = round.id;

        self.rounds.insert(0, round);
        self.session = Some(session);
        self.freeze_scoreboard(now);
        Ok(id)
    }

    /// Starts a round from a saved preset
    ///
    /// # Errors
    ///
    /// Returns [`Error::PresetNotFound`] plus everything
    /// [`QuizHost::start_round`] can return.
    pub fn start_preset(
        &mut self,
        id: PresetId,
        bank: &impl QuestionBank,
        now: SystemTime,
    ) -> Result<RoundId, Error> {
        let config = self
            .presets
            .iter()
            .find(|p| p.id == id)
            .ok_or(Error::PresetNotFound)?
            .config
            .clone();
        self.start_round(config, Some(id), bank, now)
    }

    /// Ends the active round: stamps `completed_at`, drops the session,
    /// and unfreezes the scoreboard
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveRound`] with nothing running.
    pub fn end_round(&mut self, now: SystemTime) -> Result<RoundId, Error> {
        let id = self
            .session
            .as_ref()
            .map(ActiveSession::round_id)
            .ok_or(Error::NoActiveRound)?;
        Self::round_mut(&mut self.rounds, id)?.complete(now);
        self.session = None;
        self.scoreboard = None;
        self.ledger.clear();
        Ok(id)
    }

    // ---- session transitions ----

    /// Reveals the current unit and starts its countdown
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveRound`] with nothing running.
    pub fn reveal(&mut self, now: SystemTime) -> Result<(), Error> {
        let (session, round) = Self::active_mut(&mut self.session, &mut self.rounds)?;
        session.reveal(round.config.question_time, now);
        Ok(())
    }

    /// Records a pending option choice on the current unit
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveRound`] or [`Error::Session`].
    pub fn select_option(&mut self, key: &str) -> Result<(), Error> {
        let session = self.session.as_mut().ok_or(Error::NoActiveRound)?;
        Ok(session.select_option(key)?)
    }

    /// Records the yes/no call on the active quick-fire item
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveRound`] or [`Error::Session`].
    pub fn select_judgement(&mut self, judgement: Judgement) -> Result<(), Error> {
        let session = self.session.as_mut().ok_or(Error::NoActiveRound)?;
        Ok(session.select_judgement(judgement)?)
    }

    /// Submits the pending selection, locking the current unit
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveRound`] or [`Error::Session`].
    pub fn submit(&mut self, bank: &impl QuestionBank) -> Result<AnswerRecord, Error> {
        let session = self.session.as_mut().ok_or(Error::NoActiveRound)?;
        let round = Self::round_mut(&mut self.rounds, session.round_id())?;
        Ok(session
            .submit(round, &mut self.teams, &mut self.ledger, bank)?
            .clone())
    }

    /// Skips the current unit for zero points
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveRound`] or [`Error::Session`].
    pub fn skip(&mut self) -> Result<AnswerRecord, Error> {
        let session = self.session.as_mut().ok_or(Error::NoActiveRound)?;
        let round = Self::round_mut(&mut self.rounds, session.round_id())?;
        Ok(session.skip(round, &mut self.teams, &mut self.ledger)?.clone())
    }

    /// Passes the team's turn for zero points
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveRound`] or [`Error::Session`].
    pub fn pass(&mut self) -> Result<AnswerRecord, Error> {
        let session = self.session.as_mut().ok_or(Error::NoActiveRound)?;
        let round = Self::round_mut(&mut self.rounds, session.round_id())?;
        Ok(session.pass(round, &mut self.teams, &mut self.ledger)?.clone())
    }

    /// Moves past the answered current unit; on the last unit this
    /// ends the round synchronously
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveRound`] or [`Error::Session`].
    pub fn advance(&mut self, now: SystemTime) -> Result<Advance, Error> {
        let (session, _) = Self::active_mut(&mut self.session, &mut self.rounds)?;
        let advance = session.advance()?;
        if advance == Advance::Completed {
            self.end_round(now)?;
        }
        Ok(advance)
    }

    /// Drives the countdown: fires the timeout transition when the
    /// deadline has passed, then re-arms for the next quick-fire item
    /// if one follows. Returns whether an expiry fired. Safe to call on
    /// any schedule, including redundantly.
    pub fn tick(&mut self, now: SystemTime) -> bool {
        let Ok((session, round)) = Self::active_mut(&mut self.session, &mut self.rounds) else {
            return false;
        };
        let question_time = round.config.question_time;

        session.sync_countdown(question_time, now, false);
        let expired = session.countdown().is_some_and(|c| c.is_expired(now));
        if !expired {
            return false;
        }

        session.timeout(round, &mut self.teams, &mut self.ledger);
        session.sync_countdown(question_time, now, false);
        true
    }

    /// Reverses the most recent scoring action
    ///
    /// The team and round totals get the delta back and the unit's
    /// answer record is cleared; if it is the currently displayed unit,
    /// its lock resets and the countdown restarts. The question stays
    /// reserved in the asked set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Ledger`] with nothing to undo.
    pub fn undo(&mut self, now: SystemTime) -> Result<UndoEntry, Error> {
        let round_id = self.ledger.last().ok_or(ledger::Error::Empty)?.round_id;
        let round = Self::round_mut(&mut self.rounds, round_id)?;
        let question_time = round.config.question_time;

        let entry = self.ledger.reverse_last(&mut self.teams, round)?;

        if let Some(session) = self.session.as_mut() {
            if session.round_id() == entry.round_id
                && session.clear_answer(&entry.unit_id)
                && session.stage() == Stage::Shown
            {
                session.sync_countdown(question_time, now, true);
            }
        }
        Ok(entry)
    }

    // ---- score resets and reconciliation ----

    /// Clears one round's scores: the result map is snapshotted into
    /// `cleared_results`, zeroed, and stamped, then team totals are
    /// recomputed. Clearing the active round ends its session without
    /// completing it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RoundNotFound`] or [`Error::AlreadyCleared`].
    pub fn clear_round_scores(&mut self, id: RoundId, now: SystemTime) -> Result<(), Error> {
        let round = Self::round_mut(&mut self.rounds, id)?;
        if round.is_cleared() {
            return Err(Error::AlreadyCleared);
        }

        if self.session.as_ref().is_some_and(|s| s.round_id() == id) {
            self.session = None;
            self.ledger.clear();
        }
        round.clear_scores(now);
        self.scoreboard = None;
        self.recompute_scores();
        Ok(())
    }

    /// Quiz-level reset: removes every round record entirely and zeroes
    /// all team scores; any active session is dropped
    pub fn clear_all_rounds(&mut self) {
        self.session = None;
        self.rounds.clear();
        self.scoreboard = None;
        self.ledger.clear();
        self.recompute_scores();
    }

    /// Resets the asked-exclusion set, allowing repeats across rounds
    pub fn clear_asked(&mut self) {
        self.asked.clear();
    }

    /// Recomputes every team's score from the non-cleared rounds'
    /// result maps; this is the ground-truth reconciliation rule
    pub fn recompute_scores(&mut self) {
        self.teams.zero_scores();
        for round in &self.rounds {
            if round.is_cleared() {
                continue;
            }
            for (team_id, delta) in &round.results_by_team {
                if let Some(team) = self.teams.get_mut(*team_id) {
                    team.score += delta;
                }
            }
        }
    }

    // ---- scoreboard freeze ----

    /// Freezes the current standings, tagged with the active round
    pub fn freeze_scoreboard(&mut self, now: SystemTime) {
        let order_team_ids = self
            .teams
            .iter()
            .sorted_by_key(|t| std::cmp::Reverse(t.score))
            .map(|t| t.id)
            .collect();
        self.scoreboard = Some(ScoreboardSnapshot {
            round_id: self.session.as_ref().map(ActiveSession::round_id),
            updated_at: now,
            order_team_ids,
            scores_by_team: self.teams.iter().map(|t| (t.id, t.score)).collect(),
        });
    }

    /// Reports whether the frozen scoreboard still matches live scores
    pub fn scoreboard_status(&self) -> ScoreboardStatus {
        let is_round_active = self.session.is_some();
        if !is_round_active {
            return ScoreboardStatus {
                is_round_active,
                is_outdated: false,
                changed_teams: 0,
                delta_sum: 0,
            };
        }

        let active_id = self.session.as_ref().map(ActiveSession::round_id);
        let Some(snap) = self
            .scoreboard
            .as_ref()
            .filter(|s| s.round_id == active_id)
        else {
            return ScoreboardStatus {
                is_round_active,
                is_outdated: true,
                changed_teams: 0,
                delta_sum: 0,
            };
        };

        let mut changed_teams = 0;
        let mut delta_sum = 0;
        for team in self.teams.iter() {
            let before = snap.scores_by_team.get(&team.id).copied().unwrap_or(team.score);
            if before != team.score {
                changed_teams += 1;
                delta_sum += team.score - before;
            }
        }
        ScoreboardStatus {
            is_round_active,
            is_outdated: changed_teams > 0,
            changed_teams,
            delta_sum,
        }
    }

    // ---- internal plumbing ----

    fn round_mut(rounds: &mut [Round], id: RoundId) -> Result<&mut Round, Error> {
        rounds
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(Error::RoundNotFound)
    }

    fn active_mut<'a>(
        session: &'a mut Option<ActiveSession>,
        rounds: &'a mut [Round],
    ) -> Result<(&'a mut ActiveSession, &'a mut Round), Error> {
        let session = session.as_mut().ok_or(Error::NoActiveRound)?;
        let round = rounds
            .iter_mut()
            .find(|r| r.id == session.round_id())
            .ok_or(Error::RoundNotFound)?;
        Ok((session, round))
    }
}
