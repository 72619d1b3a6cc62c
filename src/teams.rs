//! Team registry and turn ordering
//!
//! This module manages the mutable list of competing teams: registration,
//! renaming, removal, display colors, and the registration-order turn
//! rotation that round building relies on. Scores live on the teams but
//! are only ever mutated through the scoring ledger.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

use crate::constants;

/// A unique identifier for a registered team
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct TeamId(Uuid);

impl TeamId {
    /// Creates a new random team ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TeamId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TeamId {
    type Err = uuid::Error;

    /// Parses a team ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// A competing team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// The team's unique identifier
    pub id: TeamId,
    /// The team's display name
    pub name: String,
    /// Listed member names, capped at [`constants::teams::MAX_MEMBERS`]
    pub members: Vec<String>,
    /// The team's running total score across all non-cleared rounds
    pub score: i64,
    /// Opaque display color tag assigned at registration
    pub color: String,
}

/// Errors reported by registry operations
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
pub enum Error {
    /// A team name was empty or whitespace-only
    #[error("team name must not be empty")]
    EmptyName,
    /// A team name exceeded the length limit
    #[error("team name is too long")]
    NameTooLong,
    /// The referenced team does not exist
    #[error("team not found")]
    NotFound,
}

/// The mutable list of teams, in registration order
///
/// Registration order doubles as the turn rotation for round building;
/// the registry never reorders teams by score.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TeamRegistry {
    teams: Vec<Team>,
}

impl TeamRegistry {
    /// Registers a new team with a zero score and a palette color
    ///
    /// Unused palette colors are preferred; once the palette is
    /// exhausted, colors are reused cyclically by registration index.
    /// Member names are trimmed, blanks dropped, and the list capped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyName`] for an empty or whitespace-only name
    /// and [`Error::NameTooLong`] past the length limit.
    pub fn add(&mut self, name: &str, members: Vec<String>) -> Result<&Team, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        if name.len() > constants::teams::MAX_NAME_LENGTH {
            return Err(Error::NameTooLong);
        }

        let members = members
            .into_iter()
            .map(|m| m.trim().to_owned())
            .filter(|m| !m.is_empty())
            .take(constants::teams::MAX_MEMBERS)
            .collect();

        let team = Team {
            id: TeamId::new(),
            name: name.to_owned(),
            members,
            score: 0,
            color: self.next_color().to_owned(),
        };

        self.teams.push(team);
        Ok(self.teams.last().expect("just pushed"))
    }

    /// Removes a team, returning it
    ///
    /// Cascading removal from round result maps is the responsibility of
    /// the owner of the rounds (the host), since the registry does not
    /// know about them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no team has the given id.
    pub fn remove(&mut self, id: TeamId) -> Result<Team, Error> {
        let index = self
            .teams
            .iter()
            .position(|t| t.id == id)
            .ok_or(Error::NotFound)?;
        Ok(self.teams.remove(index))
    }

    /// Renames a team
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id and the same name
    /// validation errors as [`TeamRegistry::add`].
    pub fn rename(&mut self, id: TeamId, new_name: &str) -> Result<(), Error> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(Error::EmptyName);
        }
        if new_name.len() > constants::teams::MAX_NAME_LENGTH {
            return Err(Error::NameTooLong);
        }

        let team = self.get_mut(id).ok_or(Error::NotFound)?;
        team.name = new_name.to_owned();
        Ok(())
    }

    /// Looks up a team by id
    pub fn get(&self, id: TeamId) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == id)
    }

    /// Looks up a team mutably by id
    ///
    /// Only the scoring ledger may use this to touch `score`.
    pub(crate) fn get_mut(&mut self, id: TeamId) -> Option<&mut Team> {
        self.teams.iter_mut().find(|t| t.id == id)
    }

    /// Returns team ids in registration order, the round-robin turn order
    pub fn turn_order(&self) -> Vec<TeamId> {
        self.teams.iter().map(|t| t.id).collect()
    }

    /// Returns all teams in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Team> {
        self.teams.iter()
    }

    /// Returns the number of registered teams
    pub fn len(&self) -> usize {
        self.teams.len()
    }

    /// Returns whether no teams are registered
    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    /// Resets every team's score to zero
    pub(crate) fn zero_scores(&mut self) {
        for team in &mut self.teams {
            team.score = 0;
        }
    }

    fn next_color(&self) -> &'static str {
        let palette = constants::teams::COLOR_PALETTE;
        palette
            .iter()
            .find(|c| !self.teams.iter().any(|t| t.color == **c))
            .copied()
            .unwrap_or(palette[self.teams.len() % palette.len()])
    }
}
