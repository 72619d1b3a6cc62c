//! Configuration constants for the quiz host engine
//!
//! This module contains all the configuration limits and constraints
//! used throughout the engine to ensure data integrity and provide
//! consistent boundaries for different components.

/// Round configuration constants
pub mod round {
    /// Maximum length of a round or preset name in characters
    pub const MAX_NAME_LENGTH: usize = 200;
    /// Minimum points awarded for a correct answer
    pub const MIN_POINTS_PER_CORRECT: i64 = 1;
    /// Maximum points awarded for a correct answer
    pub const MAX_POINTS_PER_CORRECT: i64 = 1000;
    /// Minimum (most negative) points applied for a wrong answer
    pub const MIN_POINTS_PER_WRONG: i64 = -1000;
    /// Maximum points applied for a wrong answer (never positive)
    pub const MAX_POINTS_PER_WRONG: i64 = 0;
    /// Minimum questions asked per team in a round
    pub const MIN_QUESTIONS_PER_TEAM: usize = 1;
    /// Maximum questions asked per team in a round
    pub const MAX_QUESTIONS_PER_TEAM: usize = 1000;
    /// Minimum per-question time limit in seconds
    pub const MIN_QUESTION_TIME: u64 = 1;
    /// Maximum per-question time limit in seconds
    pub const MAX_QUESTION_TIME: u64 = 3600;
}

/// Quick-fire round configuration constants
pub mod quickfire {
    /// Minimum number of yes/no items in a quick-fire set
    pub const MIN_SET_SIZE: usize = 2;
    /// Maximum number of yes/no items in a quick-fire set
    pub const MAX_SET_SIZE: usize = 20;
}

/// Team registry configuration constants
pub mod teams {
    /// Maximum length of a team name in characters
    pub const MAX_NAME_LENGTH: usize = 200;
    /// Maximum number of listed members per team
    pub const MAX_MEMBERS: usize = 20;

    /// Display colors assigned to teams in registration order, reused
    /// cyclically once exhausted
    pub const COLOR_PALETTE: [&str; 10] = [
        "#6aa9ff", "#38d17a", "#ffd166", "#ff5c7a", "#b389ff", "#4ad7d1", "#ff9f68", "#8be9fd",
        "#f78fb3", "#7bed9f",
    ];
}

/// Timer engine constants
pub mod timer {
    /// Suggested polling interval for driving [`crate::host::QuizHost::tick`]
    /// in milliseconds; expiry is computed from the absolute deadline, so
    /// irregular polling only affects display granularity
    pub const TICK_INTERVAL_MS: u64 = 200;
}

/// Question bank constants
pub mod bank {
    /// Maximum number of labeled options per question
    pub const MAX_OPTION_COUNT: usize = 6;
    /// Separator between section key and question number in a question id
    pub const QUESTION_ID_SEPARATOR: &str = "::";
}
