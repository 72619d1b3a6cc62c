//! Absolute-deadline countdown state
//!
//! A [`Countdown`] is pure data: an absolute deadline plus the key of the
//! unit (or quick-fire item) it was armed for. Remaining time is always
//! recomputed from the deadline and the caller-supplied clock, never from
//! elapsed ticks, so irregular polling or a suspended tab cannot drift
//! the clock. Driving expiry is the host's job via
//! [`QuizHost::tick`](crate::host::QuizHost::tick).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use web_time::SystemTime;

/// A running countdown for one timer unit key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Countdown {
    /// Absolute wall-clock deadline
    ends_at: SystemTime,
    /// The unit (or sub-item) the countdown was armed for; a key change
    /// means the countdown must be restarted
    unit_key: String,
}

impl Countdown {
    /// Arms a countdown for a unit key, ending `duration` from `now`
    pub fn arm(unit_key: String, duration: Duration, now: SystemTime) -> Self {
        Self {
            ends_at: now + duration,
            unit_key,
        }
    }

    /// The key the countdown was armed for
    pub fn unit_key(&self) -> &str {
        &self.unit_key
    }

    /// Whether the deadline has been reached
    pub fn is_expired(&self, now: SystemTime) -> bool {
        now >= self.ends_at
    }

    /// Time left until the deadline, zero once expired
    pub fn remaining(&self, now: SystemTime) -> Duration {
        self.ends_at
            .duration_since(now)
            .unwrap_or(Duration::ZERO)
    }
}
