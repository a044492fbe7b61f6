//! Bounded exponential backoff for readiness polling.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff that gives up after a fixed number of polls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollBackoff {
    current: Duration,
    max: Duration,
    polls: u32,
    max_polls: u32,
}

impl PollBackoff {
    /// Creates a backoff starting at `initial`, doubling up to `max`,
    /// allowing at most `max_polls` waits.
    pub fn new(initial: Duration, max: Duration, max_polls: u32) -> Self {
        Self {
            current: initial,
            max,
            polls: 0,
            max_polls,
        }
    }

    /// Returns the delay before the next poll, or `None` once exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.polls >= self.max_polls {
            return None;
        }
        self.polls += 1;
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        Some(delay)
    }

    /// Number of delays handed out so far.
    pub fn polls(&self) -> u32 {
        self.polls
    }
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(250), Duration::from_secs(4), 12)
    }
}
