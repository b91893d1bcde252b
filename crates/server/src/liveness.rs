//! Heartbeat tracking.
//!
//! Every connection must keep sending target updates. One whose last
//! heartbeat (or its connect time, if it never sent one) is older than the
//! timeout turns stale and is removed by the next sweep. Connections that
//! never join are swept the same way. Spectators send no heartbeats and
//! are never swept.

use crate::entity::{Player, PlayerId, Role};
use std::time::Duration;
use tokio::time::Instant;

/// Freshness of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Active,
    Stale,
}

/// Timestamp of the last heartbeat-bearing message.
#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    last: Instant,
}

impl Heartbeat {
    pub fn new(now: Instant) -> Self {
        Self { last: now }
    }

    /// Record a heartbeat received at `at`. Older stamps never move it back.
    pub fn refresh(&mut self, at: Instant) {
        if at > self.last {
            self.last = at;
        }
    }

    pub fn last(&self) -> Instant {
        self.last
    }

    pub fn state(&self, now: Instant, timeout: Duration) -> Liveness {
        if now.saturating_duration_since(self.last) > timeout {
            Liveness::Stale
        } else {
            Liveness::Active
        }
    }
}

/// Finds stale connections.
#[derive(Debug, Clone, Copy)]
pub struct LivenessMonitor {
    timeout: Duration,
}

impl LivenessMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Ids of non-spectator connections whose heartbeat has gone stale,
    /// in id order when `players` is ordered.
    pub fn sweep<'a, I>(&self, now: Instant, players: I) -> Vec<PlayerId>
    where
        I: IntoIterator<Item = &'a Player>,
    {
        players
            .into_iter()
            .filter(|p| p.role != Role::Spectator)
            .filter(|p| p.heartbeat.state(now, self.timeout) == Liveness::Stale)
            .map(|p| p.id)
            .collect()
    }

    /// Reason sent to a kicked stale client.
    pub fn kick_reason(&self) -> String {
        format!(
            "Last heartbeat received over {} ms ago.",
            self.timeout.as_millis()
        )
    }
}
