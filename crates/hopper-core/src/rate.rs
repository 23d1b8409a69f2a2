//! Per-hopper rate limiting for the two actions.
//!
//! Each action has a `next_*_time` instant. The action is eligible once
//! `now >= next`, and a successful action pushes `next` to
//! `now + floor(speed * 1000)`. Actions that move nothing leave the timer
//! alone, so an idle hopper stays eligible.

use crate::fixed::{Fixed64, Millis, seconds_to_millis};
use serde::{Deserialize, Serialize};

/// The two rate-limited actions of a hopper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Suction,
    Transfer,
}

/// Observable timer state of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Cooling down until the stored instant.
    Idle(Millis),
    Eligible,
}

/// The two action timers of a hopper. Both only move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiter {
    next_suction_time: Millis,
    next_transfer_time: Millis,
}

impl RateLimiter {
    /// A limiter with both actions eligible at `now`.
    pub fn starting_at(now: Millis) -> Self {
        Self {
            next_suction_time: now,
            next_transfer_time: now,
        }
    }

    pub fn next_time(&self, kind: ActionKind) -> Millis {
        match kind {
            ActionKind::Suction => self.next_suction_time,
            ActionKind::Transfer => self.next_transfer_time,
        }
    }

    fn slot(&mut self, kind: ActionKind) -> &mut Millis {
        match kind {
            ActionKind::Suction => &mut self.next_suction_time,
            ActionKind::Transfer => &mut self.next_transfer_time,
        }
    }

    pub fn state(&self, kind: ActionKind, now: Millis) -> TimerState {
        let next = self.next_time(kind);
        if now >= next {
            TimerState::Eligible
        } else {
            TimerState::Idle(next)
        }
    }

    pub fn is_eligible(&self, kind: ActionKind, now: Millis) -> bool {
        self.state(kind, now) == TimerState::Eligible
    }

    /// Record a fired action. The timer never moves backwards, even if the
    /// host clock does.
    pub fn record_success(&mut self, kind: ActionKind, now: Millis, speed: Fixed64) {
        let next = now.saturating_add(seconds_to_millis(speed));
        let slot = self.slot(kind);
        *slot = (*slot).max(next);
    }

    /// Timers for a hopper just loaded from the store. Each action waits one
    /// full period from `now`.
    pub fn loaded_at(now: Millis, suction_speed: Fixed64, transfer_speed: Fixed64) -> Self {
        Self {
            next_suction_time: now.saturating_add(seconds_to_millis(suction_speed)),
            next_transfer_time: now.saturating_add(seconds_to_millis(transfer_speed)),
        }
    }
}
