//! Cooperative countdown used for rest intervals and timed sets.
//!
//! The timer never reads a clock. Whoever owns it calls [`RestTimer::tick`]
//! once per elapsed second while it should be counting.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    #[default]
    Rest,
    Exercise,
    Warmup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerPhase {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

/// Emitted at most once per threshold per `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSignal {
    Warning,
    Completed,
}

/// Live projection of the countdown. Also what gets saved between
/// processes, see [`RestTimer::restore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestTimerState {
    pub is_active: bool,
    pub time_remaining: u32,
    pub initial_time: u32,
    pub kind: TimerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// Seconds remaining at which the warning fires. 0 disables it.
    pub warning_threshold: u32,
    /// Lowest value a downward `adjust` may leave behind.
    pub adjust_floor: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            warning_threshold: 10,
            adjust_floor: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RestTimer {
    config: TimerConfig,
    phase: TimerPhase,
    kind: TimerKind,
    time_remaining: u32,
    initial_time: u32,
    warned: bool,
}

impl RestTimer {
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    pub fn is_running(&self) -> bool {
        self.phase == TimerPhase::Running
    }

    pub fn is_paused(&self) -> bool {
        self.phase == TimerPhase::Paused
    }

    /// Running or paused: started and not yet completed.
    pub fn is_pending(&self) -> bool {
        matches!(self.phase, TimerPhase::Running | TimerPhase::Paused)
    }

    pub fn state(&self) -> RestTimerState {
        RestTimerState {
            is_active: self.is_running(),
            time_remaining: self.time_remaining,
            initial_time: self.initial_time,
            kind: self.kind,
        }
    }

    /// Starts (or restarts) the countdown. A zero duration completes at once.
    pub fn start(&mut self, kind: TimerKind, seconds: u32) -> Option<TimerSignal> {
        self.kind = kind;
        self.initial_time = seconds;
        self.time_remaining = seconds;
        self.warned = false;
        debug!(?kind, seconds, "timer started");

        if seconds == 0 {
            self.phase = TimerPhase::Completed;
            return Some(TimerSignal::Completed);
        }
        self.phase = TimerPhase::Running;
        None
    }

    pub fn tick(&mut self) -> Option<TimerSignal> {
        if self.phase != TimerPhase::Running {
            return None;
        }

        self.time_remaining = self.time_remaining.saturating_sub(1);

        if self.time_remaining == 0 {
            self.phase = TimerPhase::Completed;
            debug!(kind = ?self.kind, "timer completed");
            return Some(TimerSignal::Completed);
        }

        if !self.warned
            && self.config.warning_threshold > 0
            && self.time_remaining == self.config.warning_threshold
        {
            self.warned = true;
            return Some(TimerSignal::Warning);
        }
        None
    }

    pub fn pause(&mut self) {
        if self.phase == TimerPhase::Running {
            self.phase = TimerPhase::Paused;
            debug!(remaining = self.time_remaining, "timer paused");
        }
    }

    pub fn resume(&mut self) {
        if self.phase == TimerPhase::Paused {
            self.phase = TimerPhase::Running;
            debug!(remaining = self.time_remaining, "timer resumed");
        }
    }

    /// Shifts the remaining and initial time by `delta` seconds. A downward
    /// adjustment stops at the configured floor, so it can never complete
    /// the timer on its own.
    pub fn adjust(&mut self, delta: i64) -> EngineResult<()> {
        if !self.is_pending() {
            return Err(EngineError::invalid_state(
                "adjust the timer",
                format!("it is {:?}", self.phase).to_lowercase(),
            ));
        }

        let current = i64::from(self.time_remaining);
        let floor = i64::from(self.config.adjust_floor.max(1)).min(current);
        let adjusted = current.saturating_add(delta).clamp(floor, i64::from(u32::MAX));
        let applied = adjusted - current;

        self.time_remaining = u32::try_from(adjusted).unwrap_or(u32::MAX);
        let initial = i64::from(self.initial_time).saturating_add(applied).max(adjusted);
        self.initial_time = u32::try_from(initial).unwrap_or(u32::MAX);

        debug!(delta, applied, remaining = self.time_remaining, "timer adjusted");
        Ok(())
    }

    /// Drops a pending countdown without signalling anything.
    pub fn cancel(&mut self) {
        if self.is_pending() {
            debug!(kind = ?self.kind, remaining = self.time_remaining, "timer cancelled");
        }
        self.phase = TimerPhase::Idle;
        self.time_remaining = 0;
        self.warned = false;
    }

    /// Rebuilds a countdown saved by an earlier process. It comes back
    /// paused; a warning already passed is not repeated.
    pub fn restore(&mut self, saved: RestTimerState) {
        if saved.time_remaining == 0 {
            self.cancel();
            return;
        }
        self.kind = saved.kind;
        self.time_remaining = saved.time_remaining;
        self.initial_time = saved.initial_time.max(saved.time_remaining);
        self.warned = self.config.warning_threshold > 0
            && saved.time_remaining <= self.config.warning_threshold;
        self.phase = TimerPhase::Paused;
        debug!(kind = ?self.kind, remaining = self.time_remaining, "timer restored");
    }

    /// Forces completion. Returns `None` if there was nothing to complete.
    pub fn skip(&mut self) -> Option<TimerSignal> {
        if !self.is_pending() {
            return None;
        }
        self.phase = TimerPhase::Completed;
        self.time_remaining = 0;
        debug!(kind = ?self.kind, "timer skipped");
        Some(TimerSignal::Completed)
    }
}
