use serde::Serialize;

use crate::models::{Cursor, SessionMetrics};
use crate::timer::TimerKind;

/// Notifications produced by a transition, in the order they happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted { cursor: Option<Cursor> },
    SetCompleted { cursor: Cursor },
    SetFailed { cursor: Cursor },
    RestTimerStarted { kind: TimerKind, seconds: u32 },
    RestTimerWarning { remaining: u32 },
    RestTimerComplete,
    ExerciseTimerComplete { cursor: Cursor },
    CursorMoved { from: Cursor, to: Cursor },
    /// Every planned set has been walked; the caller may finish the session.
    WorkoutCompleteEligible,
    ExerciseSkipped { exercise_index: usize },
    MetricsUpdated(SessionMetrics),
    SessionPaused,
    SessionResumed,
    SessionFinished(SessionMetrics),
    SessionAbandoned,
}
