//! Engine for running a gym workout set by set.
//!
//! [`SessionMachine`] drives a [`WorkoutSession`] through its sets, runs rest
//! countdowns between them and keeps [`SessionMetrics`] current. The engine
//! performs no I/O: callers feed it actions and ticks, then persist the
//! session record it hands back.

pub mod clock;
pub mod config;
pub mod cursor;
pub mod error;
pub mod events;
pub mod metrics;
pub mod models;
pub mod session;
pub mod storage;
pub mod ticker;
pub mod timer;
pub mod utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EngineError, EngineResult};
pub use events::SessionEvent;
pub use models::{
    ActualValues, Cursor, ExerciseInSession, PersonalRecord, SessionMetrics, SetInSession, SetType,
    WorkoutSession,
};
pub use session::{Action, EngineSettings, PendingTimer, SessionMachine, SessionState};
pub use timer::{RestTimer, RestTimerState, TimerConfig, TimerKind, TimerSignal};
