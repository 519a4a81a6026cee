//! The active-session state machine.
//!
//! A [`SessionMachine`] owns one [`WorkoutSession`] together with its cursor
//! and rest timer. Every transition either succeeds and returns the events it
//! produced, or fails and leaves the machine untouched.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::cursor::{self, Step};
use crate::error::{EngineError, EngineResult};
use crate::events::SessionEvent;
use crate::metrics::{self, CalorieInputs, DEFAULT_BODY_MASS_KG, DEFAULT_MET};
use crate::models::{ActualValues, Cursor, PersonalRecord, SetType, WorkoutSession};
use crate::timer::{RestTimer, RestTimerState, TimerConfig, TimerKind, TimerSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Active,
    Paused,
    Completed,
    Abandoned,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }

    /// Derived from the stored flags and timestamps.
    pub fn of(session: &WorkoutSession) -> Self {
        if session.completed {
            Self::Completed
        } else if session.abandoned {
            Self::Abandoned
        } else if session.start_time.is_none() {
            Self::NotStarted
        } else if session.is_paused() {
            Self::Paused
        } else {
            Self::Active
        }
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotStarted => "not started",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        };

        write!(f, "{}", s)
    }
}

/// Tunables the engine takes from configuration and the user's profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub timer: TimerConfig,
    pub body_mass_kg: f64,
    pub met: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timer: TimerConfig::default(),
            body_mass_kg: DEFAULT_BODY_MASS_KG,
            met: DEFAULT_MET,
        }
    }
}

/// Everything a caller can ask of a session, as data.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Start,
    CompleteSet { cursor: Cursor, values: ActualValues },
    FailSet { cursor: Cursor, values: ActualValues },
    Advance,
    Retreat,
    JumpToExercise(usize),
    SkipExercise(usize),
    Tick,
    SkipRest,
    AdjustRest(i64),
    StartSetTimer,
    Pause,
    Resume,
    Finish,
    Abandon,
    SetNotes(Option<String>),
    AddPersonalRecord(PersonalRecord),
}

pub type Events = Vec<SessionEvent>;

/// A countdown still running when the session was saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTimer {
    #[serde(flatten)]
    pub timer: RestTimerState,
    /// Rest after a completed set: finishing it moves the cursor on.
    pub advance_after: bool,
}

#[derive(Debug)]
pub struct SessionMachine<C: Clock = SystemClock> {
    session: WorkoutSession,
    state: SessionState,
    cursor: Option<Cursor>,
    timer: RestTimer,
    /// The running rest timer was started by `complete_set` and moves the
    /// cursor forward when it completes.
    advance_after_rest: bool,
    /// The timer was paused by `pause_session`, not by the user.
    timer_held_by_pause: bool,
    clock: C,
    settings: EngineSettings,
}

impl<C: Clock> SessionMachine<C> {
    /// Wraps a stored or freshly created session. An in-progress session
    /// resumes at its first open set.
    pub fn new(mut session: WorkoutSession, clock: C, settings: EngineSettings) -> EngineResult<Self> {
        if session.completed && session.abandoned {
            return Err(EngineError::invalid_state(
                "load the session",
                "it is marked both completed and abandoned",
            ));
        }
        if session.end_time.is_some() != (session.completed || session.abandoned) {
            return Err(EngineError::invalid_state(
                "load the session",
                "its endTime disagrees with its completed/abandoned flags",
            ));
        }

        let state = SessionState::of(&session);
        if !state.is_terminal() {
            session.renumber();
        }
        let cursor = match state {
            SessionState::Active | SessionState::Paused => cursor::resume_point(&session),
            _ => None,
        };

        debug!(id = %session.id, %state, ?cursor, "session loaded");
        Ok(Self {
            session,
            state,
            cursor,
            timer: RestTimer::new(settings.timer),
            advance_after_rest: false,
            timer_held_by_pause: false,
            clock,
            settings,
        })
    }

    /// Restores a cursor saved alongside the session.
    pub fn with_cursor(mut self, at: Cursor) -> EngineResult<Self> {
        self.require(&[SessionState::Active, SessionState::Paused], "restore a cursor")?;
        cursor::validate(&self.session, at)?;
        self.cursor = Some(at);
        Ok(self)
    }

    /// Brings back a countdown saved with [`SessionMachine::pending_timer`].
    /// In a paused session it stays held until `resume_session`; otherwise
    /// it runs again at once.
    pub fn with_pending_timer(mut self, pending: PendingTimer) -> EngineResult<Self> {
        self.require(&[SessionState::Active, SessionState::Paused], "restore a timer")?;
        if pending.timer.time_remaining == 0 {
            return Ok(self);
        }

        self.timer.restore(pending.timer);
        self.advance_after_rest = pending.advance_after && pending.timer.kind == TimerKind::Rest;
        if self.state == SessionState::Paused {
            self.timer_held_by_pause = true;
        } else {
            self.timer.resume();
        }
        Ok(self)
    }

    pub fn pending_timer(&self) -> Option<PendingTimer> {
        self.timer.is_pending().then(|| PendingTimer {
            timer: self.timer.state(),
            advance_after: self.advance_after_rest,
        })
    }

    pub fn session(&self) -> &WorkoutSession {
        &self.session
    }

    pub fn into_session(self) -> WorkoutSession {
        self.session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Undefined (`None`) once the session is terminal or when no set exists.
    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    pub fn timer(&self) -> &RestTimer {
        &self.timer
    }

    pub fn timer_state(&self) -> RestTimerState {
        self.timer.state()
    }

    /// A rest countdown is holding the cursor on the set just completed.
    pub fn is_resting(&self) -> bool {
        self.advance_after_rest && self.timer.is_pending()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn dispatch(&mut self, action: Action) -> EngineResult<Events> {
        match action {
            Action::Start => self.start(),
            Action::CompleteSet { cursor, values } => self.complete_set(cursor, values),
            Action::FailSet { cursor, values } => self.fail_set(cursor, values),
            Action::Advance => self.advance(),
            Action::Retreat => self.retreat(),
            Action::JumpToExercise(index) => self.jump_to_exercise(index),
            Action::SkipExercise(index) => self.skip_exercise(index),
            Action::Tick => self.tick(),
            Action::SkipRest => self.skip_rest(),
            Action::AdjustRest(delta) => self.adjust_rest(delta),
            Action::StartSetTimer => self.start_set_timer(),
            Action::Pause => self.pause_session(),
            Action::Resume => self.resume_session(),
            Action::Finish => self.finish(),
            Action::Abandon => self.abandon(),
            Action::SetNotes(notes) => self.set_notes(notes),
            Action::AddPersonalRecord(record) => self.add_personal_record(record),
        }
    }

    pub fn start(&mut self) -> EngineResult<Events> {
        self.require(&[SessionState::NotStarted], "start the session")?;

        let now = self.clock.now();
        self.session.start_time = Some(now);
        self.state = SessionState::Active;
        self.cursor = cursor::first(&self.session);

        let mut events = vec![SessionEvent::SessionStarted {
            cursor: self.cursor,
        }];
        match self.cursor {
            Some(c) => self.stamp_set_start(c, now),
            None => events.push(SessionEvent::WorkoutCompleteEligible),
        }
        events.push(self.recompute());

        info!(id = %self.session.id, exercises = self.session.exercises.len(), "session started");
        Ok(events)
    }

    /// Records the set as done. On the live cursor this starts the rest
    /// countdown; the cursor only moves once rest completes or is skipped.
    pub fn complete_set(&mut self, at: Cursor, values: ActualValues) -> EngineResult<Events> {
        self.require(&[SessionState::Active], "complete a set")?;
        cursor::validate(&self.session, at)?;
        validate_actuals(&values)?;

        let now = self.clock.now();
        self.record(at, values, true, now);
        let mut events = vec![SessionEvent::SetCompleted { cursor: at }, self.recompute()];

        if self.cursor != Some(at) {
            debug!(cursor = %at, "edited a set off the live cursor");
            return Ok(events);
        }

        match cursor::advance(&self.session, at) {
            Step::End => {
                self.drop_pending_timer();
                events.push(SessionEvent::WorkoutCompleteEligible);
            }
            Step::At(next) => {
                let rest = self.session.exercises[at.exercise_index].rest_time;
                if rest == 0 {
                    self.drop_pending_timer();
                    events.push(self.move_to(at, next, now));
                } else {
                    self.timer.start(TimerKind::Rest, rest);
                    self.advance_after_rest = true;
                    self.timer_held_by_pause = false;
                    events.push(SessionEvent::RestTimerStarted {
                        kind: TimerKind::Rest,
                        seconds: rest,
                    });
                }
            }
        }
        Ok(events)
    }

    /// Records the set as failed. No rest is earned and the cursor stays put,
    /// so failing the live set also drops any rest it had started.
    pub fn fail_set(&mut self, at: Cursor, values: ActualValues) -> EngineResult<Events> {
        self.require(&[SessionState::Active], "fail a set")?;
        cursor::validate(&self.session, at)?;
        validate_actuals(&values)?;

        let now = self.clock.now();
        if self.cursor == Some(at) {
            self.drop_pending_timer();
        }
        self.record(at, values, false, now);
        Ok(vec![SessionEvent::SetFailed { cursor: at }, self.recompute()])
    }

    /// During rest this is the same as skipping it.
    pub fn advance(&mut self) -> EngineResult<Events> {
        self.require(&[SessionState::Active], "advance")?;
        if self.is_resting() {
            return self.skip_rest();
        }

        let from = self.live_cursor()?;
        Ok(match cursor::advance(&self.session, from) {
            Step::End => vec![SessionEvent::WorkoutCompleteEligible],
            Step::At(to) => {
                let now = self.clock.now();
                vec![self.move_to(from, to, now)]
            }
        })
    }

    /// Moves back without touching completion flags. A pending rest is dropped.
    pub fn retreat(&mut self) -> EngineResult<Events> {
        self.require(&[SessionState::Active], "retreat")?;
        let from = self.live_cursor()?;

        self.drop_pending_timer();
        let to = cursor::retreat(&self.session, from);
        if to == from {
            return Ok(Vec::new());
        }
        let now = self.clock.now();
        Ok(vec![self.move_to(from, to, now)])
    }

    pub fn jump_to_exercise(&mut self, exercise_index: usize) -> EngineResult<Events> {
        self.require(&[SessionState::Active], "jump to an exercise")?;
        let from = self.live_cursor()?;
        let to = cursor::jump_to_exercise(&self.session, exercise_index)?;

        self.drop_pending_timer();
        if to == from {
            return Ok(Vec::new());
        }
        let now = self.clock.now();
        Ok(vec![self.move_to(from, to, now)])
    }

    /// Flags the exercise as skipped and, if the cursor is on it, moves to the
    /// next exercise.
    pub fn skip_exercise(&mut self, exercise_index: usize) -> EngineResult<Events> {
        self.require(&[SessionState::Active], "skip an exercise")?;
        let Some(exercise) = self.session.exercises.get(exercise_index) else {
            return Err(EngineError::invalid_cursor(
                None,
                format!("exercise {exercise_index} does not exist"),
            ));
        };
        let last_set = exercise.sets.len().saturating_sub(1);

        self.session.exercises[exercise_index].skipped = true;
        let mut events = vec![SessionEvent::ExerciseSkipped { exercise_index }];

        if let Some(from) = self.cursor.filter(|c| c.exercise_index == exercise_index) {
            self.drop_pending_timer();
            match cursor::advance(&self.session, Cursor::new(exercise_index, last_set)) {
                Step::At(to) => {
                    let now = self.clock.now();
                    events.push(self.move_to(from, to, now));
                }
                Step::End => events.push(SessionEvent::WorkoutCompleteEligible),
            }
        }
        events.push(self.recompute());
        Ok(events)
    }

    /// One elapsed second from the tick source. Ticks while paused are
    /// absorbed without effect.
    pub fn tick(&mut self) -> EngineResult<Events> {
        self.require(&[SessionState::Active, SessionState::Paused], "tick")?;
        Ok(match self.timer.tick() {
            Some(signal) => self.on_timer_signal(signal),
            None => Vec::new(),
        })
    }

    pub fn skip_rest(&mut self) -> EngineResult<Events> {
        self.require(&[SessionState::Active], "skip rest")?;
        match self.timer.skip() {
            Some(signal) => Ok(self.on_timer_signal(signal)),
            None => Err(EngineError::invalid_state("skip rest", "no timer is running")),
        }
    }

    pub fn adjust_rest(&mut self, delta_seconds: i64) -> EngineResult<Events> {
        self.require(&[SessionState::Active, SessionState::Paused], "adjust the timer")?;
        self.timer.adjust(delta_seconds)?;
        Ok(Vec::new())
    }

    /// Counts down the duration of the set under the cursor.
    pub fn start_set_timer(&mut self) -> EngineResult<Events> {
        self.require(&[SessionState::Active], "start a set timer")?;
        let at = self.live_cursor()?;
        let set = &self.session.exercises[at.exercise_index].sets[at.set_index];

        let seconds = match set.effective_duration() {
            Some(s) if s > 0 => s,
            _ => {
                return Err(EngineError::validation(
                    "targetDuration",
                    format!("set {at} has no duration to count down"),
                ));
            }
        };
        let kind = if set.set_type == SetType::Warmup {
            TimerKind::Warmup
        } else {
            TimerKind::Exercise
        };

        self.timer.start(kind, seconds);
        self.advance_after_rest = false;
        self.timer_held_by_pause = false;
        Ok(vec![SessionEvent::RestTimerStarted { kind, seconds }])
    }

    /// Pausing the session also pauses a running timer.
    pub fn pause_session(&mut self) -> EngineResult<Events> {
        self.require(&[SessionState::Active], "pause")?;

        self.session.paused_at = Some(self.clock.now());
        self.state = SessionState::Paused;
        if self.timer.is_running() {
            self.timer.pause();
            self.timer_held_by_pause = true;
        }

        info!(id = %self.session.id, "session paused");
        Ok(vec![SessionEvent::SessionPaused])
    }

    pub fn resume_session(&mut self) -> EngineResult<Events> {
        self.require(&[SessionState::Paused], "resume")?;

        self.session.resumed_at = Some(self.clock.now());
        self.state = SessionState::Active;
        if self.timer_held_by_pause {
            self.timer.resume();
            self.timer_held_by_pause = false;
        }

        info!(id = %self.session.id, "session resumed");
        Ok(vec![SessionEvent::SessionResumed])
    }

    pub fn finish(&mut self) -> EngineResult<Events> {
        self.require(&[SessionState::Active, SessionState::Paused], "finish")?;
        self.terminate(SessionState::Completed);

        let metrics = self.session.metrics.clone();
        info!(
            id = %self.session.id,
            volume = metrics.total_volume,
            completion = metrics.completion_rate,
            "session finished"
        );
        Ok(vec![SessionEvent::SessionFinished(metrics)])
    }

    pub fn abandon(&mut self) -> EngineResult<Events> {
        self.require(&[SessionState::Active, SessionState::Paused], "abandon")?;
        self.terminate(SessionState::Abandoned);

        info!(id = %self.session.id, "session abandoned");
        Ok(vec![SessionEvent::SessionAbandoned])
    }

    pub fn set_notes(&mut self, notes: Option<String>) -> EngineResult<Events> {
        self.require(
            &[SessionState::NotStarted, SessionState::Active, SessionState::Paused],
            "edit notes",
        )?;
        self.session.notes = notes.filter(|n| !n.trim().is_empty());
        Ok(Vec::new())
    }

    /// Appends a record detected by the caller. Nothing here decides what
    /// counts as a record.
    pub fn add_personal_record(&mut self, record: PersonalRecord) -> EngineResult<Events> {
        self.require(
            &[SessionState::NotStarted, SessionState::Active, SessionState::Paused],
            "add a personal record",
        )?;
        self.session.metrics.personal_records.push(record);
        Ok(vec![self.recompute()])
    }

    fn require(&self, allowed: &[SessionState], operation: &'static str) -> EngineResult<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        warn!(id = %self.session.id, state = %self.state, operation, "rejected transition");
        Err(EngineError::invalid_state(operation, self.state))
    }

    fn live_cursor(&self) -> EngineResult<Cursor> {
        self.cursor
            .ok_or_else(|| EngineError::invalid_cursor(None, "session has no sets"))
    }

    fn record(&mut self, at: Cursor, values: ActualValues, completed: bool, now: DateTime<Utc>) {
        let exercise = &mut self.session.exercises[at.exercise_index];
        let set = &mut exercise.sets[at.set_index];

        set.actual_reps = values.reps;
        set.actual_weight = values.weight;
        set.actual_duration = values.duration;
        set.rpe = values.rpe;
        if values.notes.is_some() {
            set.notes = values.notes;
        }
        set.completed = completed;
        set.failed = !completed;
        set.start_time.get_or_insert(now);
        set.end_time = Some(now);

        exercise.completed = exercise.all_sets_completed();
    }

    fn move_to(&mut self, from: Cursor, to: Cursor, now: DateTime<Utc>) -> SessionEvent {
        self.cursor = Some(to);
        self.stamp_set_start(to, now);
        debug!(%from, %to, "cursor moved");
        SessionEvent::CursorMoved { from, to }
    }

    fn stamp_set_start(&mut self, at: Cursor, now: DateTime<Utc>) {
        if let Some(set) = self.session.set_mut(at.exercise_index, at.set_index) {
            set.start_time.get_or_insert(now);
        }
    }

    fn drop_pending_timer(&mut self) {
        self.timer.cancel();
        self.advance_after_rest = false;
        self.timer_held_by_pause = false;
    }

    fn on_timer_signal(&mut self, signal: TimerSignal) -> Events {
        match (signal, self.timer.kind()) {
            (TimerSignal::Warning, _) => vec![SessionEvent::RestTimerWarning {
                remaining: self.timer.time_remaining(),
            }],
            (TimerSignal::Completed, TimerKind::Rest) => {
                let mut events = vec![SessionEvent::RestTimerComplete];
                if std::mem::take(&mut self.advance_after_rest) {
                    if let Some(from) = self.cursor {
                        match cursor::advance(&self.session, from) {
                            Step::At(to) => {
                                let now = self.clock.now();
                                events.push(self.move_to(from, to, now));
                            }
                            Step::End => events.push(SessionEvent::WorkoutCompleteEligible),
                        }
                    }
                }
                events
            }
            (TimerSignal::Completed, _) => match self.cursor {
                Some(cursor) => vec![SessionEvent::ExerciseTimerComplete { cursor }],
                None => Vec::new(),
            },
        }
    }

    fn terminate(&mut self, state: SessionState) {
        let now = self.clock.now();
        self.session.end_time = Some(now);
        self.session.completed = state == SessionState::Completed;
        self.session.abandoned = state == SessionState::Abandoned;

        self.drop_pending_timer();
        self.cursor = None;
        self.state = state;
        self.recompute();
    }

    fn recompute(&mut self) -> SessionEvent {
        let inputs = CalorieInputs {
            duration_minutes: self.elapsed_minutes(),
            body_mass_kg: self.settings.body_mass_kg,
            met: self.settings.met,
        };
        let records = std::mem::take(&mut self.session.metrics.personal_records);
        self.session.metrics = metrics::calculate(&self.session.exercises, inputs, records);
        SessionEvent::MetricsUpdated(self.session.metrics.clone())
    }

    fn elapsed_minutes(&self) -> f64 {
        let Some(start) = self.session.start_time else {
            return 0.0;
        };
        let end = self.session.end_time.unwrap_or_else(|| self.clock.now());
        ((end - start).num_seconds().max(0) as f64) / 60.0
    }
}

fn validate_actuals(values: &ActualValues) -> EngineResult<()> {
    if let Some(rpe) = values.rpe {
        if !(1.0..=10.0).contains(&rpe) {
            return Err(EngineError::validation("rpe", format!("{rpe} is outside 1-10")));
        }
    }
    if let Some(weight) = values.weight {
        if !weight.is_finite() || weight < 0.0 {
            return Err(EngineError::validation(
                "weight",
                format!("{weight} is not a valid load"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{ExerciseInSession, SetInSession};
    use crate::timer::TimerPhase;

    fn clock() -> ManualClock {
        ManualClock::at(DateTime::from_timestamp(1_700_000_000, 0).unwrap())
    }

    fn machine(exercises: Vec<ExerciseInSession>) -> (SessionMachine<ManualClock>, ManualClock) {
        let clock = clock();
        let m = SessionMachine::new(
            WorkoutSession::new(exercises),
            clock.clone(),
            EngineSettings::default(),
        )
        .unwrap();
        (m, clock)
    }

    fn started(exercises: Vec<ExerciseInSession>) -> (SessionMachine<ManualClock>, ManualClock) {
        let (mut m, clock) = machine(exercises);
        m.start().unwrap();
        (m, clock)
    }

    fn squats(sets: usize) -> ExerciseInSession {
        ExerciseInSession::new("Squat", vec![SetInSession::normal(10, Some(50.0)); sets]).with_rest(60)
    }

    fn ten_at_fifty() -> ActualValues {
        ActualValues::reps_at(10, Some(50.0))
    }

    fn assert_invariants(s: &WorkoutSession) {
        assert!(!(s.completed && s.abandoned));
        assert_eq!(s.end_time.is_some(), s.completed || s.abandoned);
        assert!((0.0..=100.0).contains(&s.metrics.completion_rate));
    }

    #[test]
    fn start_twice_is_rejected() {
        let (mut m, _) = started(vec![squats(1)]);
        assert_eq!(m.state(), SessionState::Active);
        assert_eq!(m.cursor(), Some(Cursor::new(0, 0)));
        assert!(m.session().exercises[0].sets[0].start_time.is_some());

        assert!(matches!(m.start(), Err(EngineError::InvalidState { .. })));
    }

    #[test]
    fn completing_every_set_of_one_exercise() {
        let (mut m, _) = started(vec![squats(3)]);

        for i in 0..3 {
            let at = m.cursor().unwrap();
            assert_eq!(at, Cursor::new(0, i));
            m.complete_set(at, ten_at_fifty()).unwrap();
            if i < 2 {
                assert!(m.is_resting());
                m.skip_rest().unwrap();
            }
        }

        let metrics = &m.session().metrics;
        assert_eq!(metrics.total_volume, 1500.0);
        assert_eq!(metrics.completion_rate, 100.0);
        assert!(m.session().exercises[0].completed);
        assert_invariants(m.session());
    }

    #[test]
    fn one_set_done_out_of_four() {
        let (mut m, _) = started(vec![squats(2), squats(2)]);
        m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();

        let metrics = &m.session().metrics;
        assert_eq!(metrics.completed_sets, 1);
        assert_eq!(metrics.exercises_completed, 1);
        assert_eq!(metrics.completion_rate, 25.0);
    }

    #[test]
    fn last_set_does_not_start_rest() {
        let (mut m, _) = started(vec![squats(1), squats(1)]);
        m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();
        m.skip_rest().unwrap();
        assert_eq!(m.cursor(), Some(Cursor::new(1, 0)));

        let events = m.complete_set(Cursor::new(1, 0), ten_at_fifty()).unwrap();
        assert!(events.contains(&SessionEvent::WorkoutCompleteEligible));
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::RestTimerStarted { .. })));
        assert!(!m.timer_state().is_active);
        assert!(cursor::advance(m.session(), Cursor::new(1, 0)).is_end());
        assert_eq!(m.state(), SessionState::Active);
    }

    #[test]
    fn failed_set_earns_no_rest() {
        let (mut m, _) = started(vec![squats(2)]);
        let events = m
            .fail_set(Cursor::new(0, 0), ActualValues::reps_at(6, Some(50.0)))
            .unwrap();

        let set = &m.session().exercises[0].sets[0];
        assert!(!set.completed);
        assert!(set.failed);
        assert_eq!(set.actual_reps, Some(6));
        assert_eq!(m.timer().phase(), TimerPhase::Idle);
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::RestTimerStarted { .. })));
        assert_eq!(m.cursor(), Some(Cursor::new(0, 0)));

        m.advance().unwrap();
        assert_eq!(m.cursor(), Some(Cursor::new(0, 1)));
    }

    #[test]
    fn failing_the_live_set_during_rest_drops_the_rest() {
        let (mut m, _) = started(vec![squats(2)]);
        m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();
        assert!(m.is_resting());

        m.fail_set(Cursor::new(0, 0), ActualValues::reps_at(7, Some(50.0)))
            .unwrap();
        assert!(!m.is_resting());
        assert!(!m.timer().is_pending());

        for _ in 0..120 {
            assert!(m.tick().unwrap().is_empty());
        }
        assert_eq!(m.cursor(), Some(Cursor::new(0, 0)));
        assert!(m.session().exercises[0].sets[0].failed);
    }

    #[test]
    fn failing_a_past_set_keeps_the_current_rest() {
        let (mut m, _) = started(vec![squats(3)]);
        m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();
        m.skip_rest().unwrap();
        m.complete_set(Cursor::new(0, 1), ten_at_fifty()).unwrap();

        m.fail_set(Cursor::new(0, 0), ActualValues::reps_at(7, Some(50.0)))
            .unwrap();
        assert!(m.is_resting());
    }

    #[test]
    fn completing_after_failure_clears_the_failure() {
        let (mut m, _) = started(vec![squats(1)]);
        m.fail_set(Cursor::new(0, 0), ActualValues::reps_at(4, Some(50.0))).unwrap();
        m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();

        let set = &m.session().exercises[0].sets[0];
        assert!(set.completed && !set.failed);
    }

    #[test]
    fn rest_completion_moves_the_cursor() {
        let (mut m, _) = started(vec![squats(2)]);
        let events = m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();
        assert!(events.contains(&SessionEvent::RestTimerStarted {
            kind: TimerKind::Rest,
            seconds: 60
        }));
        assert_eq!(m.cursor(), Some(Cursor::new(0, 0)));

        let mut all = Vec::new();
        for _ in 0..60 {
            all.extend(m.tick().unwrap());
        }

        assert_eq!(
            all,
            vec![
                SessionEvent::RestTimerWarning { remaining: 10 },
                SessionEvent::RestTimerComplete,
                SessionEvent::CursorMoved {
                    from: Cursor::new(0, 0),
                    to: Cursor::new(0, 1)
                },
            ]
        );
        assert_eq!(m.cursor(), Some(Cursor::new(0, 1)));
    }

    #[test]
    fn rest_uses_the_finished_exercise_rest_time() {
        let first = squats(1).with_rest(45);
        let second = squats(1).with_rest(180);
        let (mut m, _) = started(vec![first, second]);

        m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();
        assert_eq!(m.timer_state().initial_time, 45);
    }

    #[test]
    fn zero_rest_advances_immediately() {
        let (mut m, _) = started(vec![squats(2).with_rest(0)]);
        let events = m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();
        assert!(events.contains(&SessionEvent::CursorMoved {
            from: Cursor::new(0, 0),
            to: Cursor::new(0, 1)
        }));
        assert!(!m.is_resting());
    }

    #[test]
    fn advance_during_rest_skips_it_once() {
        let (mut m, _) = started(vec![squats(3)]);
        m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();

        let events = m.advance().unwrap();
        assert_eq!(events[0], SessionEvent::RestTimerComplete);
        assert_eq!(m.cursor(), Some(Cursor::new(0, 1)));
        assert_eq!(m.timer().phase(), TimerPhase::Completed);
    }

    #[test]
    fn pausing_the_session_freezes_the_timer() {
        let (mut m, clock) = started(vec![squats(2)]);
        m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();
        for _ in 0..5 {
            m.tick().unwrap();
        }

        m.pause_session().unwrap();
        let frozen = m.timer_state();
        assert!(!frozen.is_active);
        assert!(m.session().paused_at.is_some());

        clock.advance_secs(3600);
        for _ in 0..300 {
            assert!(m.tick().unwrap().is_empty());
        }
        assert_eq!(m.timer_state(), frozen);

        m.resume_session().unwrap();
        assert!(m.timer_state().is_active);
        assert_eq!(m.timer_state().time_remaining, 55);
        assert!(m.session().resumed_at.is_some());
    }

    #[test]
    fn paused_session_rejects_set_edits_and_double_pause() {
        let (mut m, _) = started(vec![squats(2)]);
        m.pause_session().unwrap();

        assert!(m.complete_set(Cursor::new(0, 0), ten_at_fifty()).is_err());
        assert!(m.pause_session().is_err());
        assert!(m.advance().is_err());
        m.resume_session().unwrap();
        assert!(m.resume_session().is_err());
    }

    #[test]
    fn retreat_keeps_completion_and_drops_rest() {
        let (mut m, _) = started(vec![squats(3).with_rest(0)]);
        m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();
        m.complete_set(Cursor::new(0, 1), ten_at_fifty()).unwrap();
        assert_eq!(m.cursor(), Some(Cursor::new(0, 2)));

        m.retreat().unwrap();
        m.retreat().unwrap();
        assert_eq!(m.cursor(), Some(Cursor::new(0, 0)));
        assert!(m.session().exercises[0].sets[0].completed);
        assert!(m.retreat().unwrap().is_empty());
    }

    #[test]
    fn editing_a_past_set_does_not_move_the_cursor() {
        let (mut m, _) = started(vec![squats(3).with_rest(0)]);
        m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();

        let edit = ActualValues::reps_at(8, Some(55.0)).with_rpe(9.0);
        let events = m.complete_set(Cursor::new(0, 0), edit).unwrap();
        assert_eq!(m.cursor(), Some(Cursor::new(0, 1)));
        assert!(!m.is_resting());
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::CursorMoved { .. })));
        assert_eq!(m.session().metrics.total_volume, 440.0);
    }

    #[test]
    fn jump_clamps_and_skip_moves_on() {
        let (mut m, _) = started(vec![squats(1), squats(2), squats(1)]);
        m.jump_to_exercise(10).unwrap();
        assert_eq!(m.cursor(), Some(Cursor::new(2, 0)));

        m.jump_to_exercise(1).unwrap();
        let events = m.skip_exercise(1).unwrap();
        assert!(m.session().exercises[1].skipped);
        assert_eq!(m.cursor(), Some(Cursor::new(2, 0)));
        assert!(events.contains(&SessionEvent::ExerciseSkipped { exercise_index: 1 }));

        assert!(matches!(
            m.skip_exercise(7),
            Err(EngineError::InvalidCursor { .. })
        ));
    }

    #[test]
    fn timed_set_counts_down_its_duration() {
        let plank = ExerciseInSession::new("Plank", vec![SetInSession::timed(30)]);
        let (mut m, _) = started(vec![plank, squats(1)]);

        m.start_set_timer().unwrap();
        assert_eq!(m.timer().kind(), TimerKind::Exercise);
        let mut events = Vec::new();
        for _ in 0..30 {
            events.extend(m.tick().unwrap());
        }
        assert_eq!(
            events.last(),
            Some(&SessionEvent::ExerciseTimerComplete {
                cursor: Cursor::new(0, 0)
            })
        );
        assert_eq!(m.cursor(), Some(Cursor::new(0, 0)));

        m.advance().unwrap();
        assert!(matches!(
            m.start_set_timer(),
            Err(EngineError::Validation { .. })
        ));
    }

    #[test]
    fn adjust_rest_is_clamped() {
        let (mut m, _) = started(vec![squats(2)]);
        assert!(m.adjust_rest(10).is_err());

        m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();
        m.adjust_rest(-120).unwrap();
        assert_eq!(m.timer_state().time_remaining, 1);
        assert!(m.is_resting());

        m.adjust_rest(i64::MAX).unwrap();
        assert_eq!(m.timer_state().time_remaining, u32::MAX);
        assert!(m.is_resting());
    }

    #[test]
    fn navigating_away_forgets_the_rest() {
        let (mut m, _) = started(vec![squats(2), squats(2)]);
        m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();
        m.jump_to_exercise(1).unwrap();

        assert_eq!(m.timer().phase(), TimerPhase::Idle);
        assert!(m.pending_timer().is_none());
        assert!(matches!(m.skip_rest(), Err(EngineError::InvalidState { .. })));
        assert!(m.adjust_rest(30).is_err());

        m.complete_set(Cursor::new(1, 0), ten_at_fifty()).unwrap();
        m.retreat().unwrap();
        assert!(m.skip_rest().is_err());
        assert_eq!(m.cursor(), Some(Cursor::new(0, 1)));
    }

    #[test]
    fn invalid_input_leaves_session_untouched() {
        let (mut m, _) = started(vec![squats(2)]);
        let before = m.session().clone();

        let bad_rpe = ten_at_fifty().with_rpe(11.0);
        assert!(matches!(
            m.complete_set(Cursor::new(0, 0), bad_rpe),
            Err(EngineError::Validation { field: "rpe", .. })
        ));
        assert!(matches!(
            m.complete_set(Cursor::new(0, 5), ten_at_fifty()),
            Err(EngineError::InvalidCursor { .. })
        ));
        let negative = ActualValues::reps_at(5, Some(-20.0));
        assert!(m.fail_set(Cursor::new(0, 0), negative).is_err());

        assert_eq!(m.session(), &before);
        assert_eq!(m.cursor(), Some(Cursor::new(0, 0)));
    }

    #[test]
    fn finish_and_abandon_are_terminal() {
        let (mut m, clock) = started(vec![squats(2)]);
        m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();
        clock.advance_secs(60 * 60);

        let events = m.finish().unwrap();
        let s = m.session();
        assert!(s.completed && !s.abandoned);
        assert_eq!(s.end_time, Some(clock.now()));
        assert_eq!(s.metrics.estimated_calories, 350);
        assert!(matches!(events[0], SessionEvent::SessionFinished(_)));
        assert_eq!(m.cursor(), None);
        assert_invariants(m.session());

        assert!(m.finish().is_err());
        assert!(m.abandon().is_err());
        assert!(m.tick().is_err());
        assert!(m.set_notes(Some("late".into())).is_err());
        assert!(m.complete_set(Cursor::new(0, 1), ten_at_fifty()).is_err());
    }

    #[test]
    fn abandon_from_pause() {
        let (mut m, _) = started(vec![squats(2)]);
        m.pause_session().unwrap();
        m.abandon().unwrap();

        let s = m.session();
        assert!(s.abandoned && !s.completed);
        assert_eq!(m.state(), SessionState::Abandoned);
        assert_invariants(s);
        assert!(m.resume_session().is_err());
    }

    #[test]
    fn operations_before_start_are_rejected() {
        let (mut m, _) = machine(vec![squats(1)]);
        assert!(m.finish().is_err());
        assert!(m.tick().is_err());
        assert!(m.complete_set(Cursor::new(0, 0), ten_at_fifty()).is_err());
        assert!(m.set_notes(Some("warm up well".into())).is_ok());
    }

    #[test]
    fn session_without_sets_is_immediately_eligible() {
        let (mut m, _) = machine(vec![ExerciseInSession::new("Stretch", Vec::new())]);
        let events = m.start().unwrap();
        assert!(events.contains(&SessionEvent::WorkoutCompleteEligible));
        assert_eq!(m.cursor(), None);
        assert!(m.advance().is_err());
        m.finish().unwrap();
    }

    #[test]
    fn personal_records_survive_recomputation() {
        let (mut m, clock) = started(vec![squats(2)]);
        let record = PersonalRecord {
            exercise_id: "squat".into(),
            exercise_name: "Squat".into(),
            weight: 140.0,
            reps: 1,
            estimated_1rm: 140.0,
            achieved_at: clock.now(),
        };
        m.add_personal_record(record.clone()).unwrap();
        m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();
        m.finish().unwrap();

        assert_eq!(m.session().metrics.personal_records, vec![record]);
    }

    #[test]
    fn restoring_a_stored_session() {
        let (mut m, clock) = started(vec![squats(3)]);
        m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();
        m.pause_session().unwrap();
        let stored = m.into_session();

        let restored = SessionMachine::new(stored.clone(), clock.clone(), EngineSettings::default()).unwrap();
        assert_eq!(restored.state(), SessionState::Paused);
        assert_eq!(restored.cursor(), Some(Cursor::new(0, 1)));

        let pinned = SessionMachine::new(stored, clock, EngineSettings::default())
            .unwrap()
            .with_cursor(Cursor::new(0, 0))
            .unwrap();
        assert_eq!(pinned.cursor(), Some(Cursor::new(0, 0)));
    }

    #[test]
    fn contradictory_record_is_refused() {
        let mut s = WorkoutSession::new(vec![squats(1)]);
        s.completed = true;
        s.abandoned = true;
        assert!(SessionMachine::new(s, clock(), EngineSettings::default()).is_err());
    }

    #[test]
    fn end_time_must_match_the_terminal_flags() {
        let mut dangling = WorkoutSession::new(vec![squats(1)]);
        dangling.start_time = Some(clock().now());
        dangling.end_time = Some(clock().now());
        assert!(matches!(
            SessionMachine::new(dangling, clock(), EngineSettings::default()),
            Err(EngineError::InvalidState { .. })
        ));

        let mut open_ended = WorkoutSession::new(vec![squats(1)]);
        open_ended.start_time = Some(clock().now());
        open_ended.completed = true;
        assert!(matches!(
            SessionMachine::new(open_ended, clock(), EngineSettings::default()),
            Err(EngineError::InvalidState { .. })
        ));
    }

    #[test]
    fn pending_rest_survives_a_reload() {
        let (mut m, clock) = started(vec![squats(3)]);
        m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();
        for _ in 0..20 {
            m.tick().unwrap();
        }
        let pending = m.pending_timer().unwrap();
        assert_eq!(pending.timer.time_remaining, 40);
        assert!(pending.advance_after);

        let at = m.cursor().unwrap();
        let stored = m.into_session();
        let mut back = SessionMachine::new(stored, clock, EngineSettings::default())
            .unwrap()
            .with_cursor(at)
            .unwrap()
            .with_pending_timer(pending)
            .unwrap();
        assert!(back.is_resting());
        assert!(back.timer().is_running());

        let events = back.advance().unwrap();
        assert_eq!(events[0], SessionEvent::RestTimerComplete);
        assert_eq!(back.cursor(), Some(Cursor::new(0, 1)));
        assert!(!back.session().exercises[0].sets[1].completed);
    }

    #[test]
    fn rest_saved_during_a_pause_waits_for_resume() {
        let (mut m, clock) = started(vec![squats(2)]);
        m.complete_set(Cursor::new(0, 0), ten_at_fifty()).unwrap();
        m.pause_session().unwrap();
        let pending = m.pending_timer().unwrap();
        assert!(!pending.timer.is_active);

        let stored = m.into_session();
        let mut back = SessionMachine::new(stored, clock, EngineSettings::default())
            .unwrap()
            .with_cursor(Cursor::new(0, 0))
            .unwrap()
            .with_pending_timer(pending)
            .unwrap();
        assert_eq!(back.state(), SessionState::Paused);
        assert!(back.tick().unwrap().is_empty());
        assert_eq!(back.timer_state().time_remaining, 60);

        back.resume_session().unwrap();
        assert!(back.timer().is_running());
        let mut events = Vec::new();
        for _ in 0..60 {
            events.extend(back.tick().unwrap());
        }
        assert!(events.contains(&SessionEvent::CursorMoved {
            from: Cursor::new(0, 0),
            to: Cursor::new(0, 1)
        }));
    }

    #[test]
    fn dispatch_routes_actions() {
        let (mut m, _) = machine(vec![squats(2)]);
        m.dispatch(Action::Start).unwrap();
        m.dispatch(Action::CompleteSet {
            cursor: Cursor::new(0, 0),
            values: ten_at_fifty(),
        })
        .unwrap();
        m.dispatch(Action::SkipRest).unwrap();
        m.dispatch(Action::Pause).unwrap();
        m.dispatch(Action::Finish).unwrap();

        assert_eq!(m.state(), SessionState::Completed);
        assert_eq!(m.session().metrics.completed_sets, 1);
    }
}
