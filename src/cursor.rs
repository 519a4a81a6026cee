//! Navigation over the exercise → set hierarchy.
//!
//! Exercises without sets are passed over in both directions, so a cursor
//! produced here always references an existing set.

use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::models::{Cursor, WorkoutSession};

/// Result of moving forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    At(Cursor),
    /// No further set exists; the workout has been walked to the end.
    End,
}

impl Step {
    pub fn cursor(self) -> Option<Cursor> {
        match self {
            Step::At(c) => Some(c),
            Step::End => None,
        }
    }

    pub fn is_end(self) -> bool {
        matches!(self, Step::End)
    }
}

pub fn advance(session: &WorkoutSession, cursor: Cursor) -> Step {
    if let Some(exercise) = session.exercises.get(cursor.exercise_index) {
        if cursor.set_index + 1 < exercise.sets.len() {
            return Step::At(Cursor::new(cursor.exercise_index, cursor.set_index + 1));
        }
    }

    let step = match next_with_sets(session, cursor.exercise_index + 1) {
        Some(e) => Step::At(Cursor::new(e, 0)),
        None => Step::End,
    };
    debug!(from = %cursor, ?step, "cursor advance");
    step
}

/// Moving back from the very first set is a no-op.
pub fn retreat(session: &WorkoutSession, cursor: Cursor) -> Cursor {
    let current_len = session
        .exercises
        .get(cursor.exercise_index)
        .map_or(0, |e| e.sets.len());

    if cursor.set_index > 0 && current_len > 0 {
        let set_index = (cursor.set_index - 1).min(current_len - 1);
        return Cursor::new(cursor.exercise_index, set_index);
    }

    match prev_with_sets(session, cursor.exercise_index) {
        Some(e) => Cursor::new(e, session.exercises[e].sets.len() - 1),
        None => cursor,
    }
}

/// Index is clamped into range. A target without sets resolves to the next
/// exercise that has some, or failing that the previous one.
pub fn jump_to_exercise(session: &WorkoutSession, exercise_index: usize) -> EngineResult<Cursor> {
    let len = session.exercises.len();
    if len == 0 {
        return Err(EngineError::invalid_cursor(None, "session has no exercises"));
    }

    let target = exercise_index.min(len - 1);
    let resolved = if session.exercises[target].sets.is_empty() {
        next_with_sets(session, target + 1).or_else(|| prev_with_sets(session, target))
    } else {
        Some(target)
    };

    resolved
        .map(|e| Cursor::new(e, 0))
        .ok_or_else(|| EngineError::invalid_cursor(None, "no exercise has any sets"))
}

pub fn first(session: &WorkoutSession) -> Option<Cursor> {
    next_with_sets(session, 0).map(|e| Cursor::new(e, 0))
}

/// Where to pick a session back up: the first set that is neither completed
/// nor failed, else the last set.
pub fn resume_point(session: &WorkoutSession) -> Option<Cursor> {
    let mut last = None;
    for (e, exercise) in session.exercises.iter().enumerate() {
        for (s, set) in exercise.sets.iter().enumerate() {
            if !set.is_done() {
                return Some(Cursor::new(e, s));
            }
            last = Some(Cursor::new(e, s));
        }
    }
    last
}

pub fn validate(session: &WorkoutSession, cursor: Cursor) -> EngineResult<()> {
    let exercise = session.exercises.get(cursor.exercise_index).ok_or_else(|| {
        EngineError::invalid_cursor(
            Some(cursor),
            format!("exercise {} does not exist", cursor.exercise_index),
        )
    })?;

    if cursor.set_index >= exercise.sets.len() {
        return Err(EngineError::invalid_cursor(
            Some(cursor),
            format!("`{}` has {} sets", exercise.name, exercise.sets.len()),
        ));
    }
    Ok(())
}

fn next_with_sets(session: &WorkoutSession, from: usize) -> Option<usize> {
    (from..session.exercises.len()).find(|&i| !session.exercises[i].sets.is_empty())
}

fn prev_with_sets(session: &WorkoutSession, before: usize) -> Option<usize> {
    let before = before.min(session.exercises.len());
    (0..before).rev().find(|&i| !session.exercises[i].sets.is_empty())
}
