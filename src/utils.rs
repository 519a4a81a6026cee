use chrono::{DateTime, Utc};

use crate::models::{ExerciseInSession, OneRMFormula, PersonalRecord};

/// Brzycki's divisor reaches zero at 37 reps; past its range Epley is used.
pub fn calculate_1rm(weight: f64, reps: u32, formula: OneRMFormula) -> f64 {
    if formula == OneRMFormula::Brzycki && reps >= 37 {
        return calculate_1rm(weight, reps, OneRMFormula::Epley);
    }
    let reps = f64::from(reps);
    match formula {
        OneRMFormula::Epley => weight * (1.0 + reps / 30.0),
        OneRMFormula::Brzycki => weight / (1.0278 - 0.0278 * reps),
        OneRMFormula::Lombardi => weight * reps.powf(0.10),
        OneRMFormula::OConner => weight * (1.0 + 0.025 * reps),
    }
}

/// Builds a record for an exercise. Whether it actually is a record is the
/// caller's call.
pub fn personal_record(
    exercise: &ExerciseInSession,
    weight: f64,
    reps: u32,
    formula: OneRMFormula,
    achieved_at: DateTime<Utc>,
) -> PersonalRecord {
    PersonalRecord {
        exercise_id: exercise.exercise_id.clone(),
        exercise_name: exercise.name.clone(),
        weight,
        reps,
        estimated_1rm: calculate_1rm(weight, reps, formula),
        achieved_at,
    }
}

pub fn format_duration(duration: chrono::Duration) -> String {
    let hours = duration.num_hours();
    let minutes = duration.num_minutes() % 60;
    let seconds = duration.num_seconds() % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// `m:ss` for countdowns.
pub fn format_countdown(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
