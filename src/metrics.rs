//! Pure aggregation over the exercise/set tree.

use crate::models::{ExerciseInSession, PersonalRecord, SessionMetrics};

/// Inputs from outside the tree: elapsed time and profile values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalorieInputs {
    pub duration_minutes: f64,
    pub body_mass_kg: f64,
    pub met: f64,
}

pub const DEFAULT_MET: f64 = 5.0;
pub const DEFAULT_BODY_MASS_KG: f64 = 70.0;

impl Default for CalorieInputs {
    fn default() -> Self {
        Self {
            duration_minutes: 0.0,
            body_mass_kg: DEFAULT_BODY_MASS_KG,
            met: DEFAULT_MET,
        }
    }
}

/// Recomputes every metric from scratch. `personal_records` is carried over
/// untouched.
pub fn calculate(
    exercises: &[ExerciseInSession],
    calories: CalorieInputs,
    personal_records: Vec<PersonalRecord>,
) -> SessionMetrics {
    let mut total_sets = 0u32;
    let mut completed_sets = 0u32;
    let mut total_volume = 0.0;
    let mut total_reps = 0u32;
    let mut rpe_sum = 0.0;
    let mut rpe_count = 0u32;

    for set in exercises.iter().flat_map(|e| e.sets.iter()) {
        total_sets += 1;
        if !set.completed {
            continue;
        }
        completed_sets += 1;

        if let Some(reps) = set.effective_reps() {
            total_reps = total_reps.saturating_add(reps);
            total_volume += set.volume();
        }
        if let Some(rpe) = set.rpe {
            rpe_sum += rpe;
            rpe_count += 1;
        }
    }

    let average_rpe = if rpe_count == 0 {
        0.0
    } else {
        rpe_sum / f64::from(rpe_count)
    };

    SessionMetrics {
        total_volume,
        total_sets,
        completed_sets,
        total_reps,
        average_rpe,
        exercises_completed: exercises_with_progress(exercises),
        completion_rate: completion_rate(completed_sets, total_sets),
        estimated_calories: estimated_calories(calories),
        personal_records,
    }
}

/// Percentage of completed sets, 0 when there are none.
pub fn completion_rate(completed_sets: u32, total_sets: u32) -> f64 {
    if total_sets == 0 {
        return 0.0;
    }
    (f64::from(completed_sets) / f64::from(total_sets) * 100.0).clamp(0.0, 100.0)
}

/// Exercises with at least one completed set. This is what
/// `exercisesCompleted` reports.
pub fn exercises_with_progress(exercises: &[ExerciseInSession]) -> u32 {
    count(exercises, ExerciseInSession::has_progress)
}

/// Exercises where every set is completed.
pub fn exercises_fully_completed(exercises: &[ExerciseInSession]) -> u32 {
    count(exercises, ExerciseInSession::all_sets_completed)
}

/// MET × kg × hours, rounded. A rough estimate only.
pub fn estimated_calories(inputs: CalorieInputs) -> u32 {
    let kcal = inputs.met * inputs.body_mass_kg * (inputs.duration_minutes / 60.0);
    if kcal.is_finite() && kcal > 0.0 {
        kcal.round() as u32
    } else {
        0
    }
}

fn count(exercises: &[ExerciseInSession], pred: fn(&ExerciseInSession) -> bool) -> u32 {
    exercises.iter().filter(|e| pred(e)).count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SetInSession;

    fn completed(reps: u32, weight: Option<f64>, rpe: Option<f64>) -> SetInSession {
        SetInSession {
            actual_reps: Some(reps),
            actual_weight: weight,
            rpe,
            completed: true,
            ..SetInSession::normal(reps, weight)
        }
    }

    #[test]
    fn three_full_sets_of_fifty_by_ten() {
        let exercises = vec![ExerciseInSession::new(
            "Squat",
            vec![completed(10, Some(50.0), None); 3],
        )];
        let m = calculate(&exercises, CalorieInputs::default(), Vec::new());

        assert_eq!(m.total_volume, 1500.0);
        assert_eq!(m.total_reps, 30);
        assert_eq!(m.completion_rate, 100.0);
        assert_eq!(m.exercises_completed, 1);
        assert_eq!(m.average_rpe, 0.0);
    }

    #[test]
    fn partial_progress_across_two_exercises() {
        let exercises = vec![
            ExerciseInSession::new(
                "Bench",
                vec![completed(8, Some(60.0), Some(8.0)), SetInSession::normal(8, Some(60.0))],
            ),
            ExerciseInSession::new("Row", vec![SetInSession::normal(10, Some(40.0)); 2]),
        ];
        let m = calculate(&exercises, CalorieInputs::default(), Vec::new());

        assert_eq!(m.total_sets, 4);
        assert_eq!(m.completed_sets, 1);
        assert_eq!(m.exercises_completed, 1);
        assert_eq!(m.completion_rate, 25.0);
        assert_eq!(m.average_rpe, 8.0);
        assert_eq!(exercises_fully_completed(&exercises), 0);
    }

    #[test]
    fn bodyweight_sets_add_reps_but_no_volume() {
        let exercises = vec![ExerciseInSession::new(
            "Pull-up",
            vec![completed(12, None, Some(7.0)), completed(10, None, Some(9.0))],
        )];
        let m = calculate(&exercises, CalorieInputs::default(), Vec::new());

        assert_eq!(m.total_reps, 22);
        assert_eq!(m.total_volume, 0.0);
        assert_eq!(m.average_rpe, 8.0);
    }

    #[test]
    fn rep_total_saturates_instead_of_overflowing() {
        let exercises = vec![ExerciseInSession::new(
            "Jump rope",
            vec![completed(u32::MAX, None, None), completed(10, None, None)],
        )];
        let m = calculate(&exercises, CalorieInputs::default(), Vec::new());
        assert_eq!(m.total_reps, u32::MAX);
    }

    #[test]
    fn failed_sets_count_toward_total_only() {
        let failed = SetInSession {
            actual_reps: Some(3),
            actual_weight: Some(100.0),
            rpe: Some(10.0),
            failed: true,
            ..SetInSession::normal(5, Some(100.0))
        };
        let exercises = vec![ExerciseInSession::new("Deadlift", vec![failed])];
        let m = calculate(&exercises, CalorieInputs::default(), Vec::new());

        assert_eq!(m.total_sets, 1);
        assert_eq!(m.completed_sets, 0);
        assert_eq!(m.total_volume, 0.0);
        assert_eq!(m.average_rpe, 0.0);
        assert_eq!(m.exercises_completed, 0);
    }

    #[test]
    fn empty_tree_has_zero_rate() {
        let m = calculate(&[], CalorieInputs::default(), Vec::new());
        assert_eq!(m.total_sets, 0);
        assert_eq!(m.completion_rate, 0.0);

        let empty_exercise = vec![ExerciseInSession::new("Plank", Vec::new())];
        let m = calculate(&empty_exercise, CalorieInputs::default(), Vec::new());
        assert_eq!(m.completion_rate, 0.0);
    }

    #[test]
    fn calories_follow_linear_model() {
        let inputs = CalorieInputs {
            duration_minutes: 60.0,
            body_mass_kg: 80.0,
            met: 5.0,
        };
        assert_eq!(estimated_calories(inputs), 400);

        let half = CalorieInputs {
            duration_minutes: 45.0,
            ..CalorieInputs::default()
        };
        assert_eq!(estimated_calories(half), 263);

        let negative = CalorieInputs {
            duration_minutes: -5.0,
            ..CalorieInputs::default()
        };
        assert_eq!(estimated_calories(negative), 0);
    }

    #[test]
    fn personal_records_are_carried_through() {
        let record = PersonalRecord {
            exercise_id: "bench".into(),
            exercise_name: "Bench".into(),
            weight: 100.0,
            reps: 3,
            estimated_1rm: 110.0,
            achieved_at: chrono::Utc::now(),
        };
        let m = calculate(&[], CalorieInputs::default(), vec![record.clone()]);
        assert_eq!(m.personal_records, vec![record]);
    }

    #[test]
    fn completion_rate_stays_in_range() {
        for total in 0..20u32 {
            for done in 0..=total {
                let rate = completion_rate(done, total);
                assert!((0.0..=100.0).contains(&rate));
            }
        }
    }
}
