use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One real-time execution of a workout, from start to finish or abandonment.
/// This is the record handed to persistence after every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSession {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub exercises: Vec<ExerciseInSession>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub abandoned: bool,
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resumed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub metrics: SessionMetrics,
}

impl WorkoutSession {
    /// Ad hoc session with a fresh id. `order` is normalized to the array position.
    pub fn new(exercises: Vec<ExerciseInSession>) -> Self {
        let mut session = Self {
            id: Uuid::new_v4().to_string(),
            name: None,
            template_id: None,
            exercises,
            start_time: None,
            end_time: None,
            completed: false,
            abandoned: false,
            paused_at: None,
            resumed_at: None,
            notes: None,
            metrics: SessionMetrics::default(),
        };
        session.renumber();
        session
    }

    pub fn is_terminal(&self) -> bool {
        self.completed || self.abandoned
    }

    /// Paused if the last pause is newer than the last resume.
    pub fn is_paused(&self) -> bool {
        match (self.paused_at, self.resumed_at) {
            (Some(p), Some(r)) => p > r,
            (Some(_), None) => true,
            _ => false,
        }
    }

    pub fn set(&self, exercise_index: usize, set_index: usize) -> Option<&SetInSession> {
        self.exercises.get(exercise_index)?.sets.get(set_index)
    }

    pub fn set_mut(&mut self, exercise_index: usize, set_index: usize) -> Option<&mut SetInSession> {
        self.exercises.get_mut(exercise_index)?.sets.get_mut(set_index)
    }

    pub fn total_sets(&self) -> usize {
        self.exercises.iter().map(|e| e.sets.len()).sum()
    }

    pub(crate) fn renumber(&mut self) {
        for (i, exercise) in self.exercises.iter_mut().enumerate() {
            exercise.order = i;
        }
    }
}

/// An exercise as performed inside a session. Owned by its session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseInSession {
    pub exercise_id: String,
    pub name: String,
    pub order: usize,
    pub sets: Vec<SetInSession>,
    /// Seconds of rest between this exercise's sets.
    #[serde(default = "default_rest_time")]
    pub rest_time: u32,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub skipped: bool,
}

pub const DEFAULT_REST_TIME: u32 = 90;

fn default_rest_time() -> u32 {
    DEFAULT_REST_TIME
}

impl ExerciseInSession {
    pub fn new(name: impl Into<String>, sets: Vec<SetInSession>) -> Self {
        Self {
            exercise_id: Uuid::new_v4().to_string(),
            name: name.into(),
            order: 0,
            sets,
            rest_time: DEFAULT_REST_TIME,
            completed: false,
            skipped: false,
        }
    }

    pub fn with_rest(mut self, seconds: u32) -> Self {
        self.rest_time = seconds;
        self
    }

    pub fn has_progress(&self) -> bool {
        self.sets.iter().any(|s| s.completed)
    }

    pub fn all_sets_completed(&self) -> bool {
        !self.sets.is_empty() && self.sets.iter().all(|s| s.completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetType {
    #[default]
    Normal,
    Warmup,
    Dropset,
    RestPause,
    Timed,
}

/// A single planned set. Targets are fixed at creation; actuals are only
/// written when the set is completed or failed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetInSession {
    #[serde(rename = "type", default)]
    pub set_type: SetType,
    #[serde(default)]
    pub target_reps: Option<u32>,
    #[serde(default)]
    pub target_weight: Option<f64>,
    #[serde(default)]
    pub target_duration: Option<u32>,
    #[serde(default)]
    pub actual_reps: Option<u32>,
    #[serde(default)]
    pub actual_weight: Option<f64>,
    #[serde(default)]
    pub actual_duration: Option<u32>,
    #[serde(default)]
    pub rpe: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl SetInSession {
    pub fn normal(reps: u32, weight: Option<f64>) -> Self {
        Self {
            target_reps: Some(reps),
            target_weight: weight,
            ..Self::default()
        }
    }

    pub fn timed(seconds: u32) -> Self {
        Self {
            set_type: SetType::Timed,
            target_duration: Some(seconds),
            ..Self::default()
        }
    }

    pub fn of_type(mut self, set_type: SetType) -> Self {
        self.set_type = set_type;
        self
    }

    pub fn effective_reps(&self) -> Option<u32> {
        self.actual_reps.or(self.target_reps)
    }

    pub fn effective_weight(&self) -> Option<f64> {
        self.actual_weight.or(self.target_weight)
    }

    pub fn effective_duration(&self) -> Option<u32> {
        self.actual_duration.or(self.target_duration)
    }

    /// Weight × reps, 0 when either is missing.
    pub fn volume(&self) -> f64 {
        match (self.effective_weight(), self.effective_reps()) {
            (Some(w), Some(r)) => w * f64::from(r),
            _ => 0.0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.completed || self.failed
    }
}

/// Values the user reports when closing a set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActualValues {
    pub reps: Option<u32>,
    pub weight: Option<f64>,
    pub duration: Option<u32>,
    pub rpe: Option<f64>,
    pub notes: Option<String>,
}

impl ActualValues {
    pub fn reps_at(reps: u32, weight: Option<f64>) -> Self {
        Self {
            reps: Some(reps),
            weight,
            ..Self::default()
        }
    }

    pub fn with_rpe(mut self, rpe: f64) -> Self {
        self.rpe = Some(rpe);
        self
    }
}

/// Aggregate numbers for a session, recomputed from the exercise tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    pub total_volume: f64,
    pub total_sets: u32,
    pub completed_sets: u32,
    pub total_reps: u32,
    #[serde(rename = "averageRPE")]
    pub average_rpe: f64,
    pub exercises_completed: u32,
    /// Percentage in [0, 100].
    pub completion_rate: f64,
    pub estimated_calories: u32,
    #[serde(default)]
    pub personal_records: Vec<PersonalRecord>,
}

/// A record supplied by whoever tracks training history. The engine only carries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalRecord {
    pub exercise_id: String,
    pub exercise_name: String,
    pub weight: f64,
    pub reps: u32,
    pub estimated_1rm: f64,
    pub achieved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneRMFormula {
    Epley,
    Brzycki,
    Lombardi,
    OConner,
}

/// (exercise, set) position currently being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub exercise_index: usize,
    pub set_index: usize,
}

impl Cursor {
    pub const fn new(exercise_index: usize, set_index: usize) -> Self {
        Self {
            exercise_index,
            set_index,
        }
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.exercise_index + 1, self.set_index + 1)
    }
}
