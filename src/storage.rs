//! File-based persistence for templates and sessions.
//!
//! Layout under the data directory:
//! - `templates/<name>.toml`: workout templates
//! - `sessions/<id>.json`: session records, one per file
//! - `current.json`: pointer to the session in progress, its cursor and
//!   any countdown left pending

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strsim::jaro_winkler;
use tracing::debug;

use crate::models::{
    Cursor, DEFAULT_REST_TIME, ExerciseInSession, SetInSession, SetType, WorkoutSession,
};
use crate::session::PendingTimer;

const TEMPLATES_DIR: &str = "templates";
const SESSIONS_DIR: &str = "sessions";
const CURRENT_FILE: &str = "current.json";

/// A planned workout, written by hand in TOML:
///
/// ```toml
/// name = "Push A"
///
/// [[exercise]]
/// name = "Bench Press"
/// sets = 3
/// reps = 8
/// weight = 60.0
/// rest = 120
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutTemplate {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "exercise", default)]
    pub exercises: Vec<TemplateExercise>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateExercise {
    pub name: String,
    pub id: Option<String>,
    pub sets: u32,
    pub reps: Option<u32>,
    pub weight: Option<f64>,
    /// Seconds, for timed sets.
    pub duration: Option<u32>,
    #[serde(rename = "type", default)]
    pub set_type: SetType,
    /// Warm-up sets placed before the working sets.
    #[serde(default)]
    pub warmup_sets: u32,
    pub rest: Option<u32>,
}

impl WorkoutTemplate {
    pub fn instantiate(&self, template_id: &str) -> WorkoutSession {
        let exercises = self
            .exercises
            .iter()
            .map(|e| {
                let working = SetInSession {
                    set_type: e.set_type,
                    target_reps: e.reps,
                    target_weight: e.weight,
                    target_duration: e.duration,
                    ..SetInSession::default()
                };
                let warmup = SetInSession {
                    set_type: SetType::Warmup,
                    target_weight: None,
                    ..working.clone()
                };

                let mut sets = vec![warmup; e.warmup_sets as usize];
                sets.extend(std::iter::repeat_n(working, e.sets as usize));

                let mut exercise = ExerciseInSession::new(e.name.clone(), sets)
                    .with_rest(e.rest.unwrap_or(DEFAULT_REST_TIME));
                if let Some(id) = &e.id {
                    exercise.exercise_id = id.clone();
                }
                exercise
            })
            .collect();

        let mut session = WorkoutSession::new(exercises);
        session.name = Some(self.name.clone());
        session.template_id = Some(template_id.to_string());
        session
    }
}

/// The session in progress, with the cursor the last command left it at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSession {
    pub session_id: String,
    pub cursor: Option<Cursor>,
    /// Countdown interrupted by the end of the last command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest: Option<PendingTimer>,
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.templates_dir(), self.sessions_dir()] {
            if !dir.exists() {
                fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
        }
        Ok(())
    }

    fn templates_dir(&self) -> PathBuf {
        self.root.join(TEMPLATES_DIR)
    }

    fn sessions_dir(&self) -> PathBuf {
        self.root.join(SESSIONS_DIR)
    }

    fn current_path(&self) -> PathBuf {
        self.root.join(CURRENT_FILE)
    }

    pub fn template_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = files_with_extension(&self.templates_dir(), "toml")?
            .iter()
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn load_template(&self, name: &str) -> Result<WorkoutTemplate> {
        let path = self.templates_dir().join(format!("{}.toml", name));
        if !path.exists() {
            let names = self.template_names()?;
            return Err(match best_suggestion(name, &names) {
                Some(s) => anyhow!("Template '{}' not found (did you mean `{}`?)", name, s),
                None => anyhow!("Template '{}' not found", name),
            });
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read template file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid template file: {}", path.display()))
    }

    pub fn save_template(&self, id: &str, template: &WorkoutTemplate) -> Result<()> {
        let path = self.templates_dir().join(format!("{}.toml", id));
        let content = toml::to_string_pretty(template)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to save template to {}", path.display()))
    }

    pub fn save_session(&self, session: &WorkoutSession) -> Result<()> {
        let path = self.sessions_dir().join(format!("{}.json", session.id));
        let content = serde_json::to_string_pretty(session)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to save session to {}", path.display()))?;
        debug!(id = %session.id, path = %path.display(), "session saved");
        Ok(())
    }

    pub fn load_session(&self, id: &str) -> Result<WorkoutSession> {
        read_session(&self.sessions_dir().join(format!("{}.json", id)))
    }

    /// All stored sessions, most recently started first.
    pub fn list_sessions(&self) -> Result<Vec<WorkoutSession>> {
        let mut sessions = files_with_extension(&self.sessions_dir(), "json")?
            .iter()
            .map(|p| read_session(p))
            .collect::<Result<Vec<_>>>()?;

        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(sessions)
    }

    pub fn save_current(&self, current: &CurrentSession) -> Result<()> {
        let path = self.current_path();
        let content = serde_json::to_string_pretty(current)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to save current session pointer to {}", path.display()))
    }

    pub fn load_current(&self) -> Result<Option<CurrentSession>> {
        let path = self.current_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let current = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(current))
    }

    pub fn clear_current(&self) -> Result<()> {
        let path = self.current_path();
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

fn read_session(path: &Path) -> Result<WorkoutSession> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read session file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse session file: {}", path.display()))
}

fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == extension))
        .collect();
    Ok(entries)
}

/// Closest name if similarity ≥ 0.80 and clearly ahead of the runner-up.
pub fn best_suggestion<'a>(input: &str, candidates: &'a [String]) -> Option<&'a str> {
    const MIN_SCORE: f64 = 0.80;
    const GAP: f64 = 0.02;

    let input = input.to_ascii_lowercase();
    let mut scores: Vec<(&str, f64)> = candidates
        .iter()
        .map(|c| (c.as_str(), jaro_winkler(&input, &c.to_ascii_lowercase())))
        .collect();
    scores.sort_by(|a, b| b.1.total_cmp(&a.1));

    let (best, best_score) = *scores.first()?;
    let second_score = scores.get(1).map_or(0.0, |(_, s)| *s);

    (best_score >= MIN_SCORE && best_score - second_score >= GAP).then_some(best)
}
