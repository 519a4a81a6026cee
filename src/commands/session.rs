use std::io::Write;

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use itertools::Itertools;
use tracing::warn;

use setrunner::config::Config;
use setrunner::models::OneRMFormula;
use setrunner::storage::{CurrentSession, Storage};
use setrunner::ticker::Ticker;
use setrunner::utils::{format_countdown, format_duration, personal_record};
use setrunner::{
    ActualValues, Cursor, EngineResult, SessionEvent, SessionMachine, SessionState, SetInSession,
    SystemClock, WorkoutSession,
};

use crate::cli::{SessionCmd, SetArgs};

type Machine = SessionMachine<SystemClock>;

pub async fn handle(cmd: SessionCmd, storage: &Storage, cfg: &Config, json: bool) -> Result<()> {
    storage.ensure_dirs()?;

    if let SessionCmd::Start { template } = &cmd {
        return start(template, storage, cfg, json);
    }
    if let SessionCmd::Log { limit } = &cmd {
        return log(*limit, storage, json);
    }

    let Some(mut machine) = load_active(storage, cfg)? else {
        println!("{} no active session", "error:".red().bold());
        return Ok(());
    };

    let outcome = match cmd {
        SessionCmd::Show => {
            show(&machine, json)?;
            return Ok(());
        }

        SessionCmd::Done { set, no_rest } => {
            // Logging the next set while still resting ends that rest first.
            if machine.state() == SessionState::Active && machine.is_resting() {
                report(&machine.skip_rest(), json);
            }
            match machine.cursor() {
                Some(at) => {
                    let result = machine.complete_set(at, actual_values(set));
                    if result.is_ok() && machine.is_resting() {
                        report(&result, json);
                        if no_rest {
                            report(&machine.skip_rest(), json);
                        } else {
                            persist(storage, &machine)?;
                            countdown(&mut machine, json).await?;
                        }
                        persist(storage, &machine)?;
                        return Ok(());
                    }
                    result
                }
                None => {
                    println!("{} no set left to complete", "error:".red().bold());
                    return Ok(());
                }
            }
        }

        SessionCmd::Fail { set } => match machine.cursor() {
            Some(at) => machine.fail_set(at, actual_values(set)),
            None => {
                println!("{} no set left to fail", "error:".red().bold());
                return Ok(());
            }
        },

        SessionCmd::Next => machine.advance(),
        SessionCmd::Prev => machine.retreat(),

        SessionCmd::Jump { exercise } => match exercise.checked_sub(1) {
            Some(idx) => machine.jump_to_exercise(idx),
            None => {
                println!("{} exercise index must be ≥ 1", "error:".red().bold());
                return Ok(());
            }
        },

        SessionCmd::Skip { exercise } => match exercise.checked_sub(1) {
            Some(idx) => machine.skip_exercise(idx),
            None => {
                println!("{} exercise index must be ≥ 1", "error:".red().bold());
                return Ok(());
            }
        },

        SessionCmd::Timer => {
            let result = machine.start_set_timer();
            report(&result, json);
            if result.is_ok() {
                countdown(&mut machine, json).await?;
                persist(storage, &machine)?;
            }
            return Ok(());
        }

        SessionCmd::Rest { adjust, skip } => {
            let result = match (skip, adjust) {
                (true, _) => machine.skip_rest(),
                (false, Some(delta)) => machine.adjust_rest(delta),
                (false, None) => Ok(Vec::new()),
            };
            report(&result, json);
            if result.is_err() {
                return Ok(());
            }
            persist(storage, &machine)?;
            if machine.state() == SessionState::Active && machine.timer().is_running() {
                countdown(&mut machine, json).await?;
                persist(storage, &machine)?;
            } else if !skip && adjust.is_none() && !json {
                println!("{} no countdown is running", "info:".blue().bold());
            }
            return Ok(());
        }

        SessionCmd::Pause => machine.pause_session(),

        SessionCmd::Resume => {
            let result = machine.resume_session();
            report(&result, json);
            if result.is_ok() {
                persist(storage, &machine)?;
                if machine.timer().is_running() {
                    countdown(&mut machine, json).await?;
                    persist(storage, &machine)?;
                }
            }
            return Ok(());
        }

        SessionCmd::Finish => machine.finish(),
        SessionCmd::Abandon => machine.abandon(),
        SessionCmd::Note { note } => machine.set_notes(Some(note)),

        SessionCmd::Pr {
            exercise,
            weight,
            reps,
        } => {
            let found = exercise
                .checked_sub(1)
                .and_then(|idx| machine.session().exercises.get(idx));
            match found {
                Some(ex) => {
                    let record = personal_record(ex, weight, reps, OneRMFormula::Epley, Utc::now());
                    machine.add_personal_record(record)
                }
                None => {
                    println!("{} no exercise at index {}", "error:".red().bold(), exercise);
                    return Ok(());
                }
            }
        }

        // handled before loading the active session
        SessionCmd::Start { .. } | SessionCmd::Log { .. } => return Ok(()),
    };

    report(&outcome, json);
    if outcome.is_ok() {
        persist(storage, &machine)?;
    }
    Ok(())
}

fn start(template_name: &str, storage: &Storage, cfg: &Config, json: bool) -> Result<()> {
    if let Some(active) = load_active(storage, cfg)? {
        println!(
            "{} there is already an active session (id: {})",
            "error:".red().bold(),
            active.session().id
        );
        return Ok(());
    }

    let template = storage.load_template(template_name)?;
    let session = template.instantiate(template_name);
    let mut machine = SessionMachine::new(session, SystemClock, cfg.settings())?;

    let outcome = machine.start();
    report(&outcome, json);
    persist(storage, &machine)?;

    if !json {
        println!("{}", "Exercises:".cyan().bold());
        for (i, exercise) in machine.session().exercises.iter().enumerate() {
            println!(
                "{} • {} — {} sets, {} rest",
                format!("{}", i + 1).yellow(),
                exercise.name.bold(),
                exercise.sets.len(),
                format_countdown(exercise.rest_time)
            );
        }
        println!(
            "\n{} session started (id: {})",
            "ok:".green().bold(),
            machine.session().id
        );
    }
    Ok(())
}

fn load_active(storage: &Storage, cfg: &Config) -> Result<Option<Machine>> {
    let Some(current) = storage.load_current()? else {
        return Ok(None);
    };

    let session = storage.load_session(&current.session_id)?;
    let machine = SessionMachine::new(session, SystemClock, cfg.settings())?;
    if machine.state().is_terminal() {
        storage.clear_current()?;
        return Ok(None);
    }

    let Some(saved) = current.cursor else {
        return Ok(Some(machine));
    };
    let fallback = machine.cursor();
    let machine = match machine.with_cursor(saved) {
        Ok(m) => m,
        Err(e) => {
            // The countdown belonged to the saved cursor, so it goes too.
            warn!(error = %e, ?fallback, "saved cursor no longer valid, resuming at first open set");
            let session = storage.load_session(&current.session_id)?;
            return Ok(Some(SessionMachine::new(session, SystemClock, cfg.settings())?));
        }
    };

    match current.rest {
        Some(pending) => Ok(Some(machine.with_pending_timer(pending)?)),
        None => Ok(Some(machine)),
    }
}

fn persist(storage: &Storage, machine: &Machine) -> Result<()> {
    storage.save_session(machine.session())?;
    if machine.state().is_terminal() {
        storage.clear_current()
    } else {
        storage.save_current(&CurrentSession {
            session_id: machine.session().id.clone(),
            cursor: machine.cursor(),
            rest: machine.pending_timer(),
        })
    }
}

/// Runs the pending countdown in the foreground. Ctrl-C pauses the session
/// and the caller saves what is left of the countdown.
async fn countdown(machine: &mut Machine, json: bool) -> Result<()> {
    let mut ticker = Ticker::per_second();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while machine.timer().is_running() {
        tokio::select! {
            tick = ticker.next() => {
                if tick.is_none() {
                    break;
                }
                let events = machine.tick()?;
                if !json {
                    print!("\r  {} {} ", "⏱".dimmed(), format_countdown(machine.timer_state().time_remaining));
                    let _ = std::io::stdout().flush();
                    if !events.is_empty() {
                        println!();
                    }
                }
                report(&Ok(events), json);
            }
            _ = &mut ctrl_c => {
                if !json {
                    println!();
                }
                let events = machine.pause_session();
                report(&events, json);
                break;
            }
        }
    }

    ticker.cancel();
    Ok(())
}

fn actual_values(set: SetArgs) -> ActualValues {
    let weight = match set.weight.as_deref() {
        None => None,
        Some(w) if w.eq_ignore_ascii_case("bw") => Some(0.0),
        Some(w) => match w.parse::<f64>() {
            Ok(v) => Some(v),
            Err(_) => Some(f64::NAN),
        },
    };

    ActualValues {
        reps: set.reps,
        weight,
        duration: set.duration,
        rpe: set.rpe,
        notes: set.note,
    }
}

fn report(outcome: &EngineResult<Vec<SessionEvent>>, json: bool) {
    let events = match outcome {
        Ok(events) => events,
        Err(e) => {
            println!("{} {}", "error:".red().bold(), e);
            return;
        }
    };

    if json {
        if !events.is_empty() {
            if let Ok(s) = serde_json::to_string(events) {
                println!("{}", s);
            }
        }
        return;
    }

    for event in events {
        match event {
            SessionEvent::SessionStarted { .. } | SessionEvent::MetricsUpdated(_) => {}
            SessionEvent::SetCompleted { cursor } => {
                println!("{} set {} done", "ok:".green().bold(), cursor)
            }
            SessionEvent::SetFailed { cursor } => {
                println!("{} set {} failed", "info:".blue().bold(), cursor)
            }
            SessionEvent::RestTimerStarted { kind, seconds } => println!(
                "{} {:?} timer {}",
                "info:".blue().bold(),
                kind,
                format_countdown(*seconds)
            ),
            SessionEvent::RestTimerWarning { remaining } => {
                println!("{} {}s left", "warning:".yellow().bold(), remaining)
            }
            SessionEvent::RestTimerComplete => println!("{} rest over", "ok:".green().bold()),
            SessionEvent::ExerciseTimerComplete { cursor } => {
                println!("{} time's up on set {}", "ok:".green().bold(), cursor)
            }
            SessionEvent::CursorMoved { to, .. } => println!("{} {}", "next:".cyan().bold(), to),
            SessionEvent::WorkoutCompleteEligible => println!(
                "{} every set visited, `session end` to finish",
                "info:".blue().bold()
            ),
            SessionEvent::ExerciseSkipped { exercise_index } => println!(
                "{} skipped exercise {}",
                "info:".blue().bold(),
                exercise_index + 1
            ),
            SessionEvent::SessionPaused => println!("{} session paused", "ok:".green().bold()),
            SessionEvent::SessionResumed => println!("{} session resumed", "ok:".green().bold()),
            SessionEvent::SessionFinished(m) => println!(
                "{} finished — {} / {} sets, {:.0}kg volume, {} kcal",
                "ok:".green().bold(),
                m.completed_sets,
                m.total_sets,
                m.total_volume,
                m.estimated_calories
            ),
            SessionEvent::SessionAbandoned => println!("{} session abandoned", "ok:".green().bold()),
        }
    }
}

fn show(machine: &Machine, json: bool) -> Result<()> {
    let session = machine.session();
    if json {
        println!("{}", serde_json::to_string_pretty(session)?);
        return Ok(());
    }

    let elapsed = session
        .start_time
        .map(|t| format_duration(Utc::now() - t))
        .unwrap_or_default();
    println!(
        "{} {} ({}, {})",
        "Session:".cyan().bold(),
        session.name.as_deref().unwrap_or("ad hoc").bold(),
        machine.state(),
        elapsed
    );
    if let Some(notes) = &session.notes {
        println!("  {}", notes.dimmed());
    }

    println!("\n{}", "Exercises:".cyan().bold());
    for (e, exercise) in session.exercises.iter().enumerate() {
        let mut header = format!("{} • {}", format!("{}", e + 1).yellow(), exercise.name.bold());
        if exercise.skipped {
            header.push_str(&format!(" {}", "(skipped)".dimmed()));
        }
        println!("{}", header);

        for (s, set) in exercise.sets.iter().enumerate() {
            let marker = if machine.cursor() == Some(Cursor::new(e, s)) {
                "▶".green().bold().to_string()
            } else {
                " ".to_string()
            };
            println!(
                " {} {} • {:<22} | {}",
                marker,
                format!("{}", s + 1).yellow(),
                describe_target(set),
                describe_actual(set)
            );
        }
        println!();
    }

    print_metrics(session);
    Ok(())
}

fn describe_target(set: &SetInSession) -> String {
    let mut parts = Vec::new();
    if let Some(r) = set.target_reps {
        parts.push(format!("{} reps", r));
    }
    if let Some(w) = set.target_weight {
        parts.push(format!("{}kg", w));
    }
    if let Some(d) = set.target_duration {
        parts.push(format_countdown(d));
    }
    let kind = format!("{:?}", set.set_type).to_lowercase();
    if kind != "normal" {
        parts.push(kind);
    }
    parts.iter().join(" · ")
}

fn describe_actual(set: &SetInSession) -> String {
    if !set.is_done() {
        return String::new();
    }
    let load = match set.effective_weight() {
        Some(w) if w > 0.0 => format!("{}kg", w),
        _ => "bw".to_string(),
    };
    let mut text = format!("{} × {}", load, set.effective_reps().unwrap_or(0));
    if let Some(rpe) = set.rpe {
        text.push_str(&format!(" @ RPE {}", rpe));
    }
    if let Some(n) = &set.notes {
        text.push_str(&format!(" - {}", n));
    }

    if set.failed {
        text.red().to_string()
    } else {
        text.green().to_string()
    }
}

fn print_metrics(session: &WorkoutSession) {
    let m = &session.metrics;
    println!("{}", "Metrics:".cyan().bold());
    println!(
        "  sets {}/{} ({:.0}%) · volume {:.0}kg · reps {} · RPE {:.1} · {} kcal",
        m.completed_sets,
        m.total_sets,
        m.completion_rate,
        m.total_volume,
        m.total_reps,
        m.average_rpe,
        m.estimated_calories
    );
    for pr in &m.personal_records {
        println!(
            "  PR: {} {}kg × {} ({:.1}RM)",
            pr.exercise_name.bold(),
            pr.weight,
            pr.reps,
            pr.estimated_1rm
        );
    }
}

fn log(limit: usize, storage: &Storage, json: bool) -> Result<()> {
    let sessions: Vec<WorkoutSession> = storage.list_sessions()?.into_iter().take(limit).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }
    if sessions.is_empty() {
        println!("{}", "(no sessions yet)".dimmed());
        return Ok(());
    }

    for session in &sessions {
        let date = session
            .start_time
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "not started".into());
        let status = match SessionState::of(session) {
            SessionState::Completed => "done".green(),
            SessionState::Abandoned => "abandoned".red(),
            other => other.to_string().yellow(),
        };
        println!(
            "{} {} [{}] {}/{} sets, {:.0}kg",
            date.dimmed(),
            session.name.as_deref().unwrap_or("ad hoc").bold(),
            status,
            session.metrics.completed_sets,
            session.metrics.total_sets,
            session.metrics.total_volume
        );
    }
    Ok(())
}
