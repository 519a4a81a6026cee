use anyhow::Result;
use colored::Colorize;
use itertools::Itertools;

use setrunner::storage::{Storage, WorkoutTemplate};
use setrunner::utils::format_countdown;

use crate::cli::TemplateCmd;

pub async fn handle(cmd: TemplateCmd, storage: &Storage, json: bool) -> Result<()> {
    storage.ensure_dirs()?;

    match cmd {
        TemplateCmd::List => {
            let names = storage.template_names()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else if names.is_empty() {
                println!(
                    "{} (no templates in {})",
                    "info:".blue().bold(),
                    storage.root().join("templates").display()
                );
            } else {
                for (i, name) in names.iter().enumerate() {
                    println!("{} • {}", format!("{}", i + 1).yellow(), name.bold());
                }
            }
        }

        TemplateCmd::Show { template } => {
            let t = storage.load_template(&template)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&t)?);
            } else {
                pretty_print(&t);
            }
        }
    }

    Ok(())
}

fn pretty_print(t: &WorkoutTemplate) {
    println!("{}", t.name.cyan().bold());
    if let Some(desc) = &t.description {
        println!("{}", desc.dimmed());
    }

    for (i, e) in t.exercises.iter().enumerate() {
        let target = [
            e.reps.map(|r| format!("{} reps", r)),
            e.weight.map(|w| format!("{}kg", w)),
            e.duration.map(format_countdown),
        ]
        .into_iter()
        .flatten()
        .join(" · ");

        let warmup = if e.warmup_sets > 0 {
            format!(" (+{} warm-up)", e.warmup_sets)
        } else {
            String::new()
        };

        println!(
            "{} • {} — {} sets{} {} {}",
            format!("{}", i + 1).yellow(),
            e.name.bold(),
            e.sets,
            warmup.dimmed(),
            target,
            e.rest.map(|r| format!("rest {}", format_countdown(r))).unwrap_or_default().dimmed()
        );
    }
}
