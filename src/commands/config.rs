use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use setrunner::config::{self, Config, KNOWN_KEYS};
use setrunner::storage::best_suggestion;

use crate::cli::ConfigCmd;

pub async fn handle(cmd: ConfigCmd, config_path: &Path) -> Result<()> {
    let mut cfg = Config::load(config_path)?;

    match cmd {
        ConfigCmd::List => {
            println!("{}", "Settings:".cyan().bold());
            for (key, about) in KNOWN_KEYS {
                let value = cfg.effective(key).unwrap_or_default();
                let origin = if cfg.map.contains_key(*key) { "" } else { " (default)" };
                println!("  {} = {}{}  {}", key.green(), value, origin.dimmed(), about.dimmed());
            }

            let extra: Vec<_> = cfg.map.iter().filter(|(k, _)| !config::is_known(k)).collect();
            if !extra.is_empty() {
                println!("{}", "Other keys:".cyan().bold());
                for (k, v) in extra {
                    println!("  {} = {}", k.yellow(), v);
                }
            }
        }

        ConfigCmd::Get { key } => match (cfg.map.get(&key), cfg.effective(&key)) {
            (Some(val), _) => println!("{}", val),
            (None, Some(default)) => println!("{} {}", default, "(default)".dimmed()),
            (None, None) => not_found(&key, &cfg),
        },

        ConfigCmd::Set { key, val } => {
            if let Err(e) = config::check(&key, &val) {
                println!("{} {}", "error:".red().bold(), e);
                return Ok(());
            }
            if !config::is_known(&key) {
                println!(
                    "{} `{}` is not a setrunner setting, keeping it anyway{}",
                    "warning:".yellow().bold(),
                    key,
                    did_you_mean(&key, &cfg)
                );
            }
            cfg.map.insert(key.clone(), val.trim().to_string());
            cfg.save(config_path)?;
            println!("{} set `{}` = `{}`", "info:".blue().bold(), key.green(), val.trim());
        }

        ConfigCmd::Unset { key } => {
            if cfg.map.remove(&key).is_none() {
                not_found(&key, &cfg);
                return Ok(());
            }
            cfg.save(config_path)?;
            match cfg.effective(&key) {
                Some(default) => println!(
                    "{} removed `{}`, back to {}",
                    "info:".blue().bold(),
                    key.green(),
                    default
                ),
                None => println!("{} removed `{}`", "info:".blue().bold(), key.green()),
            }
        }
    }

    Ok(())
}

fn not_found(key: &str, cfg: &Config) {
    println!(
        "{} key `{}` not found{}",
        "warning:".yellow().bold(),
        key,
        did_you_mean(key, cfg)
    );
}

fn did_you_mean(key: &str, cfg: &Config) -> String {
    let candidates: Vec<String> = KNOWN_KEYS
        .iter()
        .map(|(k, _)| k.to_string())
        .chain(cfg.map.keys().cloned())
        .collect();

    match best_suggestion(key, &candidates) {
        Some(s) if s != key => format!(" (did you mean `{}`?)", s),
        _ => String::new(),
    }
}
