use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::metrics::{DEFAULT_BODY_MASS_KG, DEFAULT_MET};
use crate::session::EngineSettings;
use crate::timer::TimerConfig;

pub const BODY_MASS_KG: &str = "body_mass_kg";
pub const MET: &str = "met";
pub const REST_WARNING: &str = "rest_warning";
pub const ADJUST_FLOOR: &str = "adjust_floor";
pub const DATA_DIR: &str = "data_dir";

/// Keys setrunner reads, with a short description for `config list`.
pub const KNOWN_KEYS: &[(&str, &str)] = &[
    (BODY_MASS_KG, "body mass in kg, for calorie estimates"),
    (MET, "metabolic equivalent used for calorie estimates"),
    (REST_WARNING, "seconds left when the rest warning fires (0 turns it off)"),
    (ADJUST_FLOOR, "lowest a rest can be adjusted down to, in seconds"),
    (DATA_DIR, "directory holding templates and sessions"),
];

pub fn is_known(key: &str) -> bool {
    KNOWN_KEYS.iter().any(|(k, _)| *k == key)
}

/// Rejects a value the engine would otherwise ignore with a warning.
/// Keys setrunner does not read are accepted as-is.
pub fn check(key: &str, value: &str) -> Result<()> {
    let value = value.trim();
    match key {
        BODY_MASS_KG | MET => match value.parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => Ok(()),
            _ => bail!("`{}` must be a positive number, got `{}`", key, value),
        },
        REST_WARNING | ADJUST_FLOOR => match value.parse::<u32>() {
            Ok(_) => Ok(()),
            Err(_) => bail!("`{}` must be a whole number of seconds, got `{}`", key, value),
        },
        DATA_DIR if value.is_empty() => bail!("`{}` cannot be empty", key),
        _ => Ok(()),
    }
}

/// Flat key/value settings stored as TOML. Unknown keys are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    pub map: BTreeMap<String, String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|d| d.join("setrunner").join("config.toml"))
            .context("Could not determine config directory")
    }

    /// A missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content = toml::to_string(self)?;
        fs::write(path, content).with_context(|| format!("Failed to save config to {}", path.display()))
    }

    pub fn settings(&self) -> EngineSettings {
        let timer = TimerConfig::default();
        EngineSettings {
            timer: TimerConfig {
                warning_threshold: self.parsed(REST_WARNING, timer.warning_threshold),
                adjust_floor: self.parsed(ADJUST_FLOOR, timer.adjust_floor),
            },
            body_mass_kg: self.parsed(BODY_MASS_KG, DEFAULT_BODY_MASS_KG),
            met: self.parsed(MET, DEFAULT_MET),
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match self.map.get(DATA_DIR) {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => dirs::data_dir()
                .map(|d| d.join("setrunner"))
                .context("Could not determine data directory"),
        }
    }

    /// The value in effect for a known key, whether set or defaulted.
    pub fn effective(&self, key: &str) -> Option<String> {
        let settings = self.settings();
        Some(match key {
            BODY_MASS_KG => settings.body_mass_kg.to_string(),
            MET => settings.met.to_string(),
            REST_WARNING => settings.timer.warning_threshold.to_string(),
            ADJUST_FLOOR => settings.timer.adjust_floor.to_string(),
            DATA_DIR => self.data_dir().ok()?.display().to_string(),
            _ => return None,
        })
    }

    fn parsed<T: FromStr + Copy>(&self, key: &str, default: T) -> T {
        match self.map.get(key) {
            None => default,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(key, value = %raw, "ignoring unparsable config value");
                default
            }),
        }
    }
}
