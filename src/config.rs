use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use crossterm::event::KeyCode;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::app_dirs::AppDirs;
use crate::compare::CompareStyle;
use crate::error::{Result, SplitError};
use crate::format::MAX_DECIMAL_PLACES;
use crate::input::{parse_key, KeyBindings};

/// Names accepted by [`Config::get`] and [`Config::set`], in display order.
pub const CONFIG_KEYS: &[&str] = &[
    "data_directory",
    "num_decimal_places",
    "default_compare_style",
    "continue_keys",
    "skip_keys",
    "undo_keys",
    "abort_keys",
];


#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub data_directory: Option<PathBuf>,
    pub num_decimal_places: usize,
    pub default_compare_style: CompareStyle,
    pub continue_keys: Vec<String>,
    pub skip_keys: Vec<String>,
    pub undo_keys: Vec<String>,
    pub abort_keys: Vec<String>,
}

fn key_names(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_directory: None,
            num_decimal_places: 1,
            default_compare_style: CompareStyle::default(),
            continue_keys: key_names(&["enter", "space", "c"]),
            skip_keys: key_names(&["s"]),
            undo_keys: key_names(&["u", "z"]),
            abort_keys: key_names(&["esc", "a"]),
        }
    }
}

fn split_keys(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl Config {
    pub fn data_directory(&self) -> PathBuf {
        self.data_directory.clone().unwrap_or_else(AppDirs::data_dir)
    }

    fn key_sets(&self) -> [(&'static str, &[String]); 4] {
        [
            ("continue_keys", self.continue_keys.as_slice()),
            ("skip_keys", self.skip_keys.as_slice()),
            ("undo_keys", self.undo_keys.as_slice()),
            ("abort_keys", self.abort_keys.as_slice()),
        ]
    }

    /// Parses the key sets, refusing keys bound to more than one action.
    pub fn key_bindings(&self) -> Result<KeyBindings> {
        let mut bound: Vec<(KeyCode, &str, &str)> = Vec::new();
        let mut conflicts = Vec::new();
        let mut parsed = Vec::new();
        for (action, names) in self.key_sets() {
            let mut codes = Vec::new();
            for name in names {
                let code = parse_key(name)?;
                if let Some((_, other_name, other_action)) = bound
                    .iter()
                    .find(|(other, _, other_action)| *other == code && *other_action != action)
                {
                    conflicts.push(format!("{other_name} ({other_action}, {action} as {name})"));
                }
                bound.push((code, name.as_str(), action));
                codes.push(code);
            }
            parsed.push(codes);
        }
        if !conflicts.is_empty() {
            return Err(SplitError::Config(format!(
                "the following keys are bound to multiple different functions: {}",
                conflicts.join(", ")
            )));
        }

        let [continue_keys, skip_keys, undo_keys, abort_keys]: [Vec<KeyCode>; 4] = parsed
            .try_into()
            .map_err(|_| SplitError::Config("expected four key sets".into()))?;
        Ok(KeyBindings {
            continue_keys,
            skip_keys,
            undo_keys,
            abort_keys,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_decimal_places > MAX_DECIMAL_PLACES {
            return Err(SplitError::Config(format!(
                "num_decimal_places must be at most {MAX_DECIMAL_PLACES}"
            )));
        }
        self.key_bindings().map(|_| ())
    }

    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "data_directory" => self.data_directory().display().to_string(),
            "num_decimal_places" => self.num_decimal_places.to_string(),
            "default_compare_style" => self
                .default_compare_style
                .to_possible_value()
                .map(|value| value.get_name().to_string())
                .unwrap_or_default(),
            "continue_keys" => self.continue_keys.join(","),
            "skip_keys" => self.skip_keys.join(","),
            "undo_keys" => self.undo_keys.join(","),
            "abort_keys" => self.abort_keys.join(","),
            _ => return Err(SplitError::Config(format!("unknown setting \"{key}\""))),
        };
        Ok(value)
    }

    /// Sets one value from its string form. The config is left unchanged
    /// when the result would not validate.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.clone();
        match key {
            "data_directory" => updated.data_directory = Some(PathBuf::from(value)),
            "num_decimal_places" => {
                updated.num_decimal_places = value.trim().parse().map_err(|_| {
                    SplitError::Config(format!("\"{value}\" is not a number of decimal places"))
                })?
            }
            "default_compare_style" => {
                updated.default_compare_style = CompareStyle::from_str(value.trim(), true)
                    .map_err(|_| SplitError::Config(format!("unknown compare style \"{value}\"")))?
            }
            "continue_keys" => updated.continue_keys = split_keys(value),
            "skip_keys" => updated.skip_keys = split_keys(value),
            "undo_keys" => updated.undo_keys = split_keys(value),
            "abort_keys" => updated.abort_keys = split_keys(value),
            _ => return Err(SplitError::Config(format!("unknown setting \"{key}\""))),
        }
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                match cfg.validate() {
                    Ok(()) => return cfg,
                    Err(err) => warn!(
                        "Ignoring invalid config {}: {err}",
                        self.path.display()
                    ),
                }
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> Result<()> {
        cfg.validate()?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(cfg)?)?;
        Ok(())
    }
}
