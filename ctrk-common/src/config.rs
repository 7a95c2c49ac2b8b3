//! Configuration loading and data folder resolution
//!
//! The TOML config is optional: a missing or unreadable file logs a warning
//! and falls back to compiled defaults.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::persistence::write_atomic;
use crate::{Error, Result};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "CTRK_DATA_FOLDER";

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "CTRK_CONFIG";

const DEFAULT_SPEECH_LIMIT_SECS: i64 = 180;
const DEFAULT_TIME_SIGNALS: [i64; 3] = [60, 30, 10];
const SESSION_BASE_NAME: &str = "congress_tracker_data";
const SESSION_EXTENSION: &str = "csv";

/// Timer display mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    #[default]
    Countdown,
    Stopwatch,
}

/// `[logging]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter directive, e.g. `info` or `ctrk_common=debug`
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[timer]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub mode: TimerMode,
    #[serde(default = "default_speech_limit")]
    pub speech_time_limit_secs: i64,
    /// Remaining-seconds marks that raise a signal, accepted as a list or as
    /// comma-separated text
    #[serde(default = "default_time_signals", deserialize_with = "signals_from_list_or_text")]
    pub time_signals_secs: Vec<i64>,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: TimerMode::Countdown,
            speech_time_limit_secs: DEFAULT_SPEECH_LIMIT_SECS,
            time_signals_secs: DEFAULT_TIME_SIGNALS.to_vec(),
        }
    }
}

impl TimerConfig {
    /// Replace out-of-range values with defaults; signals become unique,
    /// positive and descending
    pub fn validated(mut self) -> Self {
        if self.speech_time_limit_secs <= 0 {
            warn!(
                "Invalid speech_time_limit_secs {}, using {}",
                self.speech_time_limit_secs, DEFAULT_SPEECH_LIMIT_SECS
            );
            self.speech_time_limit_secs = DEFAULT_SPEECH_LIMIT_SECS;
        }
        self.time_signals_secs.retain(|s| *s > 0);
        self.time_signals_secs.sort_unstable_by(|a, b| b.cmp(a));
        self.time_signals_secs.dedup();
        self
    }
}

fn default_true() -> bool {
    true
}

fn default_speech_limit() -> i64 {
    DEFAULT_SPEECH_LIMIT_SECS
}

fn default_time_signals() -> Vec<i64> {
    DEFAULT_TIME_SIGNALS.to_vec()
}

fn signals_from_list_or_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<i64>),
        Text(String),
    }

    Ok(match Raw::deserialize(d)? {
        Raw::List(list) => list,
        Raw::Text(text) => text
            .split(',')
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect(),
    })
}

/// Top-level config file schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding session files
    #[serde(default)]
    pub data_folder: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub timer: TimerConfig,
}

impl TomlConfig {
    /// Parse TOML text, validating the timer table
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: TomlConfig =
            toml::from_str(text).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.timer = config.timer.validated();
        Ok(config)
    }
}

/// Platform defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_folder: PathBuf,
    pub config_file: Option<PathBuf>,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let data_folder = dirs::document_dir()
            .or_else(dirs::home_dir)
            .map(|d| d.join("CongressTracker"))
            .unwrap_or_else(|| PathBuf::from("./CongressTracker"));
        let config_file = dirs::config_dir().map(|d| d.join("ctrk").join("config.toml"));
        Self {
            data_folder,
            config_file,
            log_level: default_log_level(),
        }
    }
}

/// Config file location: `CTRK_CONFIG`, else the platform config dir
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    CompiledDefaults::for_current_platform().config_file
}

/// Load a config file, degrading to defaults on any problem
pub fn load_toml_config(path: &Path) -> TomlConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Config file {} not found, using defaults", path.display());
            return TomlConfig::default();
        }
        Err(e) => {
            warn!("Could not read config {}: {}, using defaults", path.display(), e);
            return TomlConfig::default();
        }
    };
    match TomlConfig::from_toml_str(&text) {
        Ok(config) => {
            debug!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("{} in {}, using defaults", e, path.display());
            TomlConfig::default()
        }
    }
}

/// Load the config from its resolved location (defaults if none)
pub fn load_default_config() -> TomlConfig {
    match config_file_path() {
        Some(path) => load_toml_config(&path),
        None => {
            warn!("Could not determine config directory, using defaults");
            TomlConfig::default()
        }
    }
}

/// Write a config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let text = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    write_atomic(path, text.as_bytes())
}

/// Data folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. `CTRK_DATA_FOLDER`
/// 3. TOML `data_folder`
/// 4. Compiled default (`~/Documents/CongressTracker`)
#[derive(Debug, Clone, Default)]
pub struct DataFolderResolver {
    cli_arg: Option<PathBuf>,
    config_value: Option<PathBuf>,
}

impl DataFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_config(mut self, config: &TomlConfig) -> Self {
        self.config_value = config.data_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }
        if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
        if let Some(path) = &self.config_value {
            return path.clone();
        }
        CompiledDefaults::for_current_platform().data_folder
    }
}

/// First unused `congress_tracker_data{N}.csv` in `folder`
///
/// The first candidate has no number; later ones count up from 1.
pub fn unique_session_path(folder: &Path) -> PathBuf {
    let mut candidate = folder.join(format!("{}.{}", SESSION_BASE_NAME, SESSION_EXTENSION));
    let mut counter = 0u32;
    while candidate.exists() {
        counter += 1;
        candidate = folder.join(format!("{}{}.{}", SESSION_BASE_NAME, counter, SESSION_EXTENSION));
    }
    candidate
}

/// Most recently modified session file in `folder`, if any
pub fn latest_session_path(folder: &Path) -> Option<PathBuf> {
    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot scan {}: {}", folder.display(), e);
            return None;
        }
    };
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_session_file(path))
        .filter_map(|path| {
            let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok()?;
            Some((modified, path))
        })
        .max()
        .map(|(_, path)| path)
}

fn is_session_file(path: &Path) -> bool {
    let stem_matches = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_prefix(SESSION_BASE_NAME))
        .map_or(false, |rest| rest.chars().all(|c| c.is_ascii_digit()));
    stem_matches && path.extension().map_or(false, |e| e == SESSION_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.timer.speech_time_limit_secs, 180);
        assert_eq!(config.timer.time_signals_secs, vec![60, 30, 10]);
    }

    #[test]
    fn test_signals_accept_comma_text() {
        let config = TomlConfig::from_toml_str("[timer]\ntime_signals_secs = \"10, 30,x,60\"\n").unwrap();
        assert_eq!(config.timer.time_signals_secs, vec![60, 30, 10]);
    }

    #[test]
    fn test_invalid_limit_falls_back() {
        let config = TomlConfig::from_toml_str("[timer]\nspeech_time_limit_secs = -5\n").unwrap();
        assert_eq!(config.timer.speech_time_limit_secs, 180);
    }

    #[test]
    fn test_signals_deduplicated_and_descending() {
        let timer = TimerConfig {
            time_signals_secs: vec![10, 60, 10, 0, -3, 30],
            ..TimerConfig::default()
        }
        .validated();
        assert_eq!(timer.time_signals_secs, vec![60, 30, 10]);
    }

    #[test]
    fn test_unknown_mode_is_a_parse_error() {
        assert!(TomlConfig::from_toml_str("[timer]\nmode = \"hourglass\"\n").is_err());
    }

    #[test]
    fn test_stopwatch_mode_parses() {
        let config = TomlConfig::from_toml_str("[timer]\nmode = \"stopwatch\"\nenabled = false\n").unwrap();
        assert_eq!(config.timer.mode, TimerMode::Stopwatch);
        assert!(!config.timer.enabled);
    }

    #[test]
    fn test_resolver_prefers_cli_arg() {
        let resolver = DataFolderResolver::new()
            .with_cli_arg(Some(PathBuf::from("/tmp/ctrk-cli")))
            .with_config(&TomlConfig {
                data_folder: Some(PathBuf::from("/tmp/ctrk-toml")),
                ..TomlConfig::default()
            });
        assert_eq!(resolver.resolve(), PathBuf::from("/tmp/ctrk-cli"));
    }

    #[test]
    fn test_session_file_names() {
        assert!(is_session_file(Path::new("/d/congress_tracker_data.csv")));
        assert!(is_session_file(Path::new("/d/congress_tracker_data12.csv")));
        assert!(!is_session_file(Path::new("/d/congress_tracker_data_history.json")));
        assert!(!is_session_file(Path::new("/d/congress_tracker_data1.txt")));
        assert!(!is_session_file(Path::new("/d/other.csv")));
    }
}
