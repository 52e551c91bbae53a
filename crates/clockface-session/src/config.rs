use clockface_core::Thresholds;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Capture-session configuration.
///
/// Built from defaults, an optional TOML file, then `CLOCKFACE_*`
/// environment variables, in increasing precedence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Delay between detection cycles.
    pub poll_interval_ms: u64,
    /// Consecutive same-candidate matches needed to confirm.
    pub required_matches: u32,
    /// Outcomes buffered for a slow UI before the loop waits.
    pub outcome_buffer: usize,
    /// Path to the SQLite roster database.
    pub db_path: PathBuf,
    pub thresholds: Thresholds,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            required_matches: 1,
            outcome_buffer: 8,
            db_path: default_db_path(),
            thresholds: Thresholds::default(),
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `CLOCKFACE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::default().overridden_by(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        let config = config.overridden_by(|key| std::env::var(key).ok());
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded session config");
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Apply overrides from `lookup` (an environment accessor).
    fn overridden_by(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let t = self.thresholds;
        Self {
            poll_interval_ms: parsed(&lookup, "CLOCKFACE_POLL_INTERVAL_MS", self.poll_interval_ms),
            required_matches: parsed(&lookup, "CLOCKFACE_REQUIRED_MATCHES", self.required_matches),
            outcome_buffer: parsed(&lookup, "CLOCKFACE_OUTCOME_BUFFER", self.outcome_buffer),
            db_path: lookup("CLOCKFACE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(self.db_path),
            thresholds: Thresholds {
                min_detection_confidence: parsed(
                    &lookup,
                    "CLOCKFACE_MIN_DETECTION_CONFIDENCE",
                    t.min_detection_confidence,
                ),
                min_face_area: parsed(&lookup, "CLOCKFACE_MIN_FACE_AREA", t.min_face_area),
                ideal_face_area: parsed(&lookup, "CLOCKFACE_IDEAL_FACE_AREA", t.ideal_face_area),
                min_quality: parsed(&lookup, "CLOCKFACE_MIN_QUALITY", t.min_quality),
                min_liveness: parsed(&lookup, "CLOCKFACE_MIN_LIVENESS", t.min_liveness),
                match_threshold: parsed(&lookup, "CLOCKFACE_MATCH_THRESHOLD", t.match_threshold),
                ambiguity_margin: parsed(&lookup, "CLOCKFACE_AMBIGUITY_MARGIN", t.ambiguity_margin),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".into()));
        }
        if self.required_matches == 0 {
            return Err(ConfigError::Invalid("required_matches must be at least 1".into()));
        }
        if self.outcome_buffer == 0 {
            return Err(ConfigError::Invalid("outcome_buffer must be at least 1".into()));
        }
        let t = &self.thresholds;
        if !(t.match_threshold > 0.0) {
            return Err(ConfigError::Invalid("match_threshold must be positive".into()));
        }
        if !(t.ideal_face_area > 0.0) {
            return Err(ConfigError::Invalid("ideal_face_area must be positive".into()));
        }
        if !(t.ambiguity_margin >= 0.0) {
            return Err(ConfigError::Invalid("ambiguity_margin must not be negative".into()));
        }
        Ok(())
    }
}

/// `$XDG_DATA_HOME/clockface/roster.db`, falling back to `~/.local/share`.
pub fn default_db_path() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("clockface")
        .join("roster.db")
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "ignoring unparsable config override");
                default
            }
        },
        None => default,
    }
}
