use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http_cache::app_cache_dir;

pub const DEFAULT_ENEMY_THRESHOLD: u32 = 3;
pub const DEFAULT_LOSS_RATIO_THRESHOLD: f64 = 0.75;
pub const LEGACY_ENCOUNTER_THRESHOLD: u32 = 5;
pub const LEGACY_LOSS_RATIO_THRESHOLD: f64 = 0.8;

pub const DEFAULT_BASE_URL: &str = "https://api.henrikdev.xyz";
pub const DEFAULT_REGION: &str = "kr";
pub const DEFAULT_HISTORY_SIZE: u8 = 10;
pub const MAX_HISTORY_SIZE: u8 = 20;

/// Which tally the side gate of the classifier reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideMode {
    /// `as_enemy >= enemy_threshold`.
    Split,
    /// `encounters >= enemy_threshold`, allies and enemies alike.
    IgnoreSide,
}

/// What to do with a match whose player list is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    KeepHistory,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub enemy_threshold: u32,
    pub loss_ratio_threshold: f64,
    pub side_mode: SideMode,
    pub treat_unknown_as_loss: bool,
    pub min_matches: usize,
    pub max_subject_kda: Option<f64>,
    pub include_history: bool,
    pub malformed_policy: MalformedPolicy,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enemy_threshold: DEFAULT_ENEMY_THRESHOLD,
            loss_ratio_threshold: DEFAULT_LOSS_RATIO_THRESHOLD,
            side_mode: SideMode::Split,
            treat_unknown_as_loss: true,
            min_matches: 0,
            max_subject_kda: None,
            include_history: true,
            malformed_policy: MalformedPolicy::KeepHistory,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("enemy threshold must be at least 1 (got {0})")]
    EnemyThreshold(u32),
    #[error("loss ratio threshold must be within [0, 1] (got {0})")]
    LossRatio(f64),
    #[error("subject kda limit must be a finite non-negative number (got {0})")]
    SubjectKda(f64),
}

impl DetectionConfig {
    /// The earlier heuristic: five meetings on either side, 80% lost.
    pub fn legacy() -> Self {
        Self {
            enemy_threshold: LEGACY_ENCOUNTER_THRESHOLD,
            loss_ratio_threshold: LEGACY_LOSS_RATIO_THRESHOLD,
            side_mode: SideMode::IgnoreSide,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enemy_threshold < 1 {
            return Err(ConfigError::EnemyThreshold(self.enemy_threshold));
        }
        if !(0.0..=1.0).contains(&self.loss_ratio_threshold) {
            return Err(ConfigError::LossRatio(self.loss_ratio_threshold));
        }
        if let Some(kda) = self.max_subject_kda
            && (!kda.is_finite() || kda < 0.0)
        {
            return Err(ConfigError::SubjectKda(kda));
        }
        Ok(())
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from `ABUSE_*` variables. Unparseable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let preset = lookup("ABUSE_PRESET").unwrap_or_default();
        let mut cfg = if preset.trim().eq_ignore_ascii_case("legacy") {
            Self::legacy()
        } else {
            Self::default()
        };

        if let Some(v) = parse_var::<u32>(&lookup, "ABUSE_ENEMY_THRESHOLD") {
            cfg.enemy_threshold = v;
        }
        if let Some(v) = parse_var::<f64>(&lookup, "ABUSE_LOSS_RATIO") {
            cfg.loss_ratio_threshold = v;
        }
        if let Some(raw) = lookup("ABUSE_SIDE_MODE") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "split" | "enemy" => cfg.side_mode = SideMode::Split,
                "ignore" | "ignore_side" | "any" => cfg.side_mode = SideMode::IgnoreSide,
                _ => {}
            }
        }
        if let Some(v) = bool_var(&lookup, "ABUSE_UNKNOWN_AS_LOSS") {
            cfg.treat_unknown_as_loss = v;
        }
        if let Some(v) = parse_var::<usize>(&lookup, "ABUSE_MIN_MATCHES") {
            cfg.min_matches = v;
        }
        if let Some(v) = parse_var::<f64>(&lookup, "ABUSE_MAX_SUBJECT_KDA") {
            cfg.max_subject_kda = Some(v);
        }
        if let Some(v) = bool_var(&lookup, "ABUSE_INCLUDE_HISTORY") {
            cfg.include_history = v;
        }
        if let Some(raw) = lookup("ABUSE_MALFORMED") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "history" | "keep" => cfg.malformed_policy = MalformedPolicy::KeepHistory,
                "skip" => cfg.malformed_policy = MalformedPolicy::Skip,
                _ => {}
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

/// Process-level settings for the provider, cache and store.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub region: String,
    pub history_size: u8,
    pub db_path: Option<PathBuf>,
    pub http_cache: bool,
    pub demo: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            api_key: non_empty("HENRIK_API_KEY"),
            base_url: non_empty("HENRIK_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            region: non_empty("ABUSE_REGION")
                .map(|v| v.to_ascii_lowercase())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            history_size: parse_var::<u8>(&lookup, "ABUSE_HISTORY_SIZE")
                .unwrap_or(DEFAULT_HISTORY_SIZE)
                .clamp(1, MAX_HISTORY_SIZE),
            db_path: non_empty("ABUSE_DB_PATH")
                .map(PathBuf::from)
                .or_else(default_db_path),
            http_cache: bool_var(&lookup, "ABUSE_HTTP_CACHE").unwrap_or(true),
            demo: bool_var(&lookup, "ABUSE_DEMO").unwrap_or(false),
        }
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("players.sqlite"))
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    lookup(key).and_then(|raw| raw.trim().parse::<T>().ok())
}

fn bool_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    let raw = lookup(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let cfg = DetectionConfig::from_lookup(lookup_from(&[])).expect("defaults are valid");
        assert_eq!(cfg, DetectionConfig::default());
        assert_eq!(cfg.enemy_threshold, 3);
        assert!((cfg.loss_ratio_threshold - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn legacy_preset_then_overrides() {
        let cfg = DetectionConfig::from_lookup(lookup_from(&[
            ("ABUSE_PRESET", "legacy"),
            ("ABUSE_LOSS_RATIO", "0.9"),
            ("ABUSE_UNKNOWN_AS_LOSS", "false"),
        ]))
        .expect("valid");
        assert_eq!(cfg.side_mode, SideMode::IgnoreSide);
        assert_eq!(cfg.enemy_threshold, 5);
        assert!((cfg.loss_ratio_threshold - 0.9).abs() < f64::EPSILON);
        assert!(!cfg.treat_unknown_as_loss);
    }

    #[test]
    fn garbage_values_keep_defaults() {
        let cfg = DetectionConfig::from_lookup(lookup_from(&[
            ("ABUSE_ENEMY_THRESHOLD", "many"),
            ("ABUSE_SIDE_MODE", "sideways"),
            ("ABUSE_MALFORMED", "explode"),
        ]))
        .expect("valid");
        assert_eq!(cfg, DetectionConfig::default());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert_eq!(
            DetectionConfig::from_lookup(lookup_from(&[("ABUSE_ENEMY_THRESHOLD", "0")])),
            Err(ConfigError::EnemyThreshold(0))
        );
        assert!(matches!(
            DetectionConfig::from_lookup(lookup_from(&[("ABUSE_LOSS_RATIO", "1.5")])),
            Err(ConfigError::LossRatio(_))
        ));
        assert!(matches!(
            DetectionConfig::from_lookup(lookup_from(&[("ABUSE_MAX_SUBJECT_KDA", "-1")])),
            Err(ConfigError::SubjectKda(_))
        ));
    }

    #[test]
    fn app_config_clamps_history_and_trims_base_url() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("HENRIK_BASE_URL", "http://localhost:9000/"),
            ("ABUSE_HISTORY_SIZE", "99"),
            ("ABUSE_REGION", "EU"),
            ("HENRIK_API_KEY", "  "),
            ("ABUSE_DB_PATH", "/tmp/abuse.sqlite"),
        ]));
        assert_eq!(cfg.base_url, "http://localhost:9000");
        assert_eq!(cfg.history_size, MAX_HISTORY_SIZE);
        assert_eq!(cfg.region, "eu");
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.db_path, Some(PathBuf::from("/tmp/abuse.sqlite")));
        assert!(cfg.http_cache);
        assert!(!cfg.demo);
    }
}
