//! Runtime configuration for the recovery orchestrator.
//!
//! Every knob has a documented default; a `crackwise.toml` file can override
//! any subset of them. The threshold and blend constants are heuristics
//! carried over from field tuning — preserved as defaults but deliberately
//! exposed as plain config fields rather than hard-coded.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable that overrides cracking-tool discovery.
pub const TOOL_ENV_VAR: &str = "CRACKWISE_TOOL";

/// Efficiency thresholds in candidates/second.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    /// Below this the phase is skipped immediately once warmed up.
    pub critical: f64,
    /// Below this a declining trend triggers a skip.
    pub low: f64,
    /// At or above this a phase is considered healthy.
    pub acceptable: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            critical: 0.01,
            low: 0.05,
            acceptable: 0.1,
        }
    }
}

/// Configuration for the phase monitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub thresholds: Thresholds,
    /// Ring-buffer capacity of the performance window.
    pub window_size: usize,
    /// FIFO capacity of the skip history.
    pub max_history_size: usize,
    /// Whether historical skip patterns and learned success times are used.
    pub learning_enabled: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            window_size: 10,
            max_history_size: 1000,
            learning_enabled: true,
        }
    }
}

/// Weights for blending learned frequencies with population priors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LearnerBlend {
    /// Weight on the learned frequency (percentage of recorded successes).
    pub learned_weight: f64,
    /// Weight on the static prior.
    pub prior_weight: f64,
    /// Prior assumed for a key with no entry in the prior table.
    pub fallback_prior: f64,
    /// Below this many recorded successes the priors apply unchanged.
    pub min_samples: u64,
}

impl Default for LearnerBlend {
    fn default() -> Self {
        Self {
            learned_weight: 0.6,
            prior_weight: 0.4,
            fallback_prior: 5.0,
            min_samples: 10,
        }
    }
}

/// Top-level configuration for a recovery run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CrackConfig {
    pub monitor: MonitorConfig,
    pub blend: LearnerBlend,
    pub cache: CacheConfig,
    /// Explicit path to the cracking tool; when unset, `CRACKWISE_TOOL` and
    /// then the platform candidate list are probed.
    pub tool_path: Option<PathBuf>,
    /// Override for the learner's persisted model path (defaults to the
    /// per-user data directory).
    pub model_path: Option<PathBuf>,
}

/// Result-cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Maximum number of cached results before LRU eviction.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 10_000,
        }
    }
}

impl CrackConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file is absent or unreadable. A malformed file is reported and ignored
    /// rather than aborting the run.
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(err) => {
                    warn!(path = %path.display(), %err, "ignoring malformed config file");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Explicit tool command, if one is configured: the `CRACKWISE_TOOL`
    /// environment variable wins over the config file.
    pub fn tool_override(&self) -> Option<PathBuf> {
        if let Ok(cmd) = std::env::var(TOOL_ENV_VAR) {
            if !cmd.is_empty() {
                return Some(PathBuf::from(cmd));
            }
        }
        self.tool_path.clone()
    }
}
