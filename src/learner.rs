//! Password-shape learning, persisted across sessions.
//!
//! Every recovered password is classified three ways — symbolic per-character
//! pattern, coarse charset category, positional features — and the counts are
//! written to a JSON model under the user's data directory. Rankings blend
//! the learned frequencies with static population priors so a fresh install
//! still orders strategies sensibly.

use crate::config::LearnerBlend;
use crate::context::SessionContext;
use crate::errors::CrackError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the persisted model inside the crackwise data directory.
pub const MODEL_FILE: &str = "password_patterns.json";

/// Population priors for charset categories, in percent of observed
/// passwords. Categories absent here fall back to `LearnerBlend::fallback_prior`.
const CHARSET_PRIORS: [(&str, f64); 5] = [
    ("pure_digits", 16.0),
    ("pure_lowercase", 41.0),
    ("lower_digits", 28.0),
    ("mixed_case", 8.0),
    ("with_symbols", 3.5),
];

/// Population priors for password lengths, in percent.
const LENGTH_PRIORS: [(u32, f64); 9] = [
    (8, 25.0),
    (6, 23.0),
    (7, 17.0),
    (9, 12.0),
    (10, 8.0),
    (5, 6.0),
    (4, 4.0),
    (11, 3.0),
    (12, 2.0),
];

/// Fallback probabilities for positional features with no recorded data.
const DEFAULT_POSITION_PROBS: [(&str, f64); 3] = [
    ("first_upper", 0.35),
    ("ends_digit", 0.45),
    ("ends_symbol", 0.08),
];

/// The persisted statistical model. Rewritten wholesale on every recorded
/// success; owned exclusively by [`PatternLearner`].
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PatternModel {
    /// Symbolic pattern (e.g. `?l?l?l?d?d`) -> success count.
    #[serde(default)]
    pub patterns: HashMap<String, u64>,
    /// Password length -> success count.
    #[serde(default)]
    pub lengths: HashMap<u32, u64>,
    /// Charset category -> success count.
    #[serde(default)]
    pub charsets: HashMap<String, u64>,
    /// Positional feature -> success count.
    #[serde(default)]
    pub positions: HashMap<String, u64>,
    #[serde(default)]
    pub total_success: u64,
}

/// Classification of a single password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordAnalysis {
    /// Per-character class sequence: `?d` digit, `?l` lower, `?u` upper,
    /// `?s` anything else.
    pub pattern: String,
    pub charset: &'static str,
    pub positions: Vec<&'static str>,
}

/// A learned pattern ranked by observed frequency.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PatternRank {
    pub pattern: String,
    pub count: u64,
    pub probability: f64,
}

/// A mask candidate derived from learned patterns, for the mask phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityMask {
    pub mask: String,
    pub probability: f64,
}

/// Summary statistics for dashboards and the `stats` CLI command.
#[derive(Debug, Clone, Serialize)]
pub struct LearnerStats {
    pub total_success: u64,
    pub top_charsets: Vec<String>,
    pub top_lengths: Vec<u32>,
    pub top_patterns: Vec<PatternRank>,
    pub position_probs: HashMap<String, f64>,
}

/// Stores and ranks password-shape statistics.
pub struct PatternLearner {
    model: PatternModel,
    store_path: PathBuf,
    blend: LearnerBlend,
}

impl PatternLearner {
    /// Open the learner against a store path, starting from an empty model
    /// when the file is missing or corrupt. Never fails.
    pub fn open(store_path: impl Into<PathBuf>, blend: LearnerBlend) -> Self {
        let store_path = store_path.into();
        let model = Self::load_model(&store_path);
        Self {
            model,
            store_path,
            blend,
        }
    }

    /// The per-user default location of the persisted model.
    pub fn default_store_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine user data directory"))?;
        Ok(data_dir.join("crackwise").join(MODEL_FILE))
    }

    fn load_model(path: &Path) -> PatternModel {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(model) => model,
                Err(err) => {
                    warn!(path = %path.display(), %err, "corrupt pattern model, starting fresh");
                    PatternModel::default()
                }
            },
            Err(_) => PatternModel::default(),
        }
    }

    fn save(&self) -> Result<(), CrackError> {
        if let Some(parent) = self.store_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CrackError::StoreWriteFailed {
                path: self.store_path.clone(),
                source,
            })?;
        }
        let content = serde_json::to_string_pretty(&self.model)
            .map_err(|err| anyhow::anyhow!("Failed to serialize pattern model: {err}"))?;
        std::fs::write(&self.store_path, content).map_err(|source| {
            CrackError::StoreWriteFailed {
                path: self.store_path.clone(),
                source,
            }
        })
    }

    /// Record a recovered password and persist the updated model.
    ///
    /// Persistence failures are reported and swallowed; the in-memory model
    /// keeps serving for the rest of the session.
    pub fn record_success(&mut self, password: &str, context: &SessionContext) {
        if password.is_empty() {
            return;
        }

        let analysis = Self::analyze_password(password);

        *self
            .model
            .patterns
            .entry(analysis.pattern.clone())
            .or_default() += 1;
        *self
            .model
            .lengths
            .entry(password.chars().count() as u32)
            .or_default() += 1;
        *self
            .model
            .charsets
            .entry(analysis.charset.to_string())
            .or_default() += 1;
        for feature in &analysis.positions {
            *self.model.positions.entry(feature.to_string()).or_default() += 1;
        }
        self.model.total_success += 1;

        debug!(
            file = %context.file_name,
            pattern = %analysis.pattern,
            charset = analysis.charset,
            "recorded recovery success"
        );

        if let Err(err) = self.save() {
            warn!(%err, "failed to persist pattern model, continuing in memory");
        }
    }

    /// Classify a password into pattern, charset category, and positional
    /// features.
    pub fn analyze_password(password: &str) -> PasswordAnalysis {
        let mut pattern = String::with_capacity(password.len() * 2);
        for c in password.chars() {
            if c.is_ascii_digit() {
                pattern.push_str("?d");
            } else if c.is_ascii_lowercase() {
                pattern.push_str("?l");
            } else if c.is_ascii_uppercase() {
                pattern.push_str("?u");
            } else {
                pattern.push_str("?s");
            }
        }

        let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        let has_symbol = password.chars().any(|c| !c.is_ascii_alphanumeric());

        let charset = if has_symbol {
            "with_symbols"
        } else if has_lower && has_upper && has_digit {
            "mixed_all"
        } else if has_lower && has_upper {
            "mixed_case"
        } else if has_lower && has_digit {
            "lower_digits"
        } else if has_upper && has_digit {
            "upper_digits"
        } else if has_digit {
            "pure_digits"
        } else if has_lower {
            "pure_lowercase"
        } else if has_upper {
            "pure_uppercase"
        } else {
            "unknown"
        };

        let mut positions = Vec::new();
        let first = password.chars().next();
        let last = password.chars().last();
        if first.is_some_and(|c| c.is_ascii_uppercase()) {
            positions.push("first_upper");
        }
        if last.is_some_and(|c| c.is_ascii_digit()) {
            positions.push("ends_digit");
        }
        if last.is_some_and(|c| "!@#$%^&*".contains(c)) {
            positions.push("ends_symbol");
        }
        if first.is_some_and(|c| c.is_ascii_digit()) {
            positions.push("starts_digit");
        }

        PasswordAnalysis {
            pattern,
            charset,
            positions,
        }
    }

    /// Patterns by success count, annotated with probability.
    pub fn top_patterns(&self, limit: usize) -> Vec<PatternRank> {
        let total = self.model.total_success.max(1) as f64;
        let mut ranked: Vec<PatternRank> = self
            .model
            .patterns
            .iter()
            .map(|(pattern, &count)| PatternRank {
                pattern: pattern.clone(),
                count,
                probability: count as f64 / total,
            })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then(a.pattern.cmp(&b.pattern)));
        ranked.truncate(limit);
        ranked
    }

    /// Length candidates ordered by blended weight, highest first.
    pub fn length_priority(&self) -> Vec<u32> {
        self.length_weights().into_iter().map(|(len, _)| len).collect()
    }

    /// Length candidates with their blended weights.
    pub fn length_weights(&self) -> Vec<(u32, f64)> {
        let mut combined: HashMap<u32, f64> = LENGTH_PRIORS.iter().copied().collect();
        self.blend_observed(&mut combined, &self.model.lengths);
        let mut weights: Vec<(u32, f64)> = combined.into_iter().collect();
        weights.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        weights
    }

    /// Charset categories ordered by blended weight, highest first.
    pub fn charset_priority(&self) -> Vec<String> {
        self.charset_weights().into_iter().map(|(cs, _)| cs).collect()
    }

    /// Charset categories with their blended weights.
    pub fn charset_weights(&self) -> Vec<(String, f64)> {
        let mut combined: HashMap<String, f64> = CHARSET_PRIORS
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        if self.model.total_success > self.blend.min_samples {
            let total = self.model.total_success as f64;
            for (key, &count) in &self.model.charsets {
                let learned = count as f64 / total * 100.0;
                let prior = combined
                    .get(key)
                    .copied()
                    .unwrap_or(self.blend.fallback_prior);
                combined.insert(
                    key.clone(),
                    learned * self.blend.learned_weight + prior * self.blend.prior_weight,
                );
            }
        }
        let mut weights: Vec<(String, f64)> = combined.into_iter().collect();
        weights.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        weights
    }

    fn blend_observed(&self, combined: &mut HashMap<u32, f64>, observed: &HashMap<u32, u64>) {
        if self.model.total_success <= self.blend.min_samples {
            return;
        }
        let total = self.model.total_success as f64;
        for (&key, &count) in observed {
            let learned = count as f64 / total * 100.0;
            let prior = combined.get(&key).copied().unwrap_or(self.blend.fallback_prior);
            combined.insert(
                key,
                learned * self.blend.learned_weight + prior * self.blend.prior_weight,
            );
        }
    }

    /// Per-feature probability of positional traits, with research-derived
    /// fallbacks when nothing has been recorded for a feature.
    pub fn position_probabilities(&self) -> HashMap<String, f64> {
        let total = self.model.total_success.max(1) as f64;
        let mut probs: HashMap<String, f64> = self
            .model
            .positions
            .iter()
            .map(|(k, &count)| (k.clone(), count as f64 / total))
            .collect();
        for (feature, default) in DEFAULT_POSITION_PROBS {
            probs.entry(feature.to_string()).or_insert(default);
        }
        probs
    }

    /// Masks worth scheduling first in the mask phase: learned patterns with
    /// at least 1% success probability, strongest first.
    pub fn priority_masks(&self) -> Vec<PriorityMask> {
        self.top_patterns(20)
            .into_iter()
            .filter(|rank| rank.probability > 0.01)
            .map(|rank| PriorityMask {
                mask: rank.pattern,
                probability: rank.probability,
            })
            .collect()
    }

    /// Summary for dashboards.
    pub fn stats(&self) -> LearnerStats {
        LearnerStats {
            total_success: self.model.total_success,
            top_charsets: self.charset_priority().into_iter().take(5).collect(),
            top_lengths: self.length_priority().into_iter().take(5).collect(),
            top_patterns: self.top_patterns(5),
            position_probs: self.position_probabilities(),
        }
    }

    pub fn total_success(&self) -> u64 {
        self.model.total_success
    }
}
