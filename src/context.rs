//! Session input context and derived file characteristics.
//!
//! `SessionContext` is what the caller (archive handler) supplies: the target
//! hash file plus the original archive's name and size. `FileCharacteristics`
//! is derived from it once per session and drives adaptive timeouts, the
//! phase plan, and several skip rules.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;

static DATE_PATTERN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}|\d{2}-\d{2}|\d{2}_\d{2}").unwrap());

static NUMBER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

static YEAR_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());

/// File-name keywords that suggest a personal document, which tend to carry
/// simpler passwords.
const PERSONAL_KEYWORDS: [&str; 6] = ["name", "photo", "document", "resume", "cv", "personal"];

/// Input context for one recovery session, supplied by the archive handler.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionContext {
    /// Path to the extracted hash file the cracking tool consumes.
    pub hash_file: PathBuf,
    /// Original archive file name (used for heuristics, not opened).
    #[serde(default)]
    pub file_name: String,
    /// Original archive size in bytes.
    #[serde(default)]
    pub file_size: u64,
}

impl SessionContext {
    pub fn new(hash_file: impl Into<PathBuf>, file_name: impl Into<String>, file_size: u64) -> Self {
        Self {
            hash_file: hash_file.into(),
            file_name: file_name.into(),
            file_size,
        }
    }

    /// Whether the archive name contains a 4-digit sequence (year-like).
    pub fn has_year_marker(&self) -> bool {
        YEAR_REGEX.is_match(&self.file_name)
    }
}

/// Heuristic characteristics derived once per session from the context.
///
/// Absent or malformed context fields degrade to zero/false rather than
/// erroring; an empty context yields a neutral characteristics value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileCharacteristics {
    pub file_size: u64,
    pub file_name: String,
    pub has_personal_info: bool,
    pub has_date_pattern: bool,
    pub has_number_pattern: bool,
    /// Difficulty multiplier, clamped to [0.5, 2.0].
    pub complexity: f64,
}

impl Default for FileCharacteristics {
    fn default() -> Self {
        Self {
            file_size: 0,
            file_name: String::new(),
            has_personal_info: false,
            has_date_pattern: false,
            has_number_pattern: false,
            complexity: 1.0,
        }
    }
}

impl FileCharacteristics {
    /// Analyze a session context into characteristics.
    pub fn analyze(context: &SessionContext) -> Self {
        let file_name = context.file_name.clone();
        let name_lower = file_name.to_lowercase();

        let has_personal_info = PERSONAL_KEYWORDS.iter().any(|kw| name_lower.contains(kw));
        let has_date_pattern = DATE_PATTERN_REGEX.is_match(&file_name);
        let has_number_pattern = NUMBER_REGEX.is_match(&file_name);

        let mut complexity: f64 = 1.0;
        if context.file_size > 100 * 1024 * 1024 {
            complexity *= 1.2;
        }
        if file_name.len() > 20 {
            complexity *= 1.1;
        }
        // Personal and date-named files tend toward simpler passwords.
        if has_personal_info {
            complexity *= 0.8;
        }
        if has_date_pattern {
            complexity *= 0.9;
        }

        Self {
            file_size: context.file_size,
            file_name,
            has_personal_info,
            has_date_pattern,
            has_number_pattern,
            complexity: complexity.clamp(0.5, 2.0),
        }
    }

    /// Whether the archive is under 1 MiB (short passwords more likely).
    pub fn is_small_file(&self) -> bool {
        self.file_size < 1024 * 1024
    }
}
