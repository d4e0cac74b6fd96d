//! External cracking-tool integration.
//!
//! Locates the tool binary across platform-specific install paths, probes it
//! for usability, builds the per-phase argument vector, and parses its
//! stdout:
//! - `Progress...: <int>` — candidates tested so far
//! - `Candidates...: <text>` — the candidate currently being tried
//! - `Speed...: <int>` — hash rate
//! - `hash:password` pairing — a recovered password

use crate::phase::Phase;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// How long the usability probe waits before declaring the tool unusable.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

static PROGRESS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Progress[^:]*:\s*(\d+)").unwrap());

static CANDIDATES_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Candidates[^:]*:\s*(.+)").unwrap());

static SPEED_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Speed[^:]*:\s*(\d+)").unwrap());

/// Leading markers of tool status lines, which must never be mistaken for a
/// `hash:password` result line.
const STATUS_MARKERS: [&str; 14] = [
    "Progress", "Candidates", "Speed", "Session", "Status", "Hash", "Time", "Guess", "Kernel",
    "Recovered", "Restore", "Started", "Stopped", "Hardware",
];

/// Per-phase invocation settings supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PhaseJobConfig {
    /// Wordlist for dictionary-style phases.
    pub dictionary_path: Option<PathBuf>,
    /// Mangling-rules file for the dictionary phase.
    pub rules_path: Option<PathBuf>,
    /// Mask override for mask-style phases.
    pub mask: Option<String>,
}

/// One parsed progress line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolProgress {
    pub tested_count: Option<u64>,
    pub candidate: Option<String>,
    pub speed: Option<u64>,
}

impl ToolProgress {
    pub fn is_empty(&self) -> bool {
        self.tested_count.is_none() && self.candidate.is_none() && self.speed.is_none()
    }
}

/// Parse progress markers out of one stdout line. Unrecognized lines yield
/// an empty update, never an error.
pub fn parse_progress_line(line: &str) -> ToolProgress {
    let mut progress = ToolProgress::default();
    if let Some(cap) = PROGRESS_REGEX.captures(line) {
        progress.tested_count = cap[1].parse().ok();
    }
    if let Some(cap) = CANDIDATES_REGEX.captures(line) {
        progress.candidate = Some(cap[1].trim().to_string());
    }
    if let Some(cap) = SPEED_REGEX.captures(line) {
        progress.speed = cap[1].parse().ok();
    }
    progress
}

/// Recognize a recovered password in one stdout line.
///
/// Status lines are excluded first; what remains must look like a
/// `hash:password` pairing, where the hash part carries no whitespace.
pub fn extract_password(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if STATUS_MARKERS
        .iter()
        .any(|marker| trimmed.starts_with(marker))
    {
        return None;
    }
    let (prefix, candidate) = trimmed.split_once(':')?;
    if prefix.is_empty() || prefix.contains(char::is_whitespace) {
        return None;
    }
    let password = candidate.trim();
    if password.is_empty() {
        None
    } else {
        Some(password.to_string())
    }
}

/// Platform-ordered candidate install paths, most specific first. The bare
/// command name comes last so a PATH-resolved install still works.
pub fn candidate_tool_paths() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    if cfg!(target_os = "windows") {
        paths.push(PathBuf::from(r"C:\Program Files\hashcat\hashcat.exe"));
        paths.push(PathBuf::from(r"C:\hashcat\hashcat.exe"));
        paths.push(PathBuf::from("hashcat.exe"));
    } else if cfg!(target_os = "macos") {
        paths.push(PathBuf::from("/opt/homebrew/bin/hashcat"));
        paths.push(PathBuf::from("/usr/local/bin/hashcat"));
        paths.push(PathBuf::from("/usr/bin/hashcat"));
        paths.push(PathBuf::from("hashcat"));
    } else {
        paths.push(PathBuf::from("/usr/bin/hashcat"));
        paths.push(PathBuf::from("/usr/local/bin/hashcat"));
        paths.push(PathBuf::from("hashcat"));
    }
    paths
}

/// Spawn `<tool> --help` and wait up to [`PROBE_TIMEOUT`] for a clean exit.
pub async fn probe_tool(path: &Path) -> bool {
    let child = Command::new(path)
        .arg("--help")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(err) => {
            debug!(path = %path.display(), %err, "tool probe spawn failed");
            return false;
        }
    };

    match timeout(PROBE_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(err)) => {
            debug!(path = %path.display(), %err, "tool probe wait failed");
            false
        }
        Err(_) => {
            let _ = child.start_kill();
            debug!(path = %path.display(), "tool probe timed out");
            false
        }
    }
}

/// Resolve a usable tool binary: an explicit override wins, otherwise the
/// platform candidates are probed in order. Returns `None` when nothing is
/// usable — callers treat that as a degraded mode, not an error.
pub async fn detect_tool(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if probe_tool(&path).await {
            return Some(path);
        }
        warn!(path = %path.display(), "configured tool path is not usable");
        return None;
    }
    for candidate in candidate_tool_paths() {
        if probe_tool(&candidate).await {
            debug!(path = %candidate.display(), "cracking tool detected");
            return Some(candidate);
        }
    }
    None
}

/// Build the argument vector for one phase invocation: attack-mode flag and
/// keyspace selection first, the target hash file last.
pub fn build_args(phase: Phase, config: &PhaseJobConfig, hash_file: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-m".into(),
        "0".into(),
        "--force".into(),
        "--potfile-disable".into(),
        "--quiet".into(),
    ];

    match phase {
        Phase::ShortPasswords => {
            args.push("-a".into());
            args.push("3".into());
            args.push("?d?d?d?d?d?d".into());
        }
        Phase::CommonPasswords => {
            args.push("-a".into());
            args.push("0".into());
            args.push(wordlist(config, "common.txt"));
        }
        Phase::DictionaryAttack => {
            args.push("-a".into());
            args.push("0".into());
            args.push(wordlist(config, "rockyou.txt"));
            if let Some(rules) = &config.rules_path {
                args.push("-r".into());
                args.push(rules.to_string_lossy().into_owned());
            }
        }
        Phase::DatePatterns => {
            args.push("-a".into());
            args.push("3".into());
            args.push(
                config
                    .mask
                    .clone()
                    .unwrap_or_else(|| "?d?d?d?d?d?d?d?d".into()),
            );
        }
        Phase::MaskAttack => {
            args.push("-a".into());
            args.push("3".into());
            args.push(
                config
                    .mask
                    .clone()
                    .unwrap_or_else(|| "?a?a?a?a?a?a?a?a".into()),
            );
        }
        Phase::BruteForce => {
            args.push("-a".into());
            args.push("3".into());
            args.push("?a?a?a?a?a?a?a?a?a".into());
        }
    }

    args.push(hash_file.to_string_lossy().into_owned());
    args
}

fn wordlist(config: &PhaseJobConfig, fallback: &str) -> String {
    config
        .dictionary_path
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}
