//! Attack-phase vocabulary for the crackwise orchestrator.
//!
//! This module provides:
//! - `Phase` enum naming each known attack strategy
//! - `Priority` ranking used when building a session plan
//! - `PhaseDescriptor` pairing a phase with its plan-time priority and timeout
//!
//! Base timeouts are static per strategy; the monitor adapts them per file
//! (see `monitor::PhaseMonitor::start_phase`).

use serde::{Deserialize, Serialize};

/// A single attack strategy run as one bounded phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Exhaustive short numeric/simple passwords (small keyspace).
    #[serde(rename = "short_passwords")]
    ShortPasswords,
    /// Top-N most common passwords wordlist.
    #[serde(rename = "common_passwords")]
    CommonPasswords,
    /// Full dictionary attack, optionally with mangling rules.
    #[serde(rename = "dictionary_attack")]
    DictionaryAttack,
    /// Date and year shaped candidates (birthdays, file dates).
    #[serde(rename = "date_patterns")]
    DatePatterns,
    /// Mask attack over learned or default character-class masks.
    #[serde(rename = "mask_attack")]
    MaskAttack,
    /// Last-resort full keyspace brute force.
    #[serde(rename = "bruteforce")]
    BruteForce,
}

impl Phase {
    /// All known phases, in default priority order.
    pub const ALL: [Phase; 6] = [
        Phase::ShortPasswords,
        Phase::CommonPasswords,
        Phase::DictionaryAttack,
        Phase::DatePatterns,
        Phase::MaskAttack,
        Phase::BruteForce,
    ];

    /// Stable string identifier, used in logs, events, and cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::ShortPasswords => "short_passwords",
            Phase::CommonPasswords => "common_passwords",
            Phase::DictionaryAttack => "dictionary_attack",
            Phase::DatePatterns => "date_patterns",
            Phase::MaskAttack => "mask_attack",
            Phase::BruteForce => "bruteforce",
        }
    }

    /// Static base timeout in milliseconds, before per-file adaptation.
    pub fn base_timeout_ms(&self) -> u64 {
        match self {
            Phase::ShortPasswords => 30_000,
            Phase::CommonPasswords => 60_000,
            Phase::DictionaryAttack => 120_000,
            Phase::DatePatterns => 90_000,
            Phase::MaskAttack => 600_000,
            Phase::BruteForce => 1_800_000,
        }
    }

    /// Plan priority for this strategy.
    pub fn priority(&self) -> Priority {
        match self {
            Phase::ShortPasswords | Phase::CommonPasswords | Phase::DatePatterns => Priority::High,
            Phase::DictionaryAttack => Priority::Medium,
            Phase::MaskAttack => Priority::Low,
            Phase::BruteForce => Priority::Lowest,
        }
    }

    /// Whether this phase targets date-shaped passwords.
    ///
    /// Used by the monitor's file-characteristic rule: a date-named file
    /// running too long in a non-date phase gets skipped.
    pub fn is_date_related(&self) -> bool {
        matches!(self, Phase::DatePatterns | Phase::ShortPasswords)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Plan-time priority ranking for a phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
    Lowest,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::Lowest => "lowest",
        }
    }
}

/// One entry in a session's ordered phase plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PhaseDescriptor {
    pub phase: Phase,
    pub priority: Priority,
    /// Plan-time timeout hint in milliseconds (the monitor recomputes an
    /// adaptive timeout when the phase actually starts).
    pub timeout_ms: u64,
}

impl PhaseDescriptor {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            priority: phase.priority(),
            timeout_ms: phase.base_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names_round_trip_through_serde() {
        for phase in Phase::ALL {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{}\"", phase.as_str()));
            let back: Phase = serde_json::from_str(&json).unwrap();
            assert_eq!(back, phase);
        }
    }

    #[test]
    fn base_timeouts_are_within_monitor_clamp() {
        for phase in Phase::ALL {
            let t = phase.base_timeout_ms();
            assert!((10_000..=1_800_000).contains(&t), "{phase}: {t}");
        }
    }

    #[test]
    fn only_date_and_short_phases_are_date_related() {
        assert!(Phase::DatePatterns.is_date_related());
        assert!(Phase::ShortPasswords.is_date_related());
        assert!(!Phase::DictionaryAttack.is_date_related());
        assert!(!Phase::MaskAttack.is_date_related());
        assert!(!Phase::BruteForce.is_date_related());
    }

    #[test]
    fn bruteforce_ranks_last() {
        assert!(Phase::BruteForce.priority() > Phase::MaskAttack.priority());
        assert!(Phase::MaskAttack.priority() > Phase::DictionaryAttack.priority());
        assert_eq!(Phase::BruteForce.priority(), Priority::Lowest);
    }

    #[test]
    fn descriptor_carries_static_values() {
        let d = PhaseDescriptor::new(Phase::ShortPasswords);
        assert_eq!(d.timeout_ms, 30_000);
        assert_eq!(d.priority, Priority::High);
    }
}
