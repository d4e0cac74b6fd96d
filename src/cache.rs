//! Bounded LRU cache for recovered passwords.
//!
//! Keys are SHA-256 fingerprints of (phase, job config, file identity), so a
//! repeat run against the same archive with the same configuration returns
//! the stored password without invoking the tool. Eviction order is explicit:
//! a `VecDeque` tracks recency, oldest entries fall off once capacity is
//! exceeded.

use crate::context::SessionContext;
use crate::phase::Phase;
use crate::tool::PhaseJobConfig;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};

/// A cached recovery result.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub password: String,
    pub phase: Phase,
    pub recorded_at: DateTime<Utc>,
}

/// LRU cache with explicit capacity and eviction order.
#[derive(Debug)]
pub struct CandidateCache {
    entries: HashMap<String, CacheEntry>,
    /// Recency order, least-recently-used at the front.
    order: VecDeque<String>,
    capacity: usize,
}

impl CandidateCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Compute the cache key for a phase invocation.
    ///
    /// File identity is the archive's name and size from the session context
    /// plus the hash file path; the job config is serialized canonically so
    /// any change to wordlist, rules, or mask produces a distinct key.
    pub fn fingerprint(phase: Phase, config: &PhaseJobConfig, context: &SessionContext) -> String {
        let material = serde_json::json!({
            "phase": phase,
            "config": config,
            "file_name": context.file_name,
            "file_size": context.file_size,
            "hash_file": context.hash_file,
        });
        let mut hasher = Sha256::new();
        hasher.update(material.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Look up a key, refreshing its recency on hit.
    pub fn get(&mut self, key: &str) -> Option<&CacheEntry> {
        if self.entries.contains_key(key) {
            self.touch(key);
            self.entries.get(key)
        } else {
            None
        }
    }

    /// Insert a result, evicting the least-recently-used entries past
    /// capacity.
    pub fn insert(&mut self, key: String, phase: Phase, password: String) {
        if self.entries.contains_key(&key) {
            self.touch(&key);
        } else {
            self.order.push_back(key.clone());
        }
        self.entries.insert(
            key,
            CacheEntry {
                password,
                phase,
                recorded_at: Utc::now(),
            },
        );

        while self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> SessionContext {
        SessionContext::new("/tmp/hashes.txt", "archive.zip", 2048)
    }

    #[test]
    fn fingerprint_is_stable_for_identical_inputs() {
        let config = PhaseJobConfig::default();
        let a = CandidateCache::fingerprint(Phase::DictionaryAttack, &config, &ctx());
        let b = CandidateCache::fingerprint(Phase::DictionaryAttack, &config, &ctx());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_differs_by_phase_config_and_file() {
        let config = PhaseJobConfig::default();
        let base = CandidateCache::fingerprint(Phase::DictionaryAttack, &config, &ctx());

        let other_phase = CandidateCache::fingerprint(Phase::MaskAttack, &config, &ctx());
        assert_ne!(base, other_phase);

        let mut with_rules = PhaseJobConfig::default();
        with_rules.rules_path = Some("best64.rule".into());
        let other_config =
            CandidateCache::fingerprint(Phase::DictionaryAttack, &with_rules, &ctx());
        assert_ne!(base, other_config);

        let other_file = CandidateCache::fingerprint(
            Phase::DictionaryAttack,
            &config,
            &SessionContext::new("/tmp/hashes.txt", "other.zip", 2048),
        );
        assert_ne!(base, other_file);
    }

    #[test]
    fn get_returns_inserted_password() {
        let mut cache = CandidateCache::new(10);
        cache.insert("k1".into(), Phase::CommonPasswords, "hunter2".into());
        let entry = cache.get("k1").unwrap();
        assert_eq!(entry.password, "hunter2");
        assert_eq!(entry.phase, Phase::CommonPasswords);
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn oldest_entry_is_evicted_at_capacity() {
        let mut cache = CandidateCache::new(2);
        cache.insert("a".into(), Phase::CommonPasswords, "1".into());
        cache.insert("b".into(), Phase::CommonPasswords, "2".into());
        cache.insert("c".into(), Phase::CommonPasswords, "3".into());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn get_refreshes_recency() {
        let mut cache = CandidateCache::new(2);
        cache.insert("a".into(), Phase::CommonPasswords, "1".into());
        cache.insert("b".into(), Phase::CommonPasswords, "2".into());
        // Touch "a" so "b" becomes the eviction candidate.
        cache.get("a");
        cache.insert("c".into(), Phase::CommonPasswords, "3".into());
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn reinsert_updates_in_place_without_growing() {
        let mut cache = CandidateCache::new(5);
        cache.insert("k".into(), Phase::CommonPasswords, "old".into());
        cache.insert("k".into(), Phase::MaskAttack, "new".into());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k").unwrap().password, "new");
    }
}
