// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Write-once module cache

use crate::error::{ModuleError, Result};
use crate::record::ModuleRef;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Resolution outcome stored per key
pub type CacheEntry = Result<ModuleRef>;

/// Thread-safe cache of resolved records and resolution failures.
///
/// Keys are canonical locations, or the raw specifier for host modules.
/// A key is written at most once; after [`ModuleCache::lock`] nothing new
/// is written at all.
pub struct ModuleCache {
    entries: DashMap<String, CacheEntry>,
    locked: AtomicBool,
}

impl ModuleCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            locked: AtomicBool::new(false),
        }
    }

    /// Get a memoized outcome
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Check if a key is cached
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Stores `entry` unless `key` already holds one, and returns whichever
    /// outcome is cached afterwards.
    pub fn insert(&self, key: &str, entry: CacheEntry) -> CacheEntry {
        if self.is_locked() {
            return Err(ModuleError::ResolutionLocked(key.to_string()));
        }
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(vacant) => vacant.insert(entry).value().clone(),
        }
    }

    /// Refuses every later insert.
    pub fn lock(&self) {
        self.locked.store(true, Ordering::Release);
    }

    /// Whether [`ModuleCache::lock`] was called
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// All cached keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Get the number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ModuleCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostModule;
    use serde_json::json;
    use std::sync::Arc;

    fn record() -> ModuleRef {
        HostModule::json(json!({})).into_record("host")
    }

    #[test]
    fn test_first_write_wins() {
        let cache = ModuleCache::new();
        let first = record();
        let kept = cache.insert("host", Ok(Arc::clone(&first))).unwrap();
        let again = cache.insert("host", Ok(record())).unwrap();
        assert!(Arc::ptr_eq(&kept, &first));
        assert!(Arc::ptr_eq(&again, &first));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failures_are_memoized() {
        let cache = ModuleCache::new();
        let err = ModuleError::UnknownHostModule("host:nope".into());
        cache.insert("host:nope", Err(err.clone())).unwrap_err();
        assert_eq!(cache.get("host:nope").unwrap().unwrap_err(), err);
    }

    #[test]
    fn test_lock_refuses_inserts() {
        let cache = ModuleCache::new();
        cache.insert("b", Ok(record())).unwrap();
        cache.insert("a", Ok(record())).unwrap();
        cache.lock();
        assert!(matches!(
            cache.insert("c", Ok(record())),
            Err(ModuleError::ResolutionLocked(_))
        ));
        assert!(cache.get("a").unwrap().is_ok());
        assert_eq!(cache.keys(), vec!["a", "b"]);
    }
}
