//! Version-keyed memo store for normalized hover text.
//!
//! An entry is only served while its stored version equals the version in the lookup
//! key, so an edited file always misses. The lock is never held across a provider call:
//! two concurrent misses on the same key both fetch, and the second store overwrites the
//! first with an equal value.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::Mutex;

use crate::types::DocumentVersion;

/// Identity of one hover query against one document state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    file: PathBuf,
    version: DocumentVersion,
    line: u32,
    character: u32,
}

impl CacheKey {
    pub fn new(file: &Path, version: DocumentVersion, line: u32, character: u32) -> Self {
        Self {
            file: file.to_path_buf(),
            version,
            line,
            character,
        }
    }

    pub fn version(&self) -> DocumentVersion {
        self.version
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    version: DocumentVersion,
    text: String,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    insertion_order: VecDeque<CacheKey>,
    hits: u64,
    misses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
pub struct HoverCache {
    state: Mutex<CacheState>,
    /// `0` means unbounded.
    max_entries: usize,
}

impl Default for HoverCache {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl HoverCache {
    pub fn unbounded() -> Self {
        Self::with_max_entries(0)
    }

    /// When full, the oldest inserted key is evicted first.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            max_entries,
        }
    }

    pub async fn lookup(&self, key: &CacheKey) -> Option<String> {
        let mut state = self.state.lock().await;
        let hit = state
            .entries
            .get(key)
            .filter(|entry| entry.version == key.version)
            .map(|entry| entry.text.clone());
        if hit.is_some() {
            state.hits += 1;
        } else {
            state.misses += 1;
        }
        hit
    }

    pub async fn store(&self, key: CacheKey, version: DocumentVersion, text: String) {
        let mut state = self.state.lock().await;
        let previous = state
            .entries
            .insert(key.clone(), CacheEntry { version, text });
        if previous.is_none() {
            state.insertion_order.push_back(key);
        }

        if self.max_entries == 0 {
            return;
        }
        while state.entries.len() > self.max_entries {
            let Some(oldest) = state.insertion_order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
        }
    }

    /// Drop every entry. Returns how many entries were removed.
    pub async fn clear(&self) -> usize {
        let mut state = self.state.lock().await;
        let removed = state.entries.len();
        state.entries.clear();
        state.insertion_order.clear();
        removed
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        CacheStats {
            entries: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
        }
    }
}
