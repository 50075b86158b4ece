//! Analytics result cache: query key → (result, computed_at).
//!
//! RULE: Entries never expire on their own. The only way a cached result
//! goes away is `invalidate()`, which the analytics service calls
//! whenever it receives a new population snapshot.

use crate::analyzer::{AggregateStats, Analysis};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    AggregateStats,
    Analysis,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CachedResult {
    AggregateStats(AggregateStats),
    Analysis(Analysis),
}

impl CachedResult {
    pub fn key(&self) -> QueryKey {
        match self {
            Self::AggregateStats(_) => QueryKey::AggregateStats,
            Self::Analysis(_)       => QueryKey::Analysis,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub result:      CachedResult,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct AnalyticsCache {
    entries: HashMap<QueryKey, CacheEntry>,
}

impl AnalyticsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: QueryKey) -> Option<&CacheEntry> {
        self.entries.get(&key)
    }

    /// Store `result` under its own key, stamped now. Replaces any
    /// previous entry for that key.
    pub fn insert(&mut self, result: CachedResult) -> &CacheEntry {
        self.insert_at(result, Utc::now())
    }

    pub fn insert_at(&mut self, result: CachedResult, computed_at: DateTime<Utc>) -> &CacheEntry {
        let key = result.key();
        self.entries.insert(key, CacheEntry { result, computed_at });
        &self.entries[&key]
    }

    pub fn aggregate_stats(&self) -> Option<&AggregateStats> {
        match self.get(QueryKey::AggregateStats).map(|e| &e.result) {
            Some(CachedResult::AggregateStats(s)) => Some(s),
            _ => None,
        }
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        match self.get(QueryKey::Analysis).map(|e| &e.result) {
            Some(CachedResult::Analysis(a)) => Some(a),
            _ => None,
        }
    }

    pub fn computed_at(&self, key: QueryKey) -> Option<DateTime<Utc>> {
        self.get(key).map(|e| e.computed_at)
    }

    pub fn invalidate(&mut self) {
        if !self.entries.is_empty() {
            log::debug!("analytics cache invalidated ({} entries)", self.entries.len());
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
