// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The "two index sets" named alongside the TTL hash: a set of member
//! keys per index name (`streams:all`, `streams:by_type:<T>`,
//! `sessions:by_stream:<id>`, ...). Membership here is advisory — callers
//! must cross-check against [`crate::store::TtlStore::hget`] and drop
//! stale entries on read, since an index set has no TTL of its own.

use dashmap::DashSet;
use dashmap::DashMap;

/// A named collection of index sets, each holding member keys.
#[derive(Default)]
pub struct IndexSets {
    sets: DashMap<String, DashSet<String>>,
}

impl IndexSets {
    #[must_use]
    pub fn new() -> Self {
        Self { sets: DashMap::new() }
    }

    /// Adds `member` to the index named `index`.
    pub fn add(&self, index: &str, member: impl Into<String>) {
        self.sets.entry(index.to_string()).or_default().insert(member.into());
    }

    /// Removes `member` from the index named `index`, if present.
    pub fn remove(&self, index: &str, member: &str) {
        if let Some(set) = self.sets.get(index) {
            set.remove(member);
        }
    }

    /// Returns every member currently recorded under `index`. Callers are
    /// responsible for filtering out members whose backing TTL record has
    /// since expired.
    #[must_use]
    pub fn members(&self, index: &str) -> Vec<String> {
        self.sets
            .get(index)
            .map(|set| set.iter().map(|m| m.clone()).collect())
            .unwrap_or_default()
    }

    /// Drops the whole index named `index`, the same as Redis's
    /// `DEL index_key` on a set: every member is gone, not just one.
    pub fn clear(&self, index: &str) {
        self.sets.remove(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_list_members() {
        let idx = IndexSets::new();
        idx.add("streams:all", "stream:1");
        idx.add("streams:all", "stream:2");
        let mut members = idx.members("streams:all");
        members.sort();
        assert_eq!(members, vec!["stream:1".to_string(), "stream:2".to_string()]);
    }

    #[test]
    fn remove_drops_member() {
        let idx = IndexSets::new();
        idx.add("streams:all", "stream:1");
        idx.remove("streams:all", "stream:1");
        assert!(idx.members("streams:all").is_empty());
    }

    #[test]
    fn missing_index_returns_empty() {
        let idx = IndexSets::new();
        assert!(idx.members("streams:by_type:audio").is_empty());
    }

    #[test]
    fn clear_drops_every_member() {
        let idx = IndexSets::new();
        idx.add("sessions:by_stream:1", "session:a");
        idx.add("sessions:by_stream:1", "session:b");
        idx.clear("sessions:by_stream:1");
        assert!(idx.members("sessions:by_stream:1").is_empty());
    }
}
