// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Keyed hash with per-key expiry, the four primitives named in the
//! coordination fabric's design notes: `set`, `hget`, `hset_field`,
//! `touch`, plus `delete`. Backed by `dashmap` and swept by a background
//! task rather than an external key-value service, per the "any map +
//! background sweeper suffices" guidance.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::debug;
use serde_json::Value;

use crate::error::{EphemeralError, EphemeralErrorKind};

struct Entry {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// An in-process TTL hash store. Cheap to clone (wraps an `Arc`
/// internally via `DashMap`'s own sharding), so it is typically held
/// behind an `Arc<TtlStore>` and shared across the stream registry,
/// negotiator and the sweep task.
#[derive(Default)]
pub struct TtlStore {
    entries: DashMap<String, Entry>,
}

impl TtlStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Writes `value` under `key` with an expiry `ttl` from now,
    /// overwriting any prior value and TTL.
    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let expires_at = Utc::now() + chrono_duration(ttl);
        self.entries.insert(key.into(), Entry { value, expires_at });
    }

    /// Reads the value under `key`, or `None` if missing or expired.
    /// Lazily evicts an expired entry it encounters.
    #[must_use]
    pub fn hget(&self, key: &str) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at <= Utc::now() => true,
            Some(entry) => return Some(entry.value.clone()),
            None => return None,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Merges `field: value` into the JSON object stored under `key`,
    /// preserving the key's current TTL.
    ///
    /// # Errors
    /// [`EphemeralErrorKind::NotFound`] if the key is missing or expired.
    /// [`EphemeralErrorKind::NotAnObject`] if the stored value isn't a
    /// JSON object.
    pub fn hset_field(&self, key: &str, field: &str, value: Value) -> Result<(), EphemeralError> {
        let mut entry = self
            .entries
            .get_mut(key)
            .filter(|e| e.expires_at > Utc::now())
            .ok_or_else(|| EphemeralErrorKind::NotFound(key.to_string()))?;
        match entry.value.as_object_mut() {
            Some(map) => {
                map.insert(field.to_string(), value);
                Ok(())
            }
            None => Err(EphemeralErrorKind::NotAnObject(key.to_string(), field.to_string()).into()),
        }
    }

    /// Extends `key`'s expiry to `ttl` from now.
    ///
    /// # Errors
    /// [`EphemeralErrorKind::NotFound`] if the key is missing or already
    /// expired.
    pub fn touch(&self, key: &str, ttl: Duration) -> Result<(), EphemeralError> {
        let mut entry = self
            .entries
            .get_mut(key)
            .filter(|e| e.expires_at > Utc::now())
            .ok_or_else(|| EphemeralErrorKind::NotFound(key.to_string()))?;
        entry.expires_at = Utc::now() + chrono_duration(ttl);
        Ok(())
    }

    /// Removes `key` unconditionally, returning its last value if present
    /// (even if technically expired — callers that already know the key
    /// existed don't need to re-check).
    pub fn delete(&self, key: &str) -> Option<Value> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    /// Drops every entry whose TTL has lapsed. Called periodically by
    /// [`spawn_sweeper`]; exposed directly for deterministic tests.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }
}

fn chrono_duration(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero())
}

/// Spawns a background task that sweeps `store` every `interval` until
/// the returned handle is dropped or aborted.
pub fn spawn_sweeper(store: Arc<TtlStore>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let evicted = store.sweep();
            if evicted > 0 {
                debug!("ttl sweeper evicted {evicted} expired entr{}", if evicted == 1 { "y" } else { "ies" });
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_then_hget_round_trips() {
        let store = TtlStore::new();
        store.set("stream:1", json!({"name": "A"}), Duration::from_secs(30));
        assert_eq!(store.hget("stream:1"), Some(json!({"name": "A"})));
    }

    #[test]
    fn hget_returns_none_past_ttl() {
        let store = TtlStore::new();
        store.set("stream:1", json!({"name": "A"}), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.hget("stream:1"), None);
    }

    #[test]
    fn touch_extends_ttl() {
        let store = TtlStore::new();
        store.set("stream:1", json!({"name": "A"}), Duration::from_millis(10));
        store.touch("stream:1", Duration::from_secs(30)).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(store.hget("stream:1").is_some());
    }

    #[test]
    fn touch_missing_key_is_not_found() {
        let store = TtlStore::new();
        let err = store.touch("missing", Duration::from_secs(30)).unwrap_err();
        assert!(matches!(err.into_kind(), EphemeralErrorKind::NotFound(_)));
    }

    #[test]
    fn hset_field_merges_into_object() {
        let store = TtlStore::new();
        store.set("stream:1", json!({"name": "A"}), Duration::from_secs(30));
        store.hset_field("stream:1", "last_heartbeat", json!("2026-07-27T00:00:00Z")).unwrap();
        assert_eq!(
            store.hget("stream:1"),
            Some(json!({"name": "A", "last_heartbeat": "2026-07-27T00:00:00Z"}))
        );
    }

    #[test]
    fn sweep_evicts_expired_entries_only() {
        let store = TtlStore::new();
        store.set("stream:expired", json!({}), Duration::from_millis(0));
        store.set("stream:fresh", json!({}), Duration::from_secs(30));
        std::thread::sleep(Duration::from_millis(5));
        let evicted = store.sweep();
        assert_eq!(evicted, 1);
        assert!(store.hget("stream:fresh").is_some());
    }
}
