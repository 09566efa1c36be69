use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error as ThisError;
use tokio::time::{Duration, Instant};

use crate::snapshot;

/// Handle shared by every connection. The mutex is held for the span of one
/// logical operation, never across network I/O.
pub type SharedStore = Arc<Mutex<Store>>;

#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("increment or decrement would overflow")]
    Overflow,
}

/// A stored value. Every access site matches exhaustively; a string is never
/// silently read as a list or vice versa.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(Bytes),
    List(VecDeque<Bytes>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub value: Value,
    pub expires_at: Option<Instant>,
}

impl Entry {
    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// The key-value store: one map from key to entry, mutated under a single
/// exclusive lock held by the caller for the span of one logical operation.
///
/// Expiry is lazy. An entry whose deadline has passed is invisible to every
/// read and is physically removed the next time its key is touched; there is
/// no background sweeper. Time is `tokio::time::Instant`, so tests drive the
/// clock with `tokio::time::pause` and `advance` instead of sleeping.
#[derive(Debug, Default)]
pub struct Store {
    entries: HashMap<String, Entry>,
}

impl Store {
    pub fn new() -> Store {
        Store {
            entries: HashMap::new(),
        }
    }

    /// Stores a string value, replacing any prior entry of any type. With a
    /// TTL the entry expires `ttl` from now; without one it never does.
    pub fn set(&mut self, key: String, value: Bytes, ttl: Option<Duration>) {
        let entry = Entry {
            value: Value::String(value),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.insert(key, entry);
    }

    /// Returns the key's string value, or `None` if the key is missing,
    /// expired, or holds a list.
    pub fn get(&mut self, key: &str) -> Option<Bytes> {
        match &self.live_entry(key)?.value {
            Value::String(data) => Some(data.clone()),
            Value::List(_) => None,
        }
    }

    pub fn exists(&mut self, key: &str) -> bool {
        self.live_entry(key).is_some()
    }

    /// Removes the key if it is physically present, expired or not, and
    /// returns whether a removal occurred.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Adds `delta` to the integer stored at `key`, treating a missing or
    /// expired key as `0`, and returns the new value. The new value is
    /// stored as its decimal string; an existing expiry is left in place.
    pub fn incr_by(&mut self, key: &str, delta: i64) -> Result<i64, Error> {
        self.evict_if_expired(key);

        let entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::String(Bytes::from("0")),
            expires_at: None,
        });

        match &entry.value {
            Value::String(data) => {
                let current = std::str::from_utf8(data)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or(Error::NotAnInteger)?;
                let next = current.checked_add(delta).ok_or(Error::Overflow)?;
                entry.value = Value::String(Bytes::from(next.to_string()));
                Ok(next)
            }
            Value::List(_) => Err(Error::NotAnInteger),
        }
    }

    /// Pushes to the head of the key's list and returns the new length.
    pub fn push_front(&mut self, key: &str, value: Bytes) -> usize {
        let (mut items, expires_at) = self.take_list(key);
        items.push_front(value);
        let len = items.len();
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::List(items),
                expires_at,
            },
        );
        len
    }

    /// Pushes to the tail of the key's list and returns the new length.
    pub fn push_back(&mut self, key: &str, value: Bytes) -> usize {
        let (mut items, expires_at) = self.take_list(key);
        items.push_back(value);
        let len = items.len();
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::List(items),
                expires_at,
            },
        );
        len
    }

    /// Takes the key's list for in-place mutation. A missing, expired, or
    /// string-typed entry is replaced by a fresh empty list; only an
    /// existing list keeps its expiry.
    fn take_list(&mut self, key: &str) -> (VecDeque<Bytes>, Option<Instant>) {
        match self.entries.remove(key) {
            Some(entry) if !entry.is_expired(Instant::now()) => match entry.value {
                Value::List(items) => (items, entry.expires_at),
                Value::String(_) => (VecDeque::new(), None),
            },
            _ => (VecDeque::new(), None),
        }
    }

    /// Returns the inclusive slice `[start, stop]` of the key's list.
    /// Negative indices count from the tail (`-1` is the last element) and
    /// clamp to `0`; `stop` clamps to the last element. An absent, expired,
    /// or string-typed key, or an empty or inverted range, yields no
    /// elements.
    pub fn lrange(&mut self, key: &str, start: i64, stop: i64) -> Vec<Bytes> {
        let items = match self.live_entry(key) {
            Some(Entry {
                value: Value::List(items),
                ..
            }) => items,
            _ => return Vec::new(),
        };

        let len = items.len() as i64;
        let start = if start < 0 { (len + start).max(0) } else { start };
        let stop = if stop < 0 { (len + stop).max(0) } else { stop };
        let stop = stop.min(len - 1);

        if start > stop {
            return Vec::new();
        }

        items
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect()
    }

    /// Remaining time to live: `None` for an absent key, `Some(None)` for a
    /// key without expiry, `Some(Some(_))` otherwise.
    pub fn ttl(&mut self, key: &str) -> Option<Option<Duration>> {
        let entry = self.live_entry(key)?;
        Some(
            entry
                .expires_at
                .map(|deadline| deadline.saturating_duration_since(Instant::now())),
        )
    }

    /// Number of live keys. Expired entries are evicted as a side effect.
    pub fn size(&mut self) -> usize {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        self.entries.len()
    }

    /// Writes a snapshot of every live entry to `path`.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        snapshot::save(&self.entries, path)
    }

    /// Replaces the store's contents with the snapshot at `path` and returns
    /// the number of entries restored. On any error the current contents are
    /// left unchanged.
    pub fn load(&mut self, path: &Path) -> io::Result<usize> {
        let entries = snapshot::load(path)?;
        let count = entries.len();
        self.entries = entries;
        Ok(count)
    }

    /// Evicts the entry if its deadline has passed, then returns the live
    /// entry, if any.
    fn live_entry(&mut self, key: &str) -> Option<&mut Entry> {
        self.evict_if_expired(key);
        self.entries.get_mut(key)
    }

    fn evict_if_expired(&mut self, key: &str) {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(Instant::now()));
        if expired {
            self.entries.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;

    #[tokio::test]
    async fn set_then_get_roundtrips_until_overwritten() {
        let mut store = Store::new();

        store.set("key1".to_string(), Bytes::from("value1"), None);
        assert_eq!(store.get("key1"), Some(Bytes::from("value1")));

        store.set("key1".to_string(), Bytes::from("value2"), None);
        assert_eq!(store.get("key1"), Some(Bytes::from("value2")));
    }

    #[tokio::test]
    async fn get_missing_key_is_absent() {
        let mut store = Store::new();
        assert_eq!(store.get("nope"), None);
        assert!(!store.exists("nope"));
    }

    #[tokio::test]
    async fn ttl_boundary() {
        time::pause();

        let mut store = Store::new();
        store.set(
            "key1".to_string(),
            Bytes::from("value1"),
            Some(Duration::from_secs(10)),
        );

        time::advance(Duration::from_secs(9)).await;
        assert_eq!(store.get("key1"), Some(Bytes::from("value1")));
        assert!(store.exists("key1"));

        time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("key1"), None);
        assert!(!store.exists("key1"));
    }

    #[tokio::test]
    async fn expired_entry_is_physically_removed_on_touch() {
        time::pause();

        let mut store = Store::new();
        store.set(
            "key1".to_string(),
            Bytes::from("value1"),
            Some(Duration::from_secs(1)),
        );
        store.set("key2".to_string(), Bytes::from("value2"), None);

        time::advance(Duration::from_secs(2)).await;

        assert!(!store.exists("key1"));
        assert_eq!(store.size(), 1);
    }

    #[tokio::test]
    async fn overwrite_clears_previous_ttl() {
        time::pause();

        let mut store = Store::new();
        store.set(
            "key1".to_string(),
            Bytes::from("short-lived"),
            Some(Duration::from_secs(1)),
        );
        store.set("key1".to_string(), Bytes::from("persistent"), None);

        time::advance(Duration::from_secs(10)).await;
        assert_eq!(store.get("key1"), Some(Bytes::from("persistent")));
    }

    #[tokio::test]
    async fn remove_returns_true_exactly_once() {
        let mut store = Store::new();
        store.set("key1".to_string(), Bytes::from("value1"), None);

        assert!(store.remove("key1"));
        assert!(!store.remove("key1"));
        assert!(!store.remove("never-existed"));
    }

    #[tokio::test]
    async fn incr_initializes_missing_key_to_zero() {
        let mut store = Store::new();

        assert_eq!(store.incr_by("counter", 1), Ok(1));
        assert_eq!(store.incr_by("counter", -1), Ok(0));
        assert_eq!(store.get("counter"), Some(Bytes::from("0")));
    }

    #[tokio::test]
    async fn incr_rejects_non_numeric_values() {
        let mut store = Store::new();
        store.set("key1".to_string(), Bytes::from("value"), None);

        assert_eq!(store.incr_by("key1", 1), Err(Error::NotAnInteger));
        assert_eq!(store.get("key1"), Some(Bytes::from("value")));
    }

    #[tokio::test]
    async fn incr_rejects_lists() {
        let mut store = Store::new();
        store.push_back("list", Bytes::from("a"));

        assert_eq!(store.incr_by("list", 1), Err(Error::NotAnInteger));
    }

    #[tokio::test]
    async fn incr_overflow_is_an_error_and_leaves_the_value() {
        let mut store = Store::new();
        store.set(
            "key1".to_string(),
            Bytes::from(i64::MAX.to_string()),
            None,
        );

        assert_eq!(store.incr_by("key1", 1), Err(Error::Overflow));
        assert_eq!(
            store.get("key1"),
            Some(Bytes::from(i64::MAX.to_string()))
        );
    }

    #[tokio::test]
    async fn incr_preserves_ttl() {
        time::pause();

        let mut store = Store::new();
        store.set(
            "counter".to_string(),
            Bytes::from("41"),
            Some(Duration::from_secs(10)),
        );

        assert_eq!(store.incr_by("counter", 1), Ok(42));
        assert_eq!(store.ttl("counter"), Some(Some(Duration::from_secs(10))));

        time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.get("counter"), None);
    }

    #[tokio::test]
    async fn push_order() {
        let mut store = Store::new();

        store.push_front("list", Bytes::from("two"));
        store.push_front("list", Bytes::from("one"));
        let len = store.push_back("list", Bytes::from("three"));

        assert_eq!(len, 3);
        assert_eq!(
            store.lrange("list", 0, -1),
            vec![
                Bytes::from("one"),
                Bytes::from("two"),
                Bytes::from("three"),
            ]
        );
    }

    #[tokio::test]
    async fn push_coerces_string_entries_into_a_fresh_list() {
        let mut store = Store::new();
        store.set("key1".to_string(), Bytes::from("value"), None);

        let len = store.push_back("key1", Bytes::from("a"));

        assert_eq!(len, 1);
        assert_eq!(store.get("key1"), None);
        assert_eq!(store.lrange("key1", 0, -1), vec![Bytes::from("a")]);
    }

    #[tokio::test]
    async fn push_coerces_expired_lists_into_a_fresh_list() {
        time::pause();

        let mut store = Store::new();
        store.set(
            "key1".to_string(),
            Bytes::from("old"),
            Some(Duration::from_secs(1)),
        );
        time::advance(Duration::from_secs(2)).await;

        let len = store.push_back("key1", Bytes::from("a"));

        assert_eq!(len, 1);
        assert_eq!(store.lrange("key1", 0, -1), vec![Bytes::from("a")]);
    }

    #[tokio::test]
    async fn lrange_negative_indices() {
        let mut store = Store::new();
        store.push_back("list", Bytes::from("one"));
        store.push_back("list", Bytes::from("two"));
        store.push_back("list", Bytes::from("three"));

        assert_eq!(
            store.lrange("list", -2, -1),
            vec![Bytes::from("two"), Bytes::from("three")]
        );
        assert_eq!(
            store.lrange("list", -100, 100),
            vec![
                Bytes::from("one"),
                Bytes::from("two"),
                Bytes::from("three"),
            ]
        );
    }

    #[tokio::test]
    async fn lrange_empty_cases() {
        let mut store = Store::new();

        assert!(store.lrange("missing", 0, -1).is_empty());

        store.push_back("list", Bytes::from("one"));
        store.push_back("list", Bytes::from("two"));
        store.push_back("list", Bytes::from("three"));

        // Inverted after clamping.
        assert!(store.lrange("list", 2, 1).is_empty());
        assert!(store.lrange("list", 5, 10).is_empty());

        // Not a list.
        store.set("string".to_string(), Bytes::from("value"), None);
        assert!(store.lrange("string", 0, -1).is_empty());
    }

    #[tokio::test]
    async fn ttl_reports_remaining_time() {
        time::pause();

        let mut store = Store::new();
        store.set("eternal".to_string(), Bytes::from("v"), None);
        store.set(
            "mortal".to_string(),
            Bytes::from("v"),
            Some(Duration::from_secs(10)),
        );

        assert_eq!(store.ttl("missing"), None);
        assert_eq!(store.ttl("eternal"), Some(None));

        time::advance(Duration::from_secs(4)).await;
        assert_eq!(store.ttl("mortal"), Some(Some(Duration::from_secs(6))));
    }

    #[tokio::test]
    async fn load_failure_leaves_contents_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, b"\x03").unwrap();

        let mut store = Store::new();
        store.set("key1".to_string(), Bytes::from("value1"), None);

        assert!(store.load(&path).is_err());
        assert_eq!(store.get("key1"), Some(Bytes::from("value1")));
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.db");

        let mut store = Store::new();
        store.set("name".to_string(), Bytes::from("rustash"), None);
        store.set(
            "session".to_string(),
            Bytes::from("token"),
            Some(Duration::from_secs(3600)),
        );
        store.push_back("queue", Bytes::from("first"));
        store.push_back("queue", Bytes::from("second"));
        store.save(&path).unwrap();

        let mut restored = Store::new();
        assert_eq!(restored.load(&path).unwrap(), 3);
        assert_eq!(restored.get("name"), Some(Bytes::from("rustash")));
        assert_eq!(restored.get("session"), Some(Bytes::from("token")));
        assert_eq!(
            restored.lrange("queue", 0, -1),
            vec![Bytes::from("first"), Bytes::from("second")]
        );

        let remaining = restored.ttl("session").unwrap().unwrap();
        assert!(remaining <= Duration::from_secs(3600));
        assert!(remaining > Duration::from_secs(3590));
    }
}
