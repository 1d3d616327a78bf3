//! Thread-Safe Storage Engine with Expiry Support
//!
//! This module implements the keyspace for EmberKV: a sharded, lock-guarded
//! HashMap with millisecond TTLs and a read-through fallback to an on-disk
//! snapshot.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Keys hash onto 64 shards, each behind its own `RwLock`.
//! 2. **Lazy Expiry**: An entry whose deadline has passed reads as absent and
//!    is evicted on that read. The background sweeper is optional.
//! 3. **Wall-Clock Deadlines**: Expiry is an absolute epoch-millisecond value,
//!    the same unit the snapshot uses, so loaded and written keys compare alike.
//! 4. **Snapshot Fallback**: A key never written by this process is looked up
//!    in the snapshot file. Hits are not cached. Once the attached snapshot
//!    has been preloaded with [`StorageEngine::load_snapshot`], the file is
//!    no longer consulted.
//!
//! ## Read Path
//!
//! ```text
//!   read(key)
//!      │
//!      ▼
//! ┌──────────────┐ live, fresh  ┌──────────────┐
//! │ shard lookup │─────────────>│ Some(entry)  │
//! └──────┬───────┘              └──────────────┘
//!        │ live, expired ──> evict ──> None
//!        │ evicted before ──────────> None
//!        │ never written
//!        ▼
//! ┌──────────────┐ fresh        ┌──────────────┐
//! │  snapshot    │─────────────>│ Some(entry)  │
//! │  lookup      │ expired/miss/error ─> None  │
//! └──────────────┘              └──────────────┘
//! ```

use crate::clock;
use crate::snapshot::{SnapshotError, SnapshotReader};
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{OnceLock, RwLock};
use std::time::Duration;
use tracing::{debug, error};

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 64;

/// A stored value with an optional absolute deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The actual value stored
    pub value: Bytes,
    /// Epoch milliseconds at which this entry expires (None = never)
    pub expires_at: Option<u64>,
}

impl Entry {
    /// Creates a new entry without expiry.
    pub fn new(value: Bytes) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    #[inline]
    pub fn is_expired_at(&self, now: u64) -> bool {
        clock::is_expired_at(self.expires_at, now)
    }
}

/// Contents of one shard, guarded by a single lock.
#[derive(Debug, Default)]
struct ShardMap {
    entries: HashMap<Bytes, Entry>,
    /// Snapshot keys whose live entry expired. They must not fall through to
    /// the snapshot's older copy.
    evicted: HashSet<Bytes>,
}

impl ShardMap {
    /// True if this shard decides the key, so the snapshot must not be asked.
    fn shadows(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key) || self.evicted.contains(key)
    }
}

#[derive(Debug, Default)]
struct Shard {
    map: RwLock<ShardMap>,
}

/// The keyspace.
///
/// Wrap it in an `Arc` and share it across connection tasks; every method
/// takes `&self` and locks only the shard it touches.
///
/// # Example
///
/// ```
/// use emberkv::storage::StorageEngine;
/// use bytes::Bytes;
/// use std::time::Duration;
///
/// let engine = StorageEngine::new();
///
/// engine.set(Bytes::from("name"), Bytes::from("ember"));
/// assert_eq!(engine.get(b"name"), Some(Bytes::from("ember")));
///
/// engine.set_with_ttl(Bytes::from("session"), Bytes::from("abc123"), Duration::from_secs(60));
/// assert!(engine.read(b"session").unwrap().expires_at.is_some());
/// ```
pub struct StorageEngine {
    shards: Vec<Shard>,

    /// Number of live entries (approximate; expired-but-unswept entries count)
    key_count: AtomicU64,

    /// Read-through source for keys never written by this process
    snapshot: Option<SnapshotReader>,

    /// Every key in the snapshot file, decoded on first eviction
    snapshot_keys: OnceLock<HashSet<Bytes>>,

    /// Set once the attached snapshot has been loaded into the shards
    preloaded: AtomicBool,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .field("snapshot", &self.snapshot.as_ref().map(|s| s.path()))
            .field("preloaded", &self.preloaded.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates an empty engine with no snapshot attached.
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| Shard::default()).collect(),
            key_count: AtomicU64::new(0),
            snapshot: None,
            snapshot_keys: OnceLock::new(),
            preloaded: AtomicBool::new(false),
        }
    }

    /// Creates an empty engine that falls back to `snapshot` on misses.
    pub fn with_snapshot(snapshot: SnapshotReader) -> Self {
        Self {
            snapshot: Some(snapshot),
            ..Self::new()
        }
    }

    pub fn snapshot(&self) -> Option<&SnapshotReader> {
        self.snapshot.as_ref()
    }

    /// The snapshot to read through to, unless it was already preloaded.
    fn fallback(&self) -> Option<&SnapshotReader> {
        if self.preloaded.load(Ordering::Acquire) {
            return None;
        }
        self.snapshot.as_ref()
    }

    /// Keys of the fallback snapshot, decoded once.
    ///
    /// `None` when there is no fallback or the file cannot be read; a file
    /// that cannot be read serves no values, so nothing needs shadowing.
    fn fallback_keys(&self) -> Option<&HashSet<Bytes>> {
        let snapshot = self.fallback()?;
        if let Some(keys) = self.snapshot_keys.get() {
            return Some(keys);
        }

        match snapshot.load() {
            Ok(records) => Some(
                self.snapshot_keys
                    .get_or_init(|| records.into_iter().map(|record| record.key).collect()),
            ),
            Err(e) => {
                self.log_snapshot_error(&e);
                None
            }
        }
    }

    /// True if an expired live `key` would otherwise resurface from the snapshot.
    fn needs_tombstone(&self, key: &[u8]) -> bool {
        self.fallback_keys()
            .map(|keys| keys.contains(key))
            .unwrap_or(false)
    }

    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    #[inline]
    fn get_shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Upserts a key. A `None` deadline clears any previous expiry.
    pub fn write(&self, key: Bytes, value: Bytes, expires_at: Option<u64>) {
        let shard = self.get_shard(&key);
        let mut map = shard.map.write().unwrap();

        map.evicted.remove(&key);
        let entry = Entry { value, expires_at };
        if map.entries.insert(key, entry).is_none() {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Sets a key-value pair without expiry.
    pub fn set(&self, key: Bytes, value: Bytes) {
        self.write(key, value, None);
    }

    /// Sets a key-value pair that expires `ttl` from now.
    pub fn set_with_ttl(&self, key: Bytes, value: Bytes, ttl: Duration) {
        self.write(key, value, Some(clock::deadline_after(ttl)));
    }

    /// Reads the entry for a key.
    ///
    /// Returns `None` if the key is unknown or expired. An expired live entry
    /// is removed under the shard's write lock.
    pub fn read(&self, key: &[u8]) -> Option<Entry> {
        let now = clock::now_millis();
        let shard = self.get_shard(key);

        // Fast path under the read lock
        {
            let map = shard.map.read().unwrap();
            match map.entries.get(key) {
                Some(entry) if !entry.is_expired_at(now) => return Some(entry.clone()),
                Some(_) => {}
                None if map.evicted.contains(key) => return None,
                None => {
                    drop(map);
                    return self.read_snapshot(key);
                }
            }
        }

        // Entry is expired - take the write lock to evict it
        let tombstone = self.needs_tombstone(key);
        let mut map = shard.map.write().unwrap();
        let expired = match map.entries.get(key) {
            Some(entry) if entry.is_expired_at(now) => true,
            // Race: another task rewrote the key in between
            Some(entry) => return Some(entry.clone()),
            None => false,
        };

        if expired {
            map.entries.remove(key);
            self.key_count.fetch_sub(1, Ordering::Relaxed);
            if tombstone {
                map.evicted.insert(Bytes::copy_from_slice(key));
            }
            debug!(key = %String::from_utf8_lossy(key), "Evicted expired key");
        }

        None
    }

    /// Gets the value for a key.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.read(key).map(|entry| entry.value)
    }

    fn read_snapshot(&self, key: &[u8]) -> Option<Entry> {
        let snapshot = self.fallback()?;

        match snapshot.lookup(key) {
            Ok(Some(hit)) if !hit.expired => Some(Entry::new(hit.value)),
            Ok(_) => None,
            Err(e) => {
                self.log_snapshot_error(&e);
                None
            }
        }
    }

    fn log_snapshot_error(&self, e: &SnapshotError) {
        let path = self.snapshot.as_ref().map(|s| s.path().display().to_string());
        if e.is_not_found() {
            debug!(path = ?path, "Snapshot file not present");
        } else {
            error!(path = ?path, error = %e, "Failed to read snapshot");
        }
    }

    /// Returns all non-expired keys matching a glob pattern, live keys and
    /// snapshot keys alike, each key once.
    ///
    /// Supported patterns:
    /// - `*` matches everything
    /// - `h*llo` matches hello, hallo, hxllo
    /// - `h?llo` matches hello, hallo, but not hllo
    /// - `h[ae]llo` matches hello and hallo, but not hillo
    pub fn keys(&self, pattern: &str) -> Vec<Bytes> {
        let now = clock::now_millis();
        let pattern = GlobPattern::new(pattern);
        let mut result = Vec::new();

        for shard in &self.shards {
            let map = shard.map.read().unwrap();
            result.extend(
                map.entries
                    .iter()
                    .filter(|(key, entry)| !entry.is_expired_at(now) && pattern.matches(key))
                    .map(|(key, _)| key.clone()),
            );
        }

        let Some(snapshot) = self.fallback() else {
            return result;
        };

        match snapshot.list_keys() {
            Ok(keys) => {
                for key in keys {
                    if !pattern.matches(&key) {
                        continue;
                    }
                    let shadowed = self.get_shard(&key).map.read().unwrap().shadows(&key);
                    if !shadowed {
                        result.push(key);
                    }
                }
            }
            Err(e) => self.log_snapshot_error(&e),
        }

        result
    }

    /// Ingests every non-expired snapshot record through the write path.
    ///
    /// Loading the attached snapshot successfully turns off read-through for
    /// it. Returns the number of keys loaded.
    pub fn load_snapshot(&self, reader: &SnapshotReader) -> Result<usize, SnapshotError> {
        let now = clock::now_millis();
        let mut loaded = 0;

        for record in reader.load()? {
            if record.is_expired_at(now) {
                continue;
            }
            self.write(record.key, record.value, record.expires_at);
            loaded += 1;
        }

        if self.snapshot.as_ref().map(|s| s.path()) == Some(reader.path()) {
            self.preloaded.store(true, Ordering::Release);
            for shard in &self.shards {
                shard.map.write().unwrap().evicted.clear();
            }
        }

        Ok(loaded)
    }

    /// Returns the approximate number of live keys.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes expired keys from all shards.
    ///
    /// Called by the background expiry sweeper. Returns the number removed.
    pub fn cleanup_expired(&self) -> u64 {
        let now = clock::now_millis();
        // Decoded only if something actually expired
        let mut snapshot_keys = None;
        let mut cleaned = 0u64;

        for shard in &self.shards {
            let mut map = shard.map.write().unwrap();
            let ShardMap { entries, evicted } = &mut *map;
            let before = entries.len();

            entries.retain(|key, entry| {
                let expired = entry.is_expired_at(now);
                if expired {
                    let keys = *snapshot_keys.get_or_insert_with(|| self.fallback_keys());
                    if keys.is_some_and(|keys| keys.contains(key)) {
                        evicted.insert(key.clone());
                    }
                }
                !expired
            });

            cleaned += (before - entries.len()) as u64;
        }

        if cleaned > 0 {
            self.key_count.fetch_sub(cleaned, Ordering::Relaxed);
        }

        cleaned
    }
}

/// Glob matcher for the KEYS command.
struct GlobPattern {
    pattern: Vec<u8>,
}

impl GlobPattern {
    fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.as_bytes().to_vec(),
        }
    }

    /// Iterative match; on a mismatch after a `*`, retries with the star
    /// absorbing one more byte. Runs in O(pattern * text).
    fn matches(&self, text: &[u8]) -> bool {
        let pattern = &self.pattern;
        let (mut p, mut t) = (0, 0);
        // Pattern index after the last `*` and the text index it resumes from
        let mut backtrack: Option<(usize, usize)> = None;

        while t < text.len() {
            if pattern.get(p) == Some(&b'*') {
                p += 1;
                backtrack = Some((p, t));
                continue;
            }

            if let Some(width) = Self::match_token(&pattern[p..], text[t]) {
                p += width;
                t += 1;
                continue;
            }

            match backtrack {
                Some((star_p, star_t)) => {
                    p = star_p;
                    t = star_t + 1;
                    backtrack = Some((star_p, t));
                }
                None => return false,
            }
        }

        pattern[p..].iter().all(|&b| b == b'*')
    }

    /// Matches the single-byte token at the start of `pattern` against `c`,
    /// returning the token's width in the pattern.
    fn match_token(pattern: &[u8], c: u8) -> Option<usize> {
        let (&first, rest) = pattern.split_first()?;

        match first {
            b'?' => Some(1),
            b'[' => {
                let mut i = 0;
                let negate = rest.first() == Some(&b'^');
                if negate {
                    i += 1;
                }

                let mut matched = false;
                while i < rest.len() && rest[i] != b']' {
                    if i + 2 < rest.len() && rest[i + 1] == b'-' && rest[i + 2] != b']' {
                        matched |= (rest[i]..=rest[i + 2]).contains(&c);
                        i += 3;
                    } else {
                        matched |= rest[i] == c;
                        i += 1;
                    }
                }

                // Unterminated class never matches
                (i < rest.len() && matched != negate).then_some(i + 2)
            }
            b'\\' if !rest.is_empty() => (rest[0] == c).then_some(2),
            other => (other == c).then_some(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::format::opcode;
    use crate::snapshot::reader::tests::{
        foo_baz_snapshot, push_record, push_record_ms, write_snapshot, FUTURE_MS, PAST_MS,
    };
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_and_get() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from("key"), Bytes::from("value"));
        assert_eq!(engine.get(b"key"), Some(Bytes::from("value")));
    }

    #[test]
    fn test_get_nonexistent() {
        let engine = StorageEngine::new();
        assert_eq!(engine.get(b"nonexistent"), None);
    }

    #[test]
    fn test_expiry() {
        let engine = StorageEngine::new();

        engine.set_with_ttl(
            Bytes::from("key"),
            Bytes::from("value"),
            Duration::from_millis(50),
        );

        // Key should exist immediately
        assert_eq!(engine.get(b"key"), Some(Bytes::from("value")));

        std::thread::sleep(Duration::from_millis(100));

        assert_eq!(engine.get(b"key"), None);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_deadline_boundary_is_expired() {
        let engine = StorageEngine::new();
        let now = clock::now_millis();

        engine.write(Bytes::from("at-now"), Bytes::from("v"), Some(now));
        assert_eq!(engine.read(b"at-now"), None);
    }

    #[test]
    fn test_set_without_ttl_clears_previous_ttl() {
        let engine = StorageEngine::new();

        engine.set_with_ttl(
            Bytes::from("key"),
            Bytes::from("old"),
            Duration::from_millis(30),
        );
        engine.set(Bytes::from("key"), Bytes::from("new"));

        std::thread::sleep(Duration::from_millis(60));

        let entry = engine.read(b"key").unwrap();
        assert_eq!(entry.value, Bytes::from("new"));
        assert_eq!(entry.expires_at, None);
    }

    #[test]
    fn test_overwrite_keeps_single_key() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from("key"), Bytes::from("one"));
        engine.set(Bytes::from("key"), Bytes::from("two"));

        assert_eq!(engine.len(), 1);
        assert_eq!(engine.get(b"key"), Some(Bytes::from("two")));
    }

    #[test]
    fn test_keys_pattern() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from("hello"), Bytes::from("1"));
        engine.set(Bytes::from("hallo"), Bytes::from("2"));
        engine.set(Bytes::from("hxllo"), Bytes::from("3"));
        engine.set(Bytes::from("world"), Bytes::from("4"));
        engine.write(Bytes::from("hillo"), Bytes::from("5"), Some(PAST_MS));

        assert_eq!(engine.keys("*").len(), 4);
        assert_eq!(engine.keys("h*llo").len(), 3);
        assert_eq!(engine.keys("h?llo").len(), 3);
        assert_eq!(engine.keys("h[ae]llo").len(), 2);
    }

    #[test]
    fn test_cleanup_expired() {
        let engine = StorageEngine::new();

        engine.write(Bytes::from("key1"), Bytes::from("value1"), Some(PAST_MS));
        engine.write(Bytes::from("key2"), Bytes::from("value2"), Some(PAST_MS));
        engine.set(Bytes::from("key3"), Bytes::from("value3"));

        assert_eq!(engine.cleanup_expired(), 2);
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.get(b"key3"), Some(Bytes::from("value3")));
    }

    #[test]
    fn test_snapshot_fallback() {
        let file = write_snapshot(&foo_baz_snapshot());
        let engine = StorageEngine::with_snapshot(SnapshotReader::new(file.path()));

        assert_eq!(engine.get(b"foo"), Some(Bytes::from("bar")));
        assert_eq!(engine.get(b"baz"), None);
        assert_eq!(engine.get(b"nope"), None);

        // Fallback hits are not cached
        assert!(engine.is_empty());
    }

    #[test]
    fn test_live_write_wins_over_snapshot() {
        let file = write_snapshot(&foo_baz_snapshot());
        let engine = StorageEngine::with_snapshot(SnapshotReader::new(file.path()));

        engine.set(Bytes::from("foo"), Bytes::from("live"));
        assert_eq!(engine.get(b"foo"), Some(Bytes::from("live")));
    }

    #[test]
    fn test_expired_live_key_does_not_resurrect_snapshot_value() {
        let file = write_snapshot(&foo_baz_snapshot());
        let engine = StorageEngine::with_snapshot(SnapshotReader::new(file.path()));

        engine.write(Bytes::from("foo"), Bytes::from("short"), Some(PAST_MS));
        assert_eq!(engine.get(b"foo"), None);
        assert_eq!(engine.get(b"foo"), None);
        assert!(engine.keys("*").is_empty());

        engine.set(Bytes::from("foo"), Bytes::from("again"));
        assert_eq!(engine.get(b"foo"), Some(Bytes::from("again")));
    }

    fn tombstones(engine: &StorageEngine) -> usize {
        engine
            .shards
            .iter()
            .map(|shard| shard.map.read().unwrap().evicted.len())
            .sum()
    }

    #[test]
    fn test_sweeper_only_remembers_snapshot_keys() {
        let file = write_snapshot(&foo_baz_snapshot());
        let engine = StorageEngine::with_snapshot(SnapshotReader::new(file.path()));

        for i in 0..10_000 {
            engine.write(
                Bytes::from(format!("session:{}", i)),
                Bytes::from("v"),
                Some(PAST_MS),
            );
        }
        engine.write(Bytes::from("foo"), Bytes::from("short"), Some(PAST_MS));

        assert_eq!(engine.cleanup_expired(), 10_001);
        assert!(engine.is_empty());
        assert_eq!(tombstones(&engine), 1);
        assert_eq!(engine.get(b"foo"), None);
    }

    #[test]
    fn test_lazy_eviction_only_remembers_snapshot_keys() {
        let file = write_snapshot(&foo_baz_snapshot());
        let engine = StorageEngine::with_snapshot(SnapshotReader::new(file.path()));

        engine.write(Bytes::from("temp"), Bytes::from("v"), Some(PAST_MS));
        assert_eq!(engine.get(b"temp"), None);
        assert_eq!(tombstones(&engine), 0);

        engine.write(Bytes::from("foo"), Bytes::from("v"), Some(PAST_MS));
        assert_eq!(engine.get(b"foo"), None);
        assert_eq!(engine.get(b"foo"), None);
        assert_eq!(tombstones(&engine), 1);

        engine.set(Bytes::from("foo"), Bytes::from("back"));
        assert_eq!(tombstones(&engine), 0);
    }

    #[test]
    fn test_preloaded_snapshot_is_not_read_again() {
        let file = write_snapshot(&foo_baz_snapshot());
        let engine = StorageEngine::with_snapshot(SnapshotReader::new(file.path()));
        assert_eq!(engine.load_snapshot(engine.snapshot().unwrap()).unwrap(), 1);

        // Changes to the file after the preload are not visible
        let mut buf = vec![opcode::RESIZE_DB, 1, 0];
        push_record(&mut buf, "late", "1");
        std::fs::write(file.path(), &buf).unwrap();

        assert_eq!(engine.get(b"late"), None);
        assert_eq!(engine.keys("*"), vec![Bytes::from("foo")]);

        // A preloaded key that expires stays gone without a tombstone
        engine.write(Bytes::from("foo"), Bytes::from("x"), Some(PAST_MS));
        assert_eq!(engine.get(b"foo"), None);
        assert_eq!(engine.cleanup_expired(), 0);
        assert_eq!(tombstones(&engine), 0);
    }

    #[test]
    fn test_loading_another_file_keeps_read_through() {
        let attached = write_snapshot(&foo_baz_snapshot());
        let mut buf = vec![opcode::RESIZE_DB, 1, 0];
        push_record(&mut buf, "extra", "1");
        let other = write_snapshot(&buf);

        let engine = StorageEngine::with_snapshot(SnapshotReader::new(attached.path()));
        assert_eq!(engine.load_snapshot(&SnapshotReader::new(other.path())).unwrap(), 1);

        assert_eq!(engine.get(b"extra"), Some(Bytes::from("1")));
        assert_eq!(engine.get(b"foo"), Some(Bytes::from("bar")));
    }

    #[test]
    fn test_corrupt_snapshot_reads_as_miss() {
        let file = write_snapshot(&[opcode::RESIZE_DB, 3, 0, 0x00, 40]);
        let engine = StorageEngine::with_snapshot(SnapshotReader::new(file.path()));

        assert_eq!(engine.get(b"anything"), None);
        assert!(engine.keys("*").is_empty());
    }

    #[test]
    fn test_missing_snapshot_reads_as_miss() {
        let engine =
            StorageEngine::with_snapshot(SnapshotReader::new("/nonexistent/emberkv/dump.rdb"));
        assert_eq!(engine.get(b"k"), None);
        assert!(engine.keys("*").is_empty());
    }

    #[test]
    fn test_keys_merges_live_and_snapshot() {
        let mut buf = vec![opcode::RESIZE_DB, 3, 2];
        push_record(&mut buf, "snap-a", "1");
        push_record_ms(&mut buf, "snap-b", "2", FUTURE_MS);
        push_record_ms(&mut buf, "snap-old", "3", PAST_MS);
        let file = write_snapshot(&buf);
        let engine = StorageEngine::with_snapshot(SnapshotReader::new(file.path()));

        engine.set(Bytes::from("live"), Bytes::from("x"));
        engine.set(Bytes::from("snap-a"), Bytes::from("overwritten"));

        let mut keys = engine.keys("*");
        keys.sort();
        assert_eq!(
            keys,
            vec![
                Bytes::from("live"),
                Bytes::from("snap-a"),
                Bytes::from("snap-b"),
            ]
        );

        assert_eq!(engine.keys("snap-*").len(), 2);
    }

    #[test]
    fn test_load_snapshot_skips_expired_records() {
        let mut buf = vec![opcode::RESIZE_DB, 3, 2];
        push_record(&mut buf, "plain", "1");
        push_record_ms(&mut buf, "later", "2", FUTURE_MS);
        push_record_ms(&mut buf, "gone", "3", PAST_MS);
        let file = write_snapshot(&buf);
        let reader = SnapshotReader::new(file.path());

        let engine = StorageEngine::new();
        assert_eq!(engine.load_snapshot(&reader).unwrap(), 2);
        assert_eq!(engine.len(), 2);
        assert_eq!(engine.read(b"later").unwrap().expires_at, Some(FUTURE_MS));
        assert_eq!(engine.get(b"gone"), None);
    }

    #[test]
    fn test_concurrent_access() {
        let engine = Arc::new(StorageEngine::new());
        let mut handles = vec![];

        for i in 0..10 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    engine.set(Bytes::from(key.clone()), Bytes::from("value"));
                    assert_eq!(engine.get(key.as_bytes()), Some(Bytes::from("value")));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.len(), 1000);
    }

    #[test]
    fn test_concurrent_writers_and_readers_same_key() {
        let engine = Arc::new(StorageEngine::new());
        engine.set(Bytes::from("shared"), Bytes::from("w0-0"));
        let mut handles = vec![];

        for i in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for j in 0..500 {
                    if i % 2 == 0 {
                        let value = format!("w{}-{}", i, j);
                        if j % 3 == 0 {
                            engine.set_with_ttl(
                                Bytes::from("shared"),
                                Bytes::from(value),
                                Duration::from_secs(60),
                            );
                        } else {
                            engine.set(Bytes::from("shared"), Bytes::from(value));
                        }
                    } else {
                        let value = engine.get(b"shared").unwrap();
                        assert!(value.starts_with(b"w"));
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.len(), 1);
        assert!(engine.get(b"shared").is_some());
    }

    #[test]
    fn test_glob_pattern() {
        let pattern = GlobPattern::new("h*llo");
        assert!(pattern.matches(b"hello"));
        assert!(pattern.matches(b"hllo"));
        assert!(pattern.matches(b"heeeello"));
        assert!(!pattern.matches(b"world"));

        let pattern = GlobPattern::new("h?llo");
        assert!(pattern.matches(b"hallo"));
        assert!(!pattern.matches(b"hllo"));
        assert!(!pattern.matches(b"heello"));

        let pattern = GlobPattern::new("*");
        assert!(pattern.matches(b""));
        assert!(pattern.matches(b"anything"));

        let pattern = GlobPattern::new("h[ae]llo");
        assert!(pattern.matches(b"hello"));
        assert!(pattern.matches(b"hallo"));
        assert!(!pattern.matches(b"hillo"));

        let pattern = GlobPattern::new("h[^e]llo");
        assert!(pattern.matches(b"hallo"));
        assert!(!pattern.matches(b"hello"));

        let pattern = GlobPattern::new("key[0-9]");
        assert!(pattern.matches(b"key7"));
        assert!(!pattern.matches(b"keyx"));

        let pattern = GlobPattern::new("a\\*b");
        assert!(pattern.matches(b"a*b"));
        assert!(!pattern.matches(b"axb"));

        let pattern = GlobPattern::new("user:*:name");
        assert!(pattern.matches(b"user:42:name"));
        assert!(pattern.matches(b"user:a:b:name"));
        assert!(!pattern.matches(b"user:42:names"));

        let pattern = GlobPattern::new("h[ab");
        assert!(!pattern.matches(b"ha"));
    }

    #[test]
    fn test_glob_many_stars_on_long_key() {
        let pattern = GlobPattern::new("*a*a*a*a*a*a*a*a*a*a*b");
        let key = vec![b'a'; 20_000];

        let started = std::time::Instant::now();
        assert!(!pattern.matches(&key));
        assert!(started.elapsed() < Duration::from_secs(1));

        let mut key = key;
        key.push(b'b');
        assert!(pattern.matches(&key));
    }
}
