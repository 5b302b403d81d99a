//! Tool result caching.
//!
//! Avoids re-executing identical tool calls. Results are keyed by the tool
//! name plus a canonical serialization of the arguments, so two calls with
//! the same argument set hit the same entry no matter how the arguments were
//! ordered. The cache is bounded: when full, the entry inserted earliest is
//! evicted (FIFO). Reads never change eviction order. An optional TTL makes
//! stale entries invisible on read; they are deleted lazily at that moment.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

/// Default capacity used by [`ResultCache::default`].
pub const DEFAULT_CACHE_SIZE: usize = 100;

// ── Clock ──────────────────────────────────────────────────────────

/// Source of "now" for TTL checks.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Wall clock, measured from the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        let _ = self
            .millis
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |now| {
                Some(now.saturating_add(millis))
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::Relaxed))
    }
}

// ── Keys ───────────────────────────────────────────────────────────

/// Build the cache key for a tool invocation: `"{tool_name}:{canonical_args}"`.
///
/// Object keys are sorted at every nesting level before serialization, so the
/// key is invariant under reordering of the arguments.
pub fn cache_key(tool_name: &str, args: &Value) -> String {
    format!("{tool_name}:{}", canonicalize(args))
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            let sorted: Map<String, Value> = fields
                .into_iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

// ── Cache ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    result: V,
    inserted_at: Duration,
}

/// Bounded, optionally expiring cache of tool results.
///
/// Entry order in the backing map is insertion order; overwriting an existing
/// key refreshes its value and timestamp but keeps its place in line.
pub struct ResultCache<V = Value> {
    entries: IndexMap<String, CacheEntry<V>>,
    /// Maximum number of live entries.
    max_size: usize,
    /// Entries older than this are treated as absent.
    ttl: Option<Duration>,
    clock: Box<dyn Clock>,
    hits: u64,
    misses: u64,
}

impl<V> ResultCache<V> {
    /// Create a cache holding at most `max_size` entries, with an optional TTL.
    pub fn new(max_size: usize, ttl: Option<Duration>) -> Self {
        Self::with_clock(max_size, ttl, SystemClock)
    }

    /// Create a cache that reads time from `clock`.
    pub fn with_clock(max_size: usize, ttl: Option<Duration>, clock: impl Clock + 'static) -> Self {
        Self {
            entries: IndexMap::new(),
            max_size,
            ttl,
            clock: Box::new(clock),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a cached result. Expired entries are removed and reported absent.
    pub fn get(&mut self, tool_name: &str, args: &Value) -> Option<&V> {
        let key = cache_key(tool_name, args);
        let expired = match self.entries.get(&key) {
            Some(entry) => self.is_expired(entry),
            None => {
                self.misses += 1;
                return None;
            }
        };

        if expired {
            self.entries.shift_remove(&key);
            self.misses += 1;
            debug!("Tool cache: expired entry dropped: {key}");
            return None;
        }

        self.hits += 1;
        self.entries.get(&key).map(|entry| &entry.result)
    }

    /// Store a result. When the cache is full and the key is new, the
    /// earliest-inserted entry is evicted first.
    pub fn set(&mut self, tool_name: &str, args: &Value, result: V) {
        let key = cache_key(tool_name, args);
        if self.max_size == 0 {
            debug!("Tool cache: capacity is zero, not storing {key}");
            return;
        }

        if !self.entries.contains_key(&key)
            && self.entries.len() >= self.max_size
            && let Some((evicted, _)) = self.entries.shift_remove_index(0)
        {
            debug!("Tool cache: evicted {evicted}");
        }

        let inserted_at = self.clock.now();
        self.entries.insert(
            key,
            CacheEntry {
                result,
                inserted_at,
            },
        );
    }

    /// Remove a single entry. No-op if absent.
    pub fn remove(&mut self, tool_name: &str, args: &Value) {
        self.entries.shift_remove(&cache_key(tool_name, args));
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove all expired entries now instead of waiting for reads.
    /// Returns the number removed.
    pub fn purge_expired(&mut self) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_sub(entry.inserted_at) <= ttl);
        before - self.entries.len()
    }

    /// Whether a live entry exists for this key. Does not touch hit counters
    /// and does not delete expired entries.
    pub fn contains(&self, tool_name: &str, args: &Value) -> bool {
        self.entries
            .get(&cache_key(tool_name, args))
            .is_some_and(|entry| !self.is_expired(entry))
    }

    /// Number of stored entries (expired ones included until they are read).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Cache hit count.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Cache miss count.
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Hit rate as a fraction (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    fn is_expired(&self, entry: &CacheEntry<V>) -> bool {
        match self.ttl {
            Some(ttl) => self.clock.now().saturating_sub(entry.inserted_at) > ttl,
            None => false,
        }
    }
}

impl<V> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE, None)
    }
}

impl<V> fmt::Debug for ResultCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("len", &self.entries.len())
            .field("max_size", &self.max_size)
            .field("ttl", &self.ttl)
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}
