use crate::enums::{RecordClass, RecordType};
use crate::message::{Question, ResourceRecord};
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::trace;

/// Entry count that triggers eviction on insert.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;
/// How long an NXDOMAIN is remembered.
pub const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(300);

/// Names are case-insensitive, so keys carry the lowercased form.
/// Negative entries all key under (name, ANY, IN) with the marker set.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    name: Vec<u8>,
    qtype: RecordType,
    qclass: RecordClass,
    negative: bool,
}

impl CacheKey {
    fn positive(question: &Question) -> Self {
        CacheKey {
            name: question.normalized_name(),
            qtype: question.qtype,
            qclass: question.qclass,
            negative: false,
        }
    }

    fn negative(name: &[u8]) -> Self {
        CacheKey {
            name: name.to_ascii_lowercase(),
            qtype: RecordType::ANY,
            qclass: RecordClass::Internet,
            negative: true,
        }
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    /// Empty for negative entries.
    records: Vec<ResourceRecord>,
    created: Instant,
    expires: Instant,
}

/// In-memory answer cache: positive entries decay with their smallest
/// record TTL, negative entries with the configured negative TTL, and
/// the whole thing stays under `max_entries` by shedding the
/// soonest-to-expire tenth when an insert finds it full.
///
/// Safe to share across transport tasks; only the eviction sweep walks
/// more than one entry at a time.
pub struct RecordCache {
    entries: DashMap<CacheKey, CacheEntry>,
    max_entries: usize,
    negative_ttl: Duration,
}

impl Default for RecordCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_NEGATIVE_TTL)
    }
}

impl RecordCache {
    pub fn new(max_entries: usize, negative_ttl: Duration) -> Self {
        RecordCache {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            negative_ttl,
        }
    }

    /// Live records for the question, TTLs decayed by the time the
    /// entry has spent in the cache but never below one second. An
    /// expired entry is removed on the way through.
    pub fn lookup(&self, question: &Question) -> Option<Vec<ResourceRecord>> {
        self.lookup_at(question, Instant::now())
    }

    pub(crate) fn lookup_at(
        &self,
        question: &Question,
        now: Instant,
    ) -> Option<Vec<ResourceRecord>> {
        let key = CacheKey::positive(question);
        let result = {
            let entry = self.entries.get(&key)?;
            if entry.expires <= now {
                None
            } else {
                let elapsed = now.duration_since(entry.created).as_secs() as i64;
                Some(
                    entry
                        .records
                        .iter()
                        .map(|record| {
                            record.with_ttl((record.ttl as i64 - elapsed).max(1) as i32)
                        })
                        .collect(),
                )
            }
        };
        if result.is_none() {
            self.entries.remove(&key);
            trace!("cache entry for {question} expired");
        }
        result
    }

    pub fn is_negatively_cached(&self, name: &[u8]) -> bool {
        self.is_negatively_cached_at(name, Instant::now())
    }

    pub(crate) fn is_negatively_cached_at(&self, name: &[u8], now: Instant) -> bool {
        let key = CacheKey::negative(name);
        let live = match self.entries.get(&key) {
            Some(entry) => entry.expires > now,
            None => return false,
        };
        if !live {
            self.entries.remove(&key);
        }
        live
    }

    /// Stores an answer under the question's key. The entry lives for
    /// the smallest TTL across the records; if that is zero or the
    /// records say not to cache (negative TTL), nothing is stored.
    pub fn insert(&self, question: &Question, records: Vec<ResourceRecord>) {
        self.insert_at(question, records, Instant::now())
    }

    pub(crate) fn insert_at(
        &self,
        question: &Question,
        records: Vec<ResourceRecord>,
        now: Instant,
    ) {
        let min_ttl = match records.iter().map(|record| record.ttl.max(0)).min() {
            Some(value) => value,
            None => return,
        };
        if min_ttl <= 0 {
            return;
        }
        self.make_room(now);
        self.entries.insert(
            CacheKey::positive(question),
            CacheEntry {
                records,
                created: now,
                expires: now + Duration::from_secs(min_ttl as u64),
            },
        );
    }

    /// Remembers that a name does not exist.
    pub fn insert_negative(&self, name: &[u8]) {
        self.insert_negative_at(name, Instant::now())
    }

    pub(crate) fn insert_negative_at(&self, name: &[u8], now: Instant) {
        self.make_room(now);
        self.entries.insert(
            CacheKey::negative(name),
            CacheEntry {
                records: vec![],
                created: now,
                expires: now + self.negative_ttl,
            },
        );
    }

    /// Drops every entry past its expiry; returns how many went.
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    pub(crate) fn evict_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires > now);
        before.saturating_sub(self.entries.len())
    }

    /// Called before every insert: once the map is full, expired
    /// entries go first, then the soonest-to-expire tenth of a sorted
    /// snapshot.
    fn make_room(&self, now: Instant) {
        if self.entries.len() < self.max_entries {
            return;
        }
        let expired = self.evict_expired_at(now);
        if expired > 0 {
            trace!("evicted {expired} expired entries ahead of insert");
        }
        if self.entries.len() < self.max_entries {
            return;
        }

        let mut snapshot: Vec<(CacheKey, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().expires))
            .collect();
        snapshot.sort_by_key(|(_, expires)| *expires);
        let cut = (self.max_entries / 10).max(1);
        for (key, _) in snapshot.into_iter().take(cut) {
            self.entries.remove(&key);
        }
        trace!("evicted {cut} soonest-to-expire entries ahead of insert");
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
