use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};

/// Cache key: the global credentials or one named realm.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RealmKey {
    Global,
    Realm(String),
}

impl From<Option<&str>> for RealmKey {
    fn from(realm: Option<&str>) -> Self {
        match realm {
            Some(r) => Self::Realm(r.to_string()),
            None => Self::Global,
        }
    }
}

impl fmt::Display for RealmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("<global>"),
            Self::Realm(r) => f.write_str(r),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct TokenCacheEntry {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenCacheEntry {
    /// Usable while `now < expires_at - refresh_buffer`.
    pub fn is_fresh(&self, now: DateTime<Utc>, refresh_buffer: TimeDelta) -> bool {
        self.expires_at
            .checked_sub_signed(refresh_buffer)
            .is_some_and(|deadline| now < deadline)
    }
}

impl fmt::Debug for TokenCacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCacheEntry")
            .field("access_token", &"***")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

pub(crate) type Slot = Arc<Mutex<Option<TokenCacheEntry>>>;

/// Realms kept before idle slots start being evicted.
pub const DEFAULT_REALM_CAPACITY: usize = 256;

/// Realm-keyed token store. Each realm gets its own slot and lock; the outer
/// map lock is only held long enough to find or create a slot.
///
/// Creating a slot first drops idle slots holding no token or an expired one,
/// then, if still at capacity, the idle slots closest to expiry. Slots held by
/// an in-flight caller are never dropped.
pub struct TokenCache {
    slots: Mutex<HashMap<RealmKey, Slot>>,
    capacity: usize,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_REALM_CAPACITY)
    }
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn slot(&self, key: &RealmKey, now: DateTime<Utc>) -> Slot {
        let mut slots = lock(&self.slots);
        if let Some(slot) = slots.get(key) {
            return slot.clone();
        }

        evict(&mut slots, now, self.capacity - 1);
        let slot = Slot::default();
        slots.insert(key.clone(), slot.clone());
        slot
    }

    /// Number of realm slots, with or without a token.
    pub fn slot_count(&self) -> usize {
        lock(&self.slots).len()
    }

    /// Snapshot of one realm's entry.
    pub fn get(&self, key: &RealmKey) -> Option<TokenCacheEntry> {
        let slot = lock(&self.slots).get(key).cloned()?;
        let entry = lock(&slot).clone();
        entry
    }

    /// Number of realms currently holding a token.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = lock(&self.slots).values().cloned().collect();
        slots.iter().filter(|slot| lock(slot).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Only idle slots are touched: with the map locked and a strong count of one,
/// no caller can hold or acquire the slot's lock.
fn evict(slots: &mut HashMap<RealmKey, Slot>, now: DateTime<Utc>, keep: usize) {
    slots.retain(|_, slot| !is_idle(slot) || expiry(slot).is_some_and(|at| at > now));
    if slots.len() <= keep {
        return;
    }

    let mut idle: Vec<(DateTime<Utc>, RealmKey)> = slots
        .iter()
        .filter(|(_, slot)| is_idle(slot))
        .filter_map(|(key, slot)| expiry(slot).map(|at| (at, key.clone())))
        .collect();
    idle.sort_by_key(|(at, _)| *at);

    let excess = slots.len() - keep;
    for (_, key) in idle.into_iter().take(excess) {
        slots.remove(&key);
    }
}

fn is_idle(slot: &Slot) -> bool {
    Arc::strong_count(slot) == 1
}

fn expiry(slot: &Slot) -> Option<DateTime<Utc>> {
    lock(slot).as_ref().map(|entry| entry.expires_at)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
