//! Keyspace and expiry index.
//!
//! Both tables are backed by the incrementally-rehashing dictionary and share the process hash
//! key. Every key present in the expiry index is also present in the keyspace; deletion and
//! overwrite paths maintain that containment.

use crate::StoreContext;
use crate::dict::Dict;
use crate::siphash::SipKey;
use crate::value::Value;

/// Expiry-index samples taken per maintenance tick.
pub const MAX_EXPIRE_LOOKUPS_PER_CYCLE: usize = 20;

/// Rehash budget in milliseconds granted to each dictionary per maintenance tick.
pub const REHASH_BUDGET_MS_PER_CYCLE: u64 = 1;

/// One logical database: typed keyspace plus key-to-deadline expiry index.
pub struct Database {
    keys: Dict<Value>,
    expires: Dict<u64>,
    sip_key: SipKey,
}

impl Database {
    /// Creates an empty database hashing with the context key.
    #[must_use]
    pub fn new(ctx: &StoreContext) -> Self {
        Self {
            keys: Dict::new(ctx.sip_key),
            expires: Dict::new(ctx.sip_key),
            sip_key: ctx.sip_key,
        }
    }

    /// Hash key shared with every nested dictionary.
    #[must_use]
    pub fn sip_key(&self) -> SipKey {
        self.sip_key
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true when the keyspace holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Looks up `key`, evicting it first when its deadline has passed.
    pub fn lookup(&mut self, key: &[u8], now: u64) -> Option<&Value> {
        if self.purge_if_expired(key, now) {
            return None;
        }
        self.keys.find(key)
    }

    /// Mutable variant of [`Database::lookup`].
    pub fn lookup_mut(&mut self, key: &[u8], now: u64) -> Option<&mut Value> {
        if self.purge_if_expired(key, now) {
            return None;
        }
        self.keys.find_mut(key)
    }

    /// Read-only probe that skips lazy expiry and never advances rehashing.
    ///
    /// Callers that need several values borrowed at once (set algebra) purge expired keys with
    /// [`Database::contains`] first, then peek.
    #[must_use]
    pub fn peek(&self, key: &[u8]) -> Option<&Value> {
        self.keys.peek(key)
    }

    /// Returns true when `key` is live at `now`.
    pub fn contains(&mut self, key: &[u8], now: u64) -> bool {
        self.lookup(key, now).is_some()
    }

    /// Inserts or overwrites `key`, leaving any expiry deadline untouched.
    pub fn upsert(&mut self, key: &[u8], value: Value) -> Option<Value> {
        self.keys.insert(key.to_vec(), value)
    }

    /// Removes `key` and its expiry deadline.
    pub fn remove(&mut self, key: &[u8]) -> Option<Value> {
        let removed = self.keys.remove(key).map(|(_, value)| value);
        if removed.is_some() {
            let _ = self.expires.remove(key);
        }
        removed
    }

    /// Absolute unix-millisecond deadline of `key`, if one is set.
    #[must_use]
    pub fn expire_at(&self, key: &[u8]) -> Option<u64> {
        self.expires.peek(key).copied()
    }

    /// Sets the deadline of an existing key; returns false when the key is absent.
    pub fn set_expire(&mut self, key: &[u8], deadline_ms: u64) -> bool {
        if !self.keys.contains(key) {
            return false;
        }
        let _ = self.expires.insert(key.to_vec(), deadline_ms);
        true
    }

    /// Drops the deadline of `key`; returns true when one was present.
    pub fn clear_expire(&mut self, key: &[u8]) -> bool {
        self.expires.remove(key).is_some()
    }

    /// Remaining lifetime of `key` in milliseconds, `None` when no deadline is set.
    #[must_use]
    pub fn ttl_millis(&self, key: &[u8], now: u64) -> Option<u64> {
        self.expire_at(key).map(|deadline| deadline.saturating_sub(now))
    }

    fn purge_if_expired(&mut self, key: &[u8], now: u64) -> bool {
        let expired = self.expire_at(key).is_some_and(|deadline| deadline <= now);
        if expired {
            let _ = self.keys.remove(key);
            let _ = self.expires.remove(key);
        }
        expired
    }

    /// Samples the expiry index and evicts expired keys; returns the eviction count.
    ///
    /// Sampling is random, so repeated ticks make progress across the whole index without a
    /// cursor. Per-tick work is bounded by [`MAX_EXPIRE_LOOKUPS_PER_CYCLE`].
    pub fn expire_cycle(&mut self, now: u64) -> usize {
        let mut evicted = 0_usize;
        for _ in 0..MAX_EXPIRE_LOOKUPS_PER_CYCLE {
            let Some((key, deadline)) = self
                .expires
                .random_entry()
                .map(|(key, deadline)| (key.to_vec(), *deadline))
            else {
                break;
            };
            if deadline <= now {
                let _ = self.keys.remove(&key);
                let _ = self.expires.remove(&key);
                evicted += 1;
            }
        }
        evicted
    }

    /// Grants both dictionaries a bounded slice of rehash work.
    pub fn rehash_step(&mut self, budget_ms: u64) -> bool {
        let mut remaining = false;
        if self.keys.is_rehashing() {
            remaining |= self.keys.rehash_milliseconds(budget_ms);
        }
        if self.expires.is_rehashing() {
            remaining |= self.expires.rehash_milliseconds(budget_ms);
        }
        remaining
    }

    /// Returns true while either dictionary is migrating buckets.
    #[must_use]
    pub fn is_rehashing(&self) -> bool {
        self.keys.is_rehashing() || self.expires.is_rehashing()
    }
}

#[cfg(test)]
mod tests {
    use super::{Database, MAX_EXPIRE_LOOKUPS_PER_CYCLE};
    use crate::StoreContext;
    use crate::siphash::SipKey;
    use crate::value::Value;
    use googletest::prelude::*;
    use rstest::rstest;

    fn ctx() -> StoreContext {
        StoreContext {
            sip_key: SipKey::from_bytes(*b"0123456789abcdef"),
            max_list_size: 256,
        }
    }

    fn string_value(payload: &[u8]) -> Value {
        Value::Str(payload.to_vec())
    }

    #[rstest]
    fn lookup_evicts_keys_past_their_deadline() {
        let context = ctx();
        let mut db = Database::new(&context);
        let _ = db.upsert(b"session", string_value(b"token"));
        assert_that!(db.set_expire(b"session", 1_000), eq(true));

        assert_that!(db.lookup(b"session", 999).is_some(), eq(true));
        assert_that!(db.lookup(b"session", 1_000).is_some(), eq(false));
        assert_that!(db.len(), eq(0));
        assert_that!(db.expire_at(b"session"), eq(None));
    }

    #[rstest]
    fn expire_requires_a_live_key() {
        let context = ctx();
        let mut db = Database::new(&context);
        assert_that!(db.set_expire(b"ghost", 5_000), eq(false));
        assert_that!(db.expire_at(b"ghost"), eq(None));
    }

    #[rstest]
    fn remove_clears_the_expiry_index_entry() {
        let context = ctx();
        let mut db = Database::new(&context);
        let _ = db.upsert(b"k", string_value(b"v"));
        let _ = db.set_expire(b"k", u64::MAX);
        assert_that!(db.remove(b"k").is_some(), eq(true));
        assert_that!(db.expire_at(b"k"), eq(None));
    }

    #[rstest]
    fn expire_cycle_sweeps_expired_samples() {
        let context = ctx();
        let mut db = Database::new(&context);
        for index in 0..8 {
            let key = format!("stale:{index}").into_bytes();
            let _ = db.upsert(&key, string_value(b"x"));
            let _ = db.set_expire(&key, 100);
        }
        let _ = db.upsert(b"fresh", string_value(b"y"));
        let _ = db.set_expire(b"fresh", u64::MAX);

        // Random sampling with a per-tick bound: a handful of ticks drains eight stale keys.
        let mut swept = 0_usize;
        for _ in 0..64 {
            swept += db.expire_cycle(200);
            if swept == 8 {
                break;
            }
        }
        assert_that!(swept, eq(8));
        assert_that!(db.len(), eq(1));
        assert_that!(db.contains(b"fresh", 200), eq(true));
    }

    #[rstest]
    fn expire_cycle_work_is_bounded_per_tick() {
        let context = ctx();
        let mut db = Database::new(&context);
        for index in 0..1000 {
            let key = format!("stale:{index}").into_bytes();
            let _ = db.upsert(&key, string_value(b"x"));
            let _ = db.set_expire(&key, 1);
        }
        let evicted = db.expire_cycle(10);
        assert_that!(evicted <= MAX_EXPIRE_LOOKUPS_PER_CYCLE, eq(true));
        assert_that!(evicted > 0, eq(true));
    }

    #[rstest]
    fn rehash_step_drains_pending_migrations() {
        let context = ctx();
        let mut db = Database::new(&context);
        for index in 0..512 {
            let key = format!("key:{index}").into_bytes();
            let _ = db.upsert(&key, string_value(b"v"));
        }
        while db.rehash_step(1) {}
        assert_that!(db.is_rehashing(), eq(false));
        assert_that!(db.len(), eq(512));
    }
}
