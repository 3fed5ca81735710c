//! Chained hash table with incremental rehashing.
//!
//! The table keeps two bucket arrays. `tables[0]` serves all traffic while idle; during a grow
//! or compaction, `tables[1]` holds the target array and every mutating call moves a bounded
//! number of buckets across, so no single request pays for a full-table migration. Lookups probe
//! both arrays until the migration finishes.

use std::time::{Duration, Instant};

use rand::Rng;

use crate::siphash::{SipKey, siphash24};

/// Smallest bucket-array capacity ever allocated.
pub const INITIAL_SIZE: usize = 4;

/// Hard cap on bucket-array capacity. `expand` refuses any larger table and leaves the
/// existing chains to absorb further inserts.
pub const MAX_SIZE: u64 = 1 << 63;

/// Bucket migrations attempted per bounded-rehash call from the cron driver.
const REHASH_BATCH_BUCKETS: usize = 100;

/// Empty buckets scanned per requested migration step before `rehash` yields.
const EMPTY_VISITS_PER_STEP: usize = 10;

struct Entry<V> {
    key: Vec<u8>,
    value: V,
    next: Link<V>,
}

type Link<V> = Option<Box<Entry<V>>>;

struct Table<V> {
    buckets: Vec<Link<V>>,
    used: usize,
}

impl<V> Table<V> {
    fn empty() -> Self {
        Self {
            buckets: Vec::new(),
            used: 0,
        }
    }

    fn with_capacity(capacity: usize) -> Self {
        let mut buckets = Vec::with_capacity(capacity);
        buckets.resize_with(capacity, || None);
        Self { buckets, used: 0 }
    }

    fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn sizemask(&self) -> u64 {
        self.buckets.len() as u64 - 1
    }
}

/// Incrementally-rehashing chained hash table keyed by byte strings.
pub struct Dict<V> {
    tables: [Table<V>; 2],
    /// Next `tables[0]` bucket to migrate; `None` while idle.
    rehash_index: Option<usize>,
    sip_key: SipKey,
}

impl<V> Dict<V> {
    /// Creates an empty dictionary hashing with `sip_key`.
    #[must_use]
    pub fn new(sip_key: SipKey) -> Self {
        Self {
            tables: [Table::empty(), Table::empty()],
            rehash_index: None,
            sip_key,
        }
    }

    /// Number of live entries across both tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables[0].used + self.tables[1].used
    }

    /// Returns true when the dictionary holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bucket-array capacity of the primary table.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tables[0].capacity()
    }

    /// Returns true while a bucket migration is in progress.
    #[must_use]
    pub fn is_rehashing(&self) -> bool {
        self.rehash_index.is_some()
    }

    fn hash(&self, key: &[u8]) -> u64 {
        siphash24(self.sip_key, key)
    }

    /// Inserts or overwrites `key`, returning the previous value on overwrite.
    pub fn insert(&mut self, key: Vec<u8>, value: V) -> Option<V> {
        if self.is_rehashing() {
            self.rehash(1);
        }
        self.expand_if_needed();

        let hash = self.hash(&key);
        if let Some(existing) = self.find_entry_mut(hash, &key) {
            return Some(std::mem::replace(&mut existing.value, value));
        }

        let target = usize::from(self.is_rehashing());
        let table = &mut self.tables[target];
        let index = (hash & table.sizemask()) as usize;
        let entry = Box::new(Entry {
            key,
            value,
            next: table.buckets[index].take(),
        });
        table.buckets[index] = Some(entry);
        table.used += 1;
        None
    }

    /// Looks up `key`, advancing the migration by one step first.
    pub fn find(&mut self, key: &[u8]) -> Option<&V> {
        if self.is_empty() {
            return None;
        }
        if self.is_rehashing() {
            self.rehash(1);
        }
        let hash = self.hash(key);
        self.find_entry(hash, key).map(|entry| &entry.value)
    }

    /// Mutable variant of [`Dict::find`].
    pub fn find_mut(&mut self, key: &[u8]) -> Option<&mut V> {
        if self.is_empty() {
            return None;
        }
        if self.is_rehashing() {
            self.rehash(1);
        }
        let hash = self.hash(key);
        self.find_entry_mut(hash, key).map(|entry| &mut entry.value)
    }

    /// Read-only probe that never advances the migration.
    ///
    /// Used where a caller iterates one dictionary while probing others (set algebra).
    #[must_use]
    pub fn peek(&self, key: &[u8]) -> Option<&V> {
        if self.is_empty() {
            return None;
        }
        let hash = self.hash(key);
        for table in &self.tables {
            if table.capacity() == 0 {
                break;
            }
            let index = (hash & table.sizemask()) as usize;
            let mut cursor = table.buckets[index].as_deref();
            while let Some(entry) = cursor {
                if entry.key == key {
                    return Some(&entry.value);
                }
                cursor = entry.next.as_deref();
            }
            if !self.is_rehashing() {
                break;
            }
        }
        None
    }

    /// Returns true when `key` is present.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.peek(key).is_some()
    }

    /// Removes `key`, returning the unlinked pair when it was present.
    pub fn remove(&mut self, key: &[u8]) -> Option<(Vec<u8>, V)> {
        if self.is_empty() {
            return None;
        }
        if self.is_rehashing() {
            self.rehash(1);
        }
        let hash = self.hash(key);
        let rehashing = self.is_rehashing();
        for table_index in 0..2 {
            let table = &mut self.tables[table_index];
            if table.capacity() == 0 {
                break;
            }
            let index = (hash & table.sizemask()) as usize;
            if let Some(removed) = unlink_from_bucket(&mut table.buckets[index], key) {
                table.used -= 1;
                return Some((removed.key, removed.value));
            }
            if !rehashing {
                break;
            }
        }
        None
    }

    fn find_entry(&self, hash: u64, key: &[u8]) -> Option<&Entry<V>> {
        for table in &self.tables {
            if table.capacity() == 0 {
                break;
            }
            let index = (hash & table.sizemask()) as usize;
            let mut cursor = table.buckets[index].as_deref();
            while let Some(entry) = cursor {
                if entry.key == key {
                    return Some(entry);
                }
                cursor = entry.next.as_deref();
            }
            if !self.is_rehashing() {
                break;
            }
        }
        None
    }

    fn find_entry_mut(&mut self, hash: u64, key: &[u8]) -> Option<&mut Entry<V>> {
        let rehashing = self.is_rehashing();
        for table in &mut self.tables {
            if table.capacity() == 0 {
                break;
            }
            let index = (hash & table.sizemask()) as usize;
            let mut cursor = table.buckets[index].as_deref_mut();
            while let Some(entry) = cursor {
                if entry.key == key {
                    return Some(entry);
                }
                cursor = entry.next.as_deref_mut();
            }
            if !rehashing {
                break;
            }
        }
        None
    }

    /// Visits every live entry exactly once, in unspecified order.
    pub fn iterate(&self, mut visitor: impl FnMut(&[u8], &V)) {
        for (key, value) in self.iter() {
            visitor(key, value);
        }
    }

    /// Iterator over every live entry across both tables.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            dict: self,
            table: 0,
            bucket: 0,
            entry: None,
        }
    }

    /// Returns an approximately uniform random live entry.
    #[must_use]
    pub fn random_entry(&self) -> Option<(&[u8], &V)> {
        if self.is_empty() {
            return None;
        }
        let mut rng = rand::thread_rng();

        // Pick non-empty buckets until one hits; during a migration the already-moved prefix of
        // the primary table is excluded so the draw stays over live slots.
        let entry = loop {
            let bucket = if self.is_rehashing() {
                let moved = self.rehash_index.unwrap_or(0);
                let total = self.tables[0].capacity() + self.tables[1].capacity();
                let slot = rng.gen_range(moved..total);
                if slot >= self.tables[0].capacity() {
                    &self.tables[1].buckets[slot - self.tables[0].capacity()]
                } else {
                    &self.tables[0].buckets[slot]
                }
            } else {
                let slot = rng.gen_range(0..self.tables[0].capacity());
                &self.tables[0].buckets[slot]
            };
            if let Some(entry) = bucket.as_deref() {
                break entry;
            }
        };

        let mut chain_len = 1_usize;
        let mut cursor = entry.next.as_deref();
        while let Some(next) = cursor {
            chain_len += 1;
            cursor = next.next.as_deref();
        }
        let mut chosen = entry;
        for _ in 0..rng.gen_range(0..chain_len) {
            chosen = chosen.next.as_deref()?;
        }
        Some((chosen.key.as_slice(), &chosen.value))
    }

    /// Migrates up to `steps` non-empty buckets into the target table.
    ///
    /// Empty-bucket scanning is bounded to `steps * 10`; returns true while migration work
    /// remains after this call.
    pub fn rehash(&mut self, steps: usize) -> bool {
        let Some(mut index) = self.rehash_index else {
            return false;
        };
        let mut empty_visits = steps.saturating_mul(EMPTY_VISITS_PER_STEP);

        for _ in 0..steps {
            if self.tables[0].used == 0 {
                break;
            }
            while self.tables[0].buckets[index].is_none() {
                index += 1;
                empty_visits -= 1;
                if empty_visits == 0 {
                    self.rehash_index = Some(index);
                    return true;
                }
            }

            let mut chain = self.tables[0].buckets[index].take();
            while let Some(mut entry) = chain {
                chain = entry.next.take();
                let hash = siphash24(self.sip_key, &entry.key);
                let target = &mut self.tables[1];
                let slot = (hash & target.sizemask()) as usize;
                entry.next = target.buckets[slot].take();
                target.buckets[slot] = Some(entry);
                self.tables[0].used -= 1;
                self.tables[1].used += 1;
            }
            index += 1;
        }

        if self.tables[0].used == 0 {
            self.tables[0] = std::mem::replace(&mut self.tables[1], Table::empty());
            self.rehash_index = None;
            return false;
        }
        self.rehash_index = Some(index);
        true
    }

    /// Runs batched rehash steps until migration completes or `budget_ms` elapses.
    ///
    /// Returns true while migration work remains.
    pub fn rehash_milliseconds(&mut self, budget_ms: u64) -> bool {
        let deadline = Instant::now() + Duration::from_millis(budget_ms);
        while self.rehash(REHASH_BATCH_BUCKETS) {
            if Instant::now() >= deadline {
                return true;
            }
        }
        false
    }

    /// Operator-triggered compaction: shrinks the bucket array toward the live entry count.
    pub fn resize(&mut self) {
        if self.is_rehashing() {
            return;
        }
        let minimal = self.tables[0].used.max(INITIAL_SIZE);
        self.expand(minimal);
    }

    fn expand_if_needed(&mut self) {
        if self.is_rehashing() {
            return;
        }
        if self.tables[0].capacity() == 0 {
            self.expand(INITIAL_SIZE);
        } else if self.tables[0].used >= self.tables[0].capacity() {
            self.expand(self.tables[0].used.saturating_mul(2));
        }
    }

    fn expand(&mut self, size: usize) {
        if self.is_rehashing() || self.tables[0].used > size {
            return;
        }
        let Some(real_size) = next_table_size(size) else {
            return;
        };
        if real_size == self.tables[0].capacity() {
            return;
        }

        let table = Table::with_capacity(real_size);
        if self.tables[0].capacity() == 0 {
            self.tables[0] = table;
        } else {
            self.tables[1] = table;
            self.rehash_index = Some(0);
        }
    }
}

/// Rounds `size` up to the table's power-of-two capacity, refusing anything past [`MAX_SIZE`].
fn next_table_size(size: usize) -> Option<usize> {
    let wanted = size.max(INITIAL_SIZE) as u64;
    if wanted > MAX_SIZE {
        return None;
    }
    let rounded = wanted.checked_next_power_of_two()?;
    if rounded > MAX_SIZE {
        return None;
    }
    usize::try_from(rounded).ok()
}

fn unlink_from_bucket<V>(bucket: &mut Link<V>, key: &[u8]) -> Option<Box<Entry<V>>> {
    let mut cursor = bucket;
    loop {
        if cursor.as_deref().is_some_and(|entry| entry.key == key) {
            let mut removed = cursor.take()?;
            *cursor = removed.next.take();
            return Some(removed);
        }
        match cursor {
            Some(entry) => cursor = &mut entry.next,
            None => return None,
        }
    }
}

/// Entry iterator; order is unspecified.
pub struct Iter<'a, V> {
    dict: &'a Dict<V>,
    table: usize,
    bucket: usize,
    entry: Option<&'a Entry<V>>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a [u8], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.entry {
                self.entry = entry.next.as_deref();
                return Some((entry.key.as_slice(), &entry.value));
            }
            let table = &self.dict.tables[self.table];
            if self.bucket >= table.capacity() {
                if self.table == 0 {
                    self.table = 1;
                    self.bucket = 0;
                    continue;
                }
                return None;
            }
            self.entry = table.buckets[self.bucket].as_deref();
            self.bucket += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Dict, INITIAL_SIZE};
    use crate::siphash::SipKey;
    use googletest::prelude::*;
    use rstest::rstest;

    fn test_dict() -> Dict<u64> {
        Dict::new(SipKey::from_bytes(*b"0123456789abcdef"))
    }

    fn key_for(index: usize) -> Vec<u8> {
        format!("key:{index}").into_bytes()
    }

    #[rstest]
    fn first_insert_allocates_initial_capacity() {
        let mut dict = test_dict();
        assert_that!(dict.capacity(), eq(0));
        assert_that!(dict.insert(b"a".to_vec(), 1), eq(None));
        assert_that!(dict.capacity(), eq(INITIAL_SIZE));
        assert_that!(dict.len(), eq(1));
    }

    #[rstest]
    fn insert_overwrite_returns_previous_value_and_keeps_len() {
        let mut dict = test_dict();
        assert_that!(dict.insert(b"a".to_vec(), 1), eq(None));
        assert_that!(dict.insert(b"a".to_vec(), 2), eq(Some(1)));
        assert_that!(dict.len(), eq(1));
        assert_that!(dict.find(b"a").copied(), eq(Some(2)));
    }

    #[rstest]
    fn remove_unlinks_mid_chain_entries() {
        let mut dict = test_dict();
        for index in 0..64 {
            let _ = dict.insert(key_for(index), index as u64);
        }
        for index in (0..64).step_by(2) {
            let removed = dict.remove(&key_for(index));
            assert_that!(removed.is_some(), eq(true));
        }
        assert_that!(dict.len(), eq(32));
        for index in 0..64 {
            assert_that!(dict.contains(&key_for(index)), eq(index % 2 == 1));
        }
    }

    #[rstest]
    fn grow_keeps_every_key_reachable_during_migration() {
        let mut dict = test_dict();
        for index in 0..5 {
            let _ = dict.insert(key_for(index), index as u64);
        }
        // Five entries in a four-slot table force a grow into incremental migration.
        assert_that!(dict.is_rehashing(), eq(true));
        for index in 0..5 {
            assert_that!(dict.find(&key_for(index)).copied(), eq(Some(index as u64)));
        }
        while dict.rehash(16) {}
        assert_that!(dict.is_rehashing(), eq(false));
        assert_that!(dict.len(), eq(5));
    }

    #[rstest]
    fn mixed_operations_stay_consistent_through_rehash() {
        let mut dict = test_dict();
        let mut live = std::collections::BTreeMap::new();

        for round in 0..1000_usize {
            let index = round % 257;
            match round % 3 {
                0 => {
                    let _ = dict.insert(key_for(index), round as u64);
                    let _ = live.insert(index, round as u64);
                }
                1 => {
                    let expected = live.get(&index).copied();
                    assert_that!(dict.find(&key_for(index)).copied(), eq(expected));
                }
                _ => {
                    let removed = dict.remove(&key_for(index)).map(|(_, value)| value);
                    assert_that!(removed, eq(live.remove(&index)));
                }
            }
            assert_that!(dict.len(), eq(live.len()));
        }

        for (index, value) in &live {
            assert_that!(dict.find(&key_for(*index)).copied(), eq(Some(*value)));
        }
    }

    #[rstest]
    fn iteration_visits_every_entry_exactly_once_mid_rehash() {
        let mut dict = test_dict();
        for index in 0..33 {
            let _ = dict.insert(key_for(index), index as u64);
        }
        let _ = dict.rehash(2);
        assert_that!(dict.is_rehashing(), eq(true));

        let mut seen = std::collections::BTreeSet::new();
        dict.iterate(|key, _| {
            assert_that!(seen.insert(key.to_vec()), eq(true));
        });
        assert_that!(seen.len(), eq(33));
    }

    #[rstest]
    fn random_entry_returns_live_keys() {
        let mut dict = test_dict();
        for index in 0..17 {
            let _ = dict.insert(key_for(index), index as u64);
        }
        for _ in 0..64 {
            let (key, value) = dict.random_entry().expect("populated dict yields an entry");
            assert_that!(dict.peek(key).copied(), eq(Some(*value)));
        }
        assert_that!(test_dict().random_entry().is_none(), eq(true));
    }

    #[rstest]
    fn resize_compacts_a_drained_table() {
        let mut dict = test_dict();
        for index in 0..256 {
            let _ = dict.insert(key_for(index), index as u64);
        }
        while dict.rehash(64) {}
        for index in 0..252 {
            let _ = dict.remove(&key_for(index));
        }
        let before = dict.capacity();
        dict.resize();
        while dict.rehash(64) {}
        assert_that!(dict.capacity() < before, eq(true));
        assert_that!(dict.capacity(), eq(INITIAL_SIZE));
        assert_that!(dict.len(), eq(4));
    }

    #[rstest]
    fn rehash_milliseconds_completes_small_migrations() {
        let mut dict = test_dict();
        for index in 0..1024 {
            let _ = dict.insert(key_for(index), index as u64);
        }
        while dict.rehash_milliseconds(1) {}
        assert_that!(dict.is_rehashing(), eq(false));
        assert_that!(dict.len(), eq(1024));
    }
}
