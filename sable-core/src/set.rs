//! Adaptive set container and module-level set algebra.
//!
//! A set starts as a packed integer array and upgrades in place to a dictionary the first time a
//! non-integer member arrives or the integer form outgrows the configured threshold. The upgrade
//! is one-way: removals never fall back to the packed form.

use rand::Rng;

use crate::StoreContext;
use crate::containers::HotSet;
use crate::dict::Dict;
use crate::intset::IntSet;

/// Tagged adaptive set.
pub enum SetValue {
    /// Packed sorted integer encoding.
    Ints(IntSet),
    /// Dictionary encoding; members are keys, values carry nothing.
    Table(Dict<()>),
}

/// Parses a member as a canonical decimal integer.
///
/// Canonical means the integer formats back to the identical byte string, so `07`, `+5`, and
/// ` 3` all force the dictionary encoding while `0` and `-12` stay packed.
fn member_as_int(member: &[u8]) -> Option<i64> {
    let text = std::str::from_utf8(member).ok()?;
    let parsed = text.parse::<i64>().ok()?;
    if parsed.to_string() == text {
        Some(parsed)
    } else {
        None
    }
}

impl SetValue {
    /// Creates an empty set in the packed integer encoding.
    #[must_use]
    pub fn new() -> Self {
        Self::Ints(IntSet::new())
    }

    /// Number of members.
    #[must_use]
    pub fn cardinality(&self) -> usize {
        match self {
            Self::Ints(ints) => ints.len(),
            Self::Table(table) => table.len(),
        }
    }

    /// Returns true when the set holds no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cardinality() == 0
    }

    /// Returns true while the set is in the packed integer encoding.
    #[must_use]
    pub fn is_packed(&self) -> bool {
        matches!(self, Self::Ints(_))
    }

    /// Adds `member`; returns false when it was already present.
    ///
    /// Upgrades to the dictionary encoding when the member is not a canonical integer, or when
    /// the addition pushes the packed form past `ctx.max_list_size`.
    pub fn add(&mut self, member: &[u8], ctx: &StoreContext) -> bool {
        match self {
            Self::Ints(ints) => {
                if let Some(value) = member_as_int(member) {
                    let added = ints.add(value);
                    if added && ints.len() > ctx.max_list_size {
                        self.upgrade(ctx);
                    }
                    added
                } else {
                    self.upgrade(ctx);
                    self.add(member, ctx)
                }
            }
            Self::Table(table) => table.insert(member.to_vec(), ()).is_none(),
        }
    }

    fn upgrade(&mut self, ctx: &StoreContext) {
        let Self::Ints(ints) = self else {
            return;
        };
        let mut table = Dict::new(ctx.sip_key);
        for value in ints.iter() {
            let _ = table.insert(value.to_string().into_bytes(), ());
        }
        *self = Self::Table(table);
    }

    /// Removes `member`; returns false when it was absent.
    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self {
            Self::Ints(ints) => member_as_int(member).is_some_and(|value| ints.remove(value)),
            Self::Table(table) => table.remove(member).is_some(),
        }
    }

    /// Returns true when `member` is present.
    #[must_use]
    pub fn contains(&self, member: &[u8]) -> bool {
        match self {
            Self::Ints(ints) => member_as_int(member).is_some_and(|value| ints.contains(value)),
            Self::Table(table) => table.contains(member),
        }
    }

    /// Visits every member as its byte-string form.
    pub fn each(&self, mut visitor: impl FnMut(&[u8])) {
        match self {
            Self::Ints(ints) => {
                for value in ints.iter() {
                    visitor(value.to_string().as_bytes());
                }
            }
            Self::Table(table) => table.iterate(|member, _| visitor(member)),
        }
    }

    /// Collects every member as an owned byte string.
    #[must_use]
    pub fn members(&self) -> Vec<Vec<u8>> {
        let mut collected = Vec::with_capacity(self.cardinality());
        self.each(|member| collected.push(member.to_vec()));
        collected
    }

    /// Returns a random member without removing it.
    #[must_use]
    pub fn random_member(&self) -> Option<Vec<u8>> {
        match self {
            Self::Ints(ints) => ints.random_member().map(|value| value.to_string().into_bytes()),
            Self::Table(table) => table.random_entry().map(|(member, _)| member.to_vec()),
        }
    }

    /// Removes and returns a random member.
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        match self {
            Self::Ints(ints) => ints.pop_random().map(|value| value.to_string().into_bytes()),
            Self::Table(table) => {
                let member = table.random_entry().map(|(member, _)| member.to_vec())?;
                let _ = table.remove(&member);
                Some(member)
            }
        }
    }

    /// Removes and returns `min(count, cardinality)` random members.
    pub fn pop_with_count(&mut self, count: usize, ctx: &StoreContext) -> Vec<Vec<u8>> {
        let card = self.cardinality();
        if count >= card {
            let all = self.members();
            *self = Self::new();
            return all;
        }

        let remaining = card - count;
        if remaining * 5 > count {
            // Few members leave relative to what stays: pop them one by one.
            let mut popped = Vec::with_capacity(count);
            for _ in 0..count {
                if let Some(member) = self.pop() {
                    popped.push(member);
                }
            }
            return popped;
        }

        // Most members leave: move the survivors into a fresh set and hand back the rest.
        let mut survivors = Self::new();
        for _ in 0..remaining {
            if let Some(member) = self.pop() {
                let _ = survivors.add(&member, ctx);
            }
        }
        let drained = std::mem::replace(self, survivors);
        drained.members()
    }

    /// Returns `count` random members without removing them.
    ///
    /// Negative `count` samples with replacement; non-negative sampling is distinct.
    #[must_use]
    pub fn random_members_with_count(&self, count: i64) -> Vec<Vec<u8>> {
        if count == 0 {
            return Vec::new();
        }
        if count < 0 {
            let wanted = count.unsigned_abs() as usize;
            let mut sampled = Vec::with_capacity(wanted);
            for _ in 0..wanted {
                if let Some(member) = self.random_member() {
                    sampled.push(member);
                }
            }
            return sampled;
        }

        let wanted = count as usize;
        let card = self.cardinality();
        if wanted >= card {
            return self.members();
        }

        if wanted * 3 > card {
            // Close to the full set: take everything, then evict random members down to size.
            let mut working = self.members();
            let mut rng = rand::thread_rng();
            while working.len() > wanted {
                let index = rng.gen_range(0..working.len());
                let _ = working.swap_remove(index);
            }
            return working;
        }

        let mut seen: HotSet<Vec<u8>> = HotSet::with_capacity(wanted);
        while seen.len() < wanted {
            if let Some(member) = self.random_member() {
                let _ = seen.insert(member);
            }
        }
        seen.into_iter().collect()
    }
}

impl Default for SetValue {
    fn default() -> Self {
        Self::new()
    }
}

/// Intersection of `sets`: iterates the smallest input and keeps members present everywhere.
#[must_use]
pub fn intersection(sets: &[&SetValue]) -> Vec<Vec<u8>> {
    if sets.is_empty() {
        return Vec::new();
    }
    let mut ordered = sets.to_vec();
    ordered.sort_by_key(|set| set.cardinality());

    let (smallest, others) = (ordered[0], &ordered[1..]);
    let mut retained = Vec::new();
    smallest.each(|member| {
        if others.iter().all(|other| other.contains(member)) {
            retained.push(member.to_vec());
        }
    });
    retained
}

/// Union of `sets` accumulated into a fresh set.
#[must_use]
pub fn union_of(sets: &[&SetValue], ctx: &StoreContext) -> SetValue {
    let mut result = SetValue::new();
    for set in sets {
        set.each(|member| {
            let _ = result.add(member, ctx);
        });
    }
    result
}

/// Difference `sets[0] \ sets[1..]`, choosing between two algorithms by estimated work.
#[must_use]
pub fn difference(sets: &[&SetValue], ctx: &StoreContext) -> SetValue {
    let Some((first, others)) = sets.split_first() else {
        return SetValue::new();
    };

    // Algorithm 1 probes every first-set member against each other set; algorithm 2 copies the
    // first set and removes every other-set member. The halved cost gives algorithm 1 a
    // constant-factor edge because its per-element operation is cheaper.
    let work1 = first.cardinality().saturating_mul(others.len());
    let work2 = others.iter().map(|other| other.cardinality()).sum::<usize>();

    let mut result = SetValue::new();
    if work1 / 2 <= work2 {
        // Larger sets are more likely to disqualify a member early.
        let mut ordered = others.to_vec();
        ordered.sort_by(|a, b| b.cardinality().cmp(&a.cardinality()));
        first.each(|member| {
            if !ordered.iter().any(|other| other.contains(member)) {
                let _ = result.add(member, ctx);
            }
        });
    } else {
        first.each(|member| {
            let _ = result.add(member, ctx);
        });
        for other in others {
            other.each(|member| {
                let _ = result.remove(member);
            });
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::{SetValue, difference, intersection, union_of};
    use crate::StoreContext;
    use crate::siphash::SipKey;
    use googletest::prelude::*;
    use rstest::rstest;

    fn ctx() -> StoreContext {
        StoreContext {
            sip_key: SipKey::from_bytes(*b"fedcba9876543210"),
            max_list_size: 4,
        }
    }

    fn set_of(members: &[&[u8]]) -> SetValue {
        let context = ctx();
        let mut set = SetValue::new();
        for member in members {
            let _ = set.add(member, &context);
        }
        set
    }

    fn sorted_members(set: &SetValue) -> Vec<Vec<u8>> {
        let mut members = set.members();
        members.sort();
        members
    }

    #[rstest]
    fn integer_members_stay_packed_until_threshold() {
        let context = ctx();
        let mut set = SetValue::new();
        for value in 0..4_i64 {
            assert_that!(set.add(value.to_string().as_bytes(), &context), eq(true));
        }
        assert_that!(set.is_packed(), eq(true));

        assert_that!(set.add(b"4", &context), eq(true));
        assert_that!(set.is_packed(), eq(false));
        assert_that!(set.cardinality(), eq(5));
        for value in 0..5_i64 {
            assert_that!(set.contains(value.to_string().as_bytes()), eq(true));
        }
    }

    #[rstest]
    #[case(b"alpha".as_slice())]
    #[case(b"07".as_slice())]
    #[case(b"+5".as_slice())]
    #[case(b" 3".as_slice())]
    fn non_canonical_members_force_dictionary_encoding(#[case] member: &[u8]) {
        let context = ctx();
        let mut set = SetValue::new();
        let _ = set.add(b"1", &context);
        assert_that!(set.is_packed(), eq(true));
        assert_that!(set.add(member, &context), eq(true));
        assert_that!(set.is_packed(), eq(false));
        assert_that!(set.contains(b"1"), eq(true));
        assert_that!(set.contains(member), eq(true));
    }

    #[rstest]
    fn removal_never_restores_packed_encoding() {
        let mut set = set_of(&[b"1", b"2", b"word"]);
        assert_that!(set.remove(b"word"), eq(true));
        assert_that!(set.is_packed(), eq(false));
    }

    #[rstest]
    fn pop_with_count_covering_cardinality_empties_the_set() {
        let context = ctx();
        let mut set = set_of(&[b"a", b"b", b"c"]);
        let mut popped = set.pop_with_count(10, &context);
        popped.sort();
        assert_that!(&popped, eq(&vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]));
        assert_that!(set.cardinality(), eq(0));
    }

    #[rstest]
    #[case(2)]
    #[case(90)]
    fn pop_with_count_removes_exactly_count_members(#[case] count: usize) {
        let context = ctx();
        let mut set = SetValue::new();
        for value in 0..100_i64 {
            let _ = set.add(value.to_string().as_bytes(), &context);
        }
        let popped = set.pop_with_count(count, &context);
        assert_that!(popped.len(), eq(count));
        assert_that!(set.cardinality(), eq(100 - count));
        for member in &popped {
            assert_that!(set.contains(member), eq(false));
        }
    }

    #[rstest]
    #[case(0, 0)]
    #[case(-7, 7)]
    #[case(3, 3)]
    #[case(9, 9)]
    #[case(50, 10)]
    fn random_members_respects_count_contract(#[case] count: i64, #[case] expected: usize) {
        let context = ctx();
        let mut set = SetValue::new();
        for value in 0..10_i64 {
            let _ = set.add(value.to_string().as_bytes(), &context);
        }
        let sampled = set.random_members_with_count(count);
        assert_that!(sampled.len(), eq(expected));
        for member in &sampled {
            assert_that!(set.contains(member), eq(true));
        }
        if count > 0 {
            let mut distinct = sampled.clone();
            distinct.sort();
            distinct.dedup();
            assert_that!(distinct.len(), eq(expected));
        }
    }

    #[rstest]
    fn intersection_keeps_members_present_everywhere() {
        let a = set_of(&[b"1", b"2", b"3", b"4"]);
        let b = set_of(&[b"2", b"4", b"6"]);
        let c = set_of(&[b"4", b"2", b"9", b"12"]);
        let mut result = intersection(&[&a, &b, &c]);
        result.sort();
        assert_that!(&result, eq(&vec![b"2".to_vec(), b"4".to_vec()]));
        assert_that!(intersection(&[]).is_empty(), eq(true));
    }

    #[rstest]
    fn union_accumulates_all_members() {
        let context = ctx();
        let a = set_of(&[b"1", b"2"]);
        let b = set_of(&[b"2", b"word"]);
        let result = union_of(&[&a, &b], &context);
        assert_that!(
            &sorted_members(&result),
            eq(&vec![b"1".to_vec(), b"2".to_vec(), b"word".to_vec()])
        );
    }

    #[rstest]
    fn difference_matches_reference_semantics_for_both_algorithms() {
        let context = ctx();
        let first = set_of(&[b"1", b"2", b"3", b"4", b"5"]);

        // Small others push the cost model toward the copy-then-remove algorithm.
        let small = set_of(&[b"2"]);
        let copy_remove = difference(&[&first, &small], &context);
        assert_that!(
            &sorted_members(&copy_remove),
            eq(&vec![b"1".to_vec(), b"3".to_vec(), b"4".to_vec(), b"5".to_vec()])
        );

        // Large others push it toward per-member probing.
        let mut large = SetValue::new();
        for value in 0..50_i64 {
            let _ = large.add(value.to_string().as_bytes(), &context);
        }
        let probing = difference(&[&first, &large, &small], &context);
        assert_that!(probing.is_empty(), eq(true));
    }

    #[rstest]
    fn difference_of_empty_input_is_an_empty_set() {
        let context = ctx();
        let result = difference(&[], &context);
        assert_that!(result.cardinality(), eq(0));
        assert_that!(result.is_packed(), eq(true));
    }
}
