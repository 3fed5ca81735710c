//! Sorted packed integer array with width-adaptive encoding.
//!
//! Elements live in one contiguous little-endian byte buffer at the narrowest width that fits
//! every current member. Adding an element outside the width's range re-encodes the whole buffer
//! at the wider width; removal never narrows it back.

use rand::Rng;

/// Element width of the packed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntSetEncoding {
    /// 16-bit elements.
    I16,
    /// 32-bit elements.
    I32,
    /// 64-bit elements.
    I64,
}

impl IntSetEncoding {
    /// Narrowest encoding that fits `value`.
    #[must_use]
    pub fn for_value(value: i64) -> Self {
        if i64::from(value as i16) == value {
            Self::I16
        } else if i64::from(value as i32) == value {
            Self::I32
        } else {
            Self::I64
        }
    }

    /// Element width in bytes.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::I16 => 2,
            Self::I32 => 4,
            Self::I64 => 8,
        }
    }
}

/// Packed sorted set of signed integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntSet {
    encoding: IntSetEncoding,
    data: Vec<u8>,
}

impl Default for IntSet {
    fn default() -> Self {
        Self::new()
    }
}

impl IntSet {
    /// Creates an empty set at the narrowest encoding.
    #[must_use]
    pub fn new() -> Self {
        Self {
            encoding: IntSetEncoding::I16,
            data: Vec::new(),
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.encoding.width()
    }

    /// Returns true when the set holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current element encoding.
    #[must_use]
    pub fn encoding(&self) -> IntSetEncoding {
        self.encoding
    }

    /// Element at `index` in ascending order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        Some(self.decode_at(index, self.encoding))
    }

    fn decode_at(&self, index: usize, encoding: IntSetEncoding) -> i64 {
        let width = encoding.width();
        let slice = &self.data[index * width..(index + 1) * width];
        match encoding {
            IntSetEncoding::I16 => {
                let mut raw = [0_u8; 2];
                raw.copy_from_slice(slice);
                i64::from(i16::from_le_bytes(raw))
            }
            IntSetEncoding::I32 => {
                let mut raw = [0_u8; 4];
                raw.copy_from_slice(slice);
                i64::from(i32::from_le_bytes(raw))
            }
            IntSetEncoding::I64 => {
                let mut raw = [0_u8; 8];
                raw.copy_from_slice(slice);
                i64::from_le_bytes(raw)
            }
        }
    }

    fn encode(encoding: IntSetEncoding, value: i64) -> Vec<u8> {
        match encoding {
            IntSetEncoding::I16 => (value as i16).to_le_bytes().to_vec(),
            IntSetEncoding::I32 => (value as i32).to_le_bytes().to_vec(),
            IntSetEncoding::I64 => value.to_le_bytes().to_vec(),
        }
    }

    /// Binary search for `value`: `Ok(position)` when present, `Err(insertion_point)` otherwise.
    fn search(&self, value: i64) -> Result<usize, usize> {
        let mut low = 0_usize;
        let mut high = self.len();
        while low < high {
            let mid = (low + high) / 2;
            let element = self.decode_at(mid, self.encoding);
            if element == value {
                return Ok(mid);
            }
            if element < value {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        Err(low)
    }

    /// Returns true when `value` is a member.
    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        self.search(value).is_ok()
    }

    /// Inserts `value`; returns false when it was already present.
    pub fn add(&mut self, value: i64) -> bool {
        let needed = IntSetEncoding::for_value(value);
        if needed > self.encoding {
            // A wider element is by construction smaller or larger than every current member,
            // so the re-encode appends it at the matching end.
            self.upgrade_and_add(needed, value);
            return true;
        }

        let Err(position) = self.search(value) else {
            return false;
        };
        let offset = position * self.encoding.width();
        let encoded = Self::encode(self.encoding, value);
        let _ = self.data.splice(offset..offset, encoded);
        true
    }

    fn upgrade_and_add(&mut self, encoding: IntSetEncoding, value: i64) {
        let length = self.len();
        let prepend = value < 0;
        let mut widened = Vec::with_capacity((length + 1) * encoding.width());
        if prepend {
            widened.extend_from_slice(&Self::encode(encoding, value));
        }
        for index in 0..length {
            let element = self.decode_at(index, self.encoding);
            widened.extend_from_slice(&Self::encode(encoding, element));
        }
        if !prepend {
            widened.extend_from_slice(&Self::encode(encoding, value));
        }
        self.encoding = encoding;
        self.data = widened;
    }

    /// Removes `value`; returns false when it was absent. The encoding never narrows.
    pub fn remove(&mut self, value: i64) -> bool {
        if IntSetEncoding::for_value(value) > self.encoding {
            return false;
        }
        let Ok(position) = self.search(value) else {
            return false;
        };
        let width = self.encoding.width();
        let offset = position * width;
        let _ = self.data.drain(offset..offset + width);
        true
    }

    /// Ascending iterator over all elements.
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.len()).map(move |index| self.decode_at(index, self.encoding))
    }

    /// Returns a uniformly random member.
    #[must_use]
    pub fn random_member(&self) -> Option<i64> {
        if self.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..self.len());
        self.get(index)
    }

    /// Removes and returns a uniformly random member.
    pub fn pop_random(&mut self) -> Option<i64> {
        let member = self.random_member()?;
        let _ = self.remove(member);
        Some(member)
    }
}

#[cfg(test)]
mod tests {
    use super::{IntSet, IntSetEncoding};
    use googletest::prelude::*;
    use rstest::rstest;

    #[rstest]
    fn elements_stay_sorted_under_unordered_inserts() {
        let mut set = IntSet::new();
        for value in [17_i64, -3, 250, 0, -120, 99, 4] {
            assert_that!(set.add(value), eq(true));
        }
        assert_that!(set.add(17), eq(false));
        let elements = set.iter().collect::<Vec<_>>();
        assert_that!(&elements, eq(&vec![-120_i64, -3, 0, 4, 17, 99, 250]));
    }

    #[rstest]
    #[case(0, IntSetEncoding::I16)]
    #[case(i64::from(i16::MAX), IntSetEncoding::I16)]
    #[case(i64::from(i16::MAX) + 1, IntSetEncoding::I32)]
    #[case(i64::from(i32::MIN), IntSetEncoding::I32)]
    #[case(i64::from(i32::MAX) + 1, IntSetEncoding::I64)]
    #[case(i64::MIN, IntSetEncoding::I64)]
    fn encoding_is_minimal_for_value(#[case] value: i64, #[case] expected: IntSetEncoding) {
        assert_that!(IntSetEncoding::for_value(value), eq(expected));
    }

    #[rstest]
    fn upgrade_re_encodes_existing_members() {
        let mut set = IntSet::new();
        assert_that!(set.add(5), eq(true));
        assert_that!(set.add(-10), eq(true));
        assert_that!(set.encoding(), eq(IntSetEncoding::I16));

        assert_that!(set.add(1 << 20), eq(true));
        assert_that!(set.encoding(), eq(IntSetEncoding::I32));
        assert_that!(set.add(i64::MIN), eq(true));
        assert_that!(set.encoding(), eq(IntSetEncoding::I64));

        let elements = set.iter().collect::<Vec<_>>();
        assert_that!(&elements, eq(&vec![i64::MIN, -10, 5, 1 << 20]));
    }

    #[rstest]
    fn removal_keeps_order_and_never_narrows_encoding() {
        let mut set = IntSet::new();
        for value in [1_i64, 2, 1 << 40, 3] {
            let _ = set.add(value);
        }
        assert_that!(set.remove(1 << 40), eq(true));
        assert_that!(set.remove(1 << 40), eq(false));
        assert_that!(set.encoding(), eq(IntSetEncoding::I64));
        let elements = set.iter().collect::<Vec<_>>();
        assert_that!(&elements, eq(&vec![1_i64, 2, 3]));
    }

    #[rstest]
    fn lookup_covers_absent_values_between_members() {
        let mut set = IntSet::new();
        for value in [10_i64, 20, 30] {
            let _ = set.add(value);
        }
        assert_that!(set.contains(10), eq(true));
        assert_that!(set.contains(15), eq(false));
        assert_that!(set.contains(31), eq(false));
        assert_that!(set.remove(15), eq(false));
    }

    #[rstest]
    fn random_pop_drains_the_whole_set() {
        let mut set = IntSet::new();
        for value in 0..50_i64 {
            let _ = set.add(value);
        }
        let mut drained = Vec::new();
        while let Some(member) = set.pop_random() {
            drained.push(member);
        }
        drained.sort_unstable();
        assert_that!(drained.len(), eq(50));
        assert_that!(&drained, eq(&(0..50_i64).collect::<Vec<_>>()));
    }
}
