//! Keyed SipHash-2-4 over byte strings.
//!
//! The dictionary hashes every key with a per-process random 128-bit key, so remote clients
//! cannot construct colliding key sets and degrade buckets into long chains.

/// 128-bit SipHash key, generated once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SipKey {
    k0: u64,
    k1: u64,
}

impl SipKey {
    /// Builds a key from 16 raw bytes (little-endian word order).
    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        let mut k0 = [0_u8; 8];
        let mut k1 = [0_u8; 8];
        k0.copy_from_slice(&bytes[..8]);
        k1.copy_from_slice(&bytes[8..]);
        Self {
            k0: u64::from_le_bytes(k0),
            k1: u64::from_le_bytes(k1),
        }
    }

    /// Generates a fresh random key.
    #[must_use]
    pub fn random() -> Self {
        Self::from_bytes(rand::random::<[u8; 16]>())
    }
}

#[inline]
fn sip_round(v: &mut [u64; 4]) {
    v[0] = v[0].wrapping_add(v[1]);
    v[1] = v[1].rotate_left(13);
    v[1] ^= v[0];
    v[0] = v[0].rotate_left(32);
    v[2] = v[2].wrapping_add(v[3]);
    v[3] = v[3].rotate_left(16);
    v[3] ^= v[2];
    v[0] = v[0].wrapping_add(v[3]);
    v[3] = v[3].rotate_left(21);
    v[3] ^= v[0];
    v[2] = v[2].wrapping_add(v[1]);
    v[1] = v[1].rotate_left(17);
    v[1] ^= v[2];
    v[2] = v[2].rotate_left(32);
}

/// Computes the 64-bit SipHash-2-4 digest of `data` under `key`.
#[must_use]
pub fn siphash24(key: SipKey, data: &[u8]) -> u64 {
    let mut v = [
        key.k0 ^ 0x736f_6d65_7073_6575,
        key.k1 ^ 0x646f_7261_6e64_6f6d,
        key.k0 ^ 0x6c79_6765_6e65_7261,
        key.k1 ^ 0x7465_6462_7974_6573,
    ];

    let mut chunks = data.chunks_exact(8);
    for chunk in &mut chunks {
        let mut word = [0_u8; 8];
        word.copy_from_slice(chunk);
        let m = u64::from_le_bytes(word);
        v[3] ^= m;
        sip_round(&mut v);
        sip_round(&mut v);
        v[0] ^= m;
    }

    // Final block: remaining bytes in the low positions, input length in the top byte.
    let mut tail = (data.len() as u64 & 0xff) << 56;
    for (index, byte) in chunks.remainder().iter().enumerate() {
        tail |= u64::from(*byte) << (8 * index);
    }
    v[3] ^= tail;
    sip_round(&mut v);
    sip_round(&mut v);
    v[0] ^= tail;

    v[2] ^= 0xff;
    sip_round(&mut v);
    sip_round(&mut v);
    sip_round(&mut v);
    sip_round(&mut v);

    v[0] ^ v[1] ^ v[2] ^ v[3]
}

#[cfg(test)]
mod tests {
    use super::{SipKey, siphash24};
    use googletest::prelude::*;
    use rstest::rstest;

    fn reference_key() -> SipKey {
        SipKey::from_bytes([
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
            0x0e, 0x0f,
        ])
    }

    // Reference vectors from the SipHash paper: key 00..0f, input bytes 00..len-1.
    #[rstest]
    #[case(0, 0x726f_db47_dd0e_0e31)]
    #[case(1, 0x74f8_39c5_93dc_67fd)]
    #[case(2, 0x0d6c_8009_d9a9_4f5a)]
    #[case(3, 0x8567_6696_d7fb_7e2d)]
    #[case(7, 0xcbc9_466e_58fe_e3ce)]
    #[case(8, 0xab02_00f5_8b01_d137)]
    #[case(15, 0xa129_ca61_49be_45e5)]
    fn digest_matches_reference_vectors(#[case] len: usize, #[case] expected: u64) {
        let input = (0..len as u8).collect::<Vec<_>>();
        assert_that!(siphash24(reference_key(), &input), eq(expected));
    }

    #[rstest]
    fn distinct_keys_shuffle_the_same_input() {
        let first = SipKey::random();
        let second = SipKey::random();
        assert_that!(first == second, eq(false));
        assert_that!(
            siphash24(first, b"payload") == siphash24(second, b"payload"),
            eq(false)
        );
    }
}
