//! Process-wide hashing key and the deterministic, representation-independent
//! hash used for [`super::string::AvaString`] and, by extension, any value
//! whose `to_string` routes through it.
//!
//! A single [`std::sync::OnceLock`]-gated key is generated the first time
//! [`init`] or [`hash_key`] runs; every hash thereafter is a pure function of
//! the byte sequence being hashed, independent of whether it came from an
//! inline, flat, or rope string — two strings that stringify identically
//! always hash identically.

use std::sync::OnceLock;

use rand::RngCore;

use super::string::AvaString;

#[derive(Debug, Clone, Copy)]
struct HashKey {
    k0: u64,
    k1: u64,
}

static HASH_KEY: OnceLock<HashKey> = OnceLock::new();

/// Seed the process-wide hashing key. Idempotent: subsequent calls are a
/// no-op. Mirrors the single initialization gate described for process-wide
/// state — call once before constructing any value that will be hashed, on
/// whichever thread starts the process; safe to call redundantly from more
/// than one (the `OnceLock` arbitrates).
pub fn init() {
    let _ = hash_key();
}

fn hash_key() -> HashKey {
    *HASH_KEY.get_or_init(|| {
        let mut rng = rand::thread_rng();
        HashKey {
            k0: rng.next_u64(),
            k1: rng.next_u64(),
        }
    })
}

/// Hash a string value. Chunk-iterates so a rope never needs to be
/// materialized just to be hashed.
pub fn hash_string(s: &AvaString) -> u64 {
    let key = hash_key();
    // SipHash-1-3-shaped mixer: enough avalanche for a hash table key
    // without pulling in an external crate, keyed so the hash cannot be
    // predicted without observing `HASH_KEY`.
    let mut v0 = 0x736f_6d65_7073_6575 ^ key.k0;
    let mut v1 = 0x646f_7261_6e64_6f6d ^ key.k1;
    let mut v2 = 0x6c79_6765_6e65_7261 ^ key.k0;
    let mut v3 = 0x7465_6462_7974_6573 ^ key.k1;

    macro_rules! round {
        () => {
            v0 = v0.wrapping_add(v1);
            v1 = v1.rotate_left(13);
            v1 ^= v0;
            v0 = v0.rotate_left(32);
            v2 = v2.wrapping_add(v3);
            v3 = v3.rotate_left(16);
            v3 ^= v2;
            v0 = v0.wrapping_add(v3);
            v3 = v3.rotate_left(21);
            v3 ^= v0;
            v2 = v2.wrapping_add(v1);
            v1 = v1.rotate_left(17);
            v1 ^= v2;
            v2 = v2.rotate_left(32);
        };
    }

    let total_len = s.len();
    let mut buf = [0u8; 8];
    let mut buf_used = 0usize;

    for chunk in s.chunks() {
        let mut bytes = chunk.as_slice();
        while !bytes.is_empty() {
            let take = (8 - buf_used).min(bytes.len());
            buf[buf_used..buf_used + take].copy_from_slice(&bytes[..take]);
            buf_used += take;
            bytes = &bytes[take..];
            if buf_used == 8 {
                let m = u64::from_le_bytes(buf);
                v3 ^= m;
                round!();
                v0 ^= m;
                buf_used = 0;
            }
        }
    }

    let mut last_block = [0u8; 8];
    last_block[..buf_used].copy_from_slice(&buf[..buf_used]);
    last_block[7] = (total_len & 0xff) as u8;
    let m = u64::from_le_bytes(last_block);
    v3 ^= m;
    round!();
    v0 ^= m;

    v2 ^= 0xff;
    round!();
    round!();
    round!();

    v0 ^ v1 ^ v2 ^ v3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_content_hashes_equal_regardless_of_representation() {
        init();
        let flat = AvaString::from_str(
            "this is a long enough string to avoid the inline representation",
        );
        let rope = AvaString::concat(
            &AvaString::from_str("this is a long enough string to "),
            &AvaString::from_str("avoid the inline representation"),
        );
        assert_eq!(flat, rope);
        assert_eq!(hash_string(&flat), hash_string(&rope));
    }

    #[test]
    fn different_content_usually_hashes_differently() {
        init();
        let a = AvaString::from_str("alpha");
        let b = AvaString::from_str("beta");
        assert_ne!(hash_string(&a), hash_string(&b));
    }
}
