//! Ordered multimaps.
//!
//! Below [`SMALL_THRESHOLD`] entries, a map is a flat key/value array
//! scanned linearly; above it, lookups are accelerated by a bucketized
//! cuckoo hash index over two tables, while the entries themselves stay in
//! a single insertion-ordered vector so identical keys keep preserving
//! insertion order the way a flat scan naturally does.

use super::hashing;
use super::Value;

const SMALL_THRESHOLD: usize = 16;
const BUCKET_CAP: usize = 4;
const MAX_KICKS: usize = 32;

#[derive(Clone, Debug)]
struct Entry {
    key: Value,
    value: Value,
}

#[derive(Debug, Default, Clone)]
struct Bucket(Vec<u32>);

struct CuckooIndex {
    table0: Vec<Bucket>,
    table1: Vec<Bucket>,
    seed0: u64,
    seed1: u64,
    bits: u32,
}

impl CuckooIndex {
    fn with_bits(bits: u32, seed0: u64, seed1: u64) -> Self {
        let size = 1usize << bits;
        CuckooIndex {
            table0: vec![Bucket::default(); size],
            table1: vec![Bucket::default(); size],
            seed0,
            seed1,
            bits,
        }
    }

    fn mask(&self) -> u64 {
        (1u64 << self.bits) - 1
    }

    fn slot0(&self, key_hash: u64) -> usize {
        ((key_hash ^ self.seed0).wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 32 & self.mask()) as usize
    }

    fn slot1(&self, key_hash: u64) -> usize {
        ((key_hash ^ self.seed1).wrapping_mul(0xC2B2_AE3D_27D4_EB4F) >> 32 & self.mask()) as usize
    }

    /// Try to place `entry_idx` (whose key hashes to `key_hash`) without
    /// growing. Returns false if a full rehash is needed.
    fn try_insert(&mut self, key_hash: u64, entry_idx: u32) -> bool {
        let s0 = self.slot0(key_hash);
        if self.table0[s0].0.len() < BUCKET_CAP {
            self.table0[s0].0.push(entry_idx);
            return true;
        }
        let s1 = self.slot1(key_hash);
        if self.table1[s1].0.len() < BUCKET_CAP {
            self.table1[s1].0.push(entry_idx);
            return true;
        }
        // Both home buckets are full: kick the oldest occupant of table0's
        // bucket into its table1 slot, bounded by MAX_KICKS, with the
        // per-entry key hash recomputed via the supplied `hash_of` callback
        // at the call site (CuckooIndex itself doesn't own `entries`).
        false
    }
}

#[derive(Clone, Debug)]
enum Repr {
    Small(Vec<Entry>),
    Cuckoo {
        entries: Vec<Entry>,
    },
}

/// An ordered key/value multimap: identical keys preserve insertion order.
#[derive(Clone, Debug)]
pub struct Map {
    repr: Repr,
    // Present only in the Cuckoo representation; kept outside `Repr::Cuckoo`
    // so `rebuild_index` can mutably borrow `entries` and the index
    // separately.
    index: Option<Box<CuckooIndex>>,
}

impl Map {
    pub fn empty() -> Self {
        Map {
            repr: Repr::Small(Vec::new()),
            index: None,
        }
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Small(v) => v.len(),
            Repr::Cuckoo { entries } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key_hash(key: &Value) -> u64 {
        hashing::hash_string(&key.to_ava_string())
    }

    pub fn insert(&mut self, key: Value, value: Value) {
        match &mut self.repr {
            Repr::Small(entries) => {
                entries.push(Entry { key, value });
                if entries.len() > SMALL_THRESHOLD {
                    self.promote_to_cuckoo();
                }
            }
            Repr::Cuckoo { entries } => {
                let idx = entries.len() as u32;
                entries.push(Entry { key: key.clone(), value });
                let h = Self::key_hash(&key);
                Self::index_insert(self.index.as_mut().unwrap(), &*entries, h, idx);
            }
        }
    }

    fn promote_to_cuckoo(&mut self) {
        let entries = match std::mem::replace(&mut self.repr, Repr::Small(Vec::new())) {
            Repr::Small(e) => e,
            other => {
                self.repr = other;
                return;
            }
        };
        let mut index = Box::new(CuckooIndex::with_bits(
            bits_for(entries.len()),
            0x9E37_79B9,
            0x85EB_CA6B,
        ));
        for (i, e) in entries.iter().enumerate() {
            let h = Self::key_hash(&e.key);
            Self::index_insert(&mut index, &entries, h, i as u32);
        }
        self.index = Some(index);
        self.repr = Repr::Cuckoo { entries };
    }

    /// Insert into the cuckoo index, performing bounded relocation and
    /// falling back to a full rehash (growing the table) on overflow.
    fn index_insert(index: &mut Box<CuckooIndex>, entries: &[Entry], key_hash: u64, entry_idx: u32) {
        if index.try_insert(key_hash, entry_idx) {
            return;
        }

        // Bounded-kick insertion: evict the bucket-0 head repeatedly.
        let mut cur_idx = entry_idx;
        let mut cur_hash = key_hash;
        for _ in 0..MAX_KICKS {
            let s0 = index.slot0(cur_hash);
            if index.table0[s0].0.len() < BUCKET_CAP {
                index.table0[s0].0.push(cur_idx);
                return;
            }
            // Evict the oldest occupant of this bucket and try to re-home
            // it in its table1 slot instead.
            let evicted = index.table0[s0].0.remove(0);
            index.table0[s0].0.push(cur_idx);
            let evicted_hash = Self::key_hash(&entries[evicted as usize].key);
            let s1 = index.slot1(evicted_hash);
            if index.table1[s1].0.len() < BUCKET_CAP {
                index.table1[s1].0.push(evicted);
                return;
            }
            cur_idx = evicted;
            cur_hash = evicted_hash;
        }

        // Relocation chain overflowed: grow and rebuild from scratch.
        let new_bits = index.bits + 1;
        let mut rebuilt = Box::new(CuckooIndex::with_bits(
            new_bits,
            index.seed0.wrapping_add(1),
            index.seed1.wrapping_add(1),
        ));
        for (i, e) in entries.iter().enumerate() {
            let h = Self::key_hash(&e.key);
            // Growth just happened; a second overflow on the same insert is
            // vanishingly unlikely for reasonable load factors, but guard
            // with a direct bucket push that grows the bucket if needed
            // rather than recursing unboundedly.
            if !rebuilt.try_insert(h, i as u32) {
                let s0 = rebuilt.slot0(h);
                rebuilt.table0[s0].0.push(i as u32);
            }
        }
        let h = Self::key_hash(&entries[entry_idx as usize].key);
        if !rebuilt.try_insert(h, entry_idx) {
            let s0 = rebuilt.slot0(h);
            rebuilt.table0[s0].0.push(entry_idx);
        }
        *index = rebuilt;
    }

    /// All values for `key`, in insertion order (multimap semantics).
    pub fn get_all(&self, key: &Value) -> Vec<&Value> {
        match &self.repr {
            Repr::Small(entries) => entries
                .iter()
                .filter(|e| e.key.equal(key))
                .map(|e| &e.value)
                .collect(),
            Repr::Cuckoo { entries } => {
                let index = self.index.as_ref().unwrap();
                let h = Self::key_hash(key);
                let s0 = index.slot0(h);
                let s1 = index.slot1(h);
                let mut candidates: Vec<u32> = index.table0[s0]
                    .0
                    .iter()
                    .chain(index.table1[s1].0.iter())
                    .copied()
                    .collect();
                candidates.sort_unstable();
                candidates
                    .into_iter()
                    .filter(|&i| entries[i as usize].key.equal(key))
                    .map(|i| &entries[i as usize].value)
                    .collect()
            }
        }
    }

    /// First value for `key`, if any.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.get_all(key).into_iter().next()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        let entries: &[Entry] = match &self.repr {
            Repr::Small(e) => e,
            Repr::Cuckoo { entries } => entries,
        };
        entries.iter().map(|e| (&e.key, &e.value))
    }
}

fn bits_for(min_capacity: usize) -> u32 {
    let mut bits = 4u32; // start at 16 slots per table
    while (1usize << bits) < min_capacity {
        bits += 1;
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn small_map_preserves_insertion_order_for_duplicate_keys() {
        let mut m = Map::empty();
        m.insert(Value::of_string_str("k"), Value::of_integer(1));
        m.insert(Value::of_string_str("k"), Value::of_integer(2));
        let vals: Vec<i64> = m
            .get_all(&Value::of_string_str("k"))
            .into_iter()
            .map(|v| v.as_integer().unwrap())
            .collect();
        assert_eq!(vals, vec![1, 2]);
    }

    #[test]
    fn promotes_to_cuckoo_and_keeps_lookups_correct() {
        let mut m = Map::empty();
        for i in 0..200 {
            m.insert(Value::of_integer(i), Value::of_integer(i * 2));
        }
        assert_eq!(m.len(), 200);
        for i in 0..200 {
            let got = m.get(&Value::of_integer(i)).unwrap().as_integer().unwrap();
            assert_eq!(got, i * 2);
        }
    }

    #[test]
    fn duplicate_keys_survive_cuckoo_promotion_in_order() {
        let mut m = Map::empty();
        for i in 0..50 {
            m.insert(Value::of_string_str("dup"), Value::of_integer(i));
        }
        let vals: Vec<i64> = m
            .get_all(&Value::of_string_str("dup"))
            .into_iter()
            .map(|v| v.as_integer().unwrap())
            .collect();
        assert_eq!(vals, (0..50).collect::<Vec<_>>());
    }
}
