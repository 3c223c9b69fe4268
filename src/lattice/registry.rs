//! Open-addressing hash map from fixed-length lattice keys to dense ids.
//!
//! Keys are stored contiguously in insertion order, so id `i` owns
//! `keys[i * key_len..(i + 1) * key_len]`. The bucket table holds ids only;
//! growing the table rehashes bucket placement but never renumbers ids.
use log::debug;

const MIN_CAPACITY: usize = 16;
const HASH_MULTIPLIER: u64 = 1_664_525;

#[derive(Clone, Debug)]
pub struct VertexRegistry {
    key_len: usize,
    keys: Vec<i32>,
    table: Vec<Option<u32>>,
}

impl VertexRegistry {
    /// Create a registry for keys of `key_len` integers with room for
    /// `capacity` buckets (rounded up to a small minimum).
    pub fn with_capacity(key_len: usize, capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            key_len,
            keys: Vec::with_capacity(capacity / 2 * key_len),
            table: vec![None; capacity],
        }
    }

    #[inline]
    pub fn key_len(&self) -> usize {
        self.key_len
    }

    /// Number of distinct keys registered so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len() / self.key_len.max(1)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Current number of buckets.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.table.len()
    }

    /// Key registered under `id`.
    #[inline]
    pub fn key(&self, id: usize) -> &[i32] {
        &self.keys[id * self.key_len..(id + 1) * self.key_len]
    }

    /// Look up `key` without inserting.
    pub fn find(&self, key: &[i32]) -> Option<usize> {
        debug_assert_eq!(key.len(), self.key_len);
        let mut h = self.bucket(key);
        loop {
            match self.table[h] {
                None => return None,
                Some(id) if self.key(id as usize) == key => return Some(id as usize),
                Some(_) => h = self.next_bucket(h),
            }
        }
    }

    /// Return the id of `key`, registering it with the next sequential id if
    /// it has not been seen before.
    pub fn insert(&mut self, key: &[i32]) -> usize {
        debug_assert_eq!(key.len(), self.key_len);
        if 2 * self.len() >= self.capacity() {
            self.grow();
        }
        let mut h = self.bucket(key);
        loop {
            match self.table[h] {
                None => {
                    let id = self.len();
                    self.keys.extend_from_slice(key);
                    self.table[h] = Some(id as u32);
                    return id;
                }
                Some(id) if self.key(id as usize) == key => return id as usize,
                Some(_) => h = self.next_bucket(h),
            }
        }
    }

    fn grow(&mut self) {
        let old_capacity = self.capacity();
        let new_capacity = old_capacity * 2;
        let old_table = std::mem::replace(&mut self.table, vec![None; new_capacity]);
        for id in old_table.into_iter().flatten() {
            let mut h = self.bucket(self.key(id as usize));
            while self.table[h].is_some() {
                h = self.next_bucket(h);
            }
            self.table[h] = Some(id);
        }
        debug!(
            "VertexRegistry::grow {} -> {} buckets ({} keys)",
            old_capacity,
            new_capacity,
            self.len()
        );
    }

    #[inline]
    fn next_bucket(&self, h: usize) -> usize {
        if h + 1 == self.capacity() {
            0
        } else {
            h + 1
        }
    }

    #[inline]
    fn bucket(&self, key: &[i32]) -> usize {
        (hash_key(key) % self.capacity() as u64) as usize
    }
}

/// Multiplicative rolling hash over the key coordinates (wrapping).
#[inline]
fn hash_key(key: &[i32]) -> u64 {
    key.iter().fold(0u64, |acc, &k| {
        acc.wrapping_add(k as i64 as u64)
            .wrapping_mul(HASH_MULTIPLIER)
    })
}
