//! Chained string hash table with stable 1-based numbering.
//!
//! Entries live in an arena in insertion order, so entry `n` is simply
//! `entries[n - 1]`. Buckets hold the head of a chain threaded through the
//! arena by index. Growing the bucket array rehashes the chains from the
//! stored hashes; entry numbers never change.

use rustc_hash::FxHasher;
use std::hash::Hasher;
use std::marker::PhantomData;

const INITIAL_BUCKETS: usize = 16;

/// End-of-chain marker.
const NIL: u32 = 0;

/// Normalisation used for hashing and comparing keys.
pub trait LabelCase: Send + Sync + 'static {
    /// Feeds the normalised form of `key` to `state`.
    fn hash_key<H: Hasher>(key: &str, state: &mut H);

    /// Compares two keys under this normalisation.
    fn keys_equal(a: &str, b: &str) -> bool;

    /// Returns true if keys are folded to one case.
    fn is_case_insensitive() -> bool;
}

/// Keys compare byte for byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseSensitive;

/// Keys compare after ASCII case folding.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitive;

impl LabelCase for CaseSensitive {
    fn hash_key<H: Hasher>(key: &str, state: &mut H) {
        state.write(key.as_bytes());
    }

    fn keys_equal(a: &str, b: &str) -> bool {
        a == b
    }

    fn is_case_insensitive() -> bool {
        false
    }
}

impl LabelCase for CaseInsensitive {
    fn hash_key<H: Hasher>(key: &str, state: &mut H) {
        for b in key.bytes() {
            state.write_u8(b.to_ascii_uppercase());
        }
    }

    fn keys_equal(a: &str, b: &str) -> bool {
        a.eq_ignore_ascii_case(b)
    }

    fn is_case_insensitive() -> bool {
        true
    }
}

#[derive(Debug, Clone)]
struct Entry {
    key: Box<str>,
    hash: u64,
    /// Number of the next entry in the chain, or NIL
    next: u32,
}

/// String table mapping keys to the order in which they were first inserted.
#[derive(Debug, Clone)]
pub struct StrHashTable<C: LabelCase> {
    entries: Vec<Entry>,
    buckets: Vec<u32>,
    _case: PhantomData<C>,
}

impl<C: LabelCase> Default for StrHashTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: LabelCase> StrHashTable<C> {
    /// Create an empty table
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a table sized for `capacity` keys
    pub fn with_capacity(capacity: usize) -> Self {
        let mut buckets = INITIAL_BUCKETS;
        while capacity * 4 > buckets * 3 {
            buckets *= 2;
        }
        Self {
            entries: Vec::with_capacity(capacity),
            buckets: vec![NIL; buckets],
            _case: PhantomData,
        }
    }

    fn hash_of(key: &str) -> u64 {
        let mut hasher = FxHasher::default();
        C::hash_key(key, &mut hasher);
        hasher.finish()
    }

    fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }

    fn find(&self, key: &str, hash: u64) -> Option<u32> {
        let mut n = self.buckets[self.bucket_of(hash)];
        while n != NIL {
            let entry = &self.entries[n as usize - 1];
            if entry.hash == hash && C::keys_equal(&entry.key, key) {
                return Some(n);
            }
            n = entry.next;
        }
        None
    }

    fn grow(&mut self) {
        let size = self.buckets.len() * 2;
        self.buckets = vec![NIL; size];
        for i in 0..self.entries.len() {
            let bucket = self.bucket_of(self.entries[i].hash);
            self.entries[i].next = self.buckets[bucket];
            self.buckets[bucket] = i as u32 + 1;
        }
    }

    fn link(&mut self, n: u32) {
        let bucket = self.bucket_of(self.entries[n as usize - 1].hash);
        self.entries[n as usize - 1].next = self.buckets[bucket];
        self.buckets[bucket] = n;
    }

    fn unlink(&mut self, n: u32) {
        let bucket = self.bucket_of(self.entries[n as usize - 1].hash);
        let next = self.entries[n as usize - 1].next;
        if self.buckets[bucket] == n {
            self.buckets[bucket] = next;
            return;
        }
        let mut cur = self.buckets[bucket];
        while cur != NIL {
            let entry = &mut self.entries[cur as usize - 1];
            if entry.next == n {
                entry.next = next;
                return;
            }
            cur = entry.next;
        }
    }

    /// Inserts `key` if absent. Returns its number and whether it was added.
    pub fn insert(&mut self, key: &str) -> (u32, bool) {
        let hash = Self::hash_of(key);
        if let Some(n) = self.find(key, hash) {
            return (n, false);
        }

        if (self.entries.len() + 1) * 4 > self.buckets.len() * 3 {
            self.grow();
        }
        self.entries.push(Entry {
            key: key.into(),
            hash,
            next: NIL,
        });
        let n = self.entries.len() as u32;
        self.link(n);
        (n, true)
    }

    /// Number of `key`, if present.
    pub fn get(&self, key: &str) -> Option<u32> {
        self.find(key, Self::hash_of(key))
    }

    /// Key stored under number `n`.
    pub fn key(&self, n: u32) -> Option<&str> {
        if n == 0 {
            return None;
        }
        self.entries.get(n as usize - 1).map(|e| &*e.key)
    }

    /// Replaces the key of entry `n`, keeping its number.
    ///
    /// Fails if `n` does not exist or `key` already belongs to another entry.
    pub fn rename(&mut self, n: u32, key: &str) -> std::result::Result<(), RenameError> {
        if self.key(n).is_none() {
            return Err(RenameError::Missing);
        }
        let hash = Self::hash_of(key);
        match self.find(key, hash) {
            Some(other) if other != n => return Err(RenameError::Taken(other)),
            _ => {}
        }

        self.unlink(n);
        let entry = &mut self.entries[n as usize - 1];
        entry.key = key.into();
        entry.hash = hash;
        self.link(n);
        Ok(())
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of buckets currently allocated.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Keys in number order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i as u32 + 1, &*e.key))
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.buckets = vec![NIL; INITIAL_BUCKETS];
    }
}

/// Failure of `StrHashTable::rename`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameError {
    /// No entry with that number
    Missing,
    /// The new key belongs to this other entry
    Taken(u32),
}
