//! Arena of fixed-width records linked by index.
//!
//! Every record of a chain has the same number of keys and values, so the
//! arena keeps them in flat vectors and addresses record `i` by slice
//! arithmetic. Links are slot numbers; `NIL` ends a chain. Slots are never
//! freed one by one: the whole arena is dropped or cleared at once.

/// End-of-chain marker.
pub const NIL: u32 = u32::MAX;

/// Flat storage for one chain's records.
#[derive(Debug, Clone)]
pub struct RecordArena {
    dimension: usize,
    width: usize,
    keys: Vec<u32>,
    values: Vec<f64>,
    next: Vec<u32>,
}

impl RecordArena {
    /// Create an arena for records with `dimension` keys and `width` values
    pub fn new(dimension: usize, width: usize) -> Self {
        Self {
            dimension,
            width,
            keys: Vec::new(),
            values: Vec::new(),
            next: Vec::new(),
        }
    }

    /// Keys per record
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Values per record
    pub fn width(&self) -> usize {
        self.width
    }

    /// Stores a record with no successor and returns its slot.
    pub fn push(&mut self, keys: &[u32], values: &[f64]) -> u32 {
        debug_assert_eq!(keys.len(), self.dimension);
        debug_assert_eq!(values.len(), self.width);
        let slot = self.next.len() as u32;
        self.keys.extend_from_slice(keys);
        self.values.extend_from_slice(values);
        self.next.push(NIL);
        slot
    }

    /// Keys of `slot`
    pub fn keys(&self, slot: u32) -> &[u32] {
        let start = slot as usize * self.dimension;
        &self.keys[start..start + self.dimension]
    }

    /// Values of `slot`
    pub fn values(&self, slot: u32) -> &[f64] {
        let start = slot as usize * self.width;
        &self.values[start..start + self.width]
    }

    /// Successor of `slot`
    pub fn next(&self, slot: u32) -> u32 {
        self.next[slot as usize]
    }

    /// Relinks `slot`
    pub fn set_next(&mut self, slot: u32, next: u32) {
        self.next[slot as usize] = next;
    }

    /// Slots allocated, live or consumed.
    pub fn slots(&self) -> usize {
        self.next.len()
    }

    /// Releases every slot.
    pub fn clear(&mut self) {
        self.keys = Vec::new();
        self.values = Vec::new();
        self.next = Vec::new();
    }

    /// Bytes held by the arena.
    pub fn memory_used(&self) -> usize {
        self.keys.capacity() * std::mem::size_of::<u32>()
            + self.values.capacity() * std::mem::size_of::<f64>()
            + self.next.capacity() * std::mem::size_of::<u32>()
    }
}
