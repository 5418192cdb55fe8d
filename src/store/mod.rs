//! Linked sparse data store.
//!
//! Records are kept per symbol in a chain: an append-only `RecordArena` whose
//! slots are linked in tuple order. Writers append to the tail and flush the
//! whole chain to a data section; readers load a section into a chain and
//! consume it from the head.
//!
//! Tuples in a data section are strictly increasing. A chain built from
//! unordered appends is sorted before it is written, and when a tuple was
//! appended more than once the last record wins.
//!
//! ## Data Section Format
//!
//! ```text
//! ["_DATA_"][dimension: u8][width: u8][count: varint]
//! for each record:
//!   for each dimension: zigzag varint of (key - previous record's key)
//!   for each value:     tagged value
//! [crc32 of everything above: u32]
//! ```

pub mod arena;

pub use arena::{RecordArena, NIL};

use crate::error::{Error, Result};
use crate::stream::{StreamReader, StreamWriter};
use crate::uel::expect_marker;
use crate::value::SpecialValues;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

/// Marker opening every data section.
pub const MARK_DATA: &str = "_DATA_";

/// An owned record: label indices plus values.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Dense label index per dimension
    pub tuple: Vec<u32>,
    /// Value payload
    pub values: Vec<f64>,
}

/// A record borrowed from a chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordRef<'a> {
    /// Dense label index per dimension
    pub tuple: &'a [u32],
    /// Value payload
    pub values: &'a [f64],
}

impl RecordRef<'_> {
    /// Copies the record out of the chain
    pub fn to_record(&self) -> Record {
        Record {
            tuple: self.tuple.to_vec(),
            values: self.values.to_vec(),
        }
    }
}

#[derive(Debug)]
struct Chain {
    arena: RecordArena,
    head: u32,
    tail: u32,
    len: usize,
    min_key: u32,
    max_key: u32,
    /// False once an append arrives out of order (non-strict mode only)
    sorted: bool,
}

impl Chain {
    fn new(dimension: usize, width: usize) -> Self {
        Self {
            arena: RecordArena::new(dimension, width),
            head: NIL,
            tail: NIL,
            len: 0,
            min_key: u32::MAX,
            max_key: 0,
            sorted: true,
        }
    }

    fn last_tuple(&self) -> Option<&[u32]> {
        (self.tail != NIL).then(|| self.arena.keys(self.tail))
    }

    fn push(&mut self, tuple: &[u32], values: &[f64]) {
        let slot = self.arena.push(tuple, values);
        if self.tail == NIL {
            self.head = slot;
        } else {
            self.arena.set_next(self.tail, slot);
        }
        self.tail = slot;
        self.len += 1;
        for &key in tuple {
            self.min_key = self.min_key.min(key);
            self.max_key = self.max_key.max(key);
        }
    }

    fn iter(&self) -> ChainIter<'_> {
        ChainIter {
            arena: &self.arena,
            cursor: self.head,
        }
    }

    /// Stable LSD radix sort on the links, one bucket per key value.
    fn radix_sort(&mut self) {
        let dimension = self.arena.dimension();
        if self.len < 2 || dimension == 0 {
            return;
        }

        let base = self.min_key;
        let span = (self.max_key - base) as usize + 1;
        let mut heads = vec![NIL; span];
        let mut tails = vec![NIL; span];

        for d in (0..dimension).rev() {
            let mut r = self.head;
            while r != NIL {
                let next = self.arena.next(r);
                let k = (self.arena.keys(r)[d] - base) as usize;
                if heads[k] == NIL {
                    heads[k] = r;
                } else {
                    self.arena.set_next(tails[k], r);
                }
                tails[k] = r;
                r = next;
            }

            // Relink buckets from the highest key down so the chain ends up
            // ascending.
            let mut head = NIL;
            let mut tail = NIL;
            for k in (0..span).rev() {
                if heads[k] != NIL {
                    self.arena.set_next(tails[k], head);
                    if tail == NIL {
                        tail = tails[k];
                    }
                    head = heads[k];
                    heads[k] = NIL;
                }
            }
            self.head = head;
            self.tail = tail;
        }
    }

    /// Unlinks every record followed by one with the same tuple. After a
    /// stable sort this keeps the record appended last.
    fn drop_superseded(&mut self) -> usize {
        let mut dropped = 0;
        let mut prev = NIL;
        let mut r = self.head;
        while r != NIL {
            let next = self.arena.next(r);
            if next != NIL && self.arena.keys(r) == self.arena.keys(next) {
                if prev == NIL {
                    self.head = next;
                } else {
                    self.arena.set_next(prev, next);
                }
                self.len -= 1;
                dropped += 1;
            } else {
                prev = r;
            }
            r = next;
        }
        self.tail = prev;
        dropped
    }

    /// Sorts the chain and removes superseded duplicates. Returns the number
    /// of records removed.
    fn sort_unique(&mut self) -> usize {
        if self.sorted {
            return 0;
        }
        self.radix_sort();
        let dropped = self.drop_superseded();
        self.sorted = true;
        dropped
    }
}

/// Single forward pass over a chain.
pub struct ChainIter<'a> {
    arena: &'a RecordArena,
    cursor: u32,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = RecordRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let slot = self.cursor;
        self.cursor = self.arena.next(slot);
        Some(RecordRef {
            tuple: self.arena.keys(slot),
            values: self.arena.values(slot),
        })
    }
}

/// Per-symbol record chains.
#[derive(Debug)]
pub struct LinkedDataStore {
    chains: FxHashMap<u32, Chain>,
    strict: bool,
}

impl LinkedDataStore {
    /// Create an empty store. In strict mode every append must sort strictly
    /// after the previous one for the same symbol.
    pub fn new(strict: bool) -> Self {
        Self {
            chains: FxHashMap::default(),
            strict,
        }
    }

    /// Starts an empty chain for `symbol`.
    pub fn create_chain(&mut self, symbol: u32, dimension: usize, width: usize) -> Result<()> {
        if self.chains.contains_key(&symbol) {
            return Err(Error::invalid_state(format!(
                "symbol {} already has a record chain",
                symbol
            )));
        }
        self.chains.insert(symbol, Chain::new(dimension, width));
        Ok(())
    }

    fn chain(&self, symbol: u32) -> Result<&Chain> {
        self.chains
            .get(&symbol)
            .ok_or_else(|| Error::not_found(format!("no record chain for symbol {}", symbol)))
    }

    fn chain_mut(&mut self, symbol: u32) -> Result<&mut Chain> {
        self.chains
            .get_mut(&symbol)
            .ok_or_else(|| Error::not_found(format!("no record chain for symbol {}", symbol)))
    }

    /// Returns true if `symbol` has a chain.
    pub fn contains(&self, symbol: u32) -> bool {
        self.chains.contains_key(&symbol)
    }

    /// Number of live records for `symbol`.
    pub fn len(&self, symbol: u32) -> usize {
        self.chains.get(&symbol).map_or(0, |c| c.len)
    }

    /// Appends a record to the tail of the chain.
    ///
    /// The tuple arity and the value width must match the chain. In strict
    /// mode the tuple must sort after the last one appended.
    pub fn append(&mut self, symbol: u32, tuple: &[u32], values: &[f64]) -> Result<()> {
        let strict = self.strict;
        let chain = self.chain_mut(symbol)?;

        if tuple.len() != chain.arena.dimension() {
            return Err(Error::validation(format!(
                "symbol {} expects {} indices, got {}",
                symbol,
                chain.arena.dimension(),
                tuple.len()
            )));
        }
        if values.len() != chain.arena.width() {
            return Err(Error::validation(format!(
                "symbol {} expects {} values, got {}",
                symbol,
                chain.arena.width(),
                values.len()
            )));
        }
        if chain.len >= NIL as usize {
            return Err(Error::invalid_state(format!("symbol {} chain is full", symbol)));
        }

        let in_order = chain
            .last_tuple()
            .map_or(true, |previous| tuple.cmp(previous) == Ordering::Greater);
        if !in_order {
            if strict {
                return Err(Error::OutOfOrder {
                    symbol,
                    tuple: tuple.to_vec(),
                    previous: chain.last_tuple().unwrap_or_default().to_vec(),
                });
            }
            chain.sorted = false;
        }

        chain.push(tuple, values);
        Ok(())
    }

    /// Lazy, borrowing pass over the live records of `symbol`.
    pub fn iterate(&self, symbol: u32) -> Result<ChainIter<'_>> {
        Ok(self.chain(symbol)?.iter())
    }

    /// Puts the chain in tuple order. Of several records with the same tuple
    /// only the one appended last is kept. Returns the number of records
    /// dropped that way.
    pub fn sort(&mut self, symbol: u32) -> Result<usize> {
        let dropped = self.chain_mut(symbol)?.sort_unique();
        if dropped > 0 {
            log::debug!(
                "Symbol {}: {} records replaced by later writes",
                symbol,
                dropped
            );
        }
        Ok(dropped)
    }

    /// Writes the chain of `symbol` as a data section and frees it.
    ///
    /// Returns the number of records written. On error the chain is kept.
    pub fn flush_symbol(
        &mut self,
        symbol: u32,
        writer: &mut StreamWriter,
        specials: &SpecialValues,
    ) -> Result<u64> {
        self.sort(symbol)?;
        let chain = self.chain(symbol)?;
        let dimension = chain.arena.dimension();

        writer.begin_checksum();
        writer.write_string(MARK_DATA)?;
        writer.write_u8(dimension as u8)?;
        writer.write_u8(chain.arena.width() as u8)?;
        writer.write_varint(chain.len as u64)?;

        let mut previous = vec![0u32; dimension];
        for record in chain.iter() {
            for (prev, &key) in previous.iter_mut().zip(record.tuple) {
                writer.write_signed_varint(key as i64 - *prev as i64)?;
                *prev = key;
            }
            for &value in record.values {
                specials.write_value(writer, value)?;
            }
        }
        let crc = writer.end_checksum();
        writer.write_u32(crc)?;

        let count = chain.len as u64;
        self.chains.remove(&symbol);
        log::debug!("Flushed {} records for symbol {}", count, symbol);
        Ok(count)
    }

    /// Reads a data section into a fresh chain for `symbol`.
    ///
    /// The section must match the expected shape and record count.
    pub fn load_symbol(
        &mut self,
        symbol: u32,
        reader: &mut StreamReader,
        dimension: usize,
        width: usize,
        expected: u64,
        specials: &SpecialValues,
    ) -> Result<()> {
        reader.begin_checksum();
        let result = Self::read_section(reader, dimension, width, expected, specials);
        let actual = reader.end_checksum();
        let chain = result?;

        let stored = reader.read_u32()?;
        if stored != actual {
            return Err(Error::ChecksumMismatch {
                expected: stored,
                actual,
            });
        }

        self.chains.insert(symbol, chain);
        Ok(())
    }

    fn read_section(
        reader: &mut StreamReader,
        dimension: usize,
        width: usize,
        expected: u64,
        specials: &SpecialValues,
    ) -> Result<Chain> {
        expect_marker(reader, MARK_DATA)?;
        let stored_dim = reader.read_u8()? as usize;
        let stored_width = reader.read_u8()? as usize;
        if stored_dim != dimension || stored_width != width {
            return Err(Error::corruption(format!(
                "data section shape {}x{} does not match the directory ({}x{})",
                stored_dim, stored_width, dimension, width
            )));
        }
        let count = reader.read_varint()?;
        if count != expected {
            return Err(Error::corruption(format!(
                "data section holds {} records, directory says {}",
                count, expected
            )));
        }

        let mut chain = Chain::new(dimension, width);
        let mut tuple = vec![0u32; dimension];
        let mut values = vec![0.0f64; width];
        for _ in 0..count {
            for key in tuple.iter_mut() {
                let delta = reader.read_signed_varint()?;
                let next = (*key as i64)
                    .checked_add(delta)
                    .filter(|&n| n >= 1 && n <= u32::MAX as i64)
                    .ok_or_else(|| {
                        Error::corruption(format!("label delta {} from {} out of range", delta, key))
                    })?;
                *key = next as u32;
            }
            if chain
                .last_tuple()
                .is_some_and(|previous| tuple.as_slice() <= previous)
            {
                return Err(Error::corruption(format!(
                    "data section record {:?} does not follow its predecessor",
                    tuple
                )));
            }
            for value in values.iter_mut() {
                *value = specials.read_value(reader)?;
            }
            chain.push(&tuple, &values);
        }
        Ok(chain)
    }

    /// Removes and returns the first record of `symbol`. The chain is freed
    /// once its last record is taken.
    pub fn pop_front(&mut self, symbol: u32) -> Option<Record> {
        let chain = self.chains.get_mut(&symbol)?;
        if chain.head == NIL {
            self.chains.remove(&symbol);
            return None;
        }

        let slot = chain.head;
        let record = Record {
            tuple: chain.arena.keys(slot).to_vec(),
            values: chain.arena.values(slot).to_vec(),
        };
        chain.head = chain.arena.next(slot);
        chain.len -= 1;
        if chain.head == NIL {
            self.chains.remove(&symbol);
        }
        Some(record)
    }

    /// Drops the chain of `symbol`, if any.
    pub fn remove(&mut self, symbol: u32) {
        self.chains.remove(&symbol);
    }

    /// Drops every chain.
    pub fn clear(&mut self) {
        self.chains.clear();
    }

    /// Bytes held by every chain.
    pub fn memory_used(&self) -> usize {
        self.chains.values().map(|c| c.arena.memory_used()).sum()
    }
}
