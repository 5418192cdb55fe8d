//! Sparse to dense index mapping.
//!
//! Forward slot `s` holds the dense index of sparse index `s`, or 0 when `s`
//! is unmapped. The inverse array lists the sparse indices in dense order.

use super::DomainFilter;
use crate::error::{Error, Result};

/// Above this size the forward array grows by half instead of doubling.
const DOUBLING_LIMIT: usize = 1_000_000;

/// Bidirectional mapping between sparse and dense indices (both 1-based).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegerMapping {
    forward: Vec<u32>,
    inverse: Vec<u32>,
}

impl IntegerMapping {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps 1..=n onto itself.
    pub fn identity(n: u32) -> Self {
        let forward = (0..=n).collect();
        let inverse = (1..=n).collect();
        Self { forward, inverse }
    }

    /// Maps the members of `filter` onto 1..=len in ascending order.
    /// `All` becomes the identity over `universe`.
    pub fn build_from_filter(filter: &DomainFilter, universe: u32) -> Self {
        match filter.members() {
            None => Self::identity(universe),
            Some(members) => {
                let mut mapping = Self::new();
                if let Some(&max) = members.last() {
                    mapping.reserve_forward(max as usize + 1);
                }
                for &s in members {
                    mapping.push(s);
                }
                mapping
            }
        }
    }

    /// Appends the sparse range `lo..=hi`. Ranges must arrive in ascending
    /// order and may not overlap what is already mapped.
    pub fn add_filter_range(&mut self, lo: u32, hi: u32) -> Result<()> {
        if lo == 0 || lo > hi {
            return Err(Error::invalid_argument(format!("invalid range {}..={}", lo, hi)));
        }
        if let Some(highest) = self.highest_sparse() {
            if lo <= highest {
                return Err(Error::invalid_argument(format!(
                    "range {}..={} does not follow {}",
                    lo, hi, highest
                )));
            }
        }
        if (self.inverse.len() as u64) + ((hi - lo) as u64 + 1) > u32::MAX as u64 {
            return Err(Error::invalid_argument("mapping would exceed u32 indices"));
        }

        self.reserve_forward(hi as usize + 1);
        for s in lo..=hi {
            self.push(s);
        }
        Ok(())
    }

    fn reserve_forward(&mut self, needed: usize) {
        let cap = self.forward.capacity();
        if needed <= cap {
            return;
        }
        let grown = if cap < DOUBLING_LIMIT {
            cap * 2
        } else {
            cap + cap / 2
        };
        self.forward.reserve_exact(grown.max(needed) - self.forward.len());
    }

    fn push(&mut self, s: u32) {
        let slot = s as usize;
        if slot >= self.forward.len() {
            self.reserve_forward(slot + 1);
            self.forward.resize(slot + 1, 0);
        }
        self.inverse.push(s);
        self.forward[slot] = self.inverse.len() as u32;
    }

    /// Dense index of `s`, or `None` if unmapped.
    pub fn map_sparse_to_dense(&self, s: u32) -> Option<u32> {
        match self.forward.get(s as usize) {
            Some(&d) if d != 0 => Some(d),
            _ => None,
        }
    }

    /// Sparse index of `d`, or `None` if out of range.
    pub fn map_dense_to_sparse(&self, d: u32) -> Option<u32> {
        if d == 0 {
            return None;
        }
        self.inverse.get(d as usize - 1).copied()
    }

    /// Number of mapped indices.
    pub fn len(&self) -> usize {
        self.inverse.len()
    }

    /// Returns true if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.inverse.is_empty()
    }

    /// Largest mapped sparse index.
    pub fn highest_sparse(&self) -> Option<u32> {
        self.inverse.last().copied()
    }
}
