//! Domain filters: per-dimension restrictions on which label indices a tuple
//! may carry.
//!
//! A `DomainFilter` is either `All` or an ordered set of indices with O(1)
//! membership checks. A `Domain` holds at most one filter per dimension and
//! uses them both to validate tuples on write and to project tuples through
//! an `IntegerMapping` on read.

pub mod domain;
pub mod mapping;

pub use domain::Domain;
pub use mapping::IntegerMapping;

use crate::error::{Error, Result};

/// Admissible label indices for one dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainFilter {
    /// Every index passes.
    All,
    /// Only the listed indices pass.
    Members(MemberSet),
}

impl DomainFilter {
    /// A filter that admits every index
    pub fn all() -> Self {
        DomainFilter::All
    }

    /// A filter admitting exactly `indices`. Order and repeats do not matter;
    /// index 0 is rejected since label indices start at 1.
    pub fn from_indices<I: IntoIterator<Item = u32>>(indices: I) -> Result<Self> {
        Ok(DomainFilter::Members(MemberSet::new(indices)?))
    }

    /// Returns true if `index` passes.
    pub fn contains(&self, index: u32) -> bool {
        match self {
            DomainFilter::All => true,
            DomainFilter::Members(set) => set.contains(index),
        }
    }

    /// Returns true for `DomainFilter::All`.
    pub fn is_all(&self) -> bool {
        matches!(self, DomainFilter::All)
    }

    /// Sorted member list, or `None` for `All`.
    pub fn members(&self) -> Option<&[u32]> {
        match self {
            DomainFilter::All => None,
            DomainFilter::Members(set) => Some(set.as_slice()),
        }
    }

    /// Number of members, or `None` for `All`.
    pub fn len(&self) -> Option<usize> {
        self.members().map(<[u32]>::len)
    }
}

/// Sorted, deduplicated index set backed by a bitmap.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemberSet {
    members: Vec<u32>,
    bits: Vec<u64>,
}

impl MemberSet {
    /// Builds the set from arbitrary indices.
    pub fn new<I: IntoIterator<Item = u32>>(indices: I) -> Result<Self> {
        let mut members: Vec<u32> = indices.into_iter().collect();
        if members.contains(&0) {
            return Err(Error::invalid_argument("label index 0 cannot be a filter member"));
        }
        members.sort_unstable();
        members.dedup();

        let words = members.last().map_or(0, |&max| max as usize / 64 + 1);
        let mut bits = vec![0u64; words];
        for &m in &members {
            bits[m as usize / 64] |= 1u64 << (m % 64);
        }
        Ok(Self { members, bits })
    }

    /// Returns true if `index` is a member.
    pub fn contains(&self, index: u32) -> bool {
        self.bits
            .get(index as usize / 64)
            .is_some_and(|word| word & (1u64 << (index % 64)) != 0)
    }

    /// Members in ascending order.
    pub fn as_slice(&self) -> &[u32] {
        &self.members
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
