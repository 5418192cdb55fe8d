//! Per-symbol domain: one optional filter per dimension.

use super::{DomainFilter, IntegerMapping};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct DimensionFilter {
    filter: DomainFilter,
    /// `None` for `DomainFilter::All`, which projects as the identity
    mapping: Option<IntegerMapping>,
}

/// Filters for each dimension of a symbol. Each dimension can be filtered at
/// most once.
#[derive(Debug, Clone)]
pub struct Domain {
    dims: Vec<Option<DimensionFilter>>,
}

impl Domain {
    /// Create a domain with no filters for a symbol with `dimension` dimensions
    pub fn new(dimension: usize) -> Self {
        Self {
            dims: vec![None; dimension],
        }
    }

    /// Number of dimensions.
    pub fn dimension(&self) -> usize {
        self.dims.len()
    }

    /// Attaches `filter` to dimension `dim` (zero-based).
    pub fn register_filter(&mut self, dim: usize, filter: DomainFilter) -> Result<()> {
        let dimension = self.dims.len();
        let slot = self.dims.get_mut(dim).ok_or_else(|| {
            Error::invalid_argument(format!(
                "dimension {} out of range for a {}-dimensional domain",
                dim, dimension
            ))
        })?;
        if slot.is_some() {
            return Err(Error::DuplicateFilter { dimension: dim });
        }

        let mapping = match filter {
            DomainFilter::All => None,
            DomainFilter::Members(_) => Some(IntegerMapping::build_from_filter(&filter, 0)),
        };
        *slot = Some(DimensionFilter { filter, mapping });
        Ok(())
    }

    /// Filter registered for `dim`, if any.
    pub fn filter(&self, dim: usize) -> Option<&DomainFilter> {
        self.dims.get(dim)?.as_ref().map(|d| &d.filter)
    }

    /// Mapping used to project `dim`, if it has a member filter.
    pub fn mapping(&self, dim: usize) -> Option<&IntegerMapping> {
        self.dims.get(dim)?.as_ref()?.mapping.as_ref()
    }

    /// Returns true if no dimension carries a filter.
    pub fn is_unfiltered(&self) -> bool {
        self.dims.iter().all(Option::is_none)
    }

    /// Checks every filtered dimension of `tuple`.
    ///
    /// Fails on the first dimension whose index its filter does not admit.
    pub fn validate_tuple(&self, tuple: &[u32]) -> Result<()> {
        if tuple.len() != self.dims.len() {
            return Err(Error::invalid_argument(format!(
                "tuple has {} indices, domain has {} dimensions",
                tuple.len(),
                self.dims.len()
            )));
        }
        for (dimension, (&value, slot)) in tuple.iter().zip(&self.dims).enumerate() {
            if let Some(d) = slot {
                if !d.filter.contains(value) {
                    return Err(Error::DomainViolation { dimension, value });
                }
            }
        }
        Ok(())
    }

    /// Rewrites each filtered dimension through its mapping.
    ///
    /// Returns `None` when some dimension is filtered out, or when the arity
    /// does not match.
    pub fn project_tuple(&self, tuple: &[u32]) -> Option<Vec<u32>> {
        if tuple.len() != self.dims.len() {
            return None;
        }
        tuple
            .iter()
            .zip(&self.dims)
            .map(|(&value, slot)| match slot {
                Some(DimensionFilter {
                    mapping: Some(mapping),
                    ..
                }) => mapping.map_sparse_to_dense(value),
                _ => Some(value),
            })
            .collect()
    }
}
