//! Unique Element Table.
//!
//! Interns labels and assigns each one a dense, 1-based index in first-seen
//! order. Indices are never reused; a label may be renamed in place.
//!
//! Two instantiations share one implementation: `UelTable<CaseSensitive>` and
//! `UelTable<CaseInsensitive>`. A session picks one at open time and uses it
//! through the `UniqueElements` trait object.
//!
//! ## Section Format
//!
//! ```text
//! ["_UEL_"][count: u32][label]*["_UEL_"]
//! ```

pub mod hash;

pub use hash::{CaseInsensitive, CaseSensitive, LabelCase, RenameError, StrHashTable};

use crate::error::{Error, Result};
use crate::stream::{StreamReader, StreamWriter};

/// Longest accepted label, in bytes.
pub const MAX_LABEL_LEN: usize = 63;

/// Marker bracketing the UEL section.
pub const MARK_UEL: &str = "_UEL_";

/// Strips trailing blanks and checks the label rules: non-empty, at most 63
/// bytes, no control characters, and not both kinds of quote.
pub fn check_label(label: &str) -> Result<&str> {
    let label = label.trim_end_matches(' ');
    if label.is_empty() {
        return Err(Error::validation("empty label"));
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(Error::validation(format!(
            "label {:?} is longer than {} bytes",
            label, MAX_LABEL_LEN
        )));
    }
    if label.chars().any(|c| c.is_control()) {
        return Err(Error::validation(format!(
            "label {:?} contains a control character",
            label
        )));
    }
    if label.contains('\'') && label.contains('"') {
        return Err(Error::validation(format!(
            "label {:?} mixes single and double quotes",
            label
        )));
    }
    Ok(label)
}

/// Interned labels with O(1) lookup in both directions.
#[derive(Debug, Clone, Default)]
pub struct UelTable<C: LabelCase> {
    table: StrHashTable<C>,
}

impl<C: LabelCase> UelTable<C> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            table: StrHashTable::new(),
        }
    }

    /// Returns the index of `label`, adding it first if it is new.
    pub fn intern(&mut self, label: &str) -> Result<u32> {
        let label = check_label(label)?;
        if self.table.len() >= u32::MAX as usize - 1 {
            return Err(Error::invalid_state("label table is full"));
        }
        Ok(self.table.insert(label).0)
    }

    /// Index of `label`, if interned.
    pub fn lookup_index(&self, label: &str) -> Option<u32> {
        self.table.get(label.trim_end_matches(' '))
    }

    /// Label stored under `index`.
    pub fn lookup_label(&self, index: u32) -> Option<&str> {
        self.table.key(index)
    }

    /// Gives `index` a new label.
    pub fn rename(&mut self, index: u32, label: &str) -> Result<()> {
        let label = check_label(label)?;
        self.table.rename(index, label).map_err(|e| match e {
            RenameError::Missing => Error::not_found(format!("label index {}", index)),
            RenameError::Taken(other) => Error::validation(format!(
                "label {:?} is already interned as index {}",
                label, other
            )),
        })
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if no label has been interned.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Labels in index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.table.iter()
    }

    /// Writes the section.
    pub fn serialize(&self, writer: &mut StreamWriter) -> Result<()> {
        writer.write_string(MARK_UEL)?;
        writer.write_u32(self.table.len() as u32)?;
        for (_, label) in self.table.iter() {
            writer.write_string(label)?;
        }
        writer.write_string(MARK_UEL)
    }

    /// Reads a section written by `serialize`.
    ///
    /// `expected` is the count recorded in the symbol directory.
    pub fn deserialize(reader: &mut StreamReader, expected: u32) -> Result<Self> {
        expect_marker(reader, MARK_UEL)?;
        let count = reader.read_u32()?;
        if count != expected {
            return Err(Error::corruption(format!(
                "UEL section holds {} labels, directory says {}",
                count, expected
            )));
        }

        let mut table = StrHashTable::<C>::with_capacity(count as usize);
        for i in 0..count {
            let label = reader.read_string()?;
            let (n, added) = table.insert(&label);
            if !added {
                return Err(Error::corruption(format!(
                    "duplicate label {:?} at index {} (first seen at {})",
                    label,
                    i + 1,
                    n
                )));
            }
        }
        expect_marker(reader, MARK_UEL)?;
        Ok(Self { table })
    }
}

/// Reads a section marker and fails with `Corruption` if it is not `marker`.
pub(crate) fn expect_marker(reader: &mut StreamReader, marker: &str) -> Result<()> {
    let found = reader.read_string()?;
    if found != marker {
        return Err(Error::corruption(format!(
            "expected section marker {:?}, found {:?}",
            marker, found
        )));
    }
    Ok(())
}

/// Object-safe view of a `UelTable`, whichever case rule it uses.
pub trait UniqueElements: Send + Sync {
    /// Returns the index of `label`, adding it first if it is new.
    fn intern(&mut self, label: &str) -> Result<u32>;
    /// Index of `label`, if interned.
    fn lookup_index(&self, label: &str) -> Option<u32>;
    /// Label stored under `index`.
    fn lookup_label(&self, index: u32) -> Option<&str>;
    /// Gives `index` a new label.
    fn rename(&mut self, index: u32, label: &str) -> Result<()>;
    /// Number of labels.
    fn len(&self) -> usize;
    /// Returns true if no label has been interned.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Returns true if labels compare without regard to ASCII case.
    fn is_case_insensitive(&self) -> bool;
    /// Writes the section.
    fn serialize(&self, writer: &mut StreamWriter) -> Result<()>;
}

impl<C: LabelCase> UniqueElements for UelTable<C> {
    fn intern(&mut self, label: &str) -> Result<u32> {
        UelTable::intern(self, label)
    }

    fn lookup_index(&self, label: &str) -> Option<u32> {
        UelTable::lookup_index(self, label)
    }

    fn lookup_label(&self, index: u32) -> Option<&str> {
        UelTable::lookup_label(self, index)
    }

    fn rename(&mut self, index: u32, label: &str) -> Result<()> {
        UelTable::rename(self, index, label)
    }

    fn len(&self) -> usize {
        UelTable::len(self)
    }

    fn is_case_insensitive(&self) -> bool {
        C::is_case_insensitive()
    }

    fn serialize(&self, writer: &mut StreamWriter) -> Result<()> {
        UelTable::serialize(self, writer)
    }
}

/// Creates an empty table with the requested case rule.
pub fn new_table(case_insensitive: bool) -> Box<dyn UniqueElements> {
    if case_insensitive {
        Box::new(UelTable::<CaseInsensitive>::new())
    } else {
        Box::new(UelTable::<CaseSensitive>::new())
    }
}

/// Reads a UEL section with the requested case rule.
pub fn read_table(
    reader: &mut StreamReader,
    expected: u32,
    case_insensitive: bool,
) -> Result<Box<dyn UniqueElements>> {
    Ok(if case_insensitive {
        Box::new(UelTable::<CaseInsensitive>::deserialize(reader, expected)?)
    } else {
        Box::new(UelTable::<CaseSensitive>::deserialize(reader, expected)?)
    })
}
