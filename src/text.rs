//! Set element text.
//!
//! A set record carries a single value: the number of an entry in this
//! table, where `0` means the element has no text. Entry 0 is always the
//! empty string and equal texts share one number.
//!
//! ## Section Format
//!
//! ```text
//! ["_SETT_"][count: u32][text]*["_SETT_"]
//! ```

use crate::error::{Error, Result};
use crate::stream::{StreamReader, StreamWriter};
use crate::symbol::check_text;
use crate::uel::{expect_marker, CaseSensitive, StrHashTable};

/// Marker bracketing the set text section.
pub const MARK_SET_TEXT: &str = "_SETT_";

/// Texts referenced from set records, numbered from 0.
#[derive(Debug, Clone)]
pub struct SetTextTable {
    texts: StrHashTable<CaseSensitive>,
}

impl Default for SetTextTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SetTextTable {
    /// Create a table holding only the empty text
    pub fn new() -> Self {
        let mut texts = StrHashTable::new();
        texts.insert("");
        Self { texts }
    }

    /// Returns the number of `text`, adding it if it is new.
    pub fn add(&mut self, text: &str) -> Result<u32> {
        check_text(text)?;
        let (n, _) = self.texts.insert(text);
        Ok(n - 1)
    }

    /// Text stored under `number`.
    pub fn get(&self, number: u32) -> Option<&str> {
        self.texts.key(number.checked_add(1)?)
    }

    /// Number of `text`, if present.
    pub fn find(&self, text: &str) -> Option<u32> {
        self.texts.get(text).map(|n| n - 1)
    }

    /// Number of entries, the empty text included.
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    /// Returns true if only the empty text is present.
    pub fn is_empty(&self) -> bool {
        self.texts.len() <= 1
    }

    /// Text number held in a set record value, if it is a whole number of
    /// an existing entry.
    pub fn number_of(&self, value: f64) -> Option<u32> {
        if value.fract() != 0.0 || value < 0.0 || value >= self.len() as f64 {
            return None;
        }
        Some(value as u32)
    }

    /// Writes the section.
    pub fn serialize(&self, writer: &mut StreamWriter) -> Result<()> {
        writer.write_string(MARK_SET_TEXT)?;
        writer.write_u32(self.texts.len() as u32)?;
        for (_, text) in self.texts.iter() {
            writer.write_string(text)?;
        }
        writer.write_string(MARK_SET_TEXT)
    }

    /// Reads a section written by `serialize`.
    ///
    /// `expected` is the count recorded in the symbol directory.
    pub fn deserialize(reader: &mut StreamReader, expected: u32) -> Result<Self> {
        expect_marker(reader, MARK_SET_TEXT)?;
        let count = reader.read_u32()?;
        if count != expected {
            return Err(Error::corruption(format!(
                "set text section holds {} entries, directory says {}",
                count, expected
            )));
        }

        let mut texts = StrHashTable::<CaseSensitive>::with_capacity(count as usize);
        for i in 0..count {
            let text = reader.read_string()?;
            if i == 0 && !text.is_empty() {
                return Err(Error::corruption("set text 0 is not empty"));
            }
            let (_, added) = texts.insert(&text);
            if !added {
                return Err(Error::corruption(format!("duplicate set text {:?} at {}", text, i)));
            }
        }
        if texts.is_empty() {
            texts.insert("");
        }
        expect_marker(reader, MARK_SET_TEXT)?;
        Ok(Self { texts })
    }
}
