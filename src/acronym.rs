//! Acronym table.
//!
//! An acronym is a named integer code that travels through value slots as a
//! sentinel double, `code * 1e301`. The table maps codes to names and is
//! written as its own section:
//!
//! ```text
//! ["_ACRO_"][count: u32]
//! for each acronym: [name][text][code: i32][sentinel bits: u64]
//! ["_ACRO_"]
//! ```

use crate::error::{Error, Result};
use crate::stream::{StreamReader, StreamWriter};
use crate::symbol::{check_identifier, check_text};
use crate::uel::expect_marker;

/// Scale of the acronym sentinel.
pub const ACRONYM_BASE: f64 = 1.0e301;

/// Largest code whose sentinel stays finite with room to spare.
pub const MAX_ACRONYM_CODE: i32 = 10_000_000;

/// Marker bracketing the acronym section.
pub const MARK_ACRONYM: &str = "_ACRO_";

/// Relative tolerance when recognising a sentinel.
const SENTINEL_TOLERANCE: f64 = 1.0e-9;

/// Sentinel double for `code`.
pub fn encode_sentinel(code: i32) -> f64 {
    code as f64 * ACRONYM_BASE
}

/// Code encoded in `value`, if it has the sentinel shape.
pub fn sentinel_code(value: f64) -> Option<i32> {
    if !value.is_finite() || value < ACRONYM_BASE / 2.0 {
        return None;
    }
    let scaled = value / ACRONYM_BASE;
    let code = scaled.round();
    if code < 1.0 || code > MAX_ACRONYM_CODE as f64 {
        return None;
    }
    if ((scaled - code) / code).abs() > SENTINEL_TOLERANCE {
        return None;
    }
    Some(code as i32)
}

/// One registered acronym.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acronym {
    /// Identifier
    pub name: String,
    /// Explanatory text
    pub text: String,
    /// Unique code
    pub code: i32,
}

impl Acronym {
    /// Sentinel double of this acronym.
    pub fn sentinel(&self) -> f64 {
        encode_sentinel(self.code)
    }
}

/// Registered acronyms in registration order.
#[derive(Debug, Clone, Default)]
pub struct AcronymTable {
    entries: Vec<Acronym>,
}

impl AcronymTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an acronym.
    pub fn register(&mut self, name: &str, code: i32) -> Result<()> {
        self.register_with_text(name, "", code)
    }

    /// Adds an acronym with explanatory text.
    pub fn register_with_text(&mut self, name: &str, text: &str, code: i32) -> Result<()> {
        check_identifier(name)?;
        check_text(text)?;
        if code < 1 || code > MAX_ACRONYM_CODE {
            return Err(Error::invalid_argument(format!(
                "acronym code {} outside 1..={}",
                code, MAX_ACRONYM_CODE
            )));
        }
        if self.find_by_code(code).is_some() {
            return Err(Error::DuplicateAcronym { code });
        }
        if self.find_by_name(name).is_some() {
            return Err(Error::validation(format!("acronym {:?} already registered", name)));
        }

        self.entries.push(Acronym {
            name: name.to_string(),
            text: text.to_string(),
            code,
        });
        Ok(())
    }

    /// Registers `code` under a generated name unless it is already known.
    /// The name is `UnknownACRO<code>`, with a numeric suffix if another
    /// acronym already uses it. Returns true if it was added.
    pub fn register_unknown(&mut self, code: i32) -> Result<bool> {
        if self.find_by_code(code).is_some() {
            return Ok(false);
        }
        let base = format!("UnknownACRO{}", code);
        let mut name = base.clone();
        let mut suffix = 1;
        while self.find_by_name(&name).is_some() {
            suffix += 1;
            name = format!("{}_{}", base, suffix);
        }
        self.register(&name, code)?;
        Ok(true)
    }

    /// Looks up by code.
    pub fn find_by_code(&self, code: i32) -> Option<&Acronym> {
        self.entries.iter().find(|a| a.code == code)
    }

    /// Looks up by name, ignoring ASCII case.
    pub fn find_by_name(&self, name: &str) -> Option<&Acronym> {
        self.entries
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Code of a registered acronym whose sentinel is `value`.
    pub fn decode_sentinel(&self, value: f64) -> Option<i32> {
        sentinel_code(value).filter(|&code| self.find_by_code(code).is_some())
    }

    /// Number of acronyms.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Acronyms in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Acronym> + '_ {
        self.entries.iter()
    }

    /// Writes the section.
    pub fn serialize(&self, writer: &mut StreamWriter) -> Result<()> {
        writer.write_string(MARK_ACRONYM)?;
        writer.write_u32(self.entries.len() as u32)?;
        for acronym in &self.entries {
            writer.write_string(&acronym.name)?;
            writer.write_string(&acronym.text)?;
            writer.write_i32(acronym.code)?;
            writer.write_u64(acronym.sentinel().to_bits())?;
        }
        writer.write_string(MARK_ACRONYM)
    }

    /// Reads a section written by `serialize`.
    pub fn deserialize(reader: &mut StreamReader, expected: u32) -> Result<Self> {
        expect_marker(reader, MARK_ACRONYM)?;
        let count = reader.read_u32()?;
        if count != expected {
            return Err(Error::corruption(format!(
                "acronym section holds {} entries, directory says {}",
                count, expected
            )));
        }

        let mut table = AcronymTable::new();
        for _ in 0..count {
            let name = reader.read_string()?;
            let text = reader.read_string()?;
            let code = reader.read_i32()?;
            let bits = reader.read_u64()?;
            if bits != encode_sentinel(code).to_bits() {
                return Err(Error::corruption(format!(
                    "acronym {:?} sentinel does not match code {}",
                    name, code
                )));
            }
            table
                .register_with_text(&name, &text, code)
                .map_err(|e| Error::corruption(format!("bad acronym entry: {}", e)))?;
        }
        expect_marker(reader, MARK_ACRONYM)?;
        Ok(table)
    }
}
