//! Symbol declarations and the symbol directory.
//!
//! ## Directory Format
//!
//! ```text
//! ["_SYMB_"][uel_count: u32][acronym_count: u32][set_text_count: u32]
//! [symbol_count: u32]
//! for each symbol:
//!   [name][type: u8][dimension: u8][user_info: i32]
//!   [record_count: u64][data_offset: u64][text]
//!   [domain: u32 per dimension, 0 = unrestricted]
//!   [has_text: u8][alias_of: u32, 0 = universe or not an alias]
//!   [comment_count: u32][comment]*
//! ["_SYMB_"]
//! ```

use crate::error::{Error, Result};
use crate::stream::{StreamReader, StreamWriter};
use crate::uel::{expect_marker, CaseInsensitive, StrHashTable};
use std::fmt;

/// Largest symbol dimension.
pub const MAX_DIM: usize = 20;

/// Longest identifier, in bytes.
pub const MAX_NAME_LEN: usize = 63;

/// Longest explanatory text, in bytes.
pub const MAX_TEXT_LEN: usize = 255;

/// Marker bracketing the directory.
pub const MARK_SYMB: &str = "_SYMB_";

/// Most comment lines kept per symbol.
pub const MAX_COMMENTS: usize = 1024;

/// Offset stored for a symbol whose data was never written.
const NO_DATA: u64 = u64::MAX;

/// 1-based symbol number, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    /// Wraps a raw symbol number
    pub fn new(n: u32) -> Self {
        SymbolId(n)
    }

    /// The raw symbol number
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kinds of symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SymbolType {
    /// Membership only
    Set = 0,
    /// One value per record
    Parameter = 1,
    /// Level, marginal, lower, upper, scale
    Variable = 2,
    /// Same layout as a variable
    Equation = 3,
    /// Second name for a set; carries no data of its own
    Alias = 4,
}

impl SymbolType {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SymbolType::Set),
            1 => Some(SymbolType::Parameter),
            2 => Some(SymbolType::Variable),
            3 => Some(SymbolType::Equation),
            4 => Some(SymbolType::Alias),
            _ => None,
        }
    }

    /// Number of values each record carries. A set record holds its
    /// element text number; an alias reads like the set it names.
    pub fn width(self) -> usize {
        match self {
            SymbolType::Set | SymbolType::Alias | SymbolType::Parameter => 1,
            SymbolType::Variable | SymbolType::Equation => 5,
        }
    }
}

/// Checks identifier rules: an ASCII letter, then letters, digits or `_`,
/// at most 63 bytes.
pub fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !valid || name.len() > MAX_NAME_LEN {
        return Err(Error::validation(format!("invalid identifier {:?}", name)));
    }
    Ok(())
}

/// Checks explanatory text: at most 255 bytes and no control characters.
pub fn check_text(text: &str) -> Result<()> {
    if text.len() > MAX_TEXT_LEN {
        return Err(Error::validation(format!(
            "text is longer than {} bytes",
            MAX_TEXT_LEN
        )));
    }
    if text.chars().any(char::is_control) {
        return Err(Error::validation("text contains a control character"));
    }
    Ok(())
}

/// Everything the directory records about one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    /// Symbol number
    pub id: SymbolId,
    /// Name as declared
    pub name: String,
    /// Kind of symbol
    pub symbol_type: SymbolType,
    /// Number of index positions
    pub dimension: usize,
    /// Domain set per dimension; `None` means unrestricted
    pub domain: Vec<Option<SymbolId>>,
    /// Explanatory text
    pub text: String,
    /// Free-form integer carried through the file
    pub user_info: i32,
    /// Records written
    pub record_count: u64,
    /// Physical offset of the data section, once written
    pub data_offset: Option<u64>,
    /// Set only: some element carries text
    pub has_text: bool,
    /// Alias only: the aliased symbol, `None` for the universe
    pub alias_of: Option<SymbolId>,
    /// Comment lines in the order they were added
    pub comments: Vec<String>,
}

impl SymbolInfo {
    /// Values per record.
    pub fn width(&self) -> usize {
        self.symbol_type.width()
    }

    /// Returns true for a set or an alias of one.
    pub fn is_set_like(&self) -> bool {
        matches!(self.symbol_type, SymbolType::Set | SymbolType::Alias)
    }
}

/// Declared symbols in declaration order, with a case-insensitive name index.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<SymbolInfo>,
    names: StrHashTable<CaseInsensitive>,
}

impl SymbolTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a symbol and returns its id.
    ///
    /// `domain` must be empty (unrestricted) or have one entry per dimension;
    /// each entry must name an already declared one-dimensional set or alias.
    pub fn declare(
        &mut self,
        name: &str,
        symbol_type: SymbolType,
        dimension: usize,
        domain: &[Option<SymbolId>],
    ) -> Result<SymbolId> {
        if symbol_type == SymbolType::Alias {
            return Err(Error::validation(format!(
                "alias {:?} must be declared with declare_alias",
                name
            )));
        }
        self.check_new_name(name)?;
        if dimension > MAX_DIM {
            return Err(Error::validation(format!(
                "dimension {} exceeds the maximum of {}",
                dimension, MAX_DIM
            )));
        }
        let domain = if domain.is_empty() {
            vec![None; dimension]
        } else if domain.len() == dimension {
            for set in domain.iter().flatten() {
                let info = self.get(*set).map_err(|_| {
                    Error::validation(format!("domain {} of {:?} is not declared", set, name))
                })?;
                if !info.is_set_like() || info.dimension != 1 {
                    return Err(Error::validation(format!(
                        "domain {:?} of {:?} is not a one-dimensional set",
                        info.name, name
                    )));
                }
            }
            domain.to_vec()
        } else {
            return Err(Error::validation(format!(
                "{:?} has {} dimensions but {} domain entries",
                name,
                dimension,
                domain.len()
            )));
        };

        Ok(self.push(name, symbol_type, dimension, domain))
    }

    /// Adds `name` as an alias of the set `target`, or of the universe of
    /// labels when `target` is `None`.
    pub fn declare_alias(&mut self, name: &str, target: Option<SymbolId>) -> Result<SymbolId> {
        self.check_new_name(name)?;
        let (dimension, text) = match target {
            Some(target) => {
                let info = self.get(target)?;
                if !info.is_set_like() {
                    return Err(Error::validation(format!(
                        "{:?} cannot alias {:?}, which is not a set",
                        name, info.name
                    )));
                }
                (info.dimension, format!("Aliased with {}", info.name))
            }
            None => (1, "Aliased with *".to_string()),
        };

        let id = self.push(name, SymbolType::Alias, dimension, vec![None; dimension]);
        let info = self.get_mut(id)?;
        info.alias_of = target;
        info.text = text;
        Ok(id)
    }

    fn check_new_name(&self, name: &str) -> Result<()> {
        check_identifier(name)?;
        if self.names.get(name).is_some() {
            return Err(Error::validation(format!("symbol {:?} already declared", name)));
        }
        Ok(())
    }

    fn push(
        &mut self,
        name: &str,
        symbol_type: SymbolType,
        dimension: usize,
        domain: Vec<Option<SymbolId>>,
    ) -> SymbolId {
        let (n, _) = self.names.insert(name);
        let id = SymbolId(n);
        self.symbols.push(SymbolInfo {
            id,
            name: name.to_string(),
            symbol_type,
            dimension,
            domain,
            text: String::new(),
            user_info: 0,
            record_count: 0,
            data_offset: None,
            has_text: false,
            alias_of: None,
            comments: Vec::new(),
        });
        id
    }

    /// The set whose records `id` stands for: `id` itself unless it is an
    /// alias, in which case aliases are followed to a set. `None` means the
    /// universe of labels.
    pub fn resolve(&self, id: SymbolId) -> Result<Option<SymbolId>> {
        let mut current = id;
        for _ in 0..=self.symbols.len() {
            let info = self.get(current)?;
            if info.symbol_type != SymbolType::Alias {
                return Ok(Some(current));
            }
            match info.alias_of {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Err(Error::corruption(format!("alias cycle through {}", id)))
    }

    /// Appends a comment line to a symbol.
    pub fn add_comment(&mut self, id: SymbolId, comment: &str) -> Result<()> {
        check_text(comment)?;
        let info = self.get_mut(id)?;
        if info.comments.len() >= MAX_COMMENTS {
            return Err(Error::validation(format!(
                "{:?} already has {} comment lines",
                info.name, MAX_COMMENTS
            )));
        }
        info.comments.push(comment.to_string());
        Ok(())
    }

    /// Looks a symbol up by id.
    pub fn get(&self, id: SymbolId) -> Result<&SymbolInfo> {
        id.0
            .checked_sub(1)
            .and_then(|i| self.symbols.get(i as usize))
            .ok_or_else(|| Error::not_found(format!("symbol {}", id)))
    }

    /// Mutable lookup by id.
    pub fn get_mut(&mut self, id: SymbolId) -> Result<&mut SymbolInfo> {
        id.0
            .checked_sub(1)
            .and_then(|i| self.symbols.get_mut(i as usize))
            .ok_or_else(|| Error::not_found(format!("symbol {}", id)))
    }

    /// Looks a symbol up by name, ignoring ASCII case.
    pub fn find(&self, name: &str) -> Option<SymbolId> {
        self.names.get(name).map(SymbolId)
    }

    /// Symbols in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolInfo> + '_ {
        self.symbols.iter()
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns true if nothing was declared.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Writes the directory.
    pub fn serialize(&self, writer: &mut StreamWriter, counts: TableCounts) -> Result<()> {
        writer.write_string(MARK_SYMB)?;
        writer.write_u32(counts.uels)?;
        writer.write_u32(counts.acronyms)?;
        writer.write_u32(counts.set_texts)?;
        writer.write_u32(self.symbols.len() as u32)?;
        for info in &self.symbols {
            writer.write_string(&info.name)?;
            writer.write_u8(info.symbol_type as u8)?;
            writer.write_u8(info.dimension as u8)?;
            writer.write_i32(info.user_info)?;
            writer.write_u64(info.record_count)?;
            writer.write_u64(info.data_offset.unwrap_or(NO_DATA))?;
            writer.write_string(&info.text)?;
            for set in &info.domain {
                writer.write_u32(set.map_or(0, SymbolId::get))?;
            }
            writer.write_u8(info.has_text as u8)?;
            writer.write_u32(info.alias_of.map_or(0, SymbolId::get))?;
            writer.write_u32(info.comments.len() as u32)?;
            for comment in &info.comments {
                writer.write_string(comment)?;
            }
        }
        writer.write_string(MARK_SYMB)
    }

    /// Reads a directory written by `serialize`.
    pub fn deserialize(reader: &mut StreamReader) -> Result<Directory> {
        expect_marker(reader, MARK_SYMB)?;
        let counts = TableCounts {
            uels: reader.read_u32()?,
            acronyms: reader.read_u32()?,
            set_texts: reader.read_u32()?,
        };
        let count = reader.read_u32()?;

        let mut table = SymbolTable::new();
        for n in 1..=count {
            let name = reader.read_string()?;
            let raw_type = reader.read_u8()?;
            let symbol_type = SymbolType::from_u8(raw_type)
                .ok_or_else(|| Error::corruption(format!("unknown symbol type {}", raw_type)))?;
            let dimension = reader.read_u8()? as usize;
            let user_info = reader.read_i32()?;
            let record_count = reader.read_u64()?;
            let data_offset = match reader.read_u64()? {
                NO_DATA => None,
                offset => Some(offset),
            };
            let text = reader.read_string()?;
            let mut domain = Vec::with_capacity(dimension.min(MAX_DIM));
            for _ in 0..dimension.min(MAX_DIM) {
                let set = reader.read_u32()?;
                domain.push((set != 0).then_some(SymbolId(set)));
            }
            let has_text = reader.read_u8()? != 0;
            let alias_of = match reader.read_u32()? {
                0 => None,
                target => Some(SymbolId(target)),
            };
            let comment_count = reader.read_u32()? as usize;
            if comment_count > MAX_COMMENTS {
                return Err(Error::corruption(format!(
                    "directory entry {} has {} comment lines",
                    n, comment_count
                )));
            }
            let mut comments = Vec::with_capacity(comment_count);
            for _ in 0..comment_count {
                comments.push(reader.read_string()?);
            }

            let bad_entry = |e: Error| Error::corruption(format!("bad directory entry {}: {}", n, e));
            let id = if symbol_type == SymbolType::Alias {
                let id = table.declare_alias(&name, alias_of).map_err(bad_entry)?;
                if table.get(id)?.dimension != dimension {
                    return Err(Error::corruption(format!(
                        "alias {:?} dimension does not match its set",
                        name
                    )));
                }
                id
            } else {
                table
                    .declare(&name, symbol_type, dimension, &domain)
                    .map_err(bad_entry)?
            };
            if id.0 != n {
                return Err(Error::corruption(format!("directory entry {} out of sequence", n)));
            }
            let info = table.get_mut(id)?;
            info.user_info = user_info;
            info.record_count = record_count;
            info.data_offset = data_offset;
            info.text = text;
            info.has_text = has_text;
            info.comments = comments;
        }
        expect_marker(reader, MARK_SYMB)?;

        Ok(Directory {
            symbols: table,
            counts,
        })
    }
}

/// Entry counts of the tables written after the directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    /// Labels in the UEL section
    pub uels: u32,
    /// Entries in the acronym section
    pub acronyms: u32,
    /// Entries in the set text section
    pub set_texts: u32,
}

/// Result of reading the directory section.
#[derive(Debug, Clone)]
pub struct Directory {
    /// Declared symbols
    pub symbols: SymbolTable,
    /// Table sizes recorded with the directory
    pub counts: TableCounts,
}
