//! Write session: declares symbols, validates and buffers records, and lays
//! out the file sections on close.

use crate::acronym::{sentinel_code, AcronymTable};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::filter::{Domain, DomainFilter};
use crate::store::LinkedDataStore;
use crate::stream::{Sections, StreamWriter};
use crate::symbol::{check_text, SymbolId, SymbolInfo, SymbolTable, SymbolType, TableCounts};
use crate::text::SetTextTable;
use crate::uel::{self, UniqueElements};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

/// Most rejected records kept per symbol.
pub const MAX_REJECTED_RECORDS: usize = 11;

/// Why a record was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The index in this zero-based dimension is not a member of its domain
    Domain {
        /// Dimension that failed
        dimension: usize,
    },
    /// The tuple did not sort after the previous one in strict mode
    OutOfOrder,
}

/// A record refused by `write_record`, kept for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    /// Label indices as given
    pub tuple: Vec<u32>,
    /// Values as given
    pub values: Vec<f64>,
    /// Reason for the refusal
    pub reason: Rejection,
}

/// A file open for writing.
///
/// Records are buffered per symbol and each symbol is written as one data
/// section when it is finished, either explicitly or on `close`. A symbol
/// with domain references validates every record against the members of
/// its domain sets, which are finished first.
pub struct WriteSession {
    path: PathBuf,
    writer: StreamWriter,
    options: Options,
    uel: Box<dyn UniqueElements>,
    symbols: SymbolTable,
    acronyms: AcronymTable,
    set_texts: SetTextTable,
    store: LinkedDataStore,
    /// Write-time domains of symbols with buffered records
    domains: FxHashMap<u32, Domain>,
    /// Members of finished one-dimensional sets
    set_members: FxHashMap<u32, DomainFilter>,
    rejected: FxHashMap<u32, Vec<RejectedRecord>>,
    closed: bool,
}

impl WriteSession {
    pub(crate) fn create<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = StreamWriter::create(&path, &options)?;

        log::info!(
            "Opened {:?} for writing (compression={:?}, strict_order={})",
            path,
            options.compression,
            options.strict_order
        );

        Ok(Self {
            path,
            writer,
            uel: uel::new_table(options.case_insensitive_labels),
            symbols: SymbolTable::new(),
            acronyms: AcronymTable::new(),
            set_texts: SetTextTable::new(),
            store: LinkedDataStore::new(options.strict_order),
            domains: FxHashMap::default(),
            set_members: FxHashMap::default(),
            rejected: FxHashMap::default(),
            options,
            closed: false,
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::invalid_state("write session is closed"));
        }
        Ok(())
    }

    /// Path of the file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the index of `label`, interning it if it is new.
    pub fn intern_label(&mut self, label: &str) -> Result<u32> {
        self.check_open()?;
        self.uel.intern(label)
    }

    /// Gives an interned index a new, unused label.
    pub fn rename_label(&mut self, index: u32, label: &str) -> Result<()> {
        self.check_open()?;
        self.uel.rename(index, label)
    }

    /// Label table built so far.
    pub fn uel(&self) -> &dyn UniqueElements {
        self.uel.as_ref()
    }

    /// Declares a symbol.
    ///
    /// `domain` is empty for an unrestricted symbol, or holds one entry per
    /// dimension naming a previously declared one-dimensional set or alias.
    pub fn declare_symbol(
        &mut self,
        name: &str,
        symbol_type: SymbolType,
        dimension: usize,
        domain: &[Option<SymbolId>],
    ) -> Result<SymbolId> {
        self.check_open()?;
        let id = self.symbols.declare(name, symbol_type, dimension, domain)?;
        log::debug!("Declared {:?} {} as {:?}/{}", name, id, symbol_type, dimension);
        Ok(id)
    }

    /// Declares `name` as another name for the set `target`, or for the
    /// universe of labels when `target` is `None`. Aliases hold no records.
    pub fn add_alias(&mut self, name: &str, target: Option<SymbolId>) -> Result<SymbolId> {
        self.check_open()?;
        let id = self.symbols.declare_alias(name, target)?;
        log::debug!("Declared alias {:?} {} of {:?}", name, id, target);
        Ok(id)
    }

    /// Appends a comment line to a symbol.
    pub fn add_comment(&mut self, symbol: SymbolId, comment: &str) -> Result<()> {
        self.check_open()?;
        self.symbols.add_comment(symbol, comment)
    }

    /// Returns the number of `text` in the set text table, adding it if it
    /// is new. Write the number as the value of a set record to attach the
    /// text to that element.
    pub fn add_set_text(&mut self, text: &str) -> Result<u32> {
        self.check_open()?;
        self.set_texts.add(text)
    }

    /// Set text table built so far.
    pub fn set_texts(&self) -> &SetTextTable {
        &self.set_texts
    }

    /// Sets the explanatory text of a symbol.
    pub fn set_text(&mut self, symbol: SymbolId, text: &str) -> Result<()> {
        self.check_open()?;
        check_text(text)?;
        self.symbols.get_mut(symbol)?.text = text.to_string();
        Ok(())
    }

    /// Sets the free-form integer carried with a symbol.
    pub fn set_user_info(&mut self, symbol: SymbolId, user_info: i32) -> Result<()> {
        self.check_open()?;
        self.symbols.get_mut(symbol)?.user_info = user_info;
        Ok(())
    }

    /// Looks a symbol up by id.
    pub fn symbol_info(&self, symbol: SymbolId) -> Result<&SymbolInfo> {
        self.symbols.get(symbol)
    }

    /// Registers an acronym.
    pub fn register_acronym(&mut self, name: &str, code: i32) -> Result<()> {
        self.check_open()?;
        self.acronyms.register(name, code)
    }

    /// Acronyms registered so far, including auto-registered ones.
    pub fn acronyms(&self) -> &AcronymTable {
        &self.acronyms
    }

    /// Records refused so far for `symbol`, at most
    /// `MAX_REJECTED_RECORDS` of them.
    pub fn rejected_records(&self, symbol: SymbolId) -> &[RejectedRecord] {
        self.rejected.get(&symbol.get()).map_or(&[], Vec::as_slice)
    }

    fn reject(&mut self, symbol: SymbolId, tuple: &[u32], values: &[f64], reason: Rejection) {
        let list = self.rejected.entry(symbol.get()).or_default();
        if list.len() < MAX_REJECTED_RECORDS {
            list.push(RejectedRecord {
                tuple: tuple.to_vec(),
                values: values.to_vec(),
                reason,
            });
        }
    }

    /// Buffers one record.
    ///
    /// Every index must be interned. A set record's value is a number from
    /// `add_set_text`, `0` for no text. A record rejected by the symbol's
    /// domain fails with `DomainViolation` and leaves the session usable.
    /// Values with the acronym sentinel shape register their code.
    pub fn write_record(&mut self, symbol: SymbolId, tuple: &[u32], values: &[f64]) -> Result<()> {
        self.check_open()?;
        let info = self.symbols.get(symbol)?;
        if info.symbol_type == SymbolType::Alias {
            return Err(Error::invalid_state(format!(
                "alias {:?} cannot hold records",
                info.name
            )));
        }
        if info.data_offset.is_some() {
            return Err(Error::invalid_state(format!(
                "symbol {:?} has already been written",
                info.name
            )));
        }
        if tuple.len() != info.dimension || values.len() != info.width() {
            return Err(Error::validation(format!(
                "symbol {:?} expects {} indices and {} values, got {} and {}",
                info.name,
                info.dimension,
                info.width(),
                tuple.len(),
                values.len()
            )));
        }
        let labels = self.uel.len() as u32;
        if let Some(&index) = tuple.iter().find(|&&i| i == 0 || i > labels) {
            return Err(Error::not_found(format!("label index {} is not interned", index)));
        }

        let is_set = info.symbol_type == SymbolType::Set;
        let acronym_codes: Vec<i32> = if is_set {
            if self.set_texts.number_of(values[0]).is_none() {
                return Err(Error::validation(format!(
                    "set {:?} value {} is not a set text number",
                    info.name, values[0]
                )));
            }
            Vec::new()
        } else {
            let specials = &self.options.special_values;
            values
                .iter()
                .filter(|&&value| !specials.is_special(value))
                .filter_map(|&value| sentinel_code(value))
                .filter(|&code| self.acronyms.find_by_code(code).is_none())
                .collect()
        };

        if !self.store.contains(symbol.get()) {
            self.open_chain(symbol)?;
        }
        let checked = self
            .domains
            .get(&symbol.get())
            .map_or(Ok(()), |domain| domain.validate_tuple(tuple));
        if let Err(e) = checked {
            log::warn!("Rejected record {:?} for symbol {}: {}", tuple, symbol, e);
            if let Error::DomainViolation { dimension, .. } = e {
                self.reject(symbol, tuple, values, Rejection::Domain { dimension });
            }
            return Err(e);
        }

        if let Err(e) = self.store.append(symbol.get(), tuple, values) {
            if matches!(e, Error::OutOfOrder { .. }) {
                log::warn!("Rejected record {:?} for symbol {}: {}", tuple, symbol, e);
                self.reject(symbol, tuple, values, Rejection::OutOfOrder);
            }
            return Err(e);
        }

        if is_set && values[0] != 0.0 {
            self.symbols.get_mut(symbol)?.has_text = true;
        }
        for code in acronym_codes {
            if self.acronyms.register_unknown(code)? {
                log::debug!("Registered acronym code {} found in symbol {}", code, symbol);
            }
        }
        Ok(())
    }

    /// Buffers one record given by labels, interning new labels first.
    pub fn write_record_labels(
        &mut self,
        symbol: SymbolId,
        labels: &[&str],
        values: &[f64],
    ) -> Result<()> {
        self.check_open()?;
        let tuple = labels
            .iter()
            .map(|label| self.uel.intern(label))
            .collect::<Result<Vec<u32>>>()?;
        self.write_record(symbol, &tuple, values)
    }

    /// Creates the record chain of `symbol` and its write-time domain.
    fn open_chain(&mut self, symbol: SymbolId) -> Result<()> {
        let (dimension, width, refs) = {
            let info = self.symbols.get(symbol)?;
            (info.dimension, info.width(), info.domain.clone())
        };

        if refs.iter().any(Option::is_some) {
            let mut domain = Domain::new(dimension);
            for (dim, set) in refs.iter().enumerate() {
                let Some(set) = *set else { continue };
                // An alias of the universe leaves the dimension unrestricted
                let Some(set) = self.symbols.resolve(set)? else {
                    continue;
                };
                self.finish_symbol(set)?;
                let members = self.set_members.get(&set.get()).cloned().ok_or_else(|| {
                    Error::invalid_state(format!("domain set {} has no member list", set))
                })?;
                domain.register_filter(dim, members)?;
            }
            self.domains.insert(symbol.get(), domain);
        }

        self.store.create_chain(symbol.get(), dimension, width)
    }

    /// Writes the buffered records of `symbol` as its data section.
    ///
    /// No more records can be written for it afterwards. Finishing a symbol
    /// twice is a no-op.
    pub fn finish_symbol(&mut self, symbol: SymbolId) -> Result<()> {
        self.check_open()?;
        let info = self.symbols.get(symbol)?;
        if info.data_offset.is_some() || info.symbol_type == SymbolType::Alias {
            return Ok(());
        }
        let is_domain_set = info.symbol_type == SymbolType::Set && info.dimension == 1;
        if !self.store.contains(symbol.get()) {
            self.store
                .create_chain(symbol.get(), info.dimension, info.width())?;
        }

        let members = if is_domain_set {
            Some(
                self.store
                    .iterate(symbol.get())?
                    .map(|record| record.tuple[0])
                    .collect::<Vec<u32>>(),
            )
        } else {
            None
        };

        let offset = self.writer.begin_section()?;
        let count = self
            .store
            .flush_symbol(symbol.get(), &mut self.writer, &self.options.special_values)?;
        self.domains.remove(&symbol.get());

        let info = self.symbols.get_mut(symbol)?;
        info.data_offset = Some(offset);
        info.record_count = count;
        log::info!("Finished symbol {:?}: {} records at offset {}", info.name, count, offset);

        if let Some(members) = members {
            self.set_members
                .insert(symbol.get(), DomainFilter::from_indices(members)?);
        }
        Ok(())
    }

    /// Finishes every symbol, then writes the directory, the label, acronym
    /// and set text sections and the trailer. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        let pending: Vec<SymbolId> = self
            .symbols
            .iter()
            .filter(|info| info.data_offset.is_none() && info.symbol_type != SymbolType::Alias)
            .map(|info| info.id)
            .collect();
        for symbol in pending {
            self.finish_symbol(symbol)?;
        }

        let counts = TableCounts {
            uels: self.uel.len() as u32,
            acronyms: self.acronyms.len() as u32,
            set_texts: self.set_texts.len() as u32,
        };
        let directory = self.writer.begin_section()?;
        self.symbols.serialize(&mut self.writer, counts)?;
        let uels = self.writer.begin_section()?;
        self.uel.serialize(&mut self.writer)?;
        let acronyms = self.writer.begin_section()?;
        self.acronyms.serialize(&mut self.writer)?;
        let set_texts = self.writer.begin_section()?;
        self.set_texts.serialize(&mut self.writer)?;

        self.writer.close(Sections {
            directory,
            uels,
            acronyms,
            set_texts,
        })?;
        self.closed = true;

        log::info!(
            "Closed {:?}: {} symbols, {} labels, {} acronyms",
            self.path,
            self.symbols.len(),
            self.uel.len(),
            self.acronyms.len()
        );
        Ok(())
    }

    /// Returns true once `close` has succeeded.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for WriteSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        log::warn!("Write session for {:?} dropped without close", self.path);
        if let Err(e) = self.close() {
            log::error!("Error closing {:?} during drop: {}", self.path, e);
        }
    }
}
