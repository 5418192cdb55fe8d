//! Read session: loads the directory and tables on open, then reads symbol
//! data on demand.

use crate::acronym::AcronymTable;
use crate::error::{Error, Result};
use crate::filter::{Domain, DomainFilter};
use crate::store::{LinkedDataStore, Record};
use crate::stream::{FileHeader, StreamReader};
use crate::symbol::{SymbolId, SymbolInfo, SymbolTable};
use crate::text::SetTextTable;
use crate::uel::{self, UniqueElements};
use crate::value::SpecialValues;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};

/// A file open for reading.
///
/// A symbol's data section is loaded when its first record is requested and
/// its records are freed as they are consumed. Filters registered before
/// that point restrict and renumber the records returned.
pub struct ReadSession {
    path: PathBuf,
    reader: StreamReader,
    symbols: SymbolTable,
    uel: Box<dyn UniqueElements>,
    acronyms: AcronymTable,
    set_texts: SetTextTable,
    specials: SpecialValues,
    store: LinkedDataStore,
    filters: FxHashMap<u32, Domain>,
    /// Symbols whose data has been loaded since open or the last rewind
    started: FxHashSet<u32>,
    closed: bool,
}

impl ReadSession {
    pub(crate) fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut reader = StreamReader::open(&path)?;
        let sections = reader.trailer().sections;

        reader.seek(sections.directory)?;
        let directory = SymbolTable::deserialize(&mut reader)?;
        for info in directory.symbols.iter() {
            if let Some(offset) = info.data_offset {
                if !reader.block_index().contains(offset) {
                    return Err(Error::corruption(format!(
                        "data offset {} of {:?} is not a block boundary",
                        offset, info.name
                    )));
                }
            }
        }

        reader.seek(sections.uels)?;
        let case_insensitive = reader.header().case_insensitive;
        let uel = uel::read_table(&mut reader, directory.counts.uels, case_insensitive)?;

        reader.seek(sections.acronyms)?;
        let acronyms = AcronymTable::deserialize(&mut reader, directory.counts.acronyms)?;

        reader.seek(sections.set_texts)?;
        let set_texts = SetTextTable::deserialize(&mut reader, directory.counts.set_texts)?;

        log::info!(
            "Opened {:?} for reading: {} symbols, {} labels, {} acronyms",
            path,
            directory.symbols.len(),
            uel.len(),
            acronyms.len()
        );

        Ok(Self {
            path,
            reader,
            symbols: directory.symbols,
            uel,
            acronyms,
            set_texts,
            specials: SpecialValues::default(),
            store: LinkedDataStore::new(false),
            filters: FxHashMap::default(),
            started: FxHashSet::default(),
            closed: false,
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::invalid_state("read session is closed"));
        }
        Ok(())
    }

    /// Path of the file being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File header.
    pub fn header(&self) -> &FileHeader {
        self.reader.header()
    }

    /// Symbols in declaration order.
    pub fn symbols(&self) -> impl Iterator<Item = &SymbolInfo> + '_ {
        self.symbols.iter()
    }

    /// Looks a symbol up by name, ignoring ASCII case.
    pub fn find_symbol(&self, name: &str) -> Option<SymbolId> {
        self.symbols.find(name)
    }

    /// Looks a symbol up by id.
    pub fn symbol_info(&self, symbol: SymbolId) -> Result<&SymbolInfo> {
        self.symbols.get(symbol)
    }

    /// Label table.
    pub fn uel(&self) -> &dyn UniqueElements {
        self.uel.as_ref()
    }

    /// Acronym table.
    pub fn acronyms(&self) -> &AcronymTable {
        &self.acronyms
    }

    /// Set element text table.
    pub fn set_texts(&self) -> &SetTextTable {
        &self.set_texts
    }

    /// Text stored under `number`, the value of a set record.
    pub fn elem_text(&self, number: u32) -> Option<&str> {
        self.set_texts.get(number)
    }

    /// Returns true if some element of the set `symbol` carries text.
    pub fn set_has_text(&self, symbol: SymbolId) -> Result<bool> {
        let Some(set) = self.symbols.resolve(symbol)? else {
            return Ok(false);
        };
        Ok(self.symbols.get(set)?.has_text)
    }

    /// Doubles returned for special-value tags.
    pub fn special_values(&self) -> &SpecialValues {
        &self.specials
    }

    /// Replaces the doubles returned for special-value tags. Applies to
    /// symbols loaded afterwards.
    pub fn set_special_values(&mut self, specials: SpecialValues) -> Result<()> {
        specials.validate()?;
        self.specials = specials;
        Ok(())
    }

    /// Restricts dimension `dim` (zero-based) of `symbol` to `filter`.
    ///
    /// Records outside the filter are skipped; indices of filtered
    /// dimensions are returned as positions within the filter, starting at 1.
    /// Filters must be registered before the symbol is read.
    pub fn register_filter(
        &mut self,
        symbol: SymbolId,
        dim: usize,
        filter: DomainFilter,
    ) -> Result<()> {
        self.check_open()?;
        let dimension = self.symbols.get(symbol)?.dimension;
        if self.started.contains(&symbol.get()) {
            return Err(Error::invalid_state(format!(
                "symbol {} is being read; rewind it before adding filters",
                symbol
            )));
        }
        self.filters
            .entry(symbol.get())
            .or_insert_with(|| Domain::new(dimension))
            .register_filter(dim, filter)
    }

    /// Loads the data section of `symbol` unless reading has already started.
    /// An alias loads the records of the set it names; an alias of the
    /// universe yields one record per label.
    fn ensure_loaded(&mut self, symbol: SymbolId) -> Result<()> {
        if self.started.contains(&symbol.get()) {
            return Ok(());
        }
        let Some(source) = self.symbols.resolve(symbol)? else {
            self.store.create_chain(symbol.get(), 1, 1)?;
            for index in 1..=self.uel.len() as u32 {
                self.store.append(symbol.get(), &[index], &[0.0])?;
            }
            self.started.insert(symbol.get());
            return Ok(());
        };
        let info = self.symbols.get(source)?;
        if let Some(offset) = info.data_offset {
            self.reader.seek(offset)?;
            self.store.load_symbol(
                symbol.get(),
                &mut self.reader,
                info.dimension,
                info.width(),
                info.record_count,
                &self.specials,
            )?;
            log::debug!(
                "Loaded {} records of {:?} from offset {}",
                info.record_count,
                info.name,
                offset
            );
        }
        self.started.insert(symbol.get());
        Ok(())
    }

    /// Next stored record of `symbol` passing its filters, together with the
    /// projected tuple.
    fn next_filtered(&mut self, symbol: SymbolId) -> Result<Option<(Record, Vec<u32>)>> {
        self.check_open()?;
        self.ensure_loaded(symbol)?;

        while let Some(record) = self.store.pop_front(symbol.get()) {
            let projected = match self.filters.get(&symbol.get()) {
                Some(domain) => match domain.project_tuple(&record.tuple) {
                    Some(tuple) => tuple,
                    None => continue,
                },
                None => record.tuple.clone(),
            };
            return Ok(Some((record, projected)));
        }
        Ok(None)
    }

    /// Next record of `symbol`, or `None` at the end of its data.
    pub fn read_record(&mut self, symbol: SymbolId) -> Result<Option<Record>> {
        Ok(self
            .next_filtered(symbol)?
            .map(|(record, tuple)| Record {
                tuple,
                values: record.values,
            }))
    }

    /// Next record of `symbol` with its indices resolved to labels.
    /// Filters skip records but the labels are always the stored ones.
    pub fn read_record_labels(
        &mut self,
        symbol: SymbolId,
    ) -> Result<Option<(Vec<String>, Vec<f64>)>> {
        let Some((record, _)) = self.next_filtered(symbol)? else {
            return Ok(None);
        };
        let labels = record
            .tuple
            .iter()
            .map(|&index| {
                self.uel
                    .lookup_label(index)
                    .map(str::to_string)
                    .ok_or_else(|| Error::corruption(format!("label index {} is not in the table", index)))
            })
            .collect::<Result<Vec<String>>>()?;
        Ok(Some((labels, record.values)))
    }

    /// Every remaining record of `symbol`.
    pub fn read_symbol(&mut self, symbol: SymbolId) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.read_record(symbol)? {
            records.push(record);
        }
        Ok(records)
    }

    /// Discards what is left of the current pass over `symbol` so the next
    /// read starts from its first record again.
    pub fn rewind(&mut self, symbol: SymbolId) -> Result<()> {
        self.check_open()?;
        self.symbols.get(symbol)?;
        self.started.remove(&symbol.get());
        self.store.remove(symbol.get());
        Ok(())
    }

    /// Releases buffered records. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.store.clear();
        self.started.clear();
        self.reader.close();
        self.closed = true;
        log::info!("Closed {:?}", self.path);
    }
}
