//! # sdx - A Sparse Symbol Data-Exchange Engine
//!
//! sdx reads and writes a compressed binary container of named symbols
//! (sets, aliases, parameters, variables and equations) whose records are
//! keyed by tuples of string labels.
//!
//! ## Architecture
//!
//! The engine consists of several key components:
//!
//! - **Stream**: block-compressed, checksummed byte stream with typed primitives
//! - **UEL**: the unique element table interning labels to dense indices
//! - **Filters**: per-dimension domain filters and the integer mappings they induce
//! - **Store**: arena-backed record chains, one per symbol
//! - **Acronyms**: named codes carried through values as sentinel doubles
//! - **Set text**: the string table referenced by set element values
//! - **Session**: the read and write facades wiring the rest together
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sdx::{open_read, open_write, Options, SymbolType};
//!
//! # fn main() -> Result<(), sdx::Error> {
//! let mut out = open_write("demand.sdx", Options::default())?;
//! let i = out.declare_symbol("i", SymbolType::Set, 1, &[])?;
//! let d = out.declare_symbol("demand", SymbolType::Parameter, 1, &[Some(i)])?;
//! let sea = out.add_set_text("Seattle, Washington")?;
//! out.write_record_labels(i, &["seattle"], &[sea as f64])?;
//! out.write_record_labels(i, &["chicago"], &[0.0])?;
//! out.write_record_labels(d, &["seattle"], &[325.0])?;
//! out.close()?;
//!
//! let mut input = open_read("demand.sdx")?;
//! let d = input.find_symbol("demand").expect("declared above");
//! while let Some((labels, values)) = input.read_record_labels(d)? {
//!     println!("{:?} = {:?}", labels, values);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod acronym;
pub mod config;
pub mod error;
pub mod filter;
pub mod session;
pub mod store;
pub mod stream;
pub mod symbol;
pub mod text;
pub mod uel;
pub mod value;

// Re-exports
pub use acronym::{Acronym, AcronymTable};
pub use config::{CompressionType, Options};
pub use error::{Error, Result};
pub use filter::{Domain, DomainFilter, IntegerMapping};
pub use session::{open_read, open_write, ReadSession, RejectedRecord, Rejection, WriteSession};
pub use store::Record;
pub use symbol::{SymbolId, SymbolInfo, SymbolType};
pub use text::SetTextTable;
pub use uel::UniqueElements;
pub use value::SpecialValues;
