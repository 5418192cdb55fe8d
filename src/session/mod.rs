//! Session facade.
//!
//! A session owns everything one file needs: the stream, the label table,
//! the symbol directory, the acronym and set text tables and the record
//! store. A session
//! is either a [`WriteSession`] or a [`ReadSession`]; there is no shared
//! state between sessions, so independent read sessions on the same file
//! can run on separate threads.
//!
//! ## File layout
//!
//! ```text
//! [header]
//! [data section of each symbol, in finish order]
//! [symbol directory][label table][acronym table][set text table]
//! [trailer]
//! ```
//!
//! Every section starts on a block boundary; the trailer records where the
//! directory and the three tables start and the directory records where each
//! data section starts.

pub mod reader;
pub mod writer;

pub use reader::ReadSession;
pub use writer::{RejectedRecord, Rejection, WriteSession, MAX_REJECTED_RECORDS};

use crate::config::Options;
use crate::error::Result;
use std::path::Path;

/// Creates `path` (truncating it) and opens it for writing.
pub fn open_write<P: AsRef<Path>>(path: P, options: Options) -> Result<WriteSession> {
    WriteSession::create(path, options)
}

/// Opens a complete file for reading.
///
/// The whole file is verified first; a truncated or damaged file fails with
/// `Corruption` or `ChecksumMismatch` and nothing is read from it.
pub fn open_read<P: AsRef<Path>>(path: P) -> Result<ReadSession> {
    ReadSession::open(path)
}
