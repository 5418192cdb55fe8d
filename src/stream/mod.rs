//! Buffered, block-compressed byte stream.
//!
//! The stream is assembled from small capabilities rather than a class chain:
//!
//! ```text
//! StreamWriter
//!   └─ BufferedSink      fixed-size buffer, forwards one block at a time
//!        └─ BlockWriter  frames (and optionally compresses) each block
//!             └─ FileSink raw file, running crc32 of every byte
//!
//! StreamReader
//!   └─ BufferedSource
//!        └─ BlockReader  verifies and decompresses frames, seeks by block index
//!             └─ FileSource
//! ```
//!
//! ## File Format
//!
//! ```text
//! [Header]          raw: magic, byte-order marks, version, flags, audit string
//! [Frame 1]
//! [Frame 2]
//! ...
//! [Frame N]
//! [Trailer: 64B]    raw: section offsets, size totals, global crc32, magic
//! ```
//!
//! Each frame:
//!
//! ```text
//! [codec: u8][stored_len: u32][raw_len: u32][crc32(payload): u32][payload]
//! ```
//!
//! Sections of the container always start on a frame boundary, so the offsets
//! recorded in the trailer and the symbol directory are physical frame offsets.

pub mod block;
pub mod buffered;
pub mod codec;
pub mod file;
pub mod header;

pub use block::{BlockIndex, BlockReader, BlockWriter};
pub use buffered::{BufferedSink, BufferedSource};
pub use codec::{StreamReader, StreamWriter};
pub use file::{FileSink, FileSource};
pub use header::{FileHeader, Sections, Trailer};

use crate::error::Result;
use bytes::Buf;

/// Magic bytes at the start of every container file.
pub const MAGIC: &[u8; 8] = b"SDXFILE\0";

/// Magic number closing the trailer.
pub const TRAILER_MAGIC: u64 = u64::from_le_bytes(*b"SDXTRAIL");

/// Current format version.
pub const FORMAT_VERSION: i32 = 1;

/// Trailer size in bytes (fixed).
pub const TRAILER_SIZE: usize = 64;

/// Frame header size in bytes (codec + stored_len + raw_len + crc).
pub const FRAME_HEADER_SIZE: usize = 13;

/// Largest payload a single frame may carry.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Probe patterns written into the header to detect the producer's byte order.
pub const PAT_WORD: u16 = 0x1234;
/// Integer byte-order pattern.
pub const PAT_INTEGER: i32 = 0x1234_5678;
/// Double byte-order pattern.
pub const PAT_DOUBLE: f64 = std::f64::consts::PI;

/// A destination for bytes.
pub trait ByteSink {
    /// Accepts all of `buf`.
    fn write_bytes(&mut self, buf: &[u8]) -> Result<()>;

    /// Pushes everything accepted so far to the next layer down.
    fn flush(&mut self) -> Result<()>;

    /// Physical file offset at which the next forwarded byte will land.
    fn position(&self) -> u64;
}

/// A source of bytes.
pub trait ByteSource {
    /// Reads up to `buf.len()` bytes; returns 0 only at the end of data.
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Moves to a physical offset.
    fn seek(&mut self, offset: u64) -> Result<()>;

    /// Fills `buf` completely unless the data ends first; returns the number
    /// of bytes placed in `buf`.
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_into(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

/// Byte order of the numeric primitives in a file.
///
/// Writers always produce little-endian files; readers accept either order as
/// detected from the header byte-order marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
}

impl ByteOrder {
    /// Decode a u16
    pub fn get_u16(self, buf: &mut &[u8]) -> u16 {
        match self {
            ByteOrder::Little => buf.get_u16_le(),
            ByteOrder::Big => buf.get_u16(),
        }
    }

    /// Decode a u32
    pub fn get_u32(self, buf: &mut &[u8]) -> u32 {
        match self {
            ByteOrder::Little => buf.get_u32_le(),
            ByteOrder::Big => buf.get_u32(),
        }
    }

    /// Decode an i32
    pub fn get_i32(self, buf: &mut &[u8]) -> i32 {
        match self {
            ByteOrder::Little => buf.get_i32_le(),
            ByteOrder::Big => buf.get_i32(),
        }
    }

    /// Decode a u64
    pub fn get_u64(self, buf: &mut &[u8]) -> u64 {
        match self {
            ByteOrder::Little => buf.get_u64_le(),
            ByteOrder::Big => buf.get_u64(),
        }
    }

    /// Decode an i64
    pub fn get_i64(self, buf: &mut &[u8]) -> i64 {
        match self {
            ByteOrder::Little => buf.get_i64_le(),
            ByteOrder::Big => buf.get_i64(),
        }
    }

    /// Decode an f64
    pub fn get_f64(self, buf: &mut &[u8]) -> f64 {
        match self {
            ByteOrder::Little => buf.get_f64_le(),
            ByteOrder::Big => buf.get_f64(),
        }
    }
}
