//! File header and trailer.
//!
//! Both are written raw, outside the block framing, so that a reader can
//! detect the byte order and locate the sections before decoding any frame.
//!
//! Header:
//! ```text
//! [magic: 8 bytes "SDXFILE\0"]
//! [2][0x1234: u16] [4][0x12345678: i32] [8][pi: f64]   byte-order marks
//! [version: i32][flags: u8][codec: u8]
//! [producer_len: u16][producer: bytes]
//! ```
//!
//! Trailer (64 bytes):
//! ```text
//! [directory_offset: u64][uel_offset: u64][acronym_offset: u64][set_text_offset: u64]
//! [raw_total: u64][stored_total: u64]
//! [block_count: u32][checksum: u32]
//! [magic: u64]
//! ```

use super::{
    ByteOrder, ByteSource, FORMAT_VERSION, MAGIC, PAT_DOUBLE, PAT_INTEGER, PAT_WORD,
    TRAILER_MAGIC, TRAILER_SIZE,
};
use crate::config::CompressionType;
use crate::error::{Error, Result};
use bytes::BufMut;

const FLAG_COMPRESSED: u8 = 0x01;
const FLAG_CASE_INSENSITIVE: u8 = 0x02;

/// Fixed part of the header, up to and including the producer length.
const HEADER_FIXED_SIZE: usize = 8 + 3 + 5 + 9 + 4 + 1 + 1 + 2;

/// Parsed file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Byte order of the producer
    pub byte_order: ByteOrder,
    /// Format version
    pub version: i32,
    /// Codec requested by the producer (frames may still be stored raw)
    pub codec: CompressionType,
    /// Labels were interned case-insensitively
    pub case_insensitive: bool,
    /// Audit string of the producer
    pub producer: String,
}

impl FileHeader {
    /// Create a header for a new little-endian file
    pub fn new(codec: CompressionType, case_insensitive: bool, producer: impl Into<String>) -> Self {
        Self {
            byte_order: ByteOrder::Little,
            version: FORMAT_VERSION,
            codec,
            case_insensitive,
            producer: producer.into(),
        }
    }

    /// Encode the header. Writers always emit little-endian headers.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_FIXED_SIZE + self.producer.len());
        buf.put_slice(MAGIC);
        buf.put_u8(2);
        buf.put_u16_le(PAT_WORD);
        buf.put_u8(4);
        buf.put_i32_le(PAT_INTEGER);
        buf.put_u8(8);
        buf.put_f64_le(PAT_DOUBLE);
        buf.put_i32_le(self.version);
        buf.put_u8(self.flags());
        buf.put_u8(self.codec as u8);
        buf.put_u16_le(self.producer.len() as u16);
        buf.put_slice(self.producer.as_bytes());
        buf
    }

    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.codec.is_compressed() {
            flags |= FLAG_COMPRESSED;
        }
        if self.case_insensitive {
            flags |= FLAG_CASE_INSENSITIVE;
        }
        flags
    }

    /// Reads the header from the start of `source`.
    ///
    /// Every byte consumed is fed to `hasher`. Returns the header and its
    /// encoded length.
    pub fn read_from<S: ByteSource>(
        source: &mut S,
        hasher: &mut crc32fast::Hasher,
    ) -> Result<(Self, u64)> {
        let mut fixed = [0u8; HEADER_FIXED_SIZE];
        if source.read_full(&mut fixed)? != HEADER_FIXED_SIZE {
            return Err(Error::corruption("file too short for a header"));
        }
        hasher.update(&fixed);

        if &fixed[..8] != MAGIC {
            return Err(Error::corruption("bad magic: not an sdx file"));
        }
        let byte_order = detect_byte_order(&fixed[8..25])?;

        let mut rest = &fixed[25..];
        let version = byte_order.get_i32(&mut rest);
        if version < 1 || version > FORMAT_VERSION {
            return Err(Error::corruption(format!("unsupported format version {}", version)));
        }
        let flags = rest[0];
        let codec_tag = rest[1];
        rest = &rest[2..];
        let producer_len = byte_order.get_u16(&mut rest) as usize;

        let codec = CompressionType::from_u8(codec_tag)
            .ok_or_else(|| Error::corruption(format!("unsupported codec {}", codec_tag)))?;
        if codec.is_compressed() != (flags & FLAG_COMPRESSED != 0) {
            return Err(Error::corruption("compression flag disagrees with codec"));
        }

        let mut producer = vec![0u8; producer_len];
        if source.read_full(&mut producer)? != producer_len {
            return Err(Error::corruption("file ends inside the header"));
        }
        hasher.update(&producer);
        let producer = String::from_utf8(producer)
            .map_err(|_| Error::corruption("producer string is not UTF-8"))?;

        let header = Self {
            byte_order,
            version,
            codec,
            case_insensitive: flags & FLAG_CASE_INSENSITIVE != 0,
            producer,
        };
        Ok((header, (HEADER_FIXED_SIZE + producer_len) as u64))
    }
}

/// Decides the producer's byte order from the three byte-order patterns.
fn detect_byte_order(marks: &[u8]) -> Result<ByteOrder> {
    if marks.len() != 17 || marks[0] != 2 || marks[3] != 4 || marks[8] != 8 {
        return Err(Error::corruption("malformed byte-order marks"));
    }

    for order in [ByteOrder::Little, ByteOrder::Big] {
        let word = order.get_u16(&mut &marks[1..3]);
        let integer = order.get_i32(&mut &marks[4..8]);
        let double = order.get_f64(&mut &marks[9..17]);
        if word == PAT_WORD && integer == PAT_INTEGER && double == PAT_DOUBLE {
            return Ok(order);
        }
    }
    Err(Error::corruption("unrecognised byte order"))
}

/// Physical offsets of the trailing sections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sections {
    /// Symbol directory
    pub directory: u64,
    /// Unique element table
    pub uels: u64,
    /// Acronym table
    pub acronyms: u64,
    /// Set element text table
    pub set_texts: u64,
}

/// Fixed-size trailer closing every complete file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// Section offsets
    pub sections: Sections,
    /// Sum of decompressed frame payloads
    pub raw_total: u64,
    /// Sum of stored frame payloads
    pub stored_total: u64,
    /// Number of frames
    pub block_count: u32,
    /// crc32 over every byte before the trailer
    pub checksum: u32,
}

impl Trailer {
    /// Encode the trailer to bytes (64 bytes)
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(TRAILER_SIZE);
        buf.put_u64_le(self.sections.directory);
        buf.put_u64_le(self.sections.uels);
        buf.put_u64_le(self.sections.acronyms);
        buf.put_u64_le(self.sections.set_texts);
        buf.put_u64_le(self.raw_total);
        buf.put_u64_le(self.stored_total);
        buf.put_u32_le(self.block_count);
        buf.put_u32_le(self.checksum);
        buf.put_u64_le(TRAILER_MAGIC);
        debug_assert_eq!(buf.len(), TRAILER_SIZE);
        buf
    }

    /// Decode a trailer from bytes
    pub fn decode(data: &[u8], order: ByteOrder) -> Result<Self> {
        if data.len() != TRAILER_SIZE {
            return Err(Error::corruption(format!(
                "Invalid trailer size: expected {}, got {}",
                TRAILER_SIZE,
                data.len()
            )));
        }

        let mut buf = data;
        let directory = order.get_u64(&mut buf);
        let uels = order.get_u64(&mut buf);
        let acronyms = order.get_u64(&mut buf);
        let set_texts = order.get_u64(&mut buf);
        let raw_total = order.get_u64(&mut buf);
        let stored_total = order.get_u64(&mut buf);
        let block_count = order.get_u32(&mut buf);
        let checksum = order.get_u32(&mut buf);
        let magic = order.get_u64(&mut buf);

        if magic != TRAILER_MAGIC {
            return Err(Error::corruption(format!(
                "Invalid trailer magic: expected {:#x}, got {:#x}; file truncated?",
                TRAILER_MAGIC, magic
            )));
        }

        Ok(Self {
            sections: Sections {
                directory,
                uels,
                acronyms,
                set_texts,
            },
            raw_total,
            stored_total,
            block_count,
            checksum,
        })
    }
}
