//! Typed primitives on top of the buffered block stream.

use super::{
    BlockIndex, BlockReader, BlockWriter, BufferedSink, BufferedSource, ByteOrder, ByteSink,
    ByteSource, FileHeader, FileSink, FileSource, Sections, Trailer, TRAILER_SIZE,
};
use crate::config::{Options, DEFAULT_BLOCK_SIZE};
use crate::error::{Error, Result};
use std::path::Path;

/// Longest string the stream will encode or accept.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// Longest LEB128 encoding of a u64.
const MAX_VARINT_LEN: usize = 10;

/// Maps a signed integer onto the unsigned range so that small magnitudes
/// stay small.
pub fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// Inverse of `zigzag_encode`.
pub fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// Write side of the stream.
pub struct StreamWriter {
    sink: BufferedSink<BlockWriter<FileSink>>,
    section: Option<crc32fast::Hasher>,
    closed: bool,
}

impl StreamWriter {
    /// Creates the file at `path` and writes its header.
    pub fn create<P: AsRef<Path>>(path: P, options: &Options) -> Result<Self> {
        options.validate()?;

        let mut file = FileSink::create(path)?;
        let header = FileHeader::new(
            options.compression,
            options.case_insensitive_labels,
            options.producer.clone(),
        );
        file.write_bytes(&header.encode())?;

        let blocks = BlockWriter::new(file, options.compression, options.compression_level);
        Ok(Self {
            sink: BufferedSink::new(blocks, options.block_size),
            section: None,
            closed: false,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::invalid_state("stream is closed"));
        }
        Ok(())
    }

    /// Buffers `buf`; full blocks are flushed transparently.
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if let Some(hasher) = self.section.as_mut() {
            hasher.update(buf);
        }
        self.sink.write_bytes(buf)
    }

    /// Write a u8
    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_bytes(&[v])
    }

    /// Write a little-endian u16
    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Write a little-endian u32
    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Write a little-endian i32
    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Write a little-endian u64
    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Write a little-endian i64
    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Write a little-endian f64
    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Write an unsigned LEB128 varint
    pub fn write_varint(&mut self, mut v: u64) -> Result<()> {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let mut n = 0;
        while v >= 0x80 {
            buf[n] = (v as u8) | 0x80;
            v >>= 7;
            n += 1;
        }
        buf[n] = v as u8;
        self.write_bytes(&buf[..=n])
    }

    /// Write a zigzag-encoded signed varint
    pub fn write_signed_varint(&mut self, v: i64) -> Result<()> {
        self.write_varint(zigzag_encode(v))
    }

    /// Write a length-prefixed UTF-8 string
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        if s.len() > MAX_STRING_LEN {
            return Err(Error::invalid_argument(format!(
                "string of {} bytes exceeds the {} byte limit",
                s.len(),
                MAX_STRING_LEN
            )));
        }
        self.write_varint(s.len() as u64)?;
        self.write_bytes(s.as_bytes())
    }

    /// Ends the current block so that a new section starts on a frame
    /// boundary. Returns the physical offset of that section.
    pub fn begin_section(&mut self) -> Result<u64> {
        self.ensure_open()?;
        self.sink.sync()
    }

    /// Starts accumulating a checksum over the logical bytes written.
    pub fn begin_checksum(&mut self) {
        self.section = Some(crc32fast::Hasher::new());
    }

    /// Stops accumulating and returns the checksum since `begin_checksum`.
    pub fn end_checksum(&mut self) -> u32 {
        self.section.take().map(|h| h.finalize()).unwrap_or(0)
    }

    /// Flushes pending data and writes the trailer.
    ///
    /// Closing an already closed stream is a no-op.
    pub fn close(&mut self, sections: Sections) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.sink.sync()?;

        let blocks = self.sink.get_mut();
        let trailer = Trailer {
            sections,
            raw_total: blocks.raw_total(),
            stored_total: blocks.stored_total(),
            block_count: blocks.block_count(),
            checksum: blocks.get_ref().checksum(),
        };
        let file = blocks.get_mut();
        file.write_bytes(&trailer.encode())?;
        file.sync()?;
        self.closed = true;

        log::debug!(
            "Closed {} ({} blocks, {} -> {} bytes)",
            file.path().display(),
            trailer.block_count,
            trailer.raw_total,
            trailer.stored_total
        );
        Ok(())
    }

    /// Returns true once `close` has succeeded.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for StreamWriter {
    fn drop(&mut self) {
        if !self.closed {
            // Best effort flush; the file has no trailer and will not open.
            let _ = self.sink.flush();
        }
    }
}

/// Read side of the stream.
pub struct StreamReader {
    source: BufferedSource<BlockReader<FileSource>>,
    header: FileHeader,
    trailer: Trailer,
    order: ByteOrder,
    section: Option<crc32fast::Hasher>,
    closed: bool,
}

impl StreamReader {
    /// Opens and fully verifies the file at `path`.
    ///
    /// The whole file is scanned once: the header is parsed, the trailer is
    /// located, every frame header is walked to build the block index, and the
    /// global checksum and size totals are compared against the trailer. A
    /// truncated or damaged file fails here, before any record is decoded.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = FileSource::open(path.as_ref())?;
        let mut hasher = crc32fast::Hasher::new();
        let (header, header_len) = FileHeader::read_from(&mut file, &mut hasher)?;
        let order = header.byte_order;

        if file.len() < header_len + TRAILER_SIZE as u64 {
            return Err(Error::corruption("file too short: missing trailer"));
        }
        let trailer_offset = file.len() - TRAILER_SIZE as u64;
        file.seek(trailer_offset)?;
        let mut raw = [0u8; TRAILER_SIZE];
        if file.read_full(&mut raw)? != TRAILER_SIZE {
            return Err(Error::corruption("file ends inside the trailer"));
        }
        let trailer = Trailer::decode(&raw, order)?;

        let index = BlockIndex::scan(&mut file, header_len, trailer_offset, order, &mut hasher)?;
        let actual = hasher.finalize();
        if actual != trailer.checksum {
            return Err(Error::ChecksumMismatch {
                expected: trailer.checksum,
                actual,
            });
        }
        if index.len() as u64 != trailer.block_count as u64
            || index.raw_total() != trailer.raw_total
            || index.stored_total() != trailer.stored_total
        {
            return Err(Error::corruption(format!(
                "trailer totals disagree with the file ({} blocks, {} raw, {} stored)",
                index.len(),
                index.raw_total(),
                index.stored_total()
            )));
        }
        let sections = trailer.sections;
        for offset in [
            sections.directory,
            sections.uels,
            sections.acronyms,
            sections.set_texts,
        ] {
            if !index.contains(offset) {
                return Err(Error::corruption(format!(
                    "section offset {} is not a block boundary",
                    offset
                )));
            }
        }

        log::debug!(
            "Opened {} ({} blocks, producer {:?})",
            path.as_ref().display(),
            index.len(),
            header.producer
        );

        let blocks = BlockReader::new(file, order, index, trailer_offset)?;
        Ok(Self {
            source: BufferedSource::new(blocks, DEFAULT_BLOCK_SIZE),
            header,
            trailer,
            order,
            section: None,
            closed: false,
        })
    }

    /// The parsed file header
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// The parsed trailer
    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    /// Byte order detected from the header byte-order marks
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Offsets of every frame
    pub fn block_index(&self) -> &BlockIndex {
        self.source.get_ref().index()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::invalid_state("stream is closed"));
        }
        Ok(())
    }

    /// Fills `buf` exactly or fails with `TruncatedStream`.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.ensure_open()?;
        let got = self.source.read_full(buf)?;
        if got != buf.len() {
            return Err(Error::TruncatedStream {
                wanted: buf.len(),
                got,
            });
        }
        if let Some(hasher) = self.section.as_mut() {
            hasher.update(buf);
        }
        Ok(())
    }

    /// Returns exactly `n` bytes or fails with `TruncatedStream`.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read a u8
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a u16
    pub fn read_u16(&mut self) -> Result<u16> {
        let buf = self.read_array::<2>()?;
        Ok(self.order.get_u16(&mut &buf[..]))
    }

    /// Read a u32
    pub fn read_u32(&mut self) -> Result<u32> {
        let buf = self.read_array::<4>()?;
        Ok(self.order.get_u32(&mut &buf[..]))
    }

    /// Read an i32
    pub fn read_i32(&mut self) -> Result<i32> {
        let buf = self.read_array::<4>()?;
        Ok(self.order.get_i32(&mut &buf[..]))
    }

    /// Read a u64
    pub fn read_u64(&mut self) -> Result<u64> {
        let buf = self.read_array::<8>()?;
        Ok(self.order.get_u64(&mut &buf[..]))
    }

    /// Read an i64
    pub fn read_i64(&mut self) -> Result<i64> {
        let buf = self.read_array::<8>()?;
        Ok(self.order.get_i64(&mut &buf[..]))
    }

    /// Read an f64
    pub fn read_f64(&mut self) -> Result<f64> {
        let buf = self.read_array::<8>()?;
        Ok(self.order.get_f64(&mut &buf[..]))
    }

    /// Read an unsigned LEB128 varint
    pub fn read_varint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7F) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::corruption("varint longer than 10 bytes"))
    }

    /// Read a zigzag-encoded signed varint
    pub fn read_signed_varint(&mut self) -> Result<i64> {
        Ok(zigzag_decode(self.read_varint()?))
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_varint()? as usize;
        if len > MAX_STRING_LEN {
            return Err(Error::corruption(format!("string length {} out of range", len)));
        }
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|_| Error::corruption("string is not UTF-8"))
    }

    /// Moves to a block-aligned physical offset recorded in the block index.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.ensure_open()?;
        self.source.seek(offset)
    }

    /// Starts accumulating a checksum over the logical bytes read.
    pub fn begin_checksum(&mut self) {
        self.section = Some(crc32fast::Hasher::new());
    }

    /// Stops accumulating and returns the checksum since `begin_checksum`.
    pub fn end_checksum(&mut self) -> u32 {
        self.section.take().map(|h| h.finalize()).unwrap_or(0)
    }

    /// Releases the stream. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.closed = true;
    }
}
