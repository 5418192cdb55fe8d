//! Block framing and compression.
//!
//! A block is whatever the buffer layer forwards in one call. Each block is
//! written as one frame:
//!
//! ```text
//! [codec: u8][stored_len: u32][raw_len: u32][crc32(payload): u32][payload]
//! ```
//!
//! The payload is stored raw (codec 0) whenever compressing it would not make
//! it smaller.

use super::{ByteOrder, ByteSink, ByteSource, FRAME_HEADER_SIZE, MAX_FRAME_SIZE};
use crate::config::CompressionType;
use crate::error::{Error, Result};
use bytes::{BufMut, BytesMut};
use std::borrow::Cow;
use std::io::{Read, Write};

/// Offsets of every frame in a file, built by the scan on open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockIndex {
    offsets: Vec<u64>,
    raw_total: u64,
    stored_total: u64,
}

impl BlockIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame. Frames must be pushed in file order.
    pub fn push(&mut self, offset: u64, raw_len: u32, stored_len: u32) {
        self.offsets.push(offset);
        self.raw_total += raw_len as u64;
        self.stored_total += stored_len as u64;
    }

    /// Returns true if a frame starts at `offset`.
    pub fn contains(&self, offset: u64) -> bool {
        self.offsets.binary_search(&offset).is_ok()
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns true if the file holds no frames.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Sum of the decompressed payload sizes.
    pub fn raw_total(&self) -> u64 {
        self.raw_total
    }

    /// Sum of the stored payload sizes.
    pub fn stored_total(&self) -> u64 {
        self.stored_total
    }

    /// Frame offsets in file order.
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Walks the frames between `start` and `end`, feeding every byte to
    /// `hasher` and checking that the frames tile the range exactly.
    pub fn scan<S: ByteSource>(
        source: &mut S,
        start: u64,
        end: u64,
        order: ByteOrder,
        hasher: &mut crc32fast::Hasher,
    ) -> Result<Self> {
        let mut index = BlockIndex::new();
        let mut offset = start;
        let mut scratch = vec![0u8; 64 * 1024];

        source.seek(start)?;
        while offset < end {
            if end - offset < FRAME_HEADER_SIZE as u64 {
                return Err(Error::corruption(format!(
                    "partial frame header at offset {}",
                    offset
                )));
            }
            let mut header = [0u8; FRAME_HEADER_SIZE];
            if source.read_full(&mut header)? != FRAME_HEADER_SIZE {
                return Err(Error::corruption("file ends inside a frame header"));
            }
            hasher.update(&header);
            let frame = FrameHeader::decode(&header, order)?;

            let frame_end = offset + FRAME_HEADER_SIZE as u64 + frame.stored_len as u64;
            if frame_end > end {
                return Err(Error::corruption(format!(
                    "frame at offset {} overruns the data region",
                    offset
                )));
            }

            let mut remaining = frame.stored_len as usize;
            while remaining > 0 {
                let chunk = remaining.min(scratch.len());
                if source.read_full(&mut scratch[..chunk])? != chunk {
                    return Err(Error::corruption("file ends inside a frame payload"));
                }
                hasher.update(&scratch[..chunk]);
                remaining -= chunk;
            }

            index.push(offset, frame.raw_len, frame.stored_len);
            offset = frame_end;
        }

        log::debug!(
            "Indexed {} frames ({} raw bytes, {} stored)",
            index.len(),
            index.raw_total,
            index.stored_total
        );
        Ok(index)
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameHeader {
    codec: u8,
    stored_len: u32,
    raw_len: u32,
    crc: u32,
}

impl FrameHeader {
    fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE);
        buf.put_u8(self.codec);
        buf.put_u32_le(self.stored_len);
        buf.put_u32_le(self.raw_len);
        buf.put_u32_le(self.crc);
        buf
    }

    fn decode(data: &[u8; FRAME_HEADER_SIZE], order: ByteOrder) -> Result<Self> {
        let codec = data[0];
        let mut rest = &data[1..];
        let stored_len = order.get_u32(&mut rest);
        let raw_len = order.get_u32(&mut rest);
        let crc = order.get_u32(&mut rest);

        if stored_len as usize > MAX_FRAME_SIZE || raw_len as usize > MAX_FRAME_SIZE {
            return Err(Error::corruption(format!(
                "frame size out of range (stored {}, raw {})",
                stored_len, raw_len
            )));
        }
        Ok(Self {
            codec,
            stored_len,
            raw_len,
            crc,
        })
    }
}

/// Compresses `data`; returns `None` for `CompressionType::None`.
fn compress_block(codec: CompressionType, level: u32, data: &[u8]) -> Result<Option<Vec<u8>>> {
    let compressed = match codec {
        CompressionType::None => return Ok(None),
        CompressionType::Deflate => {
            let mut encoder = flate2::write::ZlibEncoder::new(
                Vec::with_capacity(data.len() / 2),
                flate2::Compression::new(level),
            );
            encoder.write_all(data)?;
            encoder.finish()?
        }
        #[cfg(feature = "snappy")]
        CompressionType::Snappy => snap::raw::Encoder::new()
            .compress_vec(data)
            .map_err(|e| Error::invalid_argument(format!("Compression failed: {}", e)))?,
        #[cfg(feature = "lz4-compression")]
        CompressionType::Lz4 => lz4::block::compress(data, None, false)?,
    };
    Ok(Some(compressed))
}

/// Reverses `compress_block` for the codec tag found in a frame header.
fn decompress_block(tag: u8, payload: &[u8], raw_len: u32) -> Result<Vec<u8>> {
    let codec = CompressionType::from_u8(tag)
        .ok_or_else(|| Error::corruption(format!("unsupported block codec {}", tag)))?;

    let data = match codec {
        CompressionType::None => payload.to_vec(),
        CompressionType::Deflate => {
            let mut out = Vec::with_capacity(raw_len as usize);
            flate2::read::ZlibDecoder::new(payload)
                .take(raw_len as u64 + 1)
                .read_to_end(&mut out)
                .map_err(|e| Error::corruption(format!("Decompression failed: {}", e)))?;
            out
        }
        #[cfg(feature = "snappy")]
        CompressionType::Snappy => snap::raw::Decoder::new()
            .decompress_vec(payload)
            .map_err(|e| Error::corruption(format!("Decompression failed: {}", e)))?,
        #[cfg(feature = "lz4-compression")]
        CompressionType::Lz4 => lz4::block::decompress(payload, Some(raw_len as i32))
            .map_err(|e| Error::corruption(format!("Decompression failed: {}", e)))?,
    };

    if data.len() != raw_len as usize {
        return Err(Error::corruption(format!(
            "block decompressed to {} bytes, header says {}",
            data.len(),
            raw_len
        )));
    }
    Ok(data)
}

/// Frames every forwarded block, compressing it with the configured codec.
pub struct BlockWriter<S: ByteSink> {
    inner: S,
    codec: CompressionType,
    level: u32,
    blocks: u32,
    raw_total: u64,
    stored_total: u64,
}

impl<S: ByteSink> BlockWriter<S> {
    /// Wraps `inner`.
    pub fn new(inner: S, codec: CompressionType, level: u32) -> Self {
        Self {
            inner,
            codec,
            level,
            blocks: 0,
            raw_total: 0,
            stored_total: 0,
        }
    }

    /// Number of frames written.
    pub fn block_count(&self) -> u32 {
        self.blocks
    }

    /// Sum of raw payload sizes.
    pub fn raw_total(&self) -> u64 {
        self.raw_total
    }

    /// Sum of stored payload sizes.
    pub fn stored_total(&self) -> u64 {
        self.stored_total
    }

    /// Access the wrapped sink
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutable access to the wrapped sink
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    fn write_frame(&mut self, data: &[u8]) -> Result<()> {
        let (codec, payload) = match compress_block(self.codec, self.level, data)? {
            Some(compressed) if compressed.len() < data.len() => {
                (self.codec, Cow::Owned(compressed))
            }
            _ => (CompressionType::None, Cow::Borrowed(data)),
        };

        let header = FrameHeader {
            codec: codec as u8,
            stored_len: payload.len() as u32,
            raw_len: data.len() as u32,
            crc: crc32fast::hash(&payload),
        };
        self.inner.write_bytes(&header.encode())?;
        self.inner.write_bytes(&payload)?;

        self.blocks += 1;
        self.raw_total += data.len() as u64;
        self.stored_total += payload.len() as u64;
        log::debug!(
            "Flushed block {} ({} -> {} bytes, {:?})",
            self.blocks,
            data.len(),
            payload.len(),
            codec
        );
        Ok(())
    }
}

impl<S: ByteSink> ByteSink for BlockWriter<S> {
    /// Writes `buf` as one frame, split only if it exceeds the frame limit.
    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        for chunk in buf.chunks(MAX_FRAME_SIZE) {
            self.write_frame(chunk)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }
}

/// Reads frames back, verifying their checksums and sizes.
pub struct BlockReader<S: ByteSource> {
    inner: S,
    order: ByteOrder,
    index: BlockIndex,
    /// Offset of the next frame to load
    next_frame: u64,
    /// End of the frame region
    end: u64,
    block: Vec<u8>,
    cursor: usize,
}

impl<S: ByteSource> BlockReader<S> {
    /// Wraps `inner`, positioned at the first frame of `index`.
    pub fn new(inner: S, order: ByteOrder, index: BlockIndex, end: u64) -> Result<Self> {
        let mut reader = Self {
            inner,
            order,
            next_frame: end,
            index,
            end,
            block: Vec::new(),
            cursor: 0,
        };
        if let Some(&first) = reader.index.offsets().first() {
            reader.seek(first)?;
        }
        Ok(reader)
    }

    /// The block index this reader seeks by.
    pub fn index(&self) -> &BlockIndex {
        &self.index
    }

    fn load_next_frame(&mut self) -> Result<bool> {
        if self.next_frame >= self.end {
            return Ok(false);
        }

        let mut raw = [0u8; FRAME_HEADER_SIZE];
        if self.inner.read_full(&mut raw)? != FRAME_HEADER_SIZE {
            return Err(Error::corruption("file ends inside a frame header"));
        }
        let header = FrameHeader::decode(&raw, self.order)?;

        let mut payload = vec![0u8; header.stored_len as usize];
        if self.inner.read_full(&mut payload)? != payload.len() {
            return Err(Error::corruption("file ends inside a frame payload"));
        }

        let actual = crc32fast::hash(&payload);
        if actual != header.crc {
            return Err(Error::ChecksumMismatch {
                expected: header.crc,
                actual,
            });
        }

        self.block = decompress_block(header.codec, &payload, header.raw_len)?;
        self.cursor = 0;
        self.next_frame += FRAME_HEADER_SIZE as u64 + header.stored_len as u64;
        Ok(true)
    }
}

impl<S: ByteSource> ByteSource for BlockReader<S> {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        while self.cursor == self.block.len() {
            if !self.load_next_frame()? {
                return Ok(0);
            }
        }
        let n = buf.len().min(self.block.len() - self.cursor);
        buf[..n].copy_from_slice(&self.block[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }

    /// Only frame starts (and the end of the frame region) are valid targets.
    fn seek(&mut self, offset: u64) -> Result<()> {
        if offset != self.end && !self.index.contains(offset) {
            return Err(Error::invalid_argument(format!(
                "offset {} is not a block boundary",
                offset
            )));
        }
        self.inner.seek(offset)?;
        self.next_frame = offset;
        self.block.clear();
        self.cursor = 0;
        Ok(())
    }
}
