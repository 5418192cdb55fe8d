//! Fixed-capacity buffering over a block layer.

use super::{ByteSink, ByteSource};
use crate::error::Result;

/// Collects bytes into a fixed-size buffer and forwards each full buffer as
/// one block.
pub struct BufferedSink<S: ByteSink> {
    inner: S,
    buffer: Vec<u8>,
    capacity: usize,
}

impl<S: ByteSink> BufferedSink<S> {
    /// Wraps `inner` with a buffer of `capacity` bytes.
    pub fn new(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Forwards any partial buffer so that the next byte starts a new block.
    ///
    /// Returns the physical offset of that next block.
    pub fn sync(&mut self) -> Result<u64> {
        if !self.buffer.is_empty() {
            self.inner.write_bytes(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(self.inner.position())
    }

    /// Bytes waiting in the buffer.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Access the wrapped sink
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutable access to the wrapped sink
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<S: ByteSink> ByteSink for BufferedSink<S> {
    fn write_bytes(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let room = self.capacity - self.buffer.len();
            let n = room.min(buf.len());
            self.buffer.extend_from_slice(&buf[..n]);
            buf = &buf[n..];

            if self.buffer.len() == self.capacity {
                self.inner.write_bytes(&self.buffer)?;
                self.buffer.clear();
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.sync()?;
        self.inner.flush()
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }
}

/// Read-side buffer: refills from the block layer one block at a time.
pub struct BufferedSource<S: ByteSource> {
    inner: S,
    buffer: Vec<u8>,
    start: usize,
    end: usize,
}

impl<S: ByteSource> BufferedSource<S> {
    /// Wraps `inner` with a buffer of `capacity` bytes.
    pub fn new(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            buffer: vec![0u8; capacity.max(1)],
            start: 0,
            end: 0,
        }
    }

    /// Access the wrapped source
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutable access to the wrapped source
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    fn refill(&mut self) -> Result<bool> {
        self.start = 0;
        self.end = self.inner.read_into(&mut self.buffer)?;
        Ok(self.end > 0)
    }
}

impl<S: ByteSource> ByteSource for BufferedSource<S> {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.start == self.end && !self.refill()? {
            return Ok(0);
        }
        let n = buf.len().min(self.end - self.start);
        buf[..n].copy_from_slice(&self.buffer[self.start..self.start + n]);
        self.start += n;
        Ok(n)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.inner.seek(offset)?;
        self.start = 0;
        self.end = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records the size of every block it receives.
    #[derive(Default)]
    struct BlockLog {
        blocks: Vec<Vec<u8>>,
        written: u64,
    }

    impl ByteSink for BlockLog {
        fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
            self.blocks.push(buf.to_vec());
            self.written += buf.len() as u64;
            Ok(())
        }
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
        fn position(&self) -> u64 {
            self.written
        }
    }

    struct Chunks {
        data: Vec<u8>,
        pos: usize,
    }

    impl ByteSource for Chunks {
        fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
            // At most 3 bytes per call, to exercise refills
            let n = buf.len().min(3).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
        fn seek(&mut self, offset: u64) -> Result<()> {
            self.pos = offset as usize;
            Ok(())
        }
    }

    #[test]
    fn test_full_buffers_forwarded_as_blocks() {
        let mut sink = BufferedSink::new(BlockLog::default(), 4);
        sink.write_bytes(b"abcdefghij").unwrap();

        assert_eq!(sink.get_ref().blocks, vec![b"abcd".to_vec(), b"efgh".to_vec()]);
        assert_eq!(sink.pending(), 2);

        let offset = sink.sync().unwrap();
        assert_eq!(offset, 10);
        assert_eq!(sink.get_ref().blocks.len(), 3);
        assert_eq!(sink.pending(), 0);
    }

    #[test]
    fn test_sync_on_empty_buffer_writes_nothing() {
        let mut sink = BufferedSink::new(BlockLog::default(), 8);
        assert_eq!(sink.sync().unwrap(), 0);
        sink.flush().unwrap();
        assert!(sink.get_ref().blocks.is_empty());
    }

    #[test]
    fn test_source_refills_across_chunks() {
        let inner = Chunks {
            data: b"hello world".to_vec(),
            pos: 0,
        };
        let mut source = BufferedSource::new(inner, 16);
        let mut out = [0u8; 11];
        assert_eq!(source.read_full(&mut out).unwrap(), 11);
        assert_eq!(&out, b"hello world");

        source.seek(6).unwrap();
        let mut out = [0u8; 5];
        source.read_full(&mut out).unwrap();
        assert_eq!(&out, b"world");
    }
}
