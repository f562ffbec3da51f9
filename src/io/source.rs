// src/io/source.rs
//
// Byte source abstraction consumed by the session driver, plus the
// non-hardware sources: replay from any reader and a scripted in-memory source.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use crate::error::TransportError;

// ============================================================================
// Types
// ============================================================================

/// Successful outcome of one read from a byte source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes received in one read. May be empty when the read timed out.
    Chunk(Vec<u8>),
    /// The source has no more data and never will
    EndOfStream,
}

/// Producer of raw bytes for one session.
///
/// Implementations may block, but should return within a bounded time (an
/// empty chunk is fine) so the driver can observe cancellation.
pub trait ByteSource {
    fn read(&mut self) -> Result<ReadOutcome, TransportError>;

    /// Short description used in log lines
    fn describe(&self) -> String {
        "byte source".to_string()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read(&mut self) -> Result<ReadOutcome, TransportError> {
        (**self).read()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

// ============================================================================
// Reader Source
// ============================================================================

/// Default read size for reader-backed sources
pub const DEFAULT_CHUNK_SIZE: usize = 256;

/// Byte source over any `std::io::Read`, e.g. a captured stream on disk.
/// `Ok(0)` from the reader is end of stream.
pub struct ReaderSource<R> {
    reader: R,
    buf: Vec<u8>,
    name: String,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self::with_chunk_size(reader, name, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(reader: R, name: impl Into<String>, chunk_size: usize) -> Self {
        ReaderSource {
            reader,
            buf: vec![0u8; chunk_size.max(1)],
            name: name.into(),
        }
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn read(&mut self) -> Result<ReadOutcome, TransportError> {
        loop {
            match self.reader.read(&mut self.buf) {
                Ok(0) => return Ok(ReadOutcome::EndOfStream),
                Ok(n) => return Ok(ReadOutcome::Chunk(self.buf[..n].to_vec())),
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

// ============================================================================
// Scripted Source
// ============================================================================

/// How a scripted source behaves once its chunks run out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptEnd {
    EndOfStream,
    Disconnect,
    /// Keep returning empty chunks forever (an idle device)
    Idle,
}

/// In-memory source that replays a fixed list of chunks
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    chunks: VecDeque<Vec<u8>>,
    end: ScriptEnd,
    reads: usize,
}

impl ScriptedSource {
    pub fn new<I, C>(chunks: I, end: ScriptEnd) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        ScriptedSource {
            chunks: chunks.into_iter().map(Into::into).collect(),
            end,
            reads: 0,
        }
    }

    /// A source that fails on the first read
    pub fn failing() -> Self {
        Self::new(Vec::<Vec<u8>>::new(), ScriptEnd::Disconnect)
    }

    /// Number of `read` calls served so far
    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn remaining_chunks(&self) -> usize {
        self.chunks.len()
    }
}

impl ByteSource for ScriptedSource {
    fn read(&mut self) -> Result<ReadOutcome, TransportError> {
        self.reads += 1;
        if let Some(chunk) = self.chunks.pop_front() {
            return Ok(ReadOutcome::Chunk(chunk));
        }
        match self.end {
            ScriptEnd::EndOfStream => Ok(ReadOutcome::EndOfStream),
            ScriptEnd::Disconnect => Err(TransportError::Disconnected),
            ScriptEnd::Idle => Ok(ReadOutcome::Chunk(Vec::new())),
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reader_source_chunks_and_ends() {
        let mut source = ReaderSource::with_chunk_size(Cursor::new(b"abcdefg".to_vec()), "mem", 3);

        assert_eq!(source.read().unwrap(), ReadOutcome::Chunk(b"abc".to_vec()));
        assert_eq!(source.read().unwrap(), ReadOutcome::Chunk(b"def".to_vec()));
        assert_eq!(source.read().unwrap(), ReadOutcome::Chunk(b"g".to_vec()));
        assert_eq!(source.read().unwrap(), ReadOutcome::EndOfStream);
        assert_eq!(source.describe(), "mem");
    }

    #[test]
    fn test_reader_source_zero_chunk_size_is_clamped() {
        let mut source = ReaderSource::with_chunk_size(Cursor::new(b"ab".to_vec()), "mem", 0);
        assert_eq!(source.read().unwrap(), ReadOutcome::Chunk(b"a".to_vec()));
    }

    #[test]
    fn test_scripted_source_ends() {
        let mut source = ScriptedSource::new(["a", "b"], ScriptEnd::Disconnect);
        assert_eq!(source.read().unwrap(), ReadOutcome::Chunk(b"a".to_vec()));
        assert_eq!(source.read().unwrap(), ReadOutcome::Chunk(b"b".to_vec()));
        assert!(matches!(source.read(), Err(TransportError::Disconnected)));
        assert_eq!(source.reads(), 3);

        let mut idle = ScriptedSource::new(Vec::<Vec<u8>>::new(), ScriptEnd::Idle);
        assert_eq!(idle.read().unwrap(), ReadOutcome::Chunk(Vec::new()));
        assert_eq!(idle.read().unwrap(), ReadOutcome::Chunk(Vec::new()));
    }

    #[test]
    fn test_failing_source() {
        let mut source = ScriptedSource::failing();
        assert!(source.read().is_err());
    }
}
