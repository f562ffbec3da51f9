// src/io/serial/framer.rs
//
// Line framing for serial text streams.
// Accumulates arbitrarily-chunked bytes and yields one decoded line per '\n'.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

// =============================================================================
// Constants
// =============================================================================

/// Line terminator on the wire (ASCII line feed)
pub const LINE_TERMINATOR: u8 = b'\n';

// =============================================================================
// Types
// =============================================================================

/// Text encoding used to turn terminated byte segments into lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    /// UTF-8 (invalid sequences are a decode error)
    Utf8,
    /// 7-bit ASCII (any byte >= 0x80 is a decode error)
    Ascii,
    /// ISO-8859-1, every byte maps to U+0000..U+00FF and never fails
    Latin1,
}

impl Default for TextEncoding {
    fn default() -> Self {
        TextEncoding::Utf8
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Ascii => "ASCII",
            TextEncoding::Latin1 => "ISO-8859-1",
        };
        f.write_str(name)
    }
}

impl TextEncoding {
    /// Decode one line's bytes (terminator already removed)
    pub fn decode(&self, bytes: &[u8]) -> Result<String, DecodeError> {
        let invalid = || DecodeError::InvalidText {
            encoding: *self,
            len: bytes.len(),
        };

        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|_| invalid()),
            TextEncoding::Ascii => {
                if bytes.is_ascii() {
                    Ok(bytes.iter().map(|&b| b as char).collect())
                } else {
                    Err(invalid())
                }
            }
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

/// One terminated segment of the stream: either decoded text or a decode failure.
/// The bytes of a failed line are gone; they are never retried.
pub type Line = Result<String, DecodeError>;

/// Bytes received since the last consumed terminator.
///
/// Once every line of a fed chunk has been pulled, this holds exactly the
/// current unterminated line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBuffer {
    bytes: Vec<u8>,
}

impl RawBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether at least one complete line is waiting to be pulled
    pub fn has_complete_line(&self) -> bool {
        self.bytes.contains(&LINE_TERMINATOR)
    }
}

impl From<Vec<u8>> for RawBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        RawBuffer { bytes }
    }
}

// =============================================================================
// Line Framer
// =============================================================================

/// Stateful line framer for streaming data.
///
/// Not synchronized: a session owns exactly one framer and feeds it from a
/// single thread.
#[derive(Debug, Clone)]
pub struct LineFramer {
    buffer: RawBuffer,
    encoding: TextEncoding,
    /// Prefix of `buffer` already known to be terminator-free
    scanned: usize,
    lines_seen: u64,
    decode_errors: u64,
}

impl LineFramer {
    pub fn new(encoding: TextEncoding) -> Self {
        Self::with_buffer(encoding, RawBuffer::new())
    }

    /// Resume framing from a buffer handed back by a previous framer
    pub fn with_buffer(encoding: TextEncoding, buffer: RawBuffer) -> Self {
        LineFramer {
            buffer,
            encoding,
            scanned: 0,
            lines_seen: 0,
            decode_errors: 0,
        }
    }

    /// Append a chunk and return a lazy iterator over the lines it completes.
    ///
    /// Lines are removed from the buffer only as the iterator is advanced.
    /// Lines left unread when the iterator is dropped stay buffered and are
    /// returned by the next `feed` call.
    pub fn feed(&mut self, chunk: &[u8]) -> Lines<'_> {
        self.buffer.bytes.extend_from_slice(chunk);
        Lines { framer: self }
    }

    /// Append a chunk and drain every complete line
    pub fn feed_all(&mut self, chunk: &[u8]) -> Vec<Line> {
        self.feed(chunk).collect()
    }

    /// Take the trailing unterminated bytes as a final line.
    /// Call when the stream ends. Complete lines still buffered are left alone.
    pub fn flush(&mut self) -> Option<Line> {
        let start = self
            .buffer
            .bytes
            .iter()
            .rposition(|&b| b == LINE_TERMINATOR)
            .map(|p| p + 1)
            .unwrap_or(0);

        if start == self.buffer.bytes.len() {
            return None;
        }

        let tail: Vec<u8> = self.buffer.bytes.drain(start..).collect();
        self.scanned = self.scanned.min(self.buffer.bytes.len());
        Some(self.decode(&tail))
    }

    pub fn buffer(&self) -> &RawBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> RawBuffer {
        self.buffer
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Terminated segments pulled so far, including ones that failed to decode
    pub fn lines_seen(&self) -> u64 {
        self.lines_seen
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }

    fn next_line(&mut self) -> Option<Line> {
        let unscanned = &self.buffer.bytes[self.scanned..];
        let Some(offset) = unscanned.iter().position(|&b| b == LINE_TERMINATOR) else {
            self.scanned = self.buffer.bytes.len();
            return None;
        };

        let end = self.scanned + offset;
        let mut segment: Vec<u8> = self.buffer.bytes.drain(..=end).collect();
        segment.pop(); // terminator
        self.scanned = 0;
        self.lines_seen += 1;

        Some(self.decode(&segment))
    }

    fn decode(&mut self, bytes: &[u8]) -> Line {
        let line = self.encoding.decode(bytes);
        if line.is_err() {
            self.decode_errors += 1;
        }
        line
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        LineFramer::new(TextEncoding::default())
    }
}

/// Lines completed by a `feed` call, pulled lazily from the framer's buffer
pub struct Lines<'a> {
    framer: &'a mut LineFramer,
}

impl Iterator for Lines<'_> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        self.framer.next_line()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_lines(lines: Vec<Line>) -> Vec<String> {
        lines.into_iter().map(|l| l.unwrap()).collect()
    }

    #[test]
    fn test_single_chunk_multiple_lines() {
        let mut framer = LineFramer::default();
        let lines = framer.feed_all(b"START;A:1;END\nSTART;B:2;END\n");

        assert_eq!(ok_lines(lines), vec!["START;A:1;END", "START;B:2;END"]);
        assert!(framer.buffer().is_empty());
    }

    #[test]
    fn test_partial_line_stays_buffered() {
        let mut framer = LineFramer::default();

        assert!(framer.feed_all(b"START;LOAD:1").is_empty());
        assert_eq!(framer.buffer().as_bytes(), b"START;LOAD:1");

        let lines = framer.feed_all(b"2.5;END\nSTA");
        assert_eq!(ok_lines(lines), vec!["START;LOAD:12.5;END"]);
        assert_eq!(framer.buffer().as_bytes(), b"STA");
    }

    #[test]
    fn test_empty_chunk_is_noop() {
        let mut framer = LineFramer::default();
        framer.feed_all(b"abc");

        assert!(framer.feed_all(b"").is_empty());
        assert_eq!(framer.buffer().as_bytes(), b"abc");
        assert_eq!(framer.lines_seen(), 0);
    }

    #[test]
    fn test_chunking_does_not_change_lines() {
        let stream = "START;LOAD:12.5;DISTANCE:3.0;END\nnoise\n\nSTART;T:é;END\nSTART;X:1;END\n"
            .as_bytes();

        let mut whole = LineFramer::default();
        let expected = ok_lines(whole.feed_all(stream));
        assert_eq!(expected.len(), 5);

        // Every chunk size, including ones that split the two-byte 'é'
        for size in 1..=stream.len() {
            let mut framer = LineFramer::default();
            let mut got = Vec::new();
            for chunk in stream.chunks(size) {
                got.extend(ok_lines(framer.feed_all(chunk)));
            }
            assert_eq!(got, expected, "chunk size {}", size);
            assert!(framer.buffer().is_empty());
        }
    }

    #[test]
    fn test_invalid_utf8_line_dropped_and_stream_continues() {
        let mut framer = LineFramer::default();
        let lines = framer.feed_all(b"START;A:\xff\xfe;END\nSTART;A:1;END\n");

        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            Err(DecodeError::InvalidText {
                encoding: TextEncoding::Utf8,
                len: 14,
            })
        );
        assert_eq!(lines[1].as_deref(), Ok("START;A:1;END"));
        assert_eq!(framer.decode_errors(), 1);
        assert_eq!(framer.lines_seen(), 2);
        assert!(framer.buffer().is_empty());
    }

    #[test]
    fn test_ascii_rejects_high_bytes() {
        assert!(TextEncoding::Ascii.decode(b"LOAD:1").is_ok());
        assert!(TextEncoding::Ascii.decode("é".as_bytes()).is_err());
    }

    #[test]
    fn test_latin1_never_fails() {
        let mut framer = LineFramer::new(TextEncoding::Latin1);
        let lines = framer.feed_all(b"T:\xb0C\n");

        assert_eq!(ok_lines(lines), vec!["T:\u{b0}C"]);
        assert_eq!(framer.decode_errors(), 0);
    }

    #[test]
    fn test_lazy_iteration_leaves_unread_lines() {
        let mut framer = LineFramer::default();
        {
            let mut lines = framer.feed(b"one\ntwo\nthree\npart");
            assert_eq!(lines.next().unwrap().unwrap(), "one");
        }
        assert_eq!(framer.buffer().as_bytes(), b"two\nthree\npart");
        assert!(framer.buffer().has_complete_line());

        let rest = ok_lines(framer.feed_all(b"ial\n"));
        assert_eq!(rest, vec!["two", "three", "partial"]);
    }

    #[test]
    fn test_buffer_hand_over() {
        let mut first = LineFramer::default();
        first.feed_all(b"START;A:");
        let buffer = first.into_buffer();

        let mut second = LineFramer::with_buffer(TextEncoding::Utf8, buffer);
        let lines = second.feed_all(b"1;END\n");
        assert_eq!(ok_lines(lines), vec!["START;A:1;END"]);
    }

    #[test]
    fn test_flush_returns_trailing_bytes() {
        let mut framer = LineFramer::default();
        framer.feed_all(b"START;A:1;END\nSTART;B:2;END");

        let flushed = framer.flush();
        assert_eq!(flushed, Some(Ok("START;B:2;END".to_string())));
        assert!(framer.buffer().is_empty());
        assert_eq!(framer.flush(), None);
    }

    #[test]
    fn test_flush_keeps_complete_lines() {
        let mut framer = LineFramer::default();
        drop(framer.feed(b"done\ntail"));

        assert_eq!(framer.flush(), Some(Ok("tail".to_string())));
        assert_eq!(framer.buffer().as_bytes(), b"done\n");
    }
}
