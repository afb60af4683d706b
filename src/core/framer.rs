//! Newline framing of the incoming byte stream
//!
//! Printable ASCII and ESC are accumulated; `\n` completes a line; every
//! other control byte (including `\r`) is dropped. ESC is kept so escape
//! sequences can be removed as a whole by the sanitizer.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

const ESC: u8 = 0x1B;

/// Default cap on a single line before the excess is discarded
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Reassembles newline-delimited lines from arbitrary chunks
#[derive(Debug, Clone)]
pub struct LineFramer {
    line: Vec<u8>,
    max_line_length: usize,
    overflowed: bool,
}

impl LineFramer {
    /// Create a framer with the default line cap
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a framer with a custom line cap
    pub fn with_max_length(max_line_length: usize) -> Self {
        Self {
            line: Vec::with_capacity(256),
            max_line_length,
            overflowed: false,
        }
    }

    /// Feed one byte; returns a candidate line when `b` is a newline
    pub fn push_byte(&mut self, b: u8) -> Option<String> {
        match b {
            b'\n' => {
                if self.overflowed {
                    tracing::debug!("Line exceeded {} bytes, truncated", self.max_line_length);
                    self.overflowed = false;
                }
                // Only ASCII is ever stored, so this cannot fail.
                let line = String::from_utf8_lossy(&self.line).into_owned();
                self.line.clear();
                Some(line)
            }
            0x20..=0x7E | ESC => {
                if self.line.len() < self.max_line_length {
                    self.line.push(b);
                } else {
                    self.overflowed = true;
                }
                None
            }
            _ => None,
        }
    }

    /// Feed a chunk, collecting every completed line
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        chunk.iter().filter_map(|&b| self.push_byte(b)).collect()
    }

    /// Bytes held for the line in progress
    pub fn pending(&self) -> usize {
        self.line.len()
    }

    /// Drop any partial line
    pub fn reset(&mut self) {
        self.line.clear();
        self.overflowed = false;
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineFramer {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut consumed = 0;
        let mut found = None;
        for &b in src.iter() {
            consumed += 1;
            if let Some(line) = self.push_byte(b) {
                found = Some(line);
                break;
            }
        }
        src.advance(consumed);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    #[test]
    fn test_lines_simple() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"Hello\nWorld\n");
        assert_eq!(lines, vec!["Hello", "World"]);
    }

    #[test]
    fn test_lines_split_across_chunks() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"Hel").is_empty());
        assert_eq!(framer.pending(), 3);
        assert_eq!(framer.push(b"lo\r\n"), vec!["Hello"]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_control_bytes_dropped_escape_kept() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"a\x07b\x00c\x1b[0m\t\n");
        assert_eq!(lines, vec!["abc\u{1b}[0m"]);
    }

    #[test]
    fn test_non_ascii_dropped() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push("é ok\n".as_bytes()), vec![" ok"]);
    }

    #[test]
    fn test_max_length() {
        let mut framer = LineFramer::with_max_length(4);
        assert_eq!(framer.push(b"abcdefgh\nxy\n"), vec!["abcd", "xy"]);
    }

    #[test]
    fn test_decoder_yields_one_line_at_a_time() {
        let mut framer = LineFramer::new();
        let mut buf = BytesMut::new();
        buf.put_slice(b"one\ntwo\nthr");

        assert_eq!(framer.decode(&mut buf).unwrap().as_deref(), Some("one"));
        assert_eq!(&buf[..], b"two\nthr");
        assert_eq!(framer.decode(&mut buf).unwrap().as_deref(), Some("two"));
        assert_eq!(framer.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());

        buf.put_slice(b"ee\n");
        assert_eq!(framer.decode(&mut buf).unwrap().as_deref(), Some("three"));
    }
}
