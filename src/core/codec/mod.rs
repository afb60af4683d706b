//! Outgoing command framing
//!
//! A frame is the command text, optionally suffixed with a checksum
//! token, optionally converted from hex digits, followed by the configured
//! line terminator.

pub mod checksum;
pub mod hex;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Command terminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// No terminator
    None,
    /// Line Feed only
    Lf,
    /// Carriage Return only
    Cr,
    /// Both CR and LF
    #[default]
    CrLf,
}

impl LineEnding {
    /// Get the byte sequence for this line ending
    pub fn bytes(&self) -> &'static [u8] {
        match self {
            Self::None => b"",
            Self::Lf => b"\n",
            Self::Cr => b"\r",
            Self::CrLf => b"\r\n",
        }
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Lf => write!(f, "lf"),
            Self::Cr => write!(f, "cr"),
            Self::CrLf => write!(f, "crlf"),
        }
    }
}

impl FromStr for LineEnding {
    type Err = String;

    /// Accepts names (`crlf`) as well as escaped forms (`\r\n`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "lf" | "\\n" | "\n" => Ok(Self::Lf),
            "cr" | "\\r" | "\r" => Ok(Self::Cr),
            "crlf" | "\\r\\n" | "\r\n" => Ok(Self::CrLf),
            other => Err(format!("unknown line ending: {other}")),
        }
    }
}

/// Encoding errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EncodeError {
    /// Non-hex character in hex mode
    #[error("Invalid hex character at position {position}: {found}")]
    InvalidHex {
        /// Offset within the offending token
        position: usize,
        /// Offending character
        found: char,
    },

    /// Hex mode needs whole bytes
    #[error("Hex string must have even number of digits (got {0})")]
    OddHexLength(usize),
}

/// Encode a command into an outgoing frame
pub fn encode(
    text: &str,
    hex_mode: bool,
    append_checksum: bool,
    terminator: LineEnding,
) -> Result<Bytes, EncodeError> {
    let body = if append_checksum {
        checksum::append_token(text)
    } else {
        text.to_string()
    };

    let payload = if hex_mode {
        hex::parse_hex_text(&body)?
    } else {
        Bytes::from(body.into_bytes())
    };

    let ending = terminator.bytes();
    let mut frame = BytesMut::with_capacity(payload.len() + ending.len());
    frame.put_slice(&payload);
    frame.put_slice(ending);
    Ok(frame.freeze())
}

/// A command ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFrame {
    /// Command as typed, trimmed, without checksum
    pub command: String,
    /// Text shown in the transcript (with checksum token when enabled)
    pub display: String,
    /// Bytes for the transport
    pub bytes: Bytes,
}

/// Frames commands according to the terminal settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandEncoder {
    /// Command text is hex digits
    pub hex_mode: bool,
    /// Append the modulo-256 token
    pub checksum: bool,
    /// Terminator appended to every frame
    pub line_ending: LineEnding,
}

impl CommandEncoder {
    /// Create an encoder
    pub fn new(hex_mode: bool, checksum: bool, line_ending: LineEnding) -> Self {
        Self {
            hex_mode,
            checksum,
            line_ending,
        }
    }

    /// Frame a command. Blank commands yield `None` and must not be written.
    pub fn frame(&self, text: &str) -> Result<Option<OutgoingFrame>, EncodeError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let bytes = encode(text, self.hex_mode, self.checksum, self.line_ending)?;
        let display = if self.checksum {
            checksum::append_token(text)
        } else {
            text.to_string()
        };
        Ok(Some(OutgoingFrame {
            command: text.trim().to_string(),
            display,
            bytes,
        }))
    }

    /// A frame consisting of the terminator alone, used to wake a console
    pub fn enter(&self) -> OutgoingFrame {
        OutgoingFrame {
            command: String::new(),
            display: String::new(),
            bytes: Bytes::from_static(self.line_ending.bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_frame_is_text_then_terminator() {
        for ending in [LineEnding::None, LineEnding::Lf, LineEnding::Cr, LineEnding::CrLf] {
            for cmd in ["show version", "  padded ", "ünïcode"] {
                let frame = encode(cmd, false, false, ending).unwrap();
                assert!(frame.ends_with(ending.bytes()));
                assert_eq!(&frame[..frame.len() - ending.bytes().len()], cmd.as_bytes());
            }
        }
    }

    #[test]
    fn test_checksum_frame() {
        let frame = encode("ab", false, true, LineEnding::Lf).unwrap();
        assert_eq!(&frame[..], b"abC3\n");
    }

    #[test]
    fn test_hex_frame() {
        let frame = encode("48 49", true, false, LineEnding::CrLf).unwrap();
        assert_eq!(&frame[..], b"HI\r\n");

        // checksum digits are hex too, so they are converted with the body
        let frame = encode("41", true, true, LineEnding::None).unwrap();
        // sum of "41" = 0x34 + 0x31 = 0x65
        assert_eq!(&frame[..], &[0x41, 0x65]);
    }

    #[test]
    fn test_hex_frame_rejects_text() {
        assert!(encode("show", true, false, LineEnding::Lf).is_err());
    }

    #[test]
    fn test_encoder_frame_and_enter() {
        let encoder = CommandEncoder::new(false, true, LineEnding::CrLf);
        assert_eq!(encoder.frame("   ").unwrap(), None);

        let frame = encoder.frame(" ab ").unwrap().unwrap();
        assert_eq!(frame.command, "ab");
        assert!(frame.display.starts_with(" ab "));
        assert!(frame.bytes.ends_with(b"\r\n"));

        assert_eq!(&encoder.enter().bytes[..], b"\r\n");
    }

    #[test]
    fn test_line_ending_parse() {
        assert_eq!("\\r\\n".parse::<LineEnding>().unwrap(), LineEnding::CrLf);
        assert_eq!("LF".parse::<LineEnding>().unwrap(), LineEnding::Lf);
        assert_eq!("".parse::<LineEnding>().unwrap(), LineEnding::None);
        assert!("tab".parse::<LineEnding>().is_err());
    }
}
