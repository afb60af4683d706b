//! Decoded lines and their transcript rendering

use super::codec::checksum::{verify_line, ChecksumMark};
use super::codec::hex::print_hex;
use super::codec::OutgoingFrame;
use chrono::{DateTime, Local};
use serde::Serialize;

/// Data direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// From the device
    Incoming,
    /// To the device
    Outgoing,
}

impl Direction {
    /// Arrow used in the transcript
    pub fn arrow(&self) -> &'static str {
        match self {
            Direction::Incoming => " >> ",
            Direction::Outgoing => " << ",
        }
    }
}

/// A cleaned line of console text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedLine {
    /// When the line was decoded
    pub timestamp: DateTime<Local>,
    /// Incoming or outgoing
    pub direction: Direction,
    /// Text without the checksum token
    pub text: String,
    /// Checksum token and verdict, in checksum mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<ChecksumMark>,
    /// Text is shown as hex
    pub hex: bool,
}

impl DecodedLine {
    /// Line received from the device.
    ///
    /// With checksum mode on, the last two characters are split off and
    /// verified; the result is for display only.
    pub fn incoming(text: &str, checksum: bool, hex: bool) -> Self {
        let (text, checksum) = match checksum.then(|| verify_line(text, false)).flatten() {
            Some((payload, mark)) => (payload, Some(mark)),
            None => (text.to_string(), None),
        };
        Self {
            timestamp: Local::now(),
            direction: Direction::Incoming,
            text,
            checksum,
            hex,
        }
    }

    /// Line written to the device
    pub fn outgoing(frame: &OutgoingFrame, checksum: bool, hex: bool) -> Self {
        let (text, checksum) = match checksum.then(|| verify_line(&frame.display, true)).flatten() {
            Some((payload, mark)) => (payload, Some(mark)),
            None => (frame.display.clone(), None),
        };
        Self {
            timestamp: Local::now(),
            direction: Direction::Outgoing,
            text,
            checksum,
            hex,
        }
    }
}

/// Renders lines for a plain-text transcript
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transcript {
    /// Prefix lines with `[HH:MM:SS.mmm]`
    pub show_timings: bool,
    /// Show ` << ` / ` >> ` arrows
    pub show_direction: bool,
}

impl Transcript {
    /// Create a renderer
    pub fn new(show_timings: bool, show_direction: bool) -> Self {
        Self {
            show_timings,
            show_direction,
        }
    }

    /// Format one line
    pub fn render(&self, line: &DecodedLine) -> String {
        let mut out = String::new();
        if self.show_timings {
            out.push_str(&format!("[{}]", line.timestamp.format("%H:%M:%S%.3f")));
        }
        if self.show_direction {
            out.push_str(line.direction.arrow());
        } else {
            out.push(' ');
        }

        out.push_str(&hex_aware(&line.text, line.direction, line.hex));
        if let Some(mark) = &line.checksum {
            let token = if line.hex {
                print_hex(&mark.token)
            } else {
                mark.token.clone()
            };
            let verdict = if mark.valid { "ok" } else { "bad" };
            out.push_str(&format!(" [{token} {verdict}]"));
        }
        out
    }
}

/// Outgoing hex text is already digits; incoming text is shown as its bytes
fn hex_aware(text: &str, direction: Direction, hex: bool) -> String {
    match (hex, direction) {
        (false, _) => text.to_string(),
        (true, Direction::Outgoing) => print_hex(text),
        (true, Direction::Incoming) => print_hex(&::hex::encode_upper(text.as_bytes())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn frame(display: &str) -> OutgoingFrame {
        OutgoingFrame {
            command: display.to_string(),
            display: display.to_string(),
            bytes: Bytes::new(),
        }
    }

    #[test]
    fn test_plain_render() {
        let t = Transcript::default();
        let line = DecodedLine::incoming("uptime is 3 days", false, false);
        assert_eq!(t.render(&line), " uptime is 3 days");
    }

    #[test]
    fn test_direction_arrows() {
        let t = Transcript::new(false, true);
        assert_eq!(t.render(&DecodedLine::incoming("a", false, false)), " >> a");
        assert_eq!(t.render(&DecodedLine::outgoing(&frame("b"), false, false)), " << b");
    }

    #[test]
    fn test_timestamp_prefix() {
        let t = Transcript::new(true, false);
        let rendered = t.render(&DecodedLine::incoming("x", false, false));
        // [HH:MM:SS.mmm]
        assert_eq!(rendered.len(), "[00:00:00.000] x".len());
        assert!(rendered.starts_with('['));
        assert_eq!(&rendered[13..], "] x");
    }

    #[test]
    fn test_incoming_checksum_marks() {
        let t = Transcript::default();
        // 'A' + 'B' = 0x83
        let good = DecodedLine::incoming("AB83", true, false);
        assert_eq!(good.text, "AB");
        assert_eq!(t.render(&good), " AB [83 ok]");

        // 'a' + 'b' = 0xC3, token compared case-insensitively
        let lower = DecodedLine::incoming("abc3", true, false);
        assert!(lower.checksum.unwrap().valid);

        let bad = DecodedLine::incoming("ABFF", true, false);
        assert_eq!(t.render(&bad), " AB [FF bad]");
    }

    #[test]
    fn test_outgoing_checksum_always_valid() {
        let line = DecodedLine::outgoing(&frame("show00"), true, false);
        assert_eq!(line.text, "show");
        assert!(line.checksum.unwrap().valid);
    }

    #[test]
    fn test_short_line_without_token() {
        let line = DecodedLine::incoming("#", true, false);
        assert_eq!(line.text, "#");
        assert!(line.checksum.is_none());
    }

    #[test]
    fn test_hex_render() {
        let t = Transcript::default();
        let out = DecodedLine::outgoing(&frame("0d0a"), false, true);
        assert_eq!(t.render(&out), " 0D 0A");
        let inc = DecodedLine::incoming("OK", false, true);
        assert_eq!(t.render(&inc), " 4F 4B");
    }
}
