//! Modulo-256 checksum token
//!
//! The token is the byte sum of the command modulo 256, rendered as two
//! uppercase hex digits. Both the encoder and the display decoration use
//! these functions so the two ends always agree.

/// Simple 8-bit sum
pub fn sum8_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Checksum token for a command string
pub fn modulo256_token(text: &str) -> String {
    format!("{:02X}", sum8_checksum(text.as_bytes()))
}

/// Append the checksum token to a command
pub fn append_token(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push_str(text);
    out.push_str(&modulo256_token(text));
    out
}

/// Result of checking a decorated line
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ChecksumMark {
    /// Token as it appeared on the line
    pub token: String,
    /// Whether the token matches the payload
    pub valid: bool,
}

/// Split the trailing two-character token off a line.
///
/// Returns `None` when the line is too short to carry a token or the split
/// would land inside a multi-byte character.
pub fn split_token(line: &str) -> Option<(&str, &str)> {
    if line.len() < 2 {
        return None;
    }
    let at = line.len() - 2;
    if !line.is_char_boundary(at) {
        return None;
    }
    Some(line.split_at(at))
}

/// Verify the trailing token of a line.
///
/// Outgoing lines are trusted and always marked valid; incoming lines are
/// compared case-insensitively against a fresh checksum of the payload.
pub fn verify_line(line: &str, outgoing: bool) -> Option<(String, ChecksumMark)> {
    let (payload, token) = split_token(line)?;
    let valid = outgoing || token.eq_ignore_ascii_case(&modulo256_token(payload));
    Some((
        payload.to_string(),
        ChecksumMark {
            token: token.to_string(),
            valid,
        },
    ))
}
