//! Hex-mode command text
//!
//! In hex mode the user types the frame as hex digits (`"0D 0A"`), which
//! are converted to raw bytes before transmission.

use super::EncodeError;
use bytes::Bytes;

/// Parse hex digits into bytes, ignoring whitespace and `0x` prefixes
pub fn parse_hex_text(text: &str) -> Result<Bytes, EncodeError> {
    let mut digits = String::with_capacity(text.len());
    for token in text.split_whitespace() {
        let token = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        for (position, c) in token.char_indices() {
            if !c.is_ascii_hexdigit() {
                return Err(EncodeError::InvalidHex { position, found: c });
            }
        }
        digits.push_str(token);
    }

    if digits.len() % 2 != 0 {
        return Err(EncodeError::OddHexLength(digits.len()));
    }

    let bytes = ::hex::decode(&digits).map_err(|_| EncodeError::OddHexLength(digits.len()))?;
    Ok(Bytes::from(bytes))
}

/// Pretty-print hex text in byte pairs (`"0d0a" -> "0D 0A"`)
pub fn print_hex(text: &str) -> String {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let mut out = String::with_capacity(compact.len() * 3 / 2);
    let chars: Vec<char> = compact.chars().collect();
    for (i, pair) in chars.chunks(2).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.extend(pair.iter().map(char::to_ascii_uppercase));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(&parse_hex_text("48454C").unwrap()[..], b"HEL");
        assert_eq!(&parse_hex_text("48 45 4c").unwrap()[..], b"HEL");
        assert_eq!(&parse_hex_text("0x48 0x45").unwrap()[..], b"HE");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_hex_text("4G"),
            Err(EncodeError::InvalidHex { found: 'G', .. })
        ));
        assert!(matches!(parse_hex_text("484"), Err(EncodeError::OddHexLength(3))));
    }

    #[test]
    fn test_print() {
        assert_eq!(print_hex("0d0a41"), "0D 0A 41");
        assert_eq!(print_hex("0D 0A"), "0D 0A");
        assert_eq!(print_hex("ABC"), "AB C");
    }
}
