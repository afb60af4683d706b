//! Modem-style status chatter from the serial Bluetooth module

use super::{compile, compile_all, Dialect, FilterContext, FilterError, LineClassifier, Verdict};
use regex::Regex;

/// Discards `AT...`, `+...`, `OK`/`ERROR` style status lines and other
/// non-console output such as bare addresses, dates and baud rates.
pub struct NoiseFilter {
    prefixes: Vec<String>,
    tokens: Option<Regex>,
    patterns: Vec<Regex>,
}

impl NoiseFilter {
    /// Build from a dialect
    pub fn new(dialect: &Dialect) -> Result<Self, FilterError> {
        let tokens = if dialect.noise_tokens.is_empty() {
            None
        } else {
            let alternation = dialect
                .noise_tokens
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|");
            Some(compile(&format!(r"\b(?:{alternation})\b"))?)
        };

        Ok(Self {
            prefixes: dialect.noise_prefixes.clone(),
            tokens,
            patterns: compile_all(&dialect.noise_patterns)?,
        })
    }

    /// Whether a sanitized line is transport noise
    pub fn is_noise(&self, line: &str) -> bool {
        self.prefixes.iter().any(|p| line.starts_with(p.as_str()))
            || self.tokens.as_ref().is_some_and(|re| re.is_match(line))
            || self.patterns.iter().any(|re| re.is_match(line))
    }
}

impl LineClassifier for NoiseFilter {
    fn classify(&self, line: &str, _ctx: &FilterContext<'_>) -> Option<Verdict> {
        self.is_noise(line).then_some(Verdict::Noise)
    }

    fn name(&self) -> &'static str {
        "noise"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> NoiseFilter {
        NoiseFilter::new(&Dialect::default()).unwrap()
    }

    #[test]
    fn test_modem_responses() {
        let f = filter();
        for line in [
            "AT+VERSION",
            "AT",
            "+ADDR:98d3:31:fb1c2a",
            "OK",
            "ERROR:(0)",
            "BT READY",
            "VERSION:3.0-20170601",
        ] {
            assert!(f.is_noise(line), "{line}");
        }
    }

    #[test]
    fn test_addresses_dates_bauds() {
        let f = filter();
        assert!(f.is_noise("98:D3:31:FB:1C:2A"));
        assert!(f.is_noise("0x1F00"));
        assert!(f.is_noise("2017-06-01"));
        assert!(f.is_noise("2017/06/01 12:30:01"));
        assert!(f.is_noise("9600"));
        assert!(f.is_noise("115200,0,0"));
    }

    #[test]
    fn test_console_output_kept() {
        let f = filter();
        for line in [
            "Username:",
            "% Login invalid",
            "Cisco IOS Software, Version 15.0(2)SE",
            "BOOKING done",
            "Router#",
            "uptime is 2 weeks",
            "Error in authentication",
        ] {
            assert!(!f.is_noise(line), "{line}");
        }
    }
}
