//! Incoming line classification
//!
//! Every candidate line from the framer is sanitized and then offered to a
//! chain of classifiers. The first one that returns a verdict decides what
//! happens to the line; a line nobody claims is ordinary console output.
//!
//! The heuristics are best-effort and device-specific, so each one sits
//! behind [`LineClassifier`] and reads its keyword lists from a [`Dialect`].

mod dialect;
mod echo;
mod noise;
mod prompt;

pub use dialect::Dialect;
pub use echo::EchoFilter;
pub use noise::NoiseFilter;
pub use prompt::{PromptDetector, PromptKind};

use regex::Regex;
use thiserror::Error;

/// Filter construction errors
#[derive(Debug, Error)]
pub enum FilterError {
    /// A dialect regex does not compile
    #[error("Invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// Offending pattern
        pattern: String,
        /// Compiler error
        #[source]
        source: regex::Error,
    },
}

pub(crate) fn compile(pattern: &str) -> Result<Regex, FilterError> {
    Regex::new(pattern).map_err(|source| FilterError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

pub(crate) fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, FilterError> {
    patterns.iter().map(|p| compile(p)).collect()
}

/// What a classifier decided about a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Transport or modem chatter; discard
    Noise,
    /// The device reflecting what was just sent; discard
    Echo,
    /// The console is asking for something
    Prompt(PromptKind),
}

/// Final classification of a sanitized line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// Ordinary console output
    Text,
    /// Modem-style status output
    Noise,
    /// Command echo
    Echo,
    /// A prompt
    Prompt(PromptKind),
}

impl From<Verdict> for LineClass {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Noise => Self::Noise,
            Verdict::Echo => Self::Echo,
            Verdict::Prompt(kind) => Self::Prompt(kind),
        }
    }
}

impl LineClass {
    /// Whether the line is delivered to the session at all
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Text | Self::Prompt(_))
    }
}

/// State the classifiers may consult
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterContext<'a> {
    /// Most recently written command (trimmed, without checksum)
    pub last_sent: Option<&'a str>,
}

/// One heuristic in the classification chain
pub trait LineClassifier: Send + Sync {
    /// Inspect a sanitized, non-empty line
    fn classify(&self, line: &str, ctx: &FilterContext<'_>) -> Option<Verdict>;

    /// Name for diagnostics
    fn name(&self) -> &'static str;
}

/// Strips escape sequences and control bytes, collapses whitespace
pub struct Sanitizer {
    ansi: Regex,
    residue: Regex,
    whitespace: Regex,
}

impl Sanitizer {
    /// Build the sanitizer
    pub fn new() -> Result<Self, FilterError> {
        Ok(Self {
            ansi: compile(r"\x1B\[[\x30-\x3F]*[\x20-\x2F]*[\x40-\x7E]")?,
            // CSI bodies whose ESC was lost on the way
            residue: compile(r"\[\d+(?:;\d+)*[A-Za-z]")?,
            whitespace: compile(r"\s+")?,
        })
    }

    /// Clean a candidate line
    pub fn clean(&self, line: &str) -> String {
        let stripped = self.ansi.replace_all(line, "");
        let stripped: String = stripped
            .chars()
            .filter(|c| !c.is_ascii_control() || *c == ' ' || *c == '\t')
            .collect();
        let stripped = self.residue.replace_all(&stripped, "");
        self.whitespace.replace_all(&stripped, " ").trim().to_string()
    }
}

/// Ordered set of classifiers applied to every incoming line
pub struct FilterChain {
    sanitizer: Sanitizer,
    classifiers: Vec<Box<dyn LineClassifier>>,
}

impl FilterChain {
    /// An empty chain that only sanitizes
    pub fn empty() -> Result<Self, FilterError> {
        Ok(Self {
            sanitizer: Sanitizer::new()?,
            classifiers: Vec::new(),
        })
    }

    /// The standard chain for a dialect: noise, prompts, then echo
    pub fn from_dialect(dialect: &Dialect) -> Result<Self, FilterError> {
        Ok(Self::empty()?
            .with(NoiseFilter::new(dialect)?)
            .with(PromptDetector::new(dialect)?)
            .with(EchoFilter::new(dialect)?))
    }

    /// Append a classifier
    #[must_use]
    pub fn with(mut self, classifier: impl LineClassifier + 'static) -> Self {
        self.classifiers.push(Box::new(classifier));
        self
    }

    /// Names of the classifiers in order
    pub fn names(&self) -> Vec<&'static str> {
        self.classifiers.iter().map(|c| c.name()).collect()
    }

    /// Sanitize and classify a candidate line.
    ///
    /// Returns `None` when nothing is left after sanitizing.
    pub fn process(&self, raw: &str, ctx: &FilterContext<'_>) -> Option<(String, LineClass)> {
        let line = self.sanitizer.clean(raw);
        if line.is_empty() {
            return None;
        }
        let class = self.classify(&line, ctx);
        Some((line, class))
    }

    /// Classify an already sanitized line
    pub fn classify(&self, line: &str, ctx: &FilterContext<'_>) -> LineClass {
        for classifier in &self.classifiers {
            if let Some(verdict) = classifier.classify(line, ctx) {
                tracing::trace!("{} -> {:?}: {}", classifier.name(), verdict, line);
                return verdict.into();
            }
        }
        LineClass::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> FilterChain {
        FilterChain::from_dialect(&Dialect::default()).unwrap()
    }

    #[test]
    fn test_sanitize() {
        let s = Sanitizer::new().unwrap();
        assert_eq!(s.clean("\x1b[1;32mRouter#\x1b[0m"), "Router#");
        assert_eq!(s.clean("  a \t  b  "), "a b");
        assert_eq!(s.clean("[0mtext"), "text");
        assert_eq!(s.clean("[APP] ok"), "[APP] ok");
        assert_eq!(s.clean("\x1b[K"), "");
    }

    #[test]
    fn test_chain_order() {
        assert_eq!(chain().names(), vec!["noise", "prompt", "echo"]);
    }

    #[test]
    fn test_modem_noise_discarded() {
        let ctx = FilterContext::default();
        let (_, class) = chain().process("AT+VERSION", &ctx).unwrap();
        assert_eq!(class, LineClass::Noise);
        assert!(!class.is_delivered());
    }

    #[test]
    fn test_exact_echo_discarded() {
        let ctx = FilterContext {
            last_sent: Some("display clock"),
        };
        let (_, class) = chain().process("display clock", &ctx).unwrap();
        assert_eq!(class, LineClass::Echo);
    }

    #[test]
    fn test_router_prompt() {
        let ctx = FilterContext::default();
        let (line, class) = chain().process("Router#", &ctx).unwrap();
        assert_eq!(line, "Router#");
        assert_eq!(class, LineClass::Prompt(PromptKind::Command));
    }

    #[test]
    fn test_blank_after_sanitize() {
        assert!(chain().process("\x1b[2J   ", &FilterContext::default()).is_none());
    }

    #[test]
    fn test_output_passes() {
        let ctx = FilterContext {
            last_sent: Some("show version"),
        };
        let (line, class) = chain()
            .process("Cisco IOS Software, C2960 Software", &ctx)
            .unwrap();
        assert_eq!(class, LineClass::Text);
        assert_eq!(line, "Cisco IOS Software, C2960 Software");
    }

    struct Banner;

    impl LineClassifier for Banner {
        fn classify(&self, line: &str, _ctx: &FilterContext<'_>) -> Option<Verdict> {
            line.starts_with("***").then_some(Verdict::Noise)
        }

        fn name(&self) -> &'static str {
            "banner"
        }
    }

    #[test]
    fn test_custom_classifier() {
        let chain = FilterChain::empty().unwrap().with(Banner);
        let ctx = FilterContext::default();
        assert_eq!(chain.classify("*** welcome ***", &ctx), LineClass::Noise);
        assert_eq!(chain.classify("AT", &ctx), LineClass::Text);
    }

    #[test]
    fn test_invalid_pattern() {
        let dialect = Dialect {
            prompt_patterns: vec!["([".to_string()],
            ..Dialect::default()
        };
        assert!(matches!(
            FilterChain::from_dialect(&dialect),
            Err(FilterError::InvalidPattern { .. })
        ));
    }
}
