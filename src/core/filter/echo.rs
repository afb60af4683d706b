//! Command echo suppression
//!
//! Consoles reflect typed characters back. Depending on the device this
//! arrives as the bare command, the command behind the prompt
//! (`Router#show version`), or with the partial retypes a slow console
//! produces (`sh show show version`).

use super::{compile, Dialect, FilterContext, FilterError, LineClassifier, Verdict};
use regex::Regex;

/// Discards lines that reflect the last sent command or start with a
/// known command keyword.
pub struct EchoFilter {
    keywords: Vec<String>,
    prompt_prefix: Regex,
}

impl EchoFilter {
    /// Build from a dialect
    pub fn new(dialect: &Dialect) -> Result<Self, FilterError> {
        Ok(Self {
            keywords: dialect.command_keywords.iter().map(|k| k.to_lowercase()).collect(),
            prompt_prefix: compile(&dialect.echo_prompt_prefix)?,
        })
    }

    fn strip_prompt<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.prompt_prefix
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    fn starts_with_keyword(&self, line: &str) -> bool {
        line.split_whitespace()
            .next()
            .is_some_and(|first| self.keywords.iter().any(|k| k == first))
    }

    /// Whether a sanitized line is an echo given the last sent command
    pub fn is_echo(&self, line: &str, last_sent: Option<&str>) -> bool {
        let lower = line.to_lowercase();
        let rest = self.strip_prompt(&lower);

        if let Some(cmd) = last_sent.map(str::trim).filter(|c| !c.is_empty()) {
            let cmd = cmd.to_lowercase();
            if reflects(&lower, &cmd) || is_stutter(&lower, &cmd) {
                return true;
            }
            if let Some(rest) = rest {
                if reflects(rest, &cmd) || is_stutter(rest, &cmd) {
                    return true;
                }
            }
        }

        self.starts_with_keyword(&lower) || rest.is_some_and(|r| self.starts_with_keyword(r))
    }
}

/// Equal to, extending, or a prefix of the command
fn reflects(line: &str, cmd: &str) -> bool {
    line == cmd || line.starts_with(cmd) || cmd.starts_with(line)
}

/// Repeated partial retypes of the command's first word followed by the
/// rest of the command
fn is_stutter(line: &str, cmd: &str) -> bool {
    let mut cmd_words = cmd.split_whitespace();
    let Some(head) = cmd_words.next() else {
        return false;
    };
    let body: Vec<&str> = cmd_words.collect();
    let words: Vec<&str> = line.split_whitespace().collect();
    let lead = words.iter().take_while(|w| head.starts_with(**w)).count();
    lead >= 2 && words[lead..] == body[..]
}

impl LineClassifier for EchoFilter {
    fn classify(&self, line: &str, ctx: &FilterContext<'_>) -> Option<Verdict> {
        self.is_echo(line, ctx.last_sent).then_some(Verdict::Echo)
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> EchoFilter {
        EchoFilter::new(&Dialect::default()).unwrap()
    }

    #[test]
    fn test_direct_echo() {
        let f = filter();
        assert!(f.is_echo("admin", Some("admin")));
        assert!(f.is_echo("ADMIN", Some("admin")));
        assert!(f.is_echo("adm", Some("admin")));
        assert!(f.is_echo("admin ", Some(" admin")));
    }

    #[test]
    fn test_bad_prompt_prefix_is_an_error() {
        let dialect = Dialect {
            echo_prompt_prefix: "(#".to_string(),
            ..Dialect::default()
        };
        match EchoFilter::new(&dialect) {
            Err(FilterError::InvalidPattern { pattern, .. }) => assert_eq!(pattern, "(#"),
            Err(e) => panic!("unexpected {e}"),
            Ok(_) => panic!("pattern should not compile"),
        }
    }

    #[test]
    fn test_prompt_prefixed_echo() {
        let f = filter();
        assert!(f.is_echo("Router#display clock", Some("display clock")));
        assert!(f.is_echo("# display clock", Some("display clock")));
        assert!(f.is_echo("Router(config)#hostname r1", Some("hostname r1")));
    }

    #[test]
    fn test_stutter_echo() {
        let f = filter();
        assert!(f.is_echo("# sh show show version", Some("show version")));
        assert!(f.is_echo("dis display clock", Some("display clock")));
        assert!(!f.is_echo("display clock", Some("show version")));
    }

    #[test]
    fn test_keyword_echo_without_last_command() {
        let f = filter();
        assert!(f.is_echo("show running-config", None));
        assert!(f.is_echo("Router#configure terminal", None));
        assert!(f.is_echo("interface Gi0/1", None));
    }

    #[test]
    fn test_output_is_not_echo() {
        let f = filter();
        assert!(!f.is_echo("Password:", Some("admin")));
        assert!(!f.is_echo("Cisco IOS Software", Some("show version")));
        assert!(!f.is_echo("uptime is 3 days", Some("")));
        assert!(!f.is_echo("Total > 5 drops", Some("x")));
    }
}
