//! Prompt recognition

use super::{compile_all, Dialect, FilterContext, FilterError, LineClassifier, Verdict};
use regex::Regex;

/// What the console is prompting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    /// A shell ready for commands (`Router#`, `Switch>`)
    Command,
    /// User name
    Username,
    /// Password
    Password,
}

/// Recognizes command, username and password prompts
#[derive(Clone)]
pub struct PromptDetector {
    command: Vec<Regex>,
    username: Vec<String>,
    password: Vec<String>,
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

impl PromptDetector {
    /// Build from a dialect
    pub fn new(dialect: &Dialect) -> Result<Self, FilterError> {
        Ok(Self {
            command: compile_all(&dialect.prompt_patterns)?,
            username: lowercase_all(&dialect.username_prompts),
            password: lowercase_all(&dialect.password_prompts),
        })
    }

    /// Classify a sanitized line as a prompt
    pub fn kind(&self, line: &str) -> Option<PromptKind> {
        let lower = line.trim_end().to_lowercase();
        if self.password.iter().any(|p| lower.ends_with(p.as_str())) {
            Some(PromptKind::Password)
        } else if self.username.iter().any(|p| lower.ends_with(p.as_str())) {
            Some(PromptKind::Username)
        } else if self.is_command_prompt(line) {
            Some(PromptKind::Command)
        } else {
            None
        }
    }

    /// Whether the line shows a shell ready for input
    pub fn is_command_prompt(&self, line: &str) -> bool {
        let line = line.trim_end();
        self.command.iter().any(|re| re.is_match(line))
    }
}

impl LineClassifier for PromptDetector {
    fn classify(&self, line: &str, _ctx: &FilterContext<'_>) -> Option<Verdict> {
        self.kind(line).map(Verdict::Prompt)
    }

    fn name(&self) -> &'static str {
        "prompt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> PromptDetector {
        PromptDetector::new(&Dialect::default()).unwrap()
    }

    #[test]
    fn test_command_prompts() {
        let d = detector();
        for line in ["Router#", "Switch>", "Router(config)#", "Router(config-if)#", "#", "user@host:~$", "%"] {
            assert_eq!(d.kind(line), Some(PromptKind::Command), "{line}");
        }
    }

    #[test]
    fn test_credential_prompts() {
        let d = detector();
        assert_eq!(d.kind("Username:"), Some(PromptKind::Username));
        assert_eq!(d.kind("router login:"), Some(PromptKind::Username));
        assert_eq!(d.kind("User Name:"), Some(PromptKind::Username));
        assert_eq!(d.kind("Password:"), Some(PromptKind::Password));
        assert_eq!(d.kind("passwd:"), Some(PromptKind::Password));
    }

    #[test]
    fn test_not_prompts() {
        let d = detector();
        for line in ["Last login: Mon Jan 1 from 10.0.0.1", "% Login invalid", "Building configuration..."] {
            assert_eq!(d.kind(line), None, "{line}");
        }
    }
}
