//! CLI Exit Codes
//!
//! Exit codes for scripted use of the terminal.

use crate::config::ConfigError;
use crate::core::session::SessionError;
use crate::core::transport::TransportError;
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Connection failed or lost
    pub const CONNECTION_FAILED: u8 = 3;

    /// Connection or login timeout
    pub const TIMEOUT: u8 = 4;

    /// Login rejected
    pub const AUTH_FAILED: u8 = 5;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 8;

    /// Internal error
    pub const INTERNAL_ERROR: u8 = 127;
}

const ALL_CODES: [u8; 8] = [0, 1, 2, 3, 4, 5, 8, 127];

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    pub fn success() -> Self {
        Self::Success(None)
    }

    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::CONNECTION_FAILED, msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::TIMEOUT, msg.into())
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::AUTH_FAILED, msg.into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) | Self::Error(_, msg) => Some(msg),
            Self::Success(None) => None,
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<&TransportError> for CliResult {
    fn from(err: &TransportError) -> Self {
        let code = match err {
            TransportError::Timeout(_) => ExitCodes::TIMEOUT,
            TransportError::InvalidAddress(_) => ExitCodes::INVALID_ARGS,
            _ => ExitCodes::CONNECTION_FAILED,
        };
        Self::Error(code, err.to_string())
    }
}

impl From<&SessionError> for CliResult {
    fn from(err: &SessionError) -> Self {
        match err {
            SessionError::Transport(e) => e.into(),
            SessionError::Filter(_) => Self::Error(ExitCodes::CONFIG_ERROR, err.to_string()),
            SessionError::Encode(_) | SessionError::InvalidPosition { .. } => {
                Self::Error(ExitCodes::INVALID_ARGS, err.to_string())
            }
            SessionError::Login(_) => Self::Error(ExitCodes::AUTH_FAILED, err.to_string()),
            SessionError::Closed => Self::Error(ExitCodes::INTERNAL_ERROR, err.to_string()),
        }
    }
}

impl From<&ConfigError> for CliResult {
    fn from(err: &ConfigError) -> Self {
        Self::Error(ExitCodes::CONFIG_ERROR, err.to_string())
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Invalid arguments",
        3 => "Connection failed",
        4 => "Timeout",
        5 => "Authentication failed",
        8 => "Configuration error",
        127 => "Internal error",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in ALL_CODES {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::login::LoginError;

    #[test]
    fn test_cli_result() {
        let success = CliResult::success();
        assert!(success.is_success());
        assert_eq!(success.code(), 0);

        let error = CliResult::connection_failed("page timeout");
        assert!(!error.is_success());
        assert_eq!(error.code(), 3);
        assert_eq!(error.message(), Some("page timeout"));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::Transport(TransportError::Timeout(10));
        assert_eq!(CliResult::from(&err).code(), ExitCodes::TIMEOUT);

        let err = SessionError::Transport(TransportError::Unavailable("no adapter".into()));
        assert_eq!(CliResult::from(&err).code(), ExitCodes::CONNECTION_FAILED);

        let err = SessionError::Login(LoginError::AlreadyLoggedIn);
        assert_eq!(CliResult::from(&err).code(), ExitCodes::AUTH_FAILED);
    }

    #[test]
    fn test_every_code_described() {
        for code in ALL_CODES {
            assert_ne!(exit_code_description(code), "Unknown error");
        }
    }
}
