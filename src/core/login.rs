//! Automated login state machine
//!
//! Drives a username/password exchange against an interactive console using
//! only the prompts it observes. The machine is pure: it never touches the
//! transport or a clock. Callers feed it lines and timer expiries and carry
//! out the [`LoginAction`]s it returns (the session controller sends each
//! step after a settle delay and owns the timeout).
//!
//! `Waiting*` states mean the step is scheduled but not yet written,
//! `Sent*` states mean it has gone out on the wire.

use super::connection::LinkFlags;
use super::filter::{Dialect, PromptKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Login progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoginState {
    /// No login, or the wake-up enter is scheduled
    #[default]
    Idle,
    /// Bare enter written, waiting for a prompt
    SentEnter,
    /// Username scheduled
    WaitingUsername,
    /// Username written
    SentUsername,
    /// Password scheduled
    WaitingPassword,
    /// Password written
    SentPassword,
    /// Device is answering the password
    WaitingResult,
    /// Shell prompt seen
    Success,
    /// Failure keyword seen
    Failed,
    /// Deadline passed
    Timeout,
}

impl LoginState {
    /// Check if the login has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Timeout)
    }
}

/// One outgoing step of the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginStep {
    /// Initial bare enter that wakes an idle console
    Wake,
    /// Bare enter asked for by the device ("press enter")
    Enter,
    /// The username
    Username,
    /// The password
    Password,
}

/// How a login ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginOutcome {
    /// A shell prompt appeared
    Success,
    /// The device rejected the credentials
    Failed {
        /// The line that reported the failure
        reason: String,
    },
    /// No shell prompt before the deadline
    TimedOut,
}

impl LoginOutcome {
    /// Check if the login succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Human-readable reason
    pub fn reason(&self) -> String {
        match self {
            Self::Success => "Login successful".to_string(),
            Self::Failed { reason } => format!("Login failed: {reason}"),
            Self::TimedOut => "Login timeout".to_string(),
        }
    }
}

/// Work the caller must carry out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginAction {
    /// Schedule a step after the settle delay
    Send(LoginStep),
    /// The login ended; cancel its timers and report
    Finish(LoginOutcome),
}

/// Reasons a login cannot start
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// The link already shows a logged-in shell
    #[error("Already logged in")]
    AlreadyLoggedIn,
    /// Another login is running
    #[error("Login already in progress")]
    InProgress,
    /// No connection to log in over
    #[error("Not connected")]
    NotConnected,
    /// Username or password missing
    #[error("Username and password can not be empty")]
    EmptyCredentials,
}

struct Credentials {
    username: String,
    password: String,
}

/// The login session of one connection
pub struct LoginMachine {
    state: LoginState,
    session: Option<Credentials>,
    failure_keywords: Vec<String>,
    press_enter: String,
}

impl LoginMachine {
    /// Create a machine using the dialect's failure and "press enter" texts
    pub fn new(dialect: &Dialect) -> Self {
        Self {
            state: LoginState::Idle,
            session: None,
            failure_keywords: dialect
                .failure_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            press_enter: dialect.press_enter.to_lowercase(),
        }
    }

    /// Current state
    pub fn state(&self) -> LoginState {
        self.state
    }

    /// Check if a login session is active
    pub fn is_logging_in(&self) -> bool {
        self.session.is_some()
    }

    /// Begin a login.
    ///
    /// The caller arms the timeout when this succeeds.
    pub fn start(
        &mut self,
        username: &str,
        password: &str,
        flags: LinkFlags,
    ) -> Result<Vec<LoginAction>, LoginError> {
        if flags.already_logged {
            return Err(LoginError::AlreadyLoggedIn);
        }
        if self.session.is_some() {
            return Err(LoginError::InProgress);
        }
        if username.is_empty() || password.is_empty() {
            return Err(LoginError::EmptyCredentials);
        }

        self.session = Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
        info!("Starting login as {}", username);

        if flags.already_woken {
            self.transition(LoginState::WaitingUsername);
            Ok(vec![LoginAction::Send(LoginStep::Username)])
        } else {
            self.transition(LoginState::Idle);
            Ok(vec![LoginAction::Send(LoginStep::Wake)])
        }
    }

    /// A scheduled step is due. Returns the text to write (empty for a
    /// bare enter), or `None` when the step is no longer wanted.
    pub fn take_step(&mut self, step: LoginStep) -> Option<String> {
        let session = self.session.as_ref()?;
        match (step, self.state) {
            (LoginStep::Wake, LoginState::Idle) => {
                self.transition(LoginState::SentEnter);
                Some(String::new())
            }
            (LoginStep::Enter, _) => Some(String::new()),
            (LoginStep::Username, LoginState::WaitingUsername) => {
                let username = session.username.clone();
                self.transition(LoginState::SentUsername);
                Some(username)
            }
            (LoginStep::Password, LoginState::WaitingPassword) => {
                let password = session.password.clone();
                self.transition(LoginState::SentPassword);
                Some(password)
            }
            _ => None,
        }
    }

    /// Feed one incoming line, with the prompt kind the reader detected
    pub fn on_line(&mut self, line: &str, prompt: Option<PromptKind>) -> Vec<LoginAction> {
        if self.session.is_none() {
            return Vec::new();
        }

        if prompt == Some(PromptKind::Command) {
            return vec![self.finish(LoginOutcome::Success)];
        }

        let lower = line.to_lowercase();
        let mut actions = Vec::new();
        if !self.press_enter.is_empty() && lower.contains(&self.press_enter) {
            actions.push(LoginAction::Send(LoginStep::Enter));
        }

        match (self.state, prompt) {
            (LoginState::Idle | LoginState::SentEnter | LoginState::SentUsername, Some(PromptKind::Username)) => {
                self.transition(LoginState::WaitingUsername);
                actions.push(LoginAction::Send(LoginStep::Username));
            }
            (
                LoginState::SentEnter
                | LoginState::SentUsername
                | LoginState::SentPassword
                | LoginState::WaitingResult,
                Some(PromptKind::Password),
            ) => {
                self.transition(LoginState::WaitingPassword);
                actions.push(LoginAction::Send(LoginStep::Password));
            }
            (LoginState::SentPassword | LoginState::WaitingResult, None) => {
                if self.failure_keywords.iter().any(|k| lower.contains(k.as_str())) {
                    actions.push(self.finish(LoginOutcome::Failed {
                        reason: line.to_string(),
                    }));
                } else {
                    self.transition(LoginState::WaitingResult);
                }
            }
            _ => {}
        }
        actions
    }

    /// The deadline passed
    pub fn on_timeout(&mut self) -> Option<LoginAction> {
        self.session.as_ref()?;
        Some(self.finish(LoginOutcome::TimedOut))
    }

    /// Drop the session without an outcome (disconnect)
    pub fn cancel(&mut self) -> bool {
        let active = self.session.take().is_some();
        if active {
            debug!("Login cancelled");
        }
        self.state = LoginState::Idle;
        active
    }

    fn finish(&mut self, outcome: LoginOutcome) -> LoginAction {
        self.session = None;
        self.transition(match outcome {
            LoginOutcome::Success => LoginState::Success,
            LoginOutcome::Failed { .. } => LoginState::Failed,
            LoginOutcome::TimedOut => LoginState::Timeout,
        });
        info!("{}", outcome.reason());
        LoginAction::Finish(outcome)
    }

    fn transition(&mut self, to: LoginState) {
        if self.state != to {
            debug!("Login {:?} -> {:?}", self.state, to);
            self.state = to;
        }
    }
}
