//! # sppterm Core Library
//!
//! A line-oriented terminal for remote consoles reached over a serial-like
//! byte stream (Bluetooth RFCOMM, an RFCOMM tty, or a TCP bridge):
//! - Line framing with modem-noise and command-echo suppression
//! - Command framing with modulo-256 checksums, hex mode and line endings
//! - Unattended username/password login driven by observed prompts
//! - GPS position commands
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sppterm_core::{
//!     ConnectionState, DeviceIdentity, SessionController, SessionEvent, SessionOptions, TcpConnector,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = SessionController::new(Arc::new(TcpConnector::default()), SessionOptions::default())?;
//!     let mut rx = session.subscribe();
//!     session.connect(DeviceIdentity::new("192.168.1.10:2323")).await?;
//!
//!     while let Ok(event) = rx.recv().await {
//!         match event {
//!             SessionEvent::StateChanged(ConnectionState::Connected) => {
//!                 session.send_login("admin", "secret").await?;
//!             }
//!             SessionEvent::LineReceived(line) => println!("{}", line.text),
//!             SessionEvent::LoginOutcome { outcome, reason } => {
//!                 println!("{reason}");
//!                 if outcome.is_success() {
//!                     session.send_command("show version").await?;
//!                 }
//!             }
//!             _ => {}
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat};
pub use crate::config::{AppConfig, ConfigError};
pub use crate::core::codec::{CommandEncoder, EncodeError, LineEnding, OutgoingFrame};
pub use crate::core::connection::{ConnectionEvent, ConnectionManager, ConnectionState, LinkFlags};
pub use crate::core::filter::{Dialect, FilterChain, LineClass, LineClassifier, PromptKind};
pub use crate::core::login::{LoginError, LoginMachine, LoginOutcome, LoginState};
pub use crate::core::session::{SessionController, SessionError, SessionEvent, SessionOptions};
pub use crate::core::transcript::{DecodedLine, Direction, Transcript};
pub use crate::core::transport::{
    create_connector, Connector, DeviceIdentity, Link, SerialConnector, TcpConnector, TransportError,
    TransportKind, TransportSettings,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
