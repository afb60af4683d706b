//! Core module containing the connection and session machinery
//!
//! This module provides:
//! - Transport adapters behind the `Connector` trait (tty, TCP, RFCOMM)
//! - Line framing and the pluggable noise / prompt / echo classifiers
//! - Command framing with checksum, hex mode and line endings
//! - The connection manager and its reader / writer tasks
//! - The automated login state machine
//! - The session controller tying it all together

pub mod codec;
pub mod connection;
pub mod filter;
pub mod framer;
pub mod gps;
pub mod login;
pub mod session;
pub mod transcript;
pub mod transport;
