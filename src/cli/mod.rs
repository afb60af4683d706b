//! CLI Module
//!
//! Provides command-line interface functionality including:
//! - Exit codes for automation
//! - Interactive input directives
//! - Event output formats

pub mod exit_codes;
pub mod input;
pub mod output;

pub use exit_codes::{exit_code_description, print_exit_codes, CliResult, ExitCodes};
pub use input::{parse_credentials, parse_input, parse_position, InputLine};
pub use output::{render_event, OutputFormat, Rendered};
