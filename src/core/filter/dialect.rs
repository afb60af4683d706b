//! Device dialect: the keyword lists and patterns the classifiers use
//!
//! The defaults target Cisco-like consoles behind a serial Bluetooth
//! module. Other devices can supply their own lists through the `dialect`
//! section of the configuration file.

use serde::{Deserialize, Serialize};

/// Keyword lists and regexes for one family of devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dialect {
    /// Line prefixes of modem-style status output (case-sensitive)
    pub noise_prefixes: Vec<String>,
    /// Whole-word status tokens (case-sensitive)
    pub noise_tokens: Vec<String>,
    /// Regexes matching whole noise lines (addresses, dates, baud rates)
    pub noise_patterns: Vec<String>,
    /// First words that mark a line as a command echo (case-insensitive)
    pub command_keywords: Vec<String>,
    /// Regexes for a console ready for input
    pub prompt_patterns: Vec<String>,
    /// Regex for a prompt in front of echoed input; group 1 is the input
    pub echo_prompt_prefix: String,
    /// Line endings that ask for a user name (case-insensitive)
    pub username_prompts: Vec<String>,
    /// Line endings that ask for a password (case-insensitive)
    pub password_prompts: Vec<String>,
    /// Words reporting a rejected login (case-insensitive)
    pub failure_keywords: Vec<String>,
    /// Text asking for a key press (case-insensitive)
    pub press_enter: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            noise_prefixes: strings(&["AT", "+"]),
            noise_tokens: strings(&["OK", "ERROR", "READY", "VERSION"]),
            noise_patterns: strings(&[
                // MAC-style addresses
                r"^(?:0x)?[0-9A-Fa-f]{2}(?:[:-][0-9A-Fa-f]{2}){5}$",
                // bare hex words such as 0x1F00
                r"^0x[0-9A-Fa-f]+$",
                // dates, optionally followed by a time
                r"^\d{4}[-/.]\d{1,2}[-/.]\d{1,2}(?:[ T]\d{1,2}:\d{2}(?::\d{2})?)?$",
                // baud rates, optionally with a parameter tail
                r"^(?:1200|2400|4800|9600|19200|38400|57600|115200|230400|460800|921600)(?:[,\s].*)?$",
            ]),
            command_keywords: strings(&[
                "show",
                "configure",
                "interface",
                "ip",
                "enable",
                "terminal",
                "gps",
            ]),
            prompt_patterns: strings(&[
                // Router#  Switch>  Router(config-if)#
                r"^[A-Za-z0-9_.\-]+(?:\([A-Za-z0-9_.\-]*\))?[#>]$",
                r"[#>$%]$",
            ]),
            echo_prompt_prefix: r"^[A-Za-z0-9_.\-@~:/]*(?:\([A-Za-z0-9_.\-]*\))?[#>$]\s*(.+)$".to_string(),
            username_prompts: strings(&["login:", "username:", "user:", "user name:"]),
            password_prompts: strings(&["password:", "passwd:"]),
            failure_keywords: strings(&[
                "incorrect",
                "wrong",
                "fail",
                "error",
                "denied",
                "invalid",
            ]),
            press_enter: "press enter".to_string(),
        }
    }
}
