//! Interactive input
//!
//! Lines typed at the terminal are sent as commands, except for a few
//! local directives starting with `:`.

/// One line of interactive input
#[derive(Debug, Clone, PartialEq)]
pub enum InputLine {
    /// Send as a command
    Command(String),
    /// `:login <user> <password>`
    Login {
        /// User name
        username: String,
        /// Password
        password: String,
    },
    /// `:gps <lat> <lon>`
    Gps {
        /// Latitude in degrees
        latitude: f64,
        /// Longitude in degrees
        longitude: f64,
    },
    /// `:quit`
    Quit,
}

/// Parse an input line. Malformed directives yield a usage message.
pub fn parse_input(line: &str) -> Result<InputLine, String> {
    let Some(directive) = line.trim_start().strip_prefix(':') else {
        return Ok(InputLine::Command(line.trim_end_matches(['\r', '\n']).to_string()));
    };

    let mut words = directive.split_whitespace();
    match words.next() {
        Some("quit" | "q" | "exit") => Ok(InputLine::Quit),
        Some("login") => match (words.next(), words.next()) {
            (Some(username), Some(password)) => Ok(InputLine::Login {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => Err("usage: :login <user> <password>".to_string()),
        },
        Some("gps") => {
            let coords = (words.next(), words.next());
            match coords {
                (Some(lat), Some(lon)) => parse_position(&format!("{lat},{lon}")),
                _ => Err("usage: :gps <lat> <lon>".to_string()),
            }
        }
        Some(other) => Err(format!("unknown directive :{other}")),
        None => Err("empty directive".to_string()),
    }
}

/// Parse `lat,lon`
pub fn parse_position(text: &str) -> Result<InputLine, String> {
    let (lat, lon) = text
        .split_once(',')
        .ok_or_else(|| format!("expected <lat>,<lon>, got {text}"))?;
    let latitude = lat
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid latitude {lat}: {e}"))?;
    let longitude = lon
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid longitude {lon}: {e}"))?;
    Ok(InputLine::Gps { latitude, longitude })
}

/// Split `user:password`
pub fn parse_credentials(text: &str) -> Result<(String, String), String> {
    match text.split_once(':') {
        Some((user, password)) if !user.is_empty() && !password.is_empty() => {
            Ok((user.to_string(), password.to_string()))
        }
        _ => Err("expected <user>:<password>".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_pass_through() {
        assert_eq!(
            parse_input("show version\n"),
            Ok(InputLine::Command("show version".into()))
        );
        assert_eq!(parse_input(""), Ok(InputLine::Command(String::new())));
    }

    #[test]
    fn test_directives() {
        assert_eq!(parse_input(":quit"), Ok(InputLine::Quit));
        assert_eq!(
            parse_input(":login admin s3cret"),
            Ok(InputLine::Login {
                username: "admin".into(),
                password: "s3cret".into()
            })
        );
        assert_eq!(
            parse_input(":gps 31.23 121.47"),
            Ok(InputLine::Gps {
                latitude: 31.23,
                longitude: 121.47
            })
        );
    }

    #[test]
    fn test_bad_directives() {
        assert!(parse_input(":login admin").is_err());
        assert!(parse_input(":gps north east").is_err());
        assert!(parse_input(":reboot").is_err());
    }

    #[test]
    fn test_credentials() {
        assert_eq!(
            parse_credentials("admin:pa:ss"),
            Ok(("admin".into(), "pa:ss".into()))
        );
        assert!(parse_credentials("admin").is_err());
        assert!(parse_credentials(":x").is_err());
    }
}
