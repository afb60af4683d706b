//! Rendering session events for stdout / stderr

use crate::core::session::SessionEvent;
use crate::core::transcript::Transcript;
use clap::ValueEnum;

/// CLI output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable transcript
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Where a rendered event goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// Transcript output
    Stdout(String),
    /// Status output
    Stderr(String),
}

/// Render an event in the selected format
pub fn render_event(event: &SessionEvent, format: OutputFormat, transcript: &Transcript) -> Option<Rendered> {
    match format {
        OutputFormat::Json => serde_json::to_string(event).ok().map(Rendered::Stdout),
        OutputFormat::Text => render_text(event, transcript),
    }
}

fn render_text(event: &SessionEvent, transcript: &Transcript) -> Option<Rendered> {
    let rendered = match event {
        SessionEvent::LineReceived(line) | SessionEvent::LineSent(line) => {
            Rendered::Stdout(transcript.render(line))
        }
        SessionEvent::StateChanged(state) => Rendered::Stderr(format!("-- {state}")),
        SessionEvent::DeviceName(name) => Rendered::Stderr(format!("-- device: {name}")),
        SessionEvent::ConnectFailed(reason) => Rendered::Stderr(format!("-- connection failed: {reason}")),
        SessionEvent::ConnectionLost(reason) => Rendered::Stderr(format!("-- connection lost: {reason}")),
        SessionEvent::Notice(text) => Rendered::Stderr(text.clone()),
        // Announced through a notice already.
        SessionEvent::LoginOutcome { .. } => return None,
    };
    Some(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connection::ConnectionState;
    use crate::core::login::LoginOutcome;
    use crate::core::transcript::DecodedLine;

    #[test]
    fn test_text_routes_lines_to_stdout() {
        let t = Transcript::default();
        let event = SessionEvent::LineReceived(DecodedLine::incoming("uptime", false, false));
        assert_eq!(
            render_event(&event, OutputFormat::Text, &t),
            Some(Rendered::Stdout(" uptime".into()))
        );

        let event = SessionEvent::StateChanged(ConnectionState::Connected);
        assert_eq!(
            render_event(&event, OutputFormat::Text, &t),
            Some(Rendered::Stderr("-- connected".into()))
        );
    }

    #[test]
    fn test_json_lines() {
        let t = Transcript::default();
        let event = SessionEvent::LoginOutcome {
            outcome: LoginOutcome::TimedOut,
            reason: "Login timeout".into(),
        };
        let Some(Rendered::Stdout(json)) = render_event(&event, OutputFormat::Json, &t) else {
            panic!("expected stdout");
        };
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "login_outcome");
        assert_eq!(value["data"]["outcome"], "timed_out");
        assert_eq!(value["data"]["reason"], "Login timeout");

        let event = SessionEvent::StateChanged(ConnectionState::Connecting);
        let Some(Rendered::Stdout(json)) = render_event(&event, OutputFormat::Json, &t) else {
            panic!("expected stdout");
        };
        assert_eq!(json, r#"{"event":"state_changed","data":"connecting"}"#);
    }
}
