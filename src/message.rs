use serde::Deserialize;
use std::path::PathBuf;

use crate::error::Result;
use crate::processor::FormatProcessor;
use crate::types::Notification;

/// A request posted by the panel, e.g. `{"command": "formatAll"}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum PanelMessage {
    FormatAll,
    FormatFile {
        #[serde(default)]
        path: Option<PathBuf>,
    },
}

impl PanelMessage {
    /// Decodes one JSON message.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or an unknown command.
    pub fn parse(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }

    /// Runs the message against `processor`.
    #[must_use]
    pub fn dispatch(&self, processor: &FormatProcessor) -> Notification {
        match self {
            Self::FormatAll => processor.format_all(),
            Self::FormatFile { path } => processor.format_file(path.as_deref()),
        }
    }
}

/// Parses and dispatches one line, turning decode failures into a notification.
#[must_use]
pub fn handle_line(line: &str, processor: &FormatProcessor) -> Notification {
    match PanelMessage::parse(line) {
        Ok(message) => message.dispatch(processor),
        Err(err) => {
            tracing::warn!(error = %err, "Ignoring malformed panel message");
            Notification::error(format!("Invalid message: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::{opening, querier_returning, shown_sink, sim_pacer, SimClock};
    use crate::types::NotificationLevel;
    use std::time::Duration;

    #[test]
    fn decodes_panel_commands() {
        assert_eq!(
            PanelMessage::parse(r#"{"command":"formatAll"}"#).unwrap(),
            PanelMessage::FormatAll
        );
        assert_eq!(
            PanelMessage::parse(r#"{"command":"formatFile","path":"src/lib.rs"}"#).unwrap(),
            PanelMessage::FormatFile {
                path: Some(PathBuf::from("src/lib.rs"))
            }
        );
        assert_eq!(
            PanelMessage::parse(r#"{"command":"formatFile"}"#).unwrap(),
            PanelMessage::FormatFile { path: None }
        );
    }

    #[test]
    fn rejects_unknown_commands() {
        assert!(matches!(
            PanelMessage::parse(r#"{"command":"deleteAll"}"#),
            Err(Error::Json(_))
        ));
        assert!(PanelMessage::parse("formatAll").is_err());
    }

    #[test]
    fn handle_line_dispatches_and_reports() {
        let clock = SimClock::default();
        let sink = shown_sink(
            &clock,
            Duration::from_millis(1000),
            &["ya tool tt format \"a.rs\""],
        );
        let processor = FormatProcessor::with_parts(
            PathBuf::from("/ws"),
            Box::new(querier_returning("modified: a.rs\n", 1)),
            Box::new(opening(sink)),
            Box::new(sim_pacer(&clock)),
        );

        let notification = handle_line(r#"{"command": "formatAll"}"#, &processor);
        assert_eq!(
            notification,
            Notification::info("Formatted 1 file successfully.")
        );

        let notification = handle_line("{not json", &processor);
        assert_eq!(notification.level, NotificationLevel::Error);
        assert!(notification.message.starts_with("Invalid message: "));
    }
}
