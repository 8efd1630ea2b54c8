//! The GitHub event that triggered the workflow.

use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use serde::{de::Error as _, Deserialize, Deserializer};
use tracing::debug;

/// The few fields of an event payload this action cares about. Any event type
/// deserializes, but only pull request events carry a number.
#[derive(Debug, Default, Deserialize)]
pub struct Event {
    #[serde(default)]
    pull_request: Option<PullRequestRef>,
}

#[derive(Debug, Deserialize)]
struct PullRequestRef {
    #[serde(default, deserialize_with = "number")]
    number: Option<u64>,
}

/// Some tools that forward event payloads quote numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Int(u64),
    Text(String),
}

fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    match Option::<Number>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Number::Int(n)) => Ok(Some(n)),
        Some(Number::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid pull request number: {text:?}"))),
    }
}

impl Event {
    pub fn pull_request_number(&self) -> Option<u64> {
        self.pull_request.as_ref()?.number
    }
}

#[derive(Debug)]
pub enum EventError {
    Io(PathBuf, std::io::Error),
    Json(serde_json::Error),
}

impl std::error::Error for EventError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EventError::Io(_, e) => Some(e),
            EventError::Json(e) => Some(e),
        }
    }
}

impl Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventError::Io(path, e) => {
                write!(f, "failed to read event payload {}: {}", path.display(), e)
            }
            EventError::Json(e) => write!(f, "invalid event payload: {}", e),
        }
    }
}

pub fn read_event(path: &Path) -> Result<Event, EventError> {
    debug!("Reading event payload at {}", path.display());
    let contents =
        std::fs::read_to_string(path).map_err(|e| EventError::Io(path.to_owned(), e))?;
    serde_json::from_str(&contents).map_err(EventError::Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Event {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn pull_request_events() {
        let event = parse(
            r#"{"action": "synchronize", "number": 7, "pull_request": {"number": 7, "title": "Fix"}}"#,
        );
        assert_eq!(event.pull_request_number(), Some(7));
    }

    #[test]
    fn quoted_numbers() {
        assert_eq!(
            parse(r#"{"pull_request": {"number": "7"}}"#).pull_request_number(),
            Some(7)
        );
        assert_eq!(
            parse(r#"{"pull_request": {"number": null}}"#).pull_request_number(),
            None
        );
        assert!(serde_json::from_str::<Event>(r#"{"pull_request": {"number": "seven"}}"#).is_err());
        assert!(serde_json::from_str::<Event>(r#"{"pull_request": {"number": -1}}"#).is_err());
    }

    #[test]
    fn other_events() {
        assert_eq!(parse(r#"{"ref": "refs/heads/main"}"#).pull_request_number(), None);
        assert_eq!(parse(r#"{"pull_request": {}}"#).pull_request_number(), None);
        assert_eq!(parse(r#"{"pull_request": null}"#).pull_request_number(), None);
    }

    #[test]
    fn reads_payload_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{"pull_request": {"number": 42}}"#).unwrap();
        assert_eq!(
            read_event(file.path()).unwrap().pull_request_number(),
            Some(42)
        );

        std::fs::write(file.path(), "not json").unwrap();
        assert!(matches!(read_event(file.path()), Err(EventError::Json(_))));
    }
}
