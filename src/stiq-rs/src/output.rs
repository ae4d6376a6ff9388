//! Output formatting.
//!
//! Json mode always yields exactly one line of JSON, errors included. Plain
//! mode yields the body text and hands errors back to the caller, which
//! aborts the process.

use crate::{ClientError, Result};
use stiq_core::OutputMode;

/// Successful response body
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
}

impl Payload {
    /// Parse `text` as JSON, keeping the raw text if it is not JSON.
    pub fn from_json_text(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Text(text),
        }
    }

    /// Single-line JSON encoding of the payload.
    pub fn to_json_line(&self) -> String {
        match self {
            Payload::Text(text) => serde_json::Value::String(text.clone()).to_string(),
            Payload::Json(value) => value.to_string(),
        }
    }
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Text(text) => f.write_str(text),
            Payload::Json(value) => match serde_json::to_string_pretty(value) {
                Ok(pretty) => f.write_str(&pretty),
                Err(_) => write!(f, "{}", value),
            },
        }
    }
}

/// Render an outcome for the given mode.
///
/// Returns the text to print. In plain mode an error is returned unchanged.
pub fn render(mode: OutputMode, outcome: Result<Payload>) -> Result<String> {
    match (mode, outcome) {
        (OutputMode::Json, Ok(payload)) => Ok(payload.to_json_line()),
        (OutputMode::Json, Err(e)) => {
            tracing::debug!(error = %e, "rendering error as json");
            Ok(e.to_json().to_string())
        }
        (OutputMode::Plain, Ok(payload)) => Ok(payload.to_string()),
        (OutputMode::Plain, Err(e)) => Err(e),
    }
}

/// Render an error that was detected before any request was made.
pub fn render_error(mode: OutputMode, error: ClientError) -> Result<String> {
    render(mode, Err(error))
}
