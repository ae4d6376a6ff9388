//! stiq Client Library
//!
//! Turns resolved commands into HTTP requests against an Elasticsearch
//! cluster and renders the responses.

mod client;
pub mod output;
pub mod stream;
pub mod transport;

pub use client::Client;
pub use output::{render, Payload};
pub use stiq_core::{Command, ConnectionOptions, OutputMode};
pub use transport::{ByteStream, HttpTransport, Transport};

use serde_json::json;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    Application(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{}: {source}", .path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// JSON form of the error, as printed in json mode.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ClientError::Application(message) => json!({ "error": message }),
            ClientError::Request(e) => {
                let mut value = json!({ "error": self.to_string() });
                if let Some(url) = e.url() {
                    value["url"] = json!(url.as_str());
                }
                if let Some(status) = e.status() {
                    value["status"] = json!(status.as_u16());
                }
                value
            }
            ClientError::File { path, source } => json!({
                "error": self.to_string(),
                "code": format!("{:?}", source.kind()),
                "syscall": "stat",
                "path": path.display().to_string(),
            }),
            ClientError::Io(_) => json!({ "error": self.to_string() }),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
