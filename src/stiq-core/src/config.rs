use serde::{Deserialize, Serialize};

/// Connection settings shared by every command of one invocation.
///
/// Built once from the global command-line flags and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnectionOptions {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(rename = "type", default)]
    pub doc_type: Option<String>,

    // Source filter for query results
    #[serde(default)]
    pub filter: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> String {
    "9200".to_string()
}

/// How results are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// One line of JSON per invocation, errors included
    Json,
    /// Raw text for humans; errors abort the process
    Plain,
}

impl ConnectionOptions {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Plain
        }
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn with_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            json: false,
            index: None,
            doc_type: None,
            filter: None,
        }
    }
}
