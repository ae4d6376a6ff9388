//! URL construction for cluster requests.
//!
//! The index and type segments are inserted between `host:port` and the
//! requested path. Joining follows filesystem path-join rules: empty and `.`
//! segments vanish, `..` drops the previous segment, repeated slashes collapse,
//! and a trailing slash on the path is kept. Nothing is percent-encoded.

use crate::config::ConnectionOptions;

/// Build `http://{host}:{port}/{index}/{type}/{path}` for the given options.
pub fn full_url(options: &ConnectionOptions, path: &str) -> String {
    let parts = [
        options.index.as_deref().unwrap_or(""),
        options.doc_type.as_deref().unwrap_or(""),
        path,
    ];

    let joined = parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/");

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                // host:port is the root; never climb above it
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut url = format!("http://{}:{}", options.host, options.port);
    for segment in &segments {
        url.push('/');
        url.push_str(segment);
    }
    if joined.ends_with('/') {
        url.push('/');
    }
    url
}
