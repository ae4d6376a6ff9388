use crate::output::{render, render_error, Payload};
use crate::stream::spawn_reader;
use crate::transport::{ByteStream, HttpTransport, Transport};
use crate::{ClientError, Result};
use futures::StreamExt;
use std::path::Path;
use stiq_core::{full_url, Body, BodyChannel, Command, ConnectionOptions, RequestDescriptor};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

const NO_INDEX_MESSAGE: &str = "No index specified! Use --index <name>";

/// stiq command client
///
/// Owns the connection options for one invocation and runs commands against
/// a [`Transport`], writing results to the given sink.
pub struct Client<T = HttpTransport> {
    options: ConnectionOptions,
    transport: T,
}

impl Client<HttpTransport> {
    /// Create a client talking HTTP to the configured cluster
    pub fn new(options: ConnectionOptions) -> Self {
        Self::with_transport(options, HttpTransport::new())
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(options: ConnectionOptions, transport: T) -> Self {
        Self { options, transport }
    }

    /// Resolve `path` against the configured host, port, index and type
    pub fn url(&self, path: &str) -> String {
        full_url(&self.options, path)
    }

    /// Run one command, writing its output to `out`.
    ///
    /// In plain mode any failure is returned as an error and nothing is
    /// written for it. In json mode failures before the response are written
    /// as a JSON error line instead.
    pub async fn run<W>(&self, command: Command, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        match command {
            Command::Url { path } => self.print_url(&path, out).await,
            Command::Get { path } => self.get(&path, out).await,
            Command::CreateIndex => self.create_index(out).await,
            Command::ListIndices => self.list_indices(out).await,
            Command::Bulk { file } => self.bulk(&file, out).await,
            Command::Query { terms } => self.query(&terms, out).await,
        }
    }

    /// Print the URL for `path` without contacting the cluster
    pub async fn print_url<W>(&self, path: &str, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.emit(Ok(Payload::Text(self.url(path))), out).await
    }

    /// GET an arbitrary path
    #[tracing::instrument(skip(self, out))]
    pub async fn get<W>(&self, path: &str, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let outcome = self.transport.execute(self.get_request(path)).await;
        self.emit(outcome, out).await
    }

    /// Create the configured index
    #[tracing::instrument(skip(self, out))]
    pub async fn create_index<W>(&self, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let outcome = match self.create_index_request() {
            Ok(request) => self.transport.execute(request).await,
            Err(e) => Err(e),
        };
        self.emit(outcome, out).await
    }

    /// List indices in the cluster
    #[tracing::instrument(skip(self, out))]
    pub async fn list_indices<W>(&self, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let outcome = self.transport.execute(self.list_indices_request()).await;
        self.emit(outcome, out).await
    }

    /// Run a free-text search
    #[tracing::instrument(skip(self, out))]
    pub async fn query<W>(&self, terms: &[String], out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let outcome = self.transport.execute(self.query_request(terms)).await;
        self.emit(outcome, out).await
    }

    /// Stream a bulk file to the cluster and the response to `out`
    ///
    /// Neither the file nor the response is held in memory in full. Errors
    /// raised before the response arrives follow the output mode; an error
    /// once response bytes have been written is always returned.
    #[tracing::instrument(skip(self, file, out), fields(file = %file.display()))]
    pub async fn bulk<W>(&self, file: &Path, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let (mut response, reader) = match self.open_bulk(file).await {
            Ok(opened) => opened,
            Err(e) => {
                let line = render_error(self.options.output_mode(), e)?;
                return write_line(out, &line).await;
            }
        };

        while let Some(chunk) = response.next().await {
            let chunk = chunk?;
            out.write_all(&chunk).await?;
            out.flush().await?;
        }

        // The server has answered; body bytes it never read are not needed
        if !reader.is_finished() {
            tracing::debug!("response complete before bulk body was fully sent");
            reader.abort();
        }

        match reader.await {
            Ok(Ok(bytes)) => tracing::debug!(bytes, "bulk body sent"),
            Ok(Err(e)) => tracing::warn!(error = %e, "bulk body reader failed"),
            Err(e) if e.is_cancelled() => {}
            Err(e) => tracing::warn!(error = %e, "bulk body reader task failed"),
        }
        Ok(())
    }

    pub fn get_request(&self, path: &str) -> RequestDescriptor {
        RequestDescriptor::get(self.url(path)).json(self.options.json)
    }

    pub fn create_index_request(&self) -> Result<RequestDescriptor> {
        if self.options.index.is_none() {
            return Err(ClientError::Application(NO_INDEX_MESSAGE.to_string()));
        }
        Ok(RequestDescriptor::put(self.url("")).json(self.options.json))
    }

    pub fn list_indices_request(&self) -> RequestDescriptor {
        // Each mode asks the cluster for its own rendering
        if self.options.json {
            RequestDescriptor::get(self.url("_all")).json(true)
        } else {
            RequestDescriptor::get(self.url("_cat/indices")).query("v", "true")
        }
    }

    pub fn query_request(&self, terms: &[String]) -> RequestDescriptor {
        let mut request = RequestDescriptor::get(self.url("_search")).json(self.options.json);
        if !terms.is_empty() {
            request = request.query("q", terms.join(" "));
        }
        if let Some(filter) = &self.options.filter {
            request = request.query("_source", filter.as_str());
        }
        request
    }

    pub fn bulk_request(&self, size: u64, body: BodyChannel) -> RequestDescriptor {
        RequestDescriptor::post(self.url("_bulk"))
            .json(true)
            .header("content-type", "application/json")
            .header("content-length", size.to_string())
            .body(Body::Stream(body))
    }

    async fn open_bulk(
        &self,
        file: &Path,
    ) -> Result<(ByteStream, JoinHandle<std::io::Result<u64>>)> {
        let file_error = |source| ClientError::File {
            path: file.to_path_buf(),
            source,
        };

        let metadata = tokio::fs::metadata(file).await.map_err(file_error)?;
        let source = tokio::fs::File::open(file).await.map_err(file_error)?;
        tracing::debug!(size = metadata.len(), "opened bulk file");

        let (body, reader) = spawn_reader(source);
        match self.transport.open(self.bulk_request(metadata.len(), body)).await {
            Ok(response) => Ok((response, reader)),
            Err(e) => {
                reader.abort();
                Err(e)
            }
        }
    }

    async fn emit<W>(&self, outcome: Result<Payload>, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let text = render(self.options.output_mode(), outcome)?;
        write_line(out, &text).await
    }
}

async fn write_line<W>(out: &mut W, text: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    out.write_all(text.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use stiq_core::Method;

    #[derive(Debug, Clone)]
    struct Recorded {
        method: Method,
        url: String,
        query: BTreeMap<String, String>,
        headers: BTreeMap<String, String>,
        json: bool,
        body: Vec<u8>,
    }

    enum Reply {
        Payload(Payload),
        Chunks(Vec<&'static str>),
        /// Streams the chunks, then fails
        Broken(Vec<&'static str>),
        /// Answers at once and never reads the request body
        Early(&'static str),
        Refused,
    }

    /// In-memory transport recording every request it is given
    struct MockTransport {
        reply: Reply,
        requests: Mutex<Vec<Recorded>>,
        unread: Mutex<Vec<Body>>,
    }

    impl MockTransport {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                requests: Mutex::new(Vec::new()),
                unread: Mutex::new(Vec::new()),
            }
        }

        async fn record(&self, request: RequestDescriptor) -> Result<()> {
            let RequestDescriptor {
                method,
                url,
                query,
                headers,
                body,
                json,
            } = request;
            let body = match body {
                Body::Empty => Vec::new(),
                Body::Json(value) => serde_json::to_vec(&value).unwrap(),
                Body::Stream(mut rx) => {
                    let mut collected = Vec::new();
                    while let Some(chunk) = rx.recv().await {
                        collected.extend_from_slice(&chunk?);
                    }
                    collected
                }
            };
            self.requests.lock().unwrap().push(Recorded {
                method,
                url,
                query,
                headers,
                json,
                body,
            });
            Ok(())
        }

        fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }

        fn refused() -> ClientError {
            ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))
        }
    }

    #[async_trait::async_trait]
    impl Transport for MockTransport {
        async fn execute(&self, request: RequestDescriptor) -> Result<Payload> {
            self.record(request).await?;
            match &self.reply {
                Reply::Payload(payload) => Ok(payload.clone()),
                Reply::Chunks(chunks) | Reply::Broken(chunks) => {
                    Ok(Payload::Text(chunks.concat()))
                }
                Reply::Early(text) => Ok(Payload::Text(text.to_string())),
                Reply::Refused => Err(Self::refused()),
            }
        }

        async fn open(&self, mut request: RequestDescriptor) -> Result<ByteStream> {
            if let Reply::Early(text) = &self.reply {
                // Keep the body channel open but unread, like a stalled server
                let body = std::mem::take(&mut request.body);
                self.unread.lock().unwrap().push(body);
                let chunk = Bytes::from_static(text.as_bytes());
                return Ok(futures::stream::iter(vec![Ok(chunk)]).boxed());
            }

            self.record(request).await?;
            let chunks: Vec<Result<Bytes>> = match &self.reply {
                Reply::Payload(payload) => vec![Ok(Bytes::from(payload.to_json_line()))],
                Reply::Chunks(chunks) => chunks
                    .iter()
                    .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                    .collect(),
                Reply::Broken(chunks) => chunks
                    .iter()
                    .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                    .chain(std::iter::once(Err(ClientError::Io(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        "connection reset",
                    )))))
                    .collect(),
                Reply::Early(_) => Vec::new(),
                Reply::Refused => return Err(Self::refused()),
            };
            Ok(futures::stream::iter(chunks).boxed())
        }
    }

    fn client(options: ConnectionOptions, reply: Reply) -> Client<MockTransport> {
        Client::with_transport(options, MockTransport::new(reply))
    }

    fn json_options() -> ConnectionOptions {
        ConnectionOptions::default().with_json(true)
    }

    async fn run(client: &Client<MockTransport>, command: Command) -> (Result<()>, String) {
        let mut out = Vec::new();
        let result = client.run(command, &mut out).await;
        (result, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_url_plain_and_json() {
        let options = ConnectionOptions::default().with_index("books");
        let c = client(options.clone(), Reply::Refused);
        let (result, out) = run(&c, Command::Url { path: "/".into() }).await;
        result.unwrap();
        assert_eq!(out, "http://localhost:9200/books/\n");
        assert!(c.transport.requests().is_empty());

        let c = client(options.with_json(true), Reply::Refused);
        let (result, out) = run(&c, Command::Url { path: "_search".into() }).await;
        result.unwrap();
        assert_eq!(out, "\"http://localhost:9200/books/_search\"\n");
    }

    #[tokio::test]
    async fn test_get_json() {
        let c = client(
            json_options(),
            Reply::Payload(Payload::Json(json!({"cluster_name": "es"}))),
        );
        let (result, out) = run(&c, Command::Get { path: "/".into() }).await;
        result.unwrap();
        assert_eq!(out, "{\"cluster_name\":\"es\"}\n");

        let requests = c.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(requests[0].url, "http://localhost:9200/");
        assert!(requests[0].json);
        assert!(requests[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_get_plain_prints_body() {
        let c = client(
            ConnectionOptions::default(),
            Reply::Payload(Payload::Text("green".to_string())),
        );
        let (result, out) = run(&c, Command::Get { path: "_cat/health".into() }).await;
        result.unwrap();
        assert_eq!(out, "green\n");
        assert!(!c.transport.requests()[0].json);
    }

    #[tokio::test]
    async fn test_create_index_without_index_json() {
        let c = client(json_options(), Reply::Refused);
        let (result, out) = run(&c, Command::CreateIndex).await;
        result.unwrap();
        assert_eq!(out, "{\"error\":\"No index specified! Use --index <name>\"}\n");
        assert!(c.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_create_index_without_index_plain() {
        let c = client(ConnectionOptions::default(), Reply::Refused);
        let (result, out) = run(&c, Command::CreateIndex).await;
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "No index specified! Use --index <name>");
        assert!(out.is_empty());
        assert!(c.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_create_index_puts_index_url() {
        let c = client(
            json_options().with_index("books"),
            Reply::Payload(Payload::Json(json!({"acknowledged": true}))),
        );
        let (result, out) = run(&c, Command::CreateIndex).await;
        result.unwrap();
        assert_eq!(out, "{\"acknowledged\":true}\n");

        let requests = c.transport.requests();
        assert_eq!(requests[0].method, Method::Put);
        assert_eq!(requests[0].url, "http://localhost:9200/books");
        assert!(requests[0].json);
        assert!(requests[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_list_indices_endpoint_depends_on_mode() {
        let c = client(json_options(), Reply::Payload(Payload::Json(json!({}))));
        run(&c, Command::ListIndices).await.0.unwrap();
        let request = &c.transport.requests()[0];
        assert_eq!(request.url, "http://localhost:9200/_all");
        assert!(request.query.is_empty());
        assert!(request.json);

        let c = client(
            ConnectionOptions::default(),
            Reply::Payload(Payload::Text("health status index".to_string())),
        );
        run(&c, Command::ListIndices).await.0.unwrap();
        let request = &c.transport.requests()[0];
        assert_eq!(request.url, "http://localhost:9200/_cat/indices");
        assert_eq!(request.query.get("v").map(String::as_str), Some("true"));
        assert!(!request.json);
    }

    #[tokio::test]
    async fn test_query_terms_and_filter() {
        let c = client(
            ConnectionOptions::default().with_filter("title"),
            Reply::Payload(Payload::Text("{}".to_string())),
        );
        let terms = vec!["foo".to_string(), "bar".to_string()];
        run(&c, Command::Query { terms }).await.0.unwrap();

        let request = &c.transport.requests()[0];
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.url, "http://localhost:9200/_search");
        assert_eq!(request.query.get("q").map(String::as_str), Some("foo bar"));
        assert_eq!(request.query.get("_source").map(String::as_str), Some("title"));
        assert!(!request.json);
    }

    #[tokio::test]
    async fn test_query_without_terms_omits_parameters() {
        let c = client(json_options(), Reply::Payload(Payload::Json(json!({}))));
        run(&c, Command::Query { terms: vec![] }).await.0.unwrap();
        assert!(c.transport.requests()[0].query.is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_policy() {
        let c = client(ConnectionOptions::default(), Reply::Refused);
        let (result, out) = run(&c, Command::Get { path: "/".into() }).await;
        assert!(result.is_err());
        assert!(out.is_empty());

        let c = client(json_options(), Reply::Refused);
        let (result, out) = run(&c, Command::Get { path: "/".into() }).await;
        result.unwrap();
        assert_eq!(out.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        assert!(value["error"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_bulk_missing_file() {
        let missing = Path::new("definitely-missing-bulk-file.json");

        let c = client(json_options(), Reply::Refused);
        let (result, out) = run(&c, Command::Bulk { file: missing.into() }).await;
        result.unwrap();
        let value: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        assert_eq!(value["code"], "NotFound");
        assert_eq!(value["path"], "definitely-missing-bulk-file.json");
        assert!(c.transport.requests().is_empty());

        let c = client(ConnectionOptions::default(), Reply::Refused);
        let (result, out) = run(&c, Command::Bulk { file: missing.into() }).await;
        assert!(matches!(result, Err(ClientError::File { .. })));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_streams_file_and_response() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.json");
        let mut contents = Vec::new();
        for i in 0..5000 {
            contents.extend_from_slice(b"{\"index\":{}}\n");
            contents.extend_from_slice(format!("{{\"n\":{}}}\n", i).as_bytes());
        }
        std::fs::write(&path, &contents).unwrap();

        let c = client(
            ConnectionOptions::default().with_index("books").with_type("doc"),
            Reply::Chunks(vec!["{\"took\":3,", "\"errors\":false}"]),
        );
        let (result, out) = run(&c, Command::Bulk { file: path }).await;
        result.unwrap();
        assert_eq!(out, "{\"took\":3,\"errors\":false}");

        let request = &c.transport.requests()[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, "http://localhost:9200/books/doc/_bulk");
        assert_eq!(
            request.headers.get("content-length"),
            Some(&contents.len().to_string())
        );
        assert_eq!(
            request.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert!(request.json);
        assert_eq!(request.body, contents);
    }

    fn bulk_file(dir: &tempfile::TempDir, size: usize) -> std::path::PathBuf {
        let path = dir.path().join("docs.json");
        std::fs::write(&path, vec![b'\n'; size]).unwrap();
        path
    }

    #[tokio::test]
    async fn test_bulk_connection_failure_follows_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = bulk_file(&dir, 4096);

        let c = client(json_options(), Reply::Refused);
        let (result, out) = run(&c, Command::Bulk { file: path.clone() }).await;
        result.unwrap();
        assert_eq!(out.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        assert!(value["error"].as_str().unwrap().contains("connection refused"));

        let c = client(ConnectionOptions::default(), Reply::Refused);
        let (result, out) = run(&c, Command::Bulk { file: path }).await;
        assert!(matches!(result, Err(ClientError::Io(_))));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_error_mid_response_always_returned() {
        let dir = tempfile::tempdir().unwrap();
        let path = bulk_file(&dir, 4096);

        for options in [json_options(), ConnectionOptions::default()] {
            let c = client(options, Reply::Broken(vec!["{\"took\":3,"]));
            let (result, out) = run(&c, Command::Bulk { file: path.clone() }).await;
            assert!(matches!(result, Err(ClientError::Io(ref e)) if e.kind() == std::io::ErrorKind::ConnectionReset));
            assert_eq!(out, "{\"took\":3,");
        }
    }

    #[tokio::test]
    async fn test_bulk_finishes_when_server_answers_early() {
        use crate::stream::{CHANNEL_CAPACITY, CHUNK_SIZE};

        let dir = tempfile::tempdir().unwrap();
        let path = bulk_file(&dir, CHUNK_SIZE * (CHANNEL_CAPACITY + 4));

        let c = client(
            ConnectionOptions::default(),
            Reply::Early("{\"status\":413}"),
        );
        let mut out = Vec::new();
        let finished = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            c.run(Command::Bulk { file: path }, &mut out),
        )
        .await
        .expect("bulk should not wait for an unread body");

        finished.unwrap();
        assert_eq!(out, b"{\"status\":413}");
    }

    #[tokio::test]
    async fn test_json_mode_always_one_line() {
        let commands = vec![
            Command::Url { path: "/".into() },
            Command::Get { path: "/".into() },
            Command::CreateIndex,
            Command::ListIndices,
            Command::Query {
                terms: vec!["a".into()],
            },
            Command::Bulk {
                file: "no-such-file.json".into(),
            },
        ];

        let replies: [fn() -> Reply; 3] = [
            || Reply::Refused,
            || Reply::Payload(Payload::Json(json!({"a": [1, 2]}))),
            || Reply::Payload(Payload::Text("x\ny".to_string())),
        ];
        for reply in replies {
            for command in commands.clone() {
                let c = client(json_options(), reply());
                let (result, out) = run(&c, command.clone()).await;
                result.unwrap();
                assert_eq!(out.lines().count(), 1, "{:?} -> {:?}", command, out);
                serde_json::from_str::<serde_json::Value>(out.trim_end()).unwrap();
            }
        }
    }
}
