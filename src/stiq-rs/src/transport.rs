use crate::output::Payload;
use crate::stream::channel_stream;
use crate::{ClientError, Result};
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use reqwest::Client as HttpClient;
use stiq_core::{Body, Method, RequestDescriptor};

/// Live response body, yielded chunk by chunk as it arrives
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Transport trait for sending request descriptors to the cluster
///
/// Neither method retries or applies its own timeout. Non-2xx responses are
/// not errors; their bodies are returned like any other.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Perform one buffered request/response cycle.
    async fn execute(&self, request: RequestDescriptor) -> Result<Payload>;

    /// Send a request whose body may be streaming, returning the response
    /// body as a stream once the response head has arrived.
    async fn open(&self, request: RequestDescriptor) -> Result<ByteStream>;
}

/// reqwest-backed transport speaking plain HTTP/1.1
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: HttpClient::new(),
        }
    }

    fn build(&self, request: RequestDescriptor) -> reqwest::RequestBuilder {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        };

        let mut builder = self.client.request(method, &request.url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if request.json {
            builder = builder.header(reqwest::header::ACCEPT, "application/json");
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        match request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::Stream(rx) => builder.body(reqwest::Body::wrap_stream(channel_stream(rx))),
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: RequestDescriptor) -> Result<Payload> {
        let json = request.json;
        let response = self.build(request).send().await?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "response received");
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "cluster returned non-success status");
        }

        let text = response.text().await?;
        if json {
            Ok(Payload::from_json_text(text))
        } else {
            Ok(Payload::Text(text))
        }
    }

    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn open(&self, request: RequestDescriptor) -> Result<ByteStream> {
        let response = self.build(request).send().await?;
        tracing::debug!(status = response.status().as_u16(), "streaming response");

        Ok(response.bytes_stream().map_err(ClientError::from).boxed())
    }
}
