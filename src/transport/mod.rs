use std::time::Duration;

use futures_util::TryStreamExt;

use crate::adapter::{BackendRequest, BackendResponse, HttpBody};
use crate::config::ServerConfig;
use crate::error::BridgeError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn build_reqwest_client(config: &ServerConfig) -> Result<reqwest::Client, BridgeError> {
    let pool_idle_timeout = match config.http_pool_idle_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(config.http_pool_max_idle_per_host.max(1))
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(config.timeout));

    if !config.http_use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| BridgeError::Transport(format!("Failed to build HTTP client: {err}")))
}

/// Pooled HTTP client used for every backend call.
///
/// One attempt per call: a transport failure surfaces as
/// [`BridgeError::Transport`] and a non-2xx status is returned as a normal
/// response.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with connection pooling and the configured deadline.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] when the client cannot be built.
    pub fn new(config: &ServerConfig) -> Result<Self, BridgeError> {
        Ok(Self {
            client: build_reqwest_client(config)?,
        })
    }

    /// POST a backend request and hand back the response with a streamed body.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] when the URL is invalid or the call
    /// fails before response headers arrive.
    pub async fn send(&self, request: BackendRequest) -> Result<BackendResponse, BridgeError> {
        let url = url::Url::parse(&request.url).map_err(|err| {
            BridgeError::Transport(format!("Invalid upstream URL '{}': {err}", request.url))
        })?;

        let mut outbound = reqwest::Request::new(http::Method::POST, url);
        *outbound.headers_mut() = request.headers;
        *outbound.body_mut() = Some(reqwest::Body::from(request.body));

        let response = self.client.execute(outbound).await.map_err(|err| {
            tracing::warn!(error = %err, stream = request.stream, "upstream request failed");
            BridgeError::Transport(err.to_string())
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        tracing::debug!(status = status.as_u16(), "upstream responded");

        let body = response
            .bytes_stream()
            .map_err(|err| BridgeError::Transport(format!("upstream body read failed: {err}")));
        Ok(BackendResponse {
            status,
            headers,
            body: HttpBody::Stream(Box::pin(body)),
        })
    }
}
