//! Provider adapters: one request mapper, one non-stream mapper and one
//! streaming decoder per backend dialect, behind a uniform contract.

mod openai_chat;
mod openai_responses;
mod passthrough;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use http::StatusCode;
use serde_json::Value;

pub use openai_chat::OpenAiChatAdapter;
pub use openai_responses::OpenAiResponsesAdapter;
pub use passthrough::PassthroughAdapter;

use crate::config::ProviderKind;
use crate::error::BridgeError;
use crate::protocol::claude::{ClaudeRequest, ClaudeResponse};
use crate::protocol::SchemaSanitizer;
use crate::stream::{drive_sse, DeltaDecoder};

/// Response or request body bytes produced incrementally.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BridgeError>> + Send>>;

const EVENT_STREAM: &str = "text/event-stream";
const APPLICATION_JSON: &str = "application/json";

/// An HTTP body that is either fully buffered or streamed.
pub enum HttpBody {
    Full(Bytes),
    Stream(ByteStream),
}

impl std::fmt::Debug for HttpBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            HttpBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl HttpBody {
    /// Buffer the whole body.
    ///
    /// # Errors
    ///
    /// Returns the first error the underlying stream yields.
    pub async fn into_bytes(self) -> Result<Bytes, BridgeError> {
        match self {
            HttpBody::Full(bytes) => Ok(bytes),
            HttpBody::Stream(mut stream) => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buffer.extend_from_slice(&chunk?);
                }
                Ok(buffer.freeze())
            }
        }
    }

    fn into_stream(self) -> ByteStream {
        match self {
            HttpBody::Full(bytes) => Box::pin(futures_util::stream::once(async move { Ok(bytes) })),
            HttpBody::Stream(stream) => stream,
        }
    }
}

/// A parsed client request together with its JSON bytes.
#[derive(Debug, Clone)]
pub struct ClientRequest {
    pub parsed: ClaudeRequest,
    pub raw: Bytes,
}

impl ClientRequest {
    /// Parse a client request body.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::MalformedRequest`] when the body is not a valid
    /// Messages request.
    pub fn from_slice(body: &[u8]) -> Result<Self, BridgeError> {
        let parsed: ClaudeRequest = serde_json::from_slice(body)?;
        Ok(Self {
            parsed,
            raw: Bytes::copy_from_slice(body),
        })
    }

    /// Replace the `model` field in both the parsed and the raw form.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::MalformedRequest`] when the raw body cannot be
    /// re-encoded.
    pub fn with_model(mut self, model: &str) -> Result<Self, BridgeError> {
        if self.parsed.model == model {
            return Ok(self);
        }
        let mut value: Value = serde_json::from_slice(&self.raw)?;
        if let Some(object) = value.as_object_mut() {
            object.insert("model".to_string(), Value::String(model.to_string()));
        }
        self.raw = Bytes::from(serde_json::to_vec(&value)?);
        self.parsed.model = model.to_string();
        Ok(self)
    }
}

/// Outbound call produced by [`ProviderAdapter::to_backend_request`].
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub stream: bool,
}

/// Raw backend response handed back to the adapter.
#[derive(Debug)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: HttpBody,
}

impl BackendResponse {
    fn content_type(&self) -> Option<&HeaderValue> {
        self.headers.get(CONTENT_TYPE)
    }

    fn is_event_stream(&self) -> bool {
        self.content_type()
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| {
                value
                    .trim_start()
                    .to_ascii_lowercase()
                    .starts_with(EVENT_STREAM)
            })
    }
}

/// Response returned to the client.
#[derive(Debug)]
pub struct ClientResponse {
    pub status: StatusCode,
    pub content_type: HeaderValue,
    pub body: HttpBody,
}

impl ClientResponse {
    fn json(response: &ClaudeResponse) -> Result<Self, BridgeError> {
        let body = serde_json::to_vec(response)
            .map_err(|err| BridgeError::Internal(format!("failed to encode response: {err}")))?;
        Ok(Self {
            status: StatusCode::OK,
            content_type: HeaderValue::from_static(APPLICATION_JSON),
            body: HttpBody::Full(Bytes::from(body)),
        })
    }

    fn event_stream(stream: ByteStream) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: HeaderValue::from_static(EVENT_STREAM),
            body: HttpBody::Stream(stream),
        }
    }

    /// Forward a backend response unchanged: status, content type and body.
    fn passthrough(response: BackendResponse) -> Self {
        let content_type = response
            .content_type()
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(APPLICATION_JSON));
        Self {
            status: response.status,
            content_type,
            body: HttpBody::Stream(response.body.into_stream()),
        }
    }
}

/// Uniform two-operation contract implemented once per backend dialect.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Build the outbound call for a client request.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] when the request cannot be encoded for the
    /// backend.
    fn to_backend_request(
        &self,
        request: &ClientRequest,
        base_url: &str,
        credential: &str,
    ) -> Result<BackendRequest, BridgeError>;

    /// Translate a backend response for the client.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] when a buffered body cannot be read or decoded.
    async fn to_client_response(
        &self,
        response: BackendResponse,
    ) -> Result<ClientResponse, BridgeError>;
}

/// Shared response dispatch for translating adapters.
///
/// Non-2xx responses pass through untouched. An event-stream body runs
/// through the SSE envelope driver with a fresh decoder; anything else is
/// decoded as one JSON document.
pub(crate) async fn translate_response<D>(
    response: BackendResponse,
    decode_json: fn(&[u8]) -> Result<ClaudeResponse, BridgeError>,
    new_decoder: D,
) -> Result<ClientResponse, BridgeError>
where
    D: FnOnce() -> Box<dyn DeltaDecoder> + Send,
{
    if !response.status.is_success() {
        return Ok(ClientResponse::passthrough(response));
    }
    if response.is_event_stream() {
        let frames = drive_sse(response.body.into_stream(), new_decoder());
        return Ok(ClientResponse::event_stream(Box::pin(
            frames.map(Ok::<Bytes, BridgeError>),
        )));
    }
    let body = response.body.into_bytes().await?;
    ClientResponse::json(&decode_json(&body)?)
}

/// Build the adapter for a provider kind.
#[must_use]
pub fn adapter_for(
    provider: ProviderKind,
    sanitizer: Arc<dyn SchemaSanitizer>,
) -> Arc<dyn ProviderAdapter> {
    match provider {
        ProviderKind::OpenAi => Arc::new(OpenAiChatAdapter::new(sanitizer)),
        ProviderKind::OpenAiResponses => Arc::new(OpenAiResponsesAdapter::new(sanitizer)),
        ProviderKind::Passthrough => Arc::new(PassthroughAdapter),
    }
}

/// Join a base URL and an endpoint path without doubling the slash.
pub(crate) fn endpoint_url(base_url: &str, path: &str) -> String {
    let mut url = String::with_capacity(base_url.len() + path.len());
    url.push_str(base_url.trim_end_matches('/'));
    url.push_str(path);
    url
}

/// JSON headers with a bearer credential; streaming calls also ask for SSE.
pub(crate) fn bearer_headers(credential: &str, stream: bool) -> Result<HeaderMap, BridgeError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    let auth = HeaderValue::from_str(&format!("Bearer {credential}"))
        .map_err(|err| BridgeError::Config(format!("invalid credential header: {err}")))?;
    headers.insert(AUTHORIZATION, auth);
    let accept = if stream { EVENT_STREAM } else { APPLICATION_JSON };
    headers.insert(http::header::ACCEPT, HeaderValue::from_static(accept));
    Ok(headers)
}

pub(crate) fn encode_body<T: serde::Serialize>(body: &T) -> Result<Bytes, BridgeError> {
    serde_json::to_vec(body)
        .map(Bytes::from)
        .map_err(|err| BridgeError::Translation(format!("failed to encode backend request: {err}")))
}
