use async_trait::async_trait;
use http::header::HeaderValue;

use super::{
    bearer_headers, endpoint_url, BackendRequest, BackendResponse, ClientRequest, ClientResponse,
    ProviderAdapter,
};
use crate::error::BridgeError;

const MESSAGES_PATH: &str = "/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Adapter for backends that already speak the Messages protocol.
///
/// The request body and the backend response are forwarded untouched; only
/// the endpoint and auth headers are supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughAdapter;

#[async_trait]
impl ProviderAdapter for PassthroughAdapter {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn to_backend_request(
        &self,
        request: &ClientRequest,
        base_url: &str,
        credential: &str,
    ) -> Result<BackendRequest, BridgeError> {
        let stream = request.parsed.is_stream();
        let mut headers = bearer_headers(credential, stream)?;
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        Ok(BackendRequest {
            url: endpoint_url(base_url, MESSAGES_PATH),
            headers,
            body: request.raw.clone(),
            stream,
        })
    }

    async fn to_client_response(
        &self,
        response: BackendResponse,
    ) -> Result<ClientResponse, BridgeError> {
        Ok(ClientResponse::passthrough(response))
    }
}
