use std::sync::Arc;

use async_trait::async_trait;

use super::{
    bearer_headers, encode_body, endpoint_url, translate_response, BackendRequest,
    BackendResponse, ClientRequest, ClientResponse, ProviderAdapter,
};
use crate::error::BridgeError;
use crate::protocol::openai_responses::request::encode_responses_request;
use crate::protocol::openai_responses::response::decode_responses_response;
use crate::protocol::openai_responses::stream::ResponsesDeltaDecoder;
use crate::protocol::SchemaSanitizer;

const RESPONSES_PATH: &str = "/responses";

/// Adapter for `OpenAI` Responses API backends.
pub struct OpenAiResponsesAdapter {
    sanitizer: Arc<dyn SchemaSanitizer>,
}

impl OpenAiResponsesAdapter {
    #[must_use]
    pub fn new(sanitizer: Arc<dyn SchemaSanitizer>) -> Self {
        Self { sanitizer }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiResponsesAdapter {
    fn name(&self) -> &'static str {
        "openai-responses"
    }

    fn to_backend_request(
        &self,
        request: &ClientRequest,
        base_url: &str,
        credential: &str,
    ) -> Result<BackendRequest, BridgeError> {
        let body = encode_responses_request(&request.parsed, self.sanitizer.as_ref());
        let stream = request.parsed.is_stream();
        Ok(BackendRequest {
            url: endpoint_url(base_url, RESPONSES_PATH),
            headers: bearer_headers(credential, stream)?,
            body: encode_body(&body)?,
            stream,
        })
    }

    async fn to_client_response(
        &self,
        response: BackendResponse,
    ) -> Result<ClientResponse, BridgeError> {
        translate_response(response, decode_responses_response, || {
            Box::new(ResponsesDeltaDecoder::new())
        })
        .await
    }
}
