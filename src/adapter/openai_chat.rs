use std::sync::Arc;

use async_trait::async_trait;

use super::{
    bearer_headers, encode_body, endpoint_url, translate_response, BackendRequest,
    BackendResponse, ClientRequest, ClientResponse, ProviderAdapter,
};
use crate::error::BridgeError;
use crate::protocol::openai_chat::request::encode_chat_request;
use crate::protocol::openai_chat::response::decode_chat_response;
use crate::protocol::openai_chat::stream::ChatDeltaDecoder;
use crate::protocol::SchemaSanitizer;

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Adapter for `OpenAI`-compatible Chat Completions backends.
pub struct OpenAiChatAdapter {
    sanitizer: Arc<dyn SchemaSanitizer>,
}

impl OpenAiChatAdapter {
    #[must_use]
    pub fn new(sanitizer: Arc<dyn SchemaSanitizer>) -> Self {
        Self { sanitizer }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiChatAdapter {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn to_backend_request(
        &self,
        request: &ClientRequest,
        base_url: &str,
        credential: &str,
    ) -> Result<BackendRequest, BridgeError> {
        let body = encode_chat_request(&request.parsed, self.sanitizer.as_ref());
        let stream = request.parsed.is_stream();
        Ok(BackendRequest {
            url: endpoint_url(base_url, CHAT_COMPLETIONS_PATH),
            headers: bearer_headers(credential, stream)?,
            body: encode_body(&body)?,
            stream,
        })
    }

    async fn to_client_response(
        &self,
        response: BackendResponse,
    ) -> Result<ClientResponse, BridgeError> {
        translate_response(response, decode_chat_response, || {
            Box::new(ChatDeltaDecoder::new())
        })
        .await
    }
}
