use async_trait::async_trait;

use super::http::{read_streamed_text, read_whole_text, send_checked};
use super::openai::build_messages;
use super::{BackendSettings, CompletionBackend, CompletionRequest};
use crate::api::{OllamaChatRequest, OllamaOptions};
use crate::core::chat_stream::{SnapshotCallback, StreamShape};
use crate::core::error::CompletionError;
use crate::utils::url::construct_api_url;

const TEXT_PATH: &str = "/message/content";
const STREAM_SHAPE: StreamShape = StreamShape::ndjson_delta(TEXT_PATH, "/done");
const ERROR_PATH: &str = "/error";

/// Adapter for a local Ollama server's `/api/chat`.
pub struct OllamaBackend {
    client: reqwest::Client,
    settings: BackendSettings,
}

impl OllamaBackend {
    pub fn new(client: reqwest::Client, settings: BackendSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    fn id(&self) -> &str {
        self.settings.spec.id
    }

    fn display_name(&self) -> &str {
        self.settings.spec.display_name
    }

    async fn complete(
        &self,
        request: CompletionRequest<'_>,
        on_chunk: Option<&mut SnapshotCallback<'_>>,
    ) -> Result<String, CompletionError> {
        let api_key = self.settings.api_key()?;
        let body = OllamaChatRequest {
            model: self.settings.model.clone(),
            messages: build_messages(&request),
            stream: on_chunk.is_some(),
            options: OllamaOptions {
                temperature: request.sampling.temperature,
                num_predict: request.sampling.max_tokens,
            },
        };

        let mut http_request = self
            .client
            .post(construct_api_url(
                &self.settings.base_url,
                self.settings.spec.chat_path,
            ))
            .header("Content-Type", "application/json")
            .json(&body);
        // Only set when Ollama sits behind an authenticating proxy.
        if let Some(api_key) = api_key {
            http_request = http_request.header("Authorization", format!("Bearer {api_key}"));
        }

        let spec = self.settings.spec;
        let response = send_checked(http_request, spec, ERROR_PATH).await?;
        match on_chunk {
            Some(callback) => read_streamed_text(response, STREAM_SHAPE, callback).await,
            None => read_whole_text(response, spec, TEXT_PATH).await,
        }
    }
}
