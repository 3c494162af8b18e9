use async_trait::async_trait;

use super::http::{read_streamed_text, read_whole_text, send_checked};
use super::{BackendSettings, CompletionBackend, CompletionRequest};
use crate::api::{GeminiContent, GenerateContentRequest, GenerationConfig};
use crate::core::chat_stream::{SnapshotCallback, StreamShape};
use crate::core::error::CompletionError;
use crate::core::message::Role;
use crate::utils::url::construct_api_url;

const TEXT_PATH: &str = "/candidates/0/content/parts/0/text";
const STREAM_SHAPE: StreamShape = StreamShape::sse_delta(TEXT_PATH);
const ERROR_PATH: &str = "/error/message";

/// Adapter for Google's `generateContent` API.
///
/// Streaming uses `streamGenerateContent?alt=sse`, which emits one
/// `GenerateContentResponse` per `data:` line holding only the new text.
pub struct GeminiBackend {
    client: reqwest::Client,
    settings: BackendSettings,
}

impl GeminiBackend {
    pub fn new(client: reqwest::Client, settings: BackendSettings) -> Self {
        Self { client, settings }
    }

    fn endpoint(&self, stream: bool) -> String {
        let method = if stream {
            "streamGenerateContent"
        } else {
            "generateContent"
        };
        construct_api_url(
            &self.settings.base_url,
            &format!(
                "{}/{}:{method}",
                self.settings.spec.chat_path, self.settings.model
            ),
        )
    }
}

/// Gemini has no system role here; the system prompt rides along as the
/// first user turn and assistant turns are sent as `model`.
pub(crate) fn build_contents(request: &CompletionRequest<'_>) -> Vec<GeminiContent> {
    let mut contents = Vec::with_capacity(request.history.len() + 2);
    if !request.system_prompt.trim().is_empty() {
        contents.push(GeminiContent::text("user", request.system_prompt));
    }
    contents.extend(request.history.iter().map(|message| {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "model",
        };
        GeminiContent::text(role, message.content.as_str())
    }));
    contents.push(GeminiContent::text("user", request.prompt));
    contents
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
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
        let stream = on_chunk.is_some();
        let body = GenerateContentRequest {
            contents: build_contents(&request),
            generation_config: GenerationConfig {
                temperature: request.sampling.temperature,
                max_output_tokens: request.sampling.max_tokens,
            },
        };

        let mut http_request = self
            .client
            .post(self.endpoint(stream))
            .header("Content-Type", "application/json");
        if stream {
            http_request = http_request.query(&[("alt", "sse")]);
        }
        if let Some(api_key) = api_key {
            http_request = http_request.header("x-goog-api-key", api_key);
        }
        let http_request = http_request.json(&body);

        let spec = self.settings.spec;
        let response = send_checked(http_request, spec, ERROR_PATH).await?;
        match on_chunk {
            Some(callback) => read_streamed_text(response, STREAM_SHAPE, callback).await,
            None => read_whole_text(response, spec, TEXT_PATH).await,
        }
    }
}
