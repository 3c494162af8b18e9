use async_trait::async_trait;

use super::http::{read_streamed_text, read_whole_text, send_checked};
use super::{BackendSettings, CompletionBackend, CompletionRequest};
use crate::api::{ChatMessage, ChatRequest};
use crate::core::chat_stream::{SnapshotCallback, StreamShape};
use crate::core::error::CompletionError;
use crate::utils::url::construct_api_url;

const STREAM_SHAPE: StreamShape = StreamShape::sse_delta("/choices/0/delta/content");
const MESSAGE_TEXT_PATH: &str = "/choices/0/message/content";
const ERROR_PATH: &str = "/error/message";

/// Adapter for `/chat/completions` servers (DeepSeek, LM Studio).
pub struct OpenAiCompatibleBackend {
    client: reqwest::Client,
    settings: BackendSettings,
}

impl OpenAiCompatibleBackend {
    pub fn new(client: reqwest::Client, settings: BackendSettings) -> Self {
        Self { client, settings }
    }

    fn build_request(&self, request: &CompletionRequest<'_>, stream: bool) -> ChatRequest {
        ChatRequest {
            model: self.settings.model.clone(),
            messages: build_messages(request),
            stream,
            temperature: request.sampling.temperature,
            max_tokens: request.sampling.max_tokens,
        }
    }
}

/// System prompt first (when present), then history, then the new prompt.
pub(crate) fn build_messages(request: &CompletionRequest<'_>) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    if !request.system_prompt.trim().is_empty() {
        messages.push(ChatMessage::new("system", request.system_prompt));
    }
    messages.extend(
        request
            .history
            .iter()
            .map(|message| ChatMessage::new(message.role.as_str(), message.content.as_str())),
    );
    messages.push(ChatMessage::new("user", request.prompt));
    messages
}

#[async_trait]
impl CompletionBackend for OpenAiCompatibleBackend {
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
        let body = self.build_request(&request, on_chunk.is_some());

        let mut http_request = self
            .client
            .post(construct_api_url(
                &self.settings.base_url,
                self.settings.spec.chat_path,
            ))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(api_key) = api_key {
            http_request = http_request.header("Authorization", format!("Bearer {api_key}"));
        }

        let spec = self.settings.spec;
        let response = send_checked(http_request, spec, ERROR_PATH).await?;
        match on_chunk {
            Some(callback) => read_streamed_text(response, STREAM_SHAPE, callback).await,
            None => read_whole_text(response, spec, MESSAGE_TEXT_PATH).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backends::find_backend_spec;
    use crate::core::backends::test_server::{serve_once, test_client, MockResponse};
    use crate::core::message::{Conversation, Message};
    use crate::core::personality::SamplingParams;

    fn sampling() -> SamplingParams {
        SamplingParams {
            temperature: 0.2,
            max_tokens: Some(150),
        }
    }

    fn lmstudio_at(base_url: &str) -> OpenAiCompatibleBackend {
        let spec = find_backend_spec("lmstudio").expect("lmstudio");
        OpenAiCompatibleBackend::new(
            test_client(),
            BackendSettings::new(spec).with_base_url(base_url),
        )
    }

    #[test]
    fn messages_are_ordered_system_history_prompt() {
        let history: Conversation = vec![
            Message::user("first"),
            Message::assistant("reply"),
        ]
        .into_iter()
        .collect();
        let request = CompletionRequest {
            prompt: "second",
            history: &history,
            system_prompt: "Be brief.",
            sampling: sampling(),
        };
        let messages = build_messages(&request);
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(messages[3].content, "second");
    }

    #[test]
    fn blank_system_prompt_is_omitted() {
        let history = Conversation::new();
        let request = CompletionRequest {
            prompt: "hi",
            history: &history,
            system_prompt: "  ",
            sampling: sampling(),
        };
        assert_eq!(build_messages(&request), vec![ChatMessage::new("user", "hi")]);
    }

    #[tokio::test]
    async fn streams_cumulative_snapshots() {
        let (base_url, server) = serve_once(MockResponse::event_stream(&[
            r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"lo"}}]}"#,
            "data: [DONE]",
        ]))
        .await;
        let backend = lmstudio_at(&base_url);
        let history = Conversation::new();
        let mut snapshots = Vec::new();
        let mut record = |text: &str| snapshots.push(text.to_string());
        let callback: &mut SnapshotCallback<'_> = &mut record;

        let text = backend
            .complete(
                CompletionRequest {
                    prompt: "hi",
                    history: &history,
                    system_prompt: "Be brief.",
                    sampling: sampling(),
                },
                Some(callback),
            )
            .await
            .expect("completion");

        assert_eq!(text, "Hello");
        assert_eq!(snapshots, ["Hel", "Hello"]);

        let captured = server.await.expect("server task");
        assert_eq!(captured.request_line, "POST /v1/chat/completions HTTP/1.1");
        assert!(captured.header("authorization").is_none());
        let body = captured.json();
        assert_eq!(body["model"], "wizardlm-7b-uncensored");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 150);
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[tokio::test]
    async fn whole_response_mode_reads_message_content_and_sends_key() {
        let (base_url, server) = serve_once(MockResponse::json(
            200,
            r#"{"choices":[{"message":{"role":"assistant","content":"Done."}}]}"#,
        ))
        .await;
        let spec = find_backend_spec("deepseek").expect("deepseek");
        let backend = OpenAiCompatibleBackend::new(
            test_client(),
            BackendSettings::new(spec)
                .with_base_url(&base_url)
                .with_api_key("sk-test"),
        );
        let history = Conversation::new();

        let text = backend
            .complete(
                CompletionRequest {
                    prompt: "hi",
                    history: &history,
                    system_prompt: "",
                    sampling: sampling(),
                },
                None,
            )
            .await
            .expect("completion");
        assert_eq!(text, "Done.");

        let captured = server.await.expect("server task");
        assert_eq!(captured.header("authorization"), Some("Bearer sk-test"));
        assert_eq!(captured.json()["stream"], false);
        assert_eq!(captured.json()["model"], "deepseek-reasoner");
    }

    #[tokio::test]
    async fn empty_stream_yields_placeholder() {
        let (base_url, _server) = serve_once(MockResponse::event_stream(&["data: [DONE]"])).await;
        let backend = lmstudio_at(&base_url);
        let history = Conversation::new();
        let mut ignore = |_: &str| {};
        let callback: &mut SnapshotCallback<'_> = &mut ignore;

        let text = backend
            .complete(
                CompletionRequest {
                    prompt: "hi",
                    history: &history,
                    system_prompt: "",
                    sampling: sampling(),
                },
                Some(callback),
            )
            .await
            .expect("completion");
        assert_eq!(text, "No response generated");
    }

    #[tokio::test]
    async fn http_errors_surface_provider_message_with_hint() {
        let (base_url, _server) = serve_once(MockResponse::json(
            400,
            r#"{"error":{"message":"model not loaded"}}"#,
        ))
        .await;
        let backend = lmstudio_at(&base_url);
        let history = Conversation::new();

        let err = backend
            .complete(
                CompletionRequest {
                    prompt: "hi",
                    history: &history,
                    system_prompt: "",
                    sampling: sampling(),
                },
                None,
            )
            .await
            .expect_err("400 should fail");
        assert_eq!(
            err.to_string(),
            "LM Studio API error: model not loaded. Make sure LM Studio is running."
        );
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let spec = find_backend_spec("deepseek").expect("deepseek");
        let backend = OpenAiCompatibleBackend::new(
            test_client(),
            BackendSettings::new(spec).with_base_url("http://127.0.0.1:9"),
        );
        let history = Conversation::new();
        let err = backend
            .complete(
                CompletionRequest {
                    prompt: "hi",
                    history: &history,
                    system_prompt: "",
                    sampling: sampling(),
                },
                None,
            )
            .await
            .expect_err("key required");
        assert_eq!(err.kind(), "configuration");
    }
}
