//! Request payloads for the supported completion APIs.
//!
//! Responses are read through JSON pointers by the backends, so only the
//! outbound shapes are typed here.

use serde::Serialize;

/// One entry of an OpenAI-style `messages` array (also used by Ollama).
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// OpenAI-compatible `/chat/completions` body (DeepSeek, LM Studio).
#[derive(Serialize, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Ollama `/api/chat` body.
#[derive(Serialize, Debug)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub options: OllamaOptions,
}

#[derive(Serialize, Debug)]
pub struct OllamaOptions {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

/// Gemini `generateContent` / `streamGenerateContent` body.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<GeminiContent>,
    pub generation_config: GenerationConfig,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct GeminiContent {
    pub role: String,
    pub parts: Vec<GeminiPart>,
}

impl GeminiContent {
    pub fn text(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            parts: vec![GeminiPart { text: text.into() }],
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct GeminiPart {
    pub text: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_request_uses_camel_case_keys() {
        let request = GenerateContentRequest {
            contents: vec![GeminiContent::text("user", "hi")],
            generation_config: GenerationConfig {
                temperature: 0.5,
                max_output_tokens: Some(10),
            },
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 10);
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn absent_token_limits_are_omitted() {
        let request = ChatRequest {
            model: "m".into(),
            messages: Vec::new(),
            stream: false,
            temperature: 0.3,
            max_tokens: None,
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert!(value.get("max_tokens").is_none());
        assert_eq!(value["stream"], false);
    }
}
