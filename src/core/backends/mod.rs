//! Completion backends and the table that describes them.
//!
//! Each provider family has one adapter implementing [`CompletionBackend`].
//! Endpoints, models and credential requirements are data in
//! [`BUILTIN_BACKENDS`]; adding a provider means adding a table row (and an
//! adapter only when it speaks a new family).

pub mod gemini;
mod http;
pub mod ollama;
pub mod openai;
#[cfg(test)]
pub(crate) mod test_server;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::chat_stream::SnapshotCallback;
use crate::core::error::CompletionError;
use crate::core::message::Conversation;
use crate::core::personality::SamplingParams;

pub use gemini::GeminiBackend;
pub(crate) use http::NO_RESPONSE;
pub use ollama::OllamaBackend;
pub use openai::OpenAiCompatibleBackend;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendFamily {
    /// `/chat/completions` with SSE streaming.
    OpenAiCompatible,
    /// `generateContent` / `streamGenerateContent?alt=sse`.
    Gemini,
    /// `/api/chat` with newline-delimited JSON streaming.
    Ollama,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    pub id: &'static str,
    pub display_name: &'static str,
    pub family: BackendFamily,
    pub base_url: &'static str,
    /// Environment variable that overrides `base_url`.
    pub base_url_env: Option<&'static str>,
    /// Path under `base_url` that completions are posted to. For Gemini this
    /// is the collection the model name is appended to.
    pub chat_path: &'static str,
    pub model: &'static str,
    /// Environment variable holding the API key. `Some` means a key is required.
    pub api_key_env: Option<&'static str>,
    /// Appended to every failure message from this backend.
    pub failure_hint: Option<&'static str>,
}

impl BackendSpec {
    pub fn requires_api_key(&self) -> bool {
        self.api_key_env.is_some()
    }

    pub(crate) fn with_hint(&self, message: String) -> String {
        match self.failure_hint {
            Some(hint) => format!("{}. {hint}", message.trim_end_matches('.')),
            None => message,
        }
    }
}

pub const BUILTIN_BACKENDS: &[BackendSpec] = &[
    BackendSpec {
        id: "deepseek",
        display_name: "DeepSeek",
        family: BackendFamily::OpenAiCompatible,
        base_url: "https://api.deepseek.com/v1",
        base_url_env: Some("DEEPSEEK_BASE_URL"),
        chat_path: "chat/completions",
        model: "deepseek-reasoner",
        api_key_env: Some("DEEPSEEK_API_KEY"),
        failure_hint: None,
    },
    BackendSpec {
        id: "gemini",
        display_name: "Gemini",
        family: BackendFamily::Gemini,
        base_url: "https://generativelanguage.googleapis.com/v1beta",
        base_url_env: Some("GEMINI_BASE_URL"),
        chat_path: "models",
        model: "gemini-1.5-flash",
        api_key_env: Some("GEMINI_API_KEY"),
        failure_hint: None,
    },
    BackendSpec {
        id: "lmstudio",
        display_name: "LM Studio",
        family: BackendFamily::OpenAiCompatible,
        base_url: "http://127.0.0.1:1234",
        base_url_env: Some("LM_STUDIO_URL"),
        chat_path: "v1/chat/completions",
        model: "wizardlm-7b-uncensored",
        api_key_env: None,
        failure_hint: Some("Make sure LM Studio is running."),
    },
    BackendSpec {
        id: "ollama",
        display_name: "Ollama",
        family: BackendFamily::Ollama,
        base_url: "http://127.0.0.1:11434",
        base_url_env: Some("OLLAMA_URL"),
        chat_path: "api/chat",
        model: "llama3.2",
        api_key_env: None,
        failure_hint: Some("Make sure Ollama is running."),
    },
];

/// Find a built-in backend by id (case-insensitive).
pub fn find_backend_spec(id: &str) -> Option<&'static BackendSpec> {
    BUILTIN_BACKENDS
        .iter()
        .find(|spec| spec.id.eq_ignore_ascii_case(id))
}

/// A backend spec with configuration and credentials applied.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub spec: &'static BackendSpec,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl BackendSettings {
    pub fn new(spec: &'static BackendSpec) -> Self {
        Self {
            spec,
            base_url: spec.base_url.to_string(),
            model: spec.model.to_string(),
            api_key: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// The key to send, failing when the backend needs one and none is set.
    pub(crate) fn api_key(&self) -> Result<Option<&str>, CompletionError> {
        let key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty());
        match (key, self.spec.api_key_env) {
            (None, Some(env_var)) => Err(CompletionError::Configuration(format!(
                "{} API key not configured. Set {env_var} or run `obsidian auth {}`.",
                self.spec.display_name, self.spec.id
            ))),
            (key, _) => Ok(key),
        }
    }
}

/// One completion call's inputs.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    /// Prior turns, oldest first. Does not include `prompt`.
    pub history: &'a Conversation,
    pub system_prompt: &'a str,
    pub sampling: SamplingParams,
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn id(&self) -> &str;

    fn display_name(&self) -> &str;

    /// Run one completion. With `on_chunk` the response is streamed and the
    /// callback receives cumulative snapshots; either way the full text is
    /// returned.
    async fn complete(
        &self,
        request: CompletionRequest<'_>,
        on_chunk: Option<&mut SnapshotCallback<'_>>,
    ) -> Result<String, CompletionError>;
}

pub fn build_backend(
    client: &reqwest::Client,
    settings: BackendSettings,
) -> Arc<dyn CompletionBackend> {
    match settings.spec.family {
        BackendFamily::OpenAiCompatible => {
            Arc::new(OpenAiCompatibleBackend::new(client.clone(), settings))
        }
        BackendFamily::Gemini => Arc::new(GeminiBackend::new(client.clone(), settings)),
        BackendFamily::Ollama => Arc::new(OllamaBackend::new(client.clone(), settings)),
    }
}

/// Backend id → adapter.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn CompletionBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(
        client: &reqwest::Client,
        settings: impl IntoIterator<Item = BackendSettings>,
    ) -> Self {
        let mut registry = Self::new();
        for entry in settings {
            registry.register(build_backend(client, entry));
        }
        registry
    }

    pub fn register(&mut self, backend: Arc<dyn CompletionBackend>) {
        self.backends
            .insert(backend.id().to_ascii_lowercase(), backend);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn CompletionBackend>> {
        self.backends.get(&id.to_ascii_lowercase()).cloned()
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
