use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::backends::{BackendRegistry, CompletionRequest};
use crate::core::chat_stream::SnapshotCallback;
use crate::core::error::CompletionError;
use crate::core::message::Conversation;
use crate::core::personality::PersonalityRegistry;

/// Routes a prompt to the backend selected by a personality.
///
/// One adapter call per [`send`](Self::send); failures are returned as the
/// adapter produced them.
pub struct CompletionOrchestrator {
    personalities: Arc<PersonalityRegistry>,
    backends: BackendRegistry,
}

impl CompletionOrchestrator {
    pub fn new(personalities: Arc<PersonalityRegistry>, backends: BackendRegistry) -> Self {
        Self {
            personalities,
            backends,
        }
    }

    pub fn personalities(&self) -> &PersonalityRegistry {
        &self.personalities
    }

    pub async fn send(
        &self,
        message: &str,
        personality_id: &str,
        history: &Conversation,
        on_chunk: Option<&mut SnapshotCallback<'_>>,
    ) -> Result<String, CompletionError> {
        let personality = self.personalities.find(personality_id).ok_or_else(|| {
            CompletionError::Configuration(format!("Unknown personality: {personality_id}"))
        })?;

        let backend = self.backends.get(&personality.backend).ok_or_else(|| {
            CompletionError::Configuration(format!(
                "No backend registered for '{}' (personality {})",
                personality.backend, personality.id
            ))
        })?;

        debug!(
            personality = %personality.id,
            backend = backend.id(),
            history = history.len(),
            streaming = on_chunk.is_some(),
            "dispatching completion"
        );

        let request = CompletionRequest {
            prompt: message,
            history,
            system_prompt: &personality.system_prompt,
            sampling: personality.sampling(),
        };

        backend
            .complete(request, on_chunk)
            .await
            .inspect_err(|err| {
                warn!(
                    backend = backend.id(),
                    kind = err.kind(),
                    error = %err,
                    "completion failed"
                )
            })
    }
}
