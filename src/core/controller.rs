//! Turn-taking state machine for one chat session.
//!
//! The controller never awaits. [`ChatController::submit`] hands out a
//! [`TurnTicket`] that the caller runs (see [`crate::core::turn`]); results
//! come back through [`ChatController::handle_event`]. Every reset bumps the
//! generation so events from a superseded turn are ignored.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::core::backends::NO_RESPONSE;
use crate::core::message::{Conversation, Message};
use crate::core::personality::{PersonalityConfig, PersonalityRegistry};
use crate::core::session_store::{Session, SessionStore, SessionStoreError};
use crate::core::turn::TurnEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingResponse,
}

/// Everything needed to run one completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnTicket {
    pub generation: u64,
    pub prompt: String,
    pub personality_id: String,
    /// The conversation before `prompt` was appended.
    pub history: Conversation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejection {
    #[error("message is empty")]
    Blank,
    #[error("still waiting for the previous response")]
    Busy,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Unknown personality: {0}")]
    UnknownPersonality(String),

    #[error("no personalities are configured")]
    NoPersonalities,

    #[error(transparent)]
    Store(#[from] SessionStoreError),
}

pub struct ChatController {
    personalities: Arc<PersonalityRegistry>,
    store: SessionStore,
    session: Session,
    /// Index into `personalities.list()`.
    active: usize,
    state: TurnState,
    current_text: String,
    generation: u64,
}

impl ChatController {
    /// Start a fresh session. `personality_id` falls back to the registry
    /// default.
    pub fn new(
        personalities: Arc<PersonalityRegistry>,
        store: SessionStore,
        personality_id: Option<&str>,
        encrypted: bool,
    ) -> Result<Self, ControllerError> {
        let requested = match personality_id {
            Some(id) => id.to_string(),
            None => personalities
                .default_id()
                .ok_or(ControllerError::NoPersonalities)?
                .to_string(),
        };
        let active = position_of(&personalities, &requested)?;
        let personality_id = personalities.list()[active].id.clone();
        let session = Session::new(store.new_id(), personality_id, encrypted);

        Ok(Self {
            personalities,
            store,
            session,
            active,
            state: TurnState::Idle,
            current_text: String::new(),
            generation: 0,
        })
    }

    pub fn submit(&mut self, text: &str) -> Result<TurnTicket, SubmitRejection> {
        let prompt = text.trim();
        if prompt.is_empty() {
            return Err(SubmitRejection::Blank);
        }
        if self.state == TurnState::AwaitingResponse {
            return Err(SubmitRejection::Busy);
        }

        let history = self.session.conversation.clone();
        self.session.conversation.push(Message::user(prompt));
        self.persist();
        self.current_text.clear();
        self.state = TurnState::AwaitingResponse;

        Ok(TurnTicket {
            generation: self.generation,
            prompt: prompt.to_string(),
            personality_id: self.session.personality_id.clone(),
            history,
        })
    }

    /// Apply an event from a running turn. Returns false when the event was
    /// discarded as stale.
    pub fn handle_event(&mut self, generation: u64, event: TurnEvent) -> bool {
        if generation != self.generation || self.state != TurnState::AwaitingResponse {
            debug!(
                event_generation = generation,
                current_generation = self.generation,
                "discarding stale turn event"
            );
            return false;
        }

        match event {
            TurnEvent::Snapshot(text) => {
                self.current_text = text;
                return true;
            }
            TurnEvent::Completed(text) => {
                let content = if text.is_empty() {
                    NO_RESPONSE.to_string()
                } else {
                    text
                };
                self.session.conversation.push(Message::assistant(content));
            }
            TurnEvent::Failed(err) => {
                self.session
                    .conversation
                    .push(Message::assistant(format!("Error: {err}")));
            }
        }

        self.current_text.clear();
        self.state = TurnState::Idle;
        self.persist();
        true
    }

    /// Switch personality, starting a new conversation. Returns false when
    /// `id` is already active.
    pub fn select_personality(&mut self, id: &str) -> Result<bool, ControllerError> {
        let index = position_of(&self.personalities, id)?;
        if index == self.active {
            return Ok(false);
        }
        self.active = index;
        self.reset();
        Ok(true)
    }

    /// Drop the conversation and its persisted copy and start a new session.
    pub fn clear(&mut self) {
        self.reset();
    }

    pub fn toggle_encrypted(&mut self, encrypted: bool) {
        if encrypted == self.session.encrypted {
            return;
        }

        if encrypted {
            // Remove before the flag flips so no persisted copy outlives it.
            if let Err(err) = self.store.clear(&self.session.id) {
                warn!(session = %self.session.id, error = %err, "failed to remove persisted session");
            }
            self.session.encrypted = true;
        } else {
            self.session.encrypted = false;
            if !self.session.conversation.is_empty() {
                self.persist();
            }
        }
    }

    /// Replace the current session with a persisted one. Returns false when
    /// no record exists for `session_id`.
    pub fn restore(&mut self, session_id: &str) -> Result<bool, ControllerError> {
        let Some(session) = self.store.load(session_id)? else {
            return Ok(false);
        };
        let index = position_of(&self.personalities, &session.personality_id)?;

        self.active = index;
        self.session = session;
        self.current_text.clear();
        self.state = TurnState::Idle;
        self.generation += 1;
        Ok(true)
    }

    pub fn current_text(&self) -> &str {
        &self.current_text
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.state == TurnState::AwaitingResponse
    }

    pub fn conversation(&self) -> &Conversation {
        &self.session.conversation
    }

    pub fn active_personality(&self) -> &PersonalityConfig {
        &self.personalities.list()[self.active]
    }

    pub fn personalities(&self) -> &PersonalityRegistry {
        &self.personalities
    }

    pub fn session_id(&self) -> &str {
        &self.session.id
    }

    pub fn is_encrypted(&self) -> bool {
        self.session.encrypted
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn reset(&mut self) {
        if !self.session.encrypted {
            if let Err(err) = self.store.clear(&self.session.id) {
                warn!(session = %self.session.id, error = %err, "failed to remove persisted session");
            }
        }

        let personality_id = self.active_personality().id.clone();
        self.session = Session::new(self.store.new_id(), personality_id, self.session.encrypted);
        self.current_text.clear();
        self.state = TurnState::Idle;
        self.generation += 1;
    }

    fn persist(&self) {
        if let Err(err) = self.store.save(
            &self.session.id,
            &self.session.conversation,
            &self.session.personality_id,
            self.session.encrypted,
        ) {
            warn!(session = %self.session.id, error = %err, "failed to persist session");
        }
    }
}

fn position_of(personalities: &PersonalityRegistry, id: &str) -> Result<usize, ControllerError> {
    personalities
        .list()
        .iter()
        .position(|p| p.id.eq_ignore_ascii_case(id))
        .ok_or_else(|| ControllerError::UnknownPersonality(id.to_string()))
}
