//! Runs completion turns off the controller's task.
//!
//! Each turn becomes one spawned task; everything it observes is sent back
//! as `(TurnEvent, generation)` so the controller can drop events from turns
//! that a reset has made stale.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::core::chat_stream::SnapshotCallback;
use crate::core::controller::TurnTicket;
use crate::core::error::CompletionError;
use crate::core::orchestrator::CompletionOrchestrator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// Cumulative text so far.
    Snapshot(String),
    Completed(String),
    Failed(CompletionError),
}

impl TurnEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TurnEvent::Snapshot(_))
    }
}

pub type TurnEventReceiver = UnboundedReceiver<(TurnEvent, u64)>;

pub struct TurnRunner {
    orchestrator: Arc<CompletionOrchestrator>,
    tx: UnboundedSender<(TurnEvent, u64)>,
}

impl TurnRunner {
    pub fn new(orchestrator: Arc<CompletionOrchestrator>) -> (Self, TurnEventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { orchestrator, tx }, rx)
    }

    pub fn spawn_turn(&self, ticket: TurnTicket) -> JoinHandle<()> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let generation = ticket.generation;
            let snapshot_tx = tx.clone();
            let mut forward = move |text: &str| {
                // The receiver only disappears when the front end is exiting.
                let _ = snapshot_tx.send((TurnEvent::Snapshot(text.to_string()), generation));
            };
            let callback: &mut SnapshotCallback<'_> = &mut forward;

            let event = match orchestrator
                .send(
                    &ticket.prompt,
                    &ticket.personality_id,
                    &ticket.history,
                    Some(callback),
                )
                .await
            {
                Ok(text) => TurnEvent::Completed(text),
                Err(err) => TurnEvent::Failed(err),
            };
            let _ = tx.send((event, generation));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backends::test_support::ScriptedBackend;
    use crate::core::backends::BackendRegistry;
    use crate::core::message::Conversation;
    use crate::core::personality::PersonalityRegistry;

    fn runner_with(backend: ScriptedBackend) -> (TurnRunner, TurnEventReceiver) {
        let mut backends = BackendRegistry::new();
        backends.register(Arc::new(backend));
        TurnRunner::new(Arc::new(CompletionOrchestrator::new(
            Arc::new(PersonalityRegistry::builtin()),
            backends,
        )))
    }

    fn ticket(generation: u64) -> TurnTicket {
        TurnTicket {
            generation,
            prompt: "hi".into(),
            personality_id: "analyst".into(),
            history: Conversation::new(),
        }
    }

    #[tokio::test]
    async fn events_arrive_in_order_tagged_with_the_generation() {
        let (runner, mut rx) =
            runner_with(ScriptedBackend::succeeding("gemini", &["He", "Hey"], "Hey"));
        runner.spawn_turn(ticket(7)).await.expect("turn task");

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                (TurnEvent::Snapshot("He".into()), 7),
                (TurnEvent::Snapshot("Hey".into()), 7),
                (TurnEvent::Completed("Hey".into()), 7),
            ]
        );
        assert!(events[2].0.is_terminal());
    }

    #[tokio::test]
    async fn failures_are_reported_as_terminal_events() {
        let error = CompletionError::Provider {
            backend: "Gemini".into(),
            message: "quota exceeded".into(),
        };
        let (runner, mut rx) = runner_with(ScriptedBackend::failing("gemini", error.clone()));
        runner.spawn_turn(ticket(1)).await.expect("turn task");

        assert_eq!(rx.recv().await, Some((TurnEvent::Failed(error), 1)));
    }
}
