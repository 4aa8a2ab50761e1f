//! Session runtime executor

use super::{Command, SessionView, SseEvent};
use crate::delivery::DeliveryEngine;
use crate::llm::LlmService;
use crate::state_machine::{transition, Effect, Event, SessionState};
use crate::transcript::Transcript;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

/// Event loop owning one session's state and transcript
///
/// Only this task mutates the transcript. Deliveries run in their own tasks
/// and report back through the command channel.
pub struct SessionRuntime<L: LlmService + 'static> {
    session_id: String,
    state: SessionState,
    transcript: Transcript,
    engine: Arc<DeliveryEngine<L>>,
    command_rx: mpsc::Receiver<Command>,
    /// Weak so that dropping every handle lets the loop finish once
    /// in-flight deliveries have settled
    command_tx: mpsc::WeakSender<Command>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    view_tx: watch::Sender<SessionView>,
}

impl<L: LlmService + 'static> SessionRuntime<L> {
    pub fn new(
        session_id: String,
        transcript: Transcript,
        engine: Arc<DeliveryEngine<L>>,
        command_rx: mpsc::Receiver<Command>,
        command_tx: mpsc::WeakSender<Command>,
        broadcast_tx: broadcast::Sender<SseEvent>,
        view_tx: watch::Sender<SessionView>,
    ) -> Self {
        Self {
            session_id,
            state: SessionState::default(),
            transcript,
            engine,
            command_rx,
            command_tx,
            broadcast_tx,
            view_tx,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "Starting session runtime");

        while let Some(command) = self.command_rx.recv().await {
            self.process_command(command);
        }

        tracing::info!(
            session_id = %self.session_id,
            turns = self.transcript.len(),
            "Session runtime stopped"
        );
    }

    fn process_command(&mut self, command: Command) {
        let Command { event, reply } = command;
        let event_name = event.name();

        let outcome = match transition(&self.state, event) {
            Ok(result) => {
                self.state = result.new_state;
                for effect in result.effects {
                    self.execute_effect(effect);
                }
                Ok(self.publish_view())
            }
            Err(e) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    event = event_name,
                    error = %e,
                    "Event rejected"
                );
                let _ = self.broadcast_tx.send(SseEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        };

        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendTurn { turn } => {
                self.transcript.append(turn.clone());
                let _ = self.broadcast_tx.send(SseEvent::Turn { turn });
            }
            Effect::NotifyState => {
                tracing::debug!(
                    session_id = %self.session_id,
                    state = self.state.label(),
                    open = self.state.open,
                    "Session state changed"
                );
                let _ = self.broadcast_tx.send(SseEvent::StateChange { state: self.state });
            }
            Effect::Deliver { text } => self.spawn_delivery(text),
        }
    }

    fn spawn_delivery(&self, text: String) {
        let Some(command_tx) = self.command_tx.upgrade() else {
            tracing::warn!(session_id = %self.session_id, "Session ended before delivery started");
            return;
        };
        let engine = Arc::clone(&self.engine);
        let session_id = self.session_id.clone();

        tokio::spawn(async move {
            let turn = engine.deliver(&text).await;
            let settled = Command::event(Event::DeliverySettled { turn });
            if command_tx.send(settled).await.is_err() {
                tracing::warn!(%session_id, "Session stopped before delivery settled");
            }
        });
    }

    fn publish_view(&self) -> SessionView {
        let view = SessionView::new(&self.session_id, self.state, &self.transcript);
        self.view_tx.send_replace(view.clone());
        view
    }
}
