//! Runtime for chat sessions
//!
//! One tokio task per session executes state machine effects. The manager
//! keeps a handle per live session and routes events to it.

mod executor;

pub use executor::SessionRuntime;

use crate::delivery::DeliveryEngine;
use crate::llm::LlmService;
use crate::state_machine::{Event, SessionState, TransitionError};
use crate::transcript::{Transcript, Turn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch, RwLock};
use tokio::time::Instant;

/// Manager backed by the real provider stack
pub type ProductionManager = SessionManager<Arc<dyn LlmService>>;

const COMMAND_BUFFER: usize = 32;
const BROADCAST_BUFFER: usize = 128;

/// How often the idle sweep runs
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Event plus an optional channel for the transition outcome
///
/// On success the reply carries the view as of that transition.
#[derive(Debug)]
pub struct Command {
    pub event: Event,
    pub reply: Option<oneshot::Sender<Result<SessionView, TransitionError>>>,
}

impl Command {
    /// Fire-and-forget command
    pub fn event(event: Event) -> Self {
        Self { event, reply: None }
    }
}

/// Read-only snapshot of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: String,
    #[serde(flatten)]
    pub state: SessionState,
    pub turns: Vec<Turn>,
}

impl SessionView {
    pub fn new(id: &str, state: SessionState, transcript: &Transcript) -> Self {
        Self {
            id: id.to_string(),
            state,
            turns: transcript.all().to_vec(),
        }
    }
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Turn { turn: Turn },
    StateChange { state: SessionState },
    Error { message: String },
}

/// Handle to interact with a running session
struct SessionHandle {
    command_tx: mpsc::Sender<Command>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    view_rx: watch::Receiver<SessionView>,
    last_activity: Mutex<Instant>,
}

impl SessionHandle {
    fn touch(&self) {
        if let Ok(mut last) = self.last_activity.lock() {
            *last = Instant::now();
        }
    }

    fn idle_for(&self, now: Instant) -> Duration {
        self.last_activity
            .lock()
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(*last))
    }

    /// Sessions with a connected stream or an answer pending are never idle
    fn is_busy(&self) -> bool {
        self.broadcast_tx.receiver_count() > 0 || self.view_rx.borrow().state.loading
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("Session runtime stopped")]
    Stopped,
}

/// Manager for all live sessions
pub struct SessionManager<L: LlmService + 'static> {
    engine: Arc<DeliveryEngine<L>>,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl<L: LlmService + 'static> SessionManager<L> {
    pub fn new(engine: Arc<DeliveryEngine<L>>) -> Self {
        Self {
            engine,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &DeliveryEngine<L> {
        &self.engine
    }

    /// Start a new session seeded with the assistant greeting
    pub async fn create(&self) -> SessionView {
        let id = uuid::Uuid::new_v4().to_string();
        let transcript = Transcript::with_greeting(self.engine.context().greeting());
        let initial = SessionView::new(&id, SessionState::default(), &transcript);

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_BUFFER);
        let (view_tx, view_rx) = watch::channel(initial.clone());

        let runtime = SessionRuntime::new(
            id.clone(),
            transcript,
            Arc::clone(&self.engine),
            command_rx,
            command_tx.downgrade(),
            broadcast_tx.clone(),
            view_tx,
        );
        tokio::spawn(runtime.run());

        self.sessions.write().await.insert(
            id.clone(),
            SessionHandle {
                command_tx,
                broadcast_tx,
                view_rx,
                last_activity: Mutex::new(Instant::now()),
            },
        );
        tracing::info!(session_id = %id, "Session created");

        initial
    }

    /// Current snapshot of a session
    pub async fn view(&self, id: &str) -> Option<SessionView> {
        let sessions = self.sessions.read().await;
        sessions.get(id).map(|handle| {
            handle.touch();
            handle.view_rx.borrow().clone()
        })
    }

    /// Route an event to a session and wait for the transition outcome
    pub async fn dispatch(&self, id: &str, event: Event) -> Result<SessionView, DispatchError> {
        let command_tx = {
            let sessions = self.sessions.read().await;
            let handle = sessions
                .get(id)
                .ok_or_else(|| DispatchError::NotFound(id.to_string()))?;
            handle.touch();
            handle.command_tx.clone()
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        command_tx
            .send(Command {
                event,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| DispatchError::Stopped)?;

        let view = reply_rx.await.map_err(|_| DispatchError::Stopped)??;
        Ok(view)
    }

    /// Subscribe to live updates, returning the snapshot the stream starts from
    pub async fn subscribe(
        &self,
        id: &str,
    ) -> Option<(SessionView, broadcast::Receiver<SseEvent>)> {
        let sessions = self.sessions.read().await;
        let handle = sessions.get(id)?;
        handle.touch();
        let rx = handle.broadcast_tx.subscribe();
        let view = handle.view_rx.borrow().clone();
        Some((view, rx))
    }

    /// End a session; an in-flight delivery still runs to settlement
    pub async fn end(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!(session_id = %id, "Session ended");
        }
        removed
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// End every session untouched for longer than `idle_timeout`
    ///
    /// Returns how many sessions were ended.
    pub async fn cleanup_idle_sessions(&self, idle_timeout: Duration) -> usize {
        let now = Instant::now();
        let stale: Vec<String> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .filter(|(_, handle)| !handle.is_busy() && handle.idle_for(now) > idle_timeout)
                .map(|(id, _)| id.clone())
                .collect()
        };

        if stale.is_empty() {
            return 0;
        }

        // Re-check under the write lock; a request may have touched it since
        let mut sessions = self.sessions.write().await;
        let mut ended = 0;
        for id in stale {
            let still_idle = sessions
                .get(&id)
                .is_some_and(|handle| !handle.is_busy() && handle.idle_for(now) > idle_timeout);
            if still_idle {
                sessions.remove(&id);
                tracing::info!(session_id = %id, "Idle session ended");
                ended += 1;
            }
        }
        ended
    }

    /// Start the background sweep for idle sessions
    ///
    /// The task stops once the manager is dropped.
    pub fn start_cleanup_task(self: &Arc<Self>, idle_timeout: Duration, every: Duration) {
        let manager: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.cleanup_idle_sessions(idle_timeout).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::RETRY_EXHAUSTED_MESSAGE;
    use crate::knowledge::SystemContext;
    use crate::llm::testing::MockLlmService;
    use crate::llm::LlmError;
    use crate::transcript::Sender;
    use std::time::Duration;

    fn manager(mock: &Arc<MockLlmService>) -> SessionManager<Arc<MockLlmService>> {
        let engine = DeliveryEngine::new(
            Some(Arc::clone(mock)),
            Arc::new(SystemContext::new("Ada Lovelace", "Analytical engine.")),
        );
        SessionManager::new(Arc::new(engine))
    }

    /// Wait until the session has no delivery in flight
    async fn wait_idle<L: LlmService + 'static>(manager: &SessionManager<L>, id: &str) -> SessionView {
        let mut view_rx = {
            let sessions = manager.sessions.read().await;
            sessions.get(id).unwrap().view_rx.clone()
        };
        loop {
            {
                let view = view_rx.borrow_and_update();
                if !view.state.loading {
                    return view.clone();
                }
            }
            view_rx.changed().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_new_session_starts_with_greeting() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let manager = manager(&mock);

        let view = manager.create().await;

        assert_eq!(view.turns.len(), 1);
        assert_eq!(view.turns[0].sender, Sender::Assistant);
        assert!(view.turns[0].text.starts_with("Hello, I am Ada's AI Assistant."));
        assert!(!view.state.open);
        assert!(!view.state.loading);
        assert_eq!(manager.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_submit_appends_user_then_answer() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_text("She wrote notes on the engine.");
        let manager = manager(&mock);
        let id = manager.create().await.id;

        let view = manager.dispatch(&id, Event::submit(" what did she do? ")).await.unwrap();
        assert!(view.state.loading);
        assert_eq!(view.turns.last().unwrap().text, "what did she do?");

        let view = wait_idle(&manager, &id).await;
        assert_eq!(view.turns.len(), 3);
        assert_eq!(view.turns[1].sender, Sender::User);
        assert_eq!(view.turns[2].sender, Sender::Assistant);
        assert_eq!(view.turns[2].text, "She wrote notes on the engine.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_while_loading_is_noop() {
        let mock = Arc::new(MockLlmService::new("mock").with_delay(Duration::from_secs(3)));
        mock.queue_text("answer");
        let manager = manager(&mock);
        let id = manager.create().await.id;

        manager.dispatch(&id, Event::submit("first")).await.unwrap();
        let err = manager.dispatch(&id, Event::submit("second")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Rejected(TransitionError::Busy)));
        assert_eq!(manager.view(&id).await.unwrap().turns.len(), 2);

        let view = wait_idle(&manager, &id).await;
        assert_eq!(view.turns.len(), 3);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_submit_is_rejected() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let manager = manager(&mock);
        let id = manager.create().await.id;

        let err = manager.dispatch(&id, Event::submit("   ")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Rejected(TransitionError::EmptyInput)));
        assert_eq!(manager.view(&id).await.unwrap().turns.len(), 1);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_during_delivery_and_close_does_not_cancel() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_error(LlmError::network("down"));
        mock.queue_text("late answer");
        let manager = manager(&mock);
        let id = manager.create().await.id;

        manager.dispatch(&id, Event::Open).await.unwrap();
        manager.dispatch(&id, Event::submit("hello")).await.unwrap();

        let view = manager.dispatch(&id, Event::Close).await.unwrap();
        assert!(!view.state.open);
        assert!(view.state.loading);

        let view = wait_idle(&manager, &id).await;
        assert!(!view.state.open);
        assert_eq!(view.turns.last().unwrap().text, "late answer");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_submissions_alternate_after_greeting() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_text("a1");
        for _ in 0..5 {
            mock.queue_error(LlmError::server_error("down"));
        }
        mock.queue_text("a3");
        let manager = manager(&mock);
        let id = manager.create().await.id;

        for question in ["q1", "q2", "q3"] {
            manager.dispatch(&id, Event::submit(question)).await.unwrap();
            wait_idle(&manager, &id).await;
        }

        let view = manager.view(&id).await.unwrap();
        let conversation = &view.turns[1..];
        assert_eq!(conversation.len(), 6);
        for (i, turn) in conversation.iter().enumerate() {
            let expected = if i % 2 == 0 { Sender::User } else { Sender::Assistant };
            assert_eq!(turn.sender, expected);
        }
        assert_eq!(conversation[1].text, "a1");
        assert_eq!(conversation[3].text, RETRY_EXHAUSTED_MESSAGE);
        assert_eq!(conversation[5].text, "a3");
    }

    #[tokio::test]
    async fn test_subscribe_streams_turns() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_text("streamed");
        let manager = manager(&mock);
        let id = manager.create().await.id;

        let (initial, mut rx) = manager.subscribe(&id).await.unwrap();
        assert_eq!(initial.turns.len(), 1);

        manager.dispatch(&id, Event::submit("hi")).await.unwrap();

        let mut turns = Vec::new();
        while turns.len() < 2 {
            if let SseEvent::Turn { turn } = rx.recv().await.unwrap() {
                turns.push(turn);
            }
        }
        assert_eq!(turns[0].text, "hi");
        assert_eq!(turns[1].text, "streamed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ending_session_lets_delivery_settle() {
        let mock = Arc::new(MockLlmService::new("mock").with_delay(Duration::from_secs(2)));
        mock.queue_error(LlmError::network("reset"));
        mock.queue_text("late");
        let manager = manager(&mock);
        let id = manager.create().await.id;
        let (_, mut rx) = manager.subscribe(&id).await.unwrap();

        manager.dispatch(&id, Event::submit("hi")).await.unwrap();
        assert!(manager.end(&id).await);
        assert!(manager.view(&id).await.is_none());

        // The stream keeps delivering until the runtime stops, then closes
        let mut texts = Vec::new();
        loop {
            match rx.recv().await {
                Ok(SseEvent::Turn { turn }) => texts.push(turn.text),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Closed) => break,
                Err(e) => panic!("unexpected receive error: {e}"),
            }
        }
        assert_eq!(texts, vec!["hi".to_string(), "late".to_string()]);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_are_evicted() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let manager = manager(&mock);
        let stale = manager.create().await.id;
        let fresh = manager.create().await.id;
        let streaming = manager.create().await.id;
        let (_, _stream_rx) = manager.subscribe(&streaming).await.unwrap();

        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        manager.view(&fresh).await.unwrap();
        tokio::time::advance(Duration::from_secs(15 * 60)).await;

        let ended = manager.cleanup_idle_sessions(Duration::from_secs(30 * 60)).await;

        assert_eq!(ended, 1);
        assert!(manager.view(&stale).await.is_none());
        assert!(manager.view(&fresh).await.is_some());
        assert!(manager.view(&streaming).await.is_some());
        assert_eq!(manager.session_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_ends_idle_sessions() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let manager = Arc::new(manager(&mock));
        manager.start_cleanup_task(Duration::from_secs(60), Duration::from_secs(10));
        let id = manager.create().await.id;

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(manager.session_count().await, 1);

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(manager.session_count().await, 0);
        assert!(matches!(
            manager.dispatch(&id, Event::Open).await,
            Err(DispatchError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_and_ended_sessions() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let manager = manager(&mock);

        let err = manager.dispatch("missing", Event::Open).await.unwrap_err();
        assert!(matches!(err, DispatchError::NotFound(_)));

        let id = manager.create().await.id;
        assert!(manager.end(&id).await);
        assert!(!manager.end(&id).await);
        assert!(manager.view(&id).await.is_none());
        assert_eq!(manager.session_count().await, 0);
    }
}
