use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chatify_core::error::{ProviderError, StorageError};
use chatify_core::inference::{ChatRequest, InferenceProxy};
use chatify_core::message::{NewMessage, Role, User};
use chatify_core::store::ConversationStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::decoder::decode_stream;
use crate::event::*;
use crate::renderer::{RenderUpdate, ThrottledRenderer};
use crate::transcript::{PlaceholderId, Transcript, TranscriptEntry};

const DEFAULT_THROTTLE: Duration = Duration::from_millis(100);

/// Shared collaborators, created once at startup and handed to every view.
#[derive(Clone)]
pub struct ChatContext {
    pub proxy: Arc<dyn InferenceProxy>,
    pub store: Arc<dyn ConversationStore>,
    pub user: Option<User>,
    pub throttle: Duration,
}

impl ChatContext {
    pub fn new(proxy: Arc<dyn InferenceProxy>, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            proxy,
            store,
            user: None,
            throttle: DEFAULT_THROTTLE,
        }
    }

    pub fn with_user(mut self, user: Option<User>) -> Self {
        self.user = user;
        self
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    pub phase: SendPhase,
    pub entries: Vec<TranscriptEntry>,
    /// In-progress answer, not yet part of `entries`
    pub live_text: Option<String>,
    pub tokens_per_second: Option<f64>,
}

struct ViewState {
    phase: SendPhase,
    transcript: Transcript,
    live: Option<RenderUpdate>,
    loading: bool,
    sends_started: u64,
    cancel: Option<CancellationToken>,
}

fn lock_state(state: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One open conversation: its transcript and at most one send in flight.
///
/// Dropping the view aborts a send that is still streaming.
pub struct ChatView {
    ctx: ChatContext,
    conversation_id: String,
    state: Arc<Mutex<ViewState>>,
}

impl ChatView {
    pub fn new(ctx: ChatContext, conversation_id: String) -> Self {
        Self {
            ctx,
            conversation_id,
            state: Arc::new(Mutex::new(ViewState {
                phase: SendPhase::Idle,
                transcript: Transcript::new(),
                live: None,
                loading: false,
                sends_started: 0,
                cancel: None,
            })),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn phase(&self) -> SendPhase {
        lock_state(&self.state).phase
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let state = lock_state(&self.state);
        ViewSnapshot {
            phase: state.phase,
            entries: state.transcript.entries().to_vec(),
            live_text: state.live.as_ref().map(|u| u.text.clone()),
            tokens_per_second: state.live.as_ref().and_then(|u| u.tokens_per_second),
        }
    }

    /// Replaces the transcript with the stored history.
    ///
    /// Skipped while another load is running or a send is in progress, and
    /// discarded if a send started before the history arrived, so provisional
    /// entries are never overwritten.
    pub async fn load(&self) -> Result<LoadOutcome, StorageError> {
        let generation = {
            let mut state = lock_state(&self.state);
            if state.loading || state.phase.is_active() {
                tracing::debug!(conversation = %self.conversation_id, "load skipped");
                return Ok(LoadOutcome::Skipped);
            }
            state.loading = true;
            state.sends_started
        };
        let _loading = LoadingFlag(Arc::clone(&self.state));

        let messages = self.ctx.store.load_messages(&self.conversation_id).await?;

        let mut state = lock_state(&self.state);
        if state.sends_started != generation || state.phase.is_active() {
            tracing::debug!(conversation = %self.conversation_id, "stale load discarded");
            return Ok(LoadOutcome::Skipped);
        }
        let count = messages.len();
        state.transcript.replace_with(messages);
        Ok(LoadOutcome::Loaded(count))
    }

    /// Starts sending `input`.
    ///
    /// The user entry is on the transcript by the time this returns. The rest
    /// of the exchange runs in a background task reporting through the handle.
    pub fn send(&self, input: &str) -> Result<SendHandle, SendRejected> {
        if input.trim().is_empty() {
            return Err(SendRejected::EmptyInput);
        }
        let user = self.ctx.user.clone().ok_or(SendRejected::NoUser)?;
        let cancel = CancellationToken::new();

        let user_placeholder = {
            let mut state = lock_state(&self.state);
            if state.phase.is_active() {
                return Err(SendRejected::InFlight);
            }
            state.phase = SendPhase::Submitted;
            state.live = None;
            state.sends_started += 1;
            state.cancel = Some(cancel.clone());
            state.transcript.push_provisional(Role::User, input.to_string())
        };

        let (tx, rx) = mpsc::channel(256);
        let job = SendJob {
            ctx: self.ctx.clone(),
            conversation_id: self.conversation_id.clone(),
            user,
            text: input.to_string(),
            user_placeholder,
            state: Arc::clone(&self.state),
            tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(job.run());

        Ok(SendHandle {
            events: rx,
            cancel,
            task,
        })
    }

    /// Aborts the in-flight request. Has no effect once the answer is being
    /// stored. Returns whether anything was cancelled.
    pub fn cancel(&self) -> bool {
        let state = lock_state(&self.state);
        match (&state.phase, &state.cancel) {
            (SendPhase::Submitted | SendPhase::Streaming, Some(token)) => {
                token.cancel();
                true
            }
            _ => false,
        }
    }
}

impl Drop for ChatView {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct LoadingFlag(Arc<Mutex<ViewState>>);

impl Drop for LoadingFlag {
    fn drop(&mut self) {
        lock_state(&self.0).loading = false;
    }
}

/// Handle to a running send.
pub struct SendHandle {
    pub events: mpsc::Receiver<ChatEvent>,
    cancel: CancellationToken,
    task: JoinHandle<SendOutcome>,
}

impl SendHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the send to end. Undelivered events are dropped.
    pub async fn outcome(self) -> SendOutcome {
        drop(self.events);
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => SendOutcome::Failed(ProviderError::Stream(format!("send task ended: {e}"))),
        }
    }
}

struct SendJob {
    ctx: ChatContext,
    conversation_id: String,
    user: User,
    text: String,
    user_placeholder: PlaceholderId,
    state: Arc<Mutex<ViewState>>,
    tx: mpsc::Sender<ChatEvent>,
    cancel: CancellationToken,
}

impl SendJob {
    async fn run(self) -> SendOutcome {
        let outcome = self.drive().await;

        // Release the view before anyone hears how the send ended
        {
            let mut state = lock_state(&self.state);
            state.phase = SendPhase::Idle;
            state.live = None;
            state.cancel = None;
        }

        let terminal = match &outcome {
            SendOutcome::Reconciled { user, assistant, .. } => {
                tracing::info!(
                    conversation = %self.conversation_id,
                    user_message = %user.id,
                    assistant_message = %assistant.id,
                    "exchange stored"
                );
                self.emit(ChatEvent::Reconciled {
                    user_message_id: user.id.clone(),
                    assistant_message_id: assistant.id.clone(),
                })
                .await;
                Some(SendPhase::Reconciled)
            }
            SendOutcome::Failed(e) => {
                tracing::warn!(conversation = %self.conversation_id, error = %e, "send failed");
                self.emit(ChatEvent::Failed {
                    error: e.to_string(),
                })
                .await;
                Some(SendPhase::Failed)
            }
            SendOutcome::PersistFailed(e) => {
                tracing::error!(
                    conversation = %self.conversation_id,
                    error = %e,
                    "answer shown but not stored"
                );
                self.emit(ChatEvent::PersistFailed {
                    error: e.to_string(),
                })
                .await;
                Some(SendPhase::Failed)
            }
            SendOutcome::Cancelled => {
                tracing::debug!(conversation = %self.conversation_id, "send cancelled");
                self.emit(ChatEvent::Cancelled).await;
                None
            }
        };

        if let Some(phase) = terminal {
            self.emit(ChatEvent::Phase(phase)).await;
        }
        self.emit(ChatEvent::Phase(SendPhase::Idle)).await;

        outcome
    }

    async fn drive(&self) -> SendOutcome {
        self.emit(ChatEvent::Phase(SendPhase::Submitted)).await;

        let request = ChatRequest {
            message: self.text.clone(),
            user_id: self.user.id.clone(),
            conversation_id: self.conversation_id.clone(),
        };
        self.enter(SendPhase::Streaming).await;

        let started_at = Instant::now();
        let body = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return SendOutcome::Cancelled,
            result = self.ctx.proxy.send(&request) => match result {
                Ok(body) => body,
                Err(e) => return SendOutcome::Failed(e),
            },
        };

        let mut fragments = decode_stream(body);
        let mut renderer = ThrottledRenderer::new(self.ctx.throttle, started_at);
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return SendOutcome::Cancelled,
                next = fragments.next() => next,
            };
            match next {
                Some(Ok(fragment)) => {
                    if let Some(update) = renderer.push(&fragment, Instant::now()) {
                        self.show(update).await;
                    }
                }
                Some(Err(e)) => return SendOutcome::Failed(e),
                None => break,
            }
        }
        drop(fragments);

        let last = renderer.finish(Instant::now());
        self.show(last.clone()).await;

        let assistant_placeholder = {
            let mut state = lock_state(&self.state);
            if self.cancel.is_cancelled() {
                return SendOutcome::Cancelled;
            }
            state.phase = SendPhase::Finalizing;
            state.live = None;
            // Persistence runs to completion once started
            state.cancel = None;
            state
                .transcript
                .push_provisional(Role::Assistant, last.text.clone())
        };
        self.emit(ChatEvent::Phase(SendPhase::Finalizing)).await;

        let batch = [
            NewMessage::user(self.text.clone()),
            NewMessage::assistant(last.text.clone()),
        ];
        let stored = match self
            .ctx
            .store
            .append_messages(&self.conversation_id, &self.user.id, &batch)
            .await
        {
            Ok(rows) if rows.len() == batch.len() => rows,
            Ok(rows) => {
                return SendOutcome::PersistFailed(StorageError::PartialWrite {
                    expected: batch.len(),
                    written: rows.len(),
                })
            }
            Err(e) => return SendOutcome::PersistFailed(e),
        };

        if let Err(e) = self.ctx.store.touch_conversation(&self.conversation_id).await {
            tracing::warn!(conversation = %self.conversation_id, error = %e, "failed to update conversation timestamp");
        }

        let pending = [
            (self.user_placeholder, Role::User),
            (assistant_placeholder, Role::Assistant),
        ];
        let reconciled = lock_state(&self.state)
            .transcript
            .reconcile(&pending, &stored);
        match reconciled {
            Ok(n) if n < pending.len() => {
                tracing::debug!(updated = n, "some provisional entries were already replaced")
            }
            Ok(_) => {}
            Err(e) => return SendOutcome::PersistFailed(StorageError::Mismatch(e.to_string())),
        }

        let mut rows = stored.into_iter();
        match (rows.next(), rows.next()) {
            (Some(user), Some(assistant)) => SendOutcome::Reconciled {
                user,
                assistant,
                tokens_per_second: last.tokens_per_second,
            },
            _ => SendOutcome::PersistFailed(StorageError::PartialWrite {
                expected: batch.len(),
                written: 0,
            }),
        }
    }

    async fn enter(&self, phase: SendPhase) {
        lock_state(&self.state).phase = phase;
        self.emit(ChatEvent::Phase(phase)).await;
    }

    async fn show(&self, update: RenderUpdate) {
        lock_state(&self.state).live = Some(update.clone());
        self.emit(ChatEvent::Render(update)).await;
    }

    async fn emit(&self, event: ChatEvent) {
        let _ = self.tx.send(event).await;
    }
}
