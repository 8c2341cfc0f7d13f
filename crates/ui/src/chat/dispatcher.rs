use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use snafu::{ResultExt, Snafu};
use thoughtline_llm::{BackendError, ChatBackend, ChatRequest};
use thoughtline_protocol::{EventPipeline, StreamEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::chat::events::{ExchangeControl, ViewChange, ViewEvent};
use crate::chat::indicator::TypingIndicator;
use crate::chat::message::{ConversationId, ExchangeId, ExchangeTarget};
use crate::chat::render::RenderState;
use crate::chat::scroll_manager::AutoScroll;
use crate::chat::view::ChatView;

/// Default bound on silence between chunks; spans a whole server-side reasoning round,
/// which makes several sequential model calls before its first frame.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Longest wait for the next chunk before the exchange fails.
    pub idle_timeout: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// How an exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Stream ended or failed; the state is in phase `done` or `failed`.
    Finished(RenderState),
    /// A newer exchange claimed the same conversation slot.
    Superseded(RenderState),
}

impl ExchangeOutcome {
    pub fn state(&self) -> &RenderState {
        match self {
            Self::Finished(state) | Self::Superseded(state) => state,
        }
    }

    pub fn into_state(self) -> RenderState {
        match self {
            Self::Finished(state) | Self::Superseded(state) => state,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded(_))
    }
}

/// Reasons the dispatcher moves an exchange to `failed`.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ExchangeFailure {
    #[snafu(display("{source}"))]
    Transport {
        stage: &'static str,
        source: BackendError,
    },
    #[snafu(display("no response received for {seconds} seconds"))]
    IdleTimeout { stage: &'static str, seconds: u64 },
}

/// Drives streaming exchanges from request to terminal [`RenderState`].
#[derive(Clone)]
pub struct SessionDispatcher {
    backend: Arc<dyn ChatBackend>,
    view: Arc<dyn ChatView>,
    slots: Arc<SlotRegistry>,
    next_exchange_id: Arc<AtomicU64>,
    options: DispatchOptions,
}

impl SessionDispatcher {
    pub fn new(backend: Arc<dyn ChatBackend>, view: Arc<dyn ChatView>) -> Self {
        Self::with_options(backend, view, DispatchOptions::default())
    }

    pub fn with_options(
        backend: Arc<dyn ChatBackend>,
        view: Arc<dyn ChatView>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            backend,
            view,
            slots: Arc::new(SlotRegistry::default()),
            next_exchange_id: Arc::new(AtomicU64::new(1)),
            options,
        }
    }

    /// Whether an exchange is currently streaming into the conversation's slot.
    pub fn is_live(&self, conversation_id: ConversationId) -> bool {
        self.slots.is_live(conversation_id)
    }

    /// Flips reasoning visibility of the live exchange in a slot.
    ///
    /// Returns `false` when nothing is streaming there.
    pub fn toggle_reasoning(&self, conversation_id: ConversationId) -> bool {
        self.slots
            .send_control(conversation_id, ExchangeControl::ToggleReasoning)
    }

    /// Runs one exchange to its end.
    ///
    /// Any exchange still live in the same conversation slot is cancelled and fully torn
    /// down before this one starts.
    pub async fn run(&self, request: ChatRequest) -> ExchangeOutcome {
        let exchange_id = ExchangeId::new(self.next_exchange_id.fetch_add(1, Ordering::Relaxed));
        let target = ExchangeTarget::new(ConversationId::for_chat(request.chat_id), exchange_id);

        let claim = self.slots.claim(target);
        let _lease = claim.lease;
        if let Some(previous_released) = claim.previous_released {
            let _ = previous_released.await;
        }
        let mut cancel_rx = claim.cancel_rx;
        let mut control_rx = claim.control_rx;

        let auto_scroll = AutoScroll::capture(self.view.viewport());
        let _indicator = TypingIndicator::start(self.view.clone(), target);
        let mut exchange = Exchange {
            target,
            view: self.view.clone(),
            slots: self.slots.clone(),
            pipeline: EventPipeline::new(),
            state: RenderState::new(target, auto_scroll.enabled()),
            auto_scroll,
        };

        tracing::info!(
            target = ?target,
            backend = %self.backend.name(),
            model = %request.model,
            auto_scroll = auto_scroll.enabled(),
            "exchange started"
        );

        let idle_timeout = self.options.idle_timeout;
        let mut deadline = Instant::now() + idle_timeout;

        let opened = tokio::select! {
            biased;
            _ = &mut cancel_rx => return exchange.superseded(),
            opened = tokio::time::timeout_at(deadline, self.backend.open_stream(request)) => opened,
        };
        let opened = match opened {
            Ok(result) => result.context(TransportSnafu {
                stage: "open-stream",
            }),
            Err(_) => Err(idle_timeout_failure("open-stream", idle_timeout)),
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(failure) => return exchange.fail(failure),
        };

        loop {
            tokio::select! {
                biased;
                _ = &mut cancel_rx => return exchange.superseded(),
                Some(control) = control_rx.recv() => exchange.control(control),
                next = tokio::time::timeout_at(deadline, stream.next()) => match next {
                    Ok(Some(Ok(chunk))) => {
                        deadline = Instant::now() + idle_timeout;
                        exchange.ingest(&chunk);
                    }
                    Ok(Some(Err(source))) => {
                        return exchange.fail(ExchangeFailure::Transport {
                            stage: "read-chunk",
                            source,
                        });
                    }
                    Ok(None) => return exchange.finish(),
                    Err(_) => {
                        return exchange.fail(idle_timeout_failure("read-chunk", idle_timeout));
                    }
                },
            }
        }
    }
}

fn idle_timeout_failure(stage: &'static str, idle_timeout: Duration) -> ExchangeFailure {
    IdleTimeoutSnafu {
        stage,
        seconds: idle_timeout.as_secs(),
    }
    .build()
}

/// State owned by one running exchange.
struct Exchange {
    target: ExchangeTarget,
    view: Arc<dyn ChatView>,
    slots: Arc<SlotRegistry>,
    pipeline: EventPipeline,
    state: RenderState,
    auto_scroll: AutoScroll,
}

impl Exchange {
    fn ingest(&mut self, chunk: &[u8]) {
        for event in self.pipeline.push(chunk) {
            self.apply(&event);
        }
    }

    fn apply(&mut self, event: &StreamEvent) {
        let changes = self.state.apply(event);
        self.publish(changes);

        if self.auto_scroll.should_scroll(event) && self.slots.is_current(self.target) {
            self.view.scroll_to_bottom(self.target);
        }
    }

    fn control(&mut self, control: ExchangeControl) {
        match control {
            ExchangeControl::ToggleReasoning => {
                let changes = self.state.toggle_reasoning();
                self.publish(changes);
            }
        }
    }

    fn finish(mut self) -> ExchangeOutcome {
        for event in self.pipeline.finish() {
            self.apply(&event);
        }

        let changes = self.state.complete();
        self.publish(changes);
        tracing::info!(
            target = ?self.target,
            chain_steps = self.state.chain_log().len(),
            diagnostics = self.state.diagnostics().len(),
            "exchange completed"
        );
        ExchangeOutcome::Finished(self.state)
    }

    fn fail(mut self, failure: ExchangeFailure) -> ExchangeOutcome {
        match &failure {
            ExchangeFailure::Transport { source, .. } if source.is_rejection() => {
                tracing::warn!(target = ?self.target, error = %failure, "exchange rejected by backend");
            }
            _ => tracing::error!(target = ?self.target, error = %failure, "exchange failed"),
        }
        let changes = self.state.fail(failure.to_string());
        self.publish(changes);
        ExchangeOutcome::Finished(self.state)
    }

    fn superseded(self) -> ExchangeOutcome {
        tracing::debug!(
            target = ?self.target,
            phase = %self.state.phase(),
            "exchange superseded"
        );
        ExchangeOutcome::Superseded(self.state)
    }

    fn publish(&self, changes: Vec<ViewChange>) {
        if changes.is_empty() {
            return;
        }

        if !self.slots.is_current(self.target) {
            tracing::debug!(target = ?self.target, "dropping view update for stale exchange");
            return;
        }

        for change in changes {
            self.view.render(ViewEvent::new(change, self.state.clone()));
        }
    }
}

/// Live exchange per conversation slot.
#[derive(Default)]
struct SlotRegistry {
    live: Mutex<HashMap<ConversationId, LiveExchange>>,
}

struct LiveExchange {
    exchange_id: ExchangeId,
    cancel_tx: Option<oneshot::Sender<()>>,
    control_tx: mpsc::UnboundedSender<ExchangeControl>,
    released_rx: oneshot::Receiver<()>,
}

impl LiveExchange {
    fn cancel(&mut self) -> bool {
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

struct SlotClaim {
    lease: SlotLease,
    cancel_rx: oneshot::Receiver<()>,
    control_rx: mpsc::UnboundedReceiver<ExchangeControl>,
    /// Resolves once the superseded exchange has torn down.
    previous_released: Option<oneshot::Receiver<()>>,
}

impl SlotRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<ConversationId, LiveExchange>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn claim(self: &Arc<Self>, target: ExchangeTarget) -> SlotClaim {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (released_tx, released_rx) = oneshot::channel();

        let previous = self.lock().insert(
            target.conversation_id,
            LiveExchange {
                exchange_id: target.exchange_id,
                cancel_tx: Some(cancel_tx),
                control_tx,
                released_rx,
            },
        );

        let previous_released = previous.map(|mut previous| {
            let signalled = previous.cancel();
            tracing::debug!(
                target = ?target,
                superseded = previous.exchange_id.0,
                signalled,
                "cancelling live exchange in slot"
            );
            previous.released_rx
        });

        SlotClaim {
            lease: SlotLease {
                slots: self.clone(),
                target,
                _released_tx: released_tx,
            },
            cancel_rx,
            control_rx,
            previous_released,
        }
    }

    fn is_current(&self, target: ExchangeTarget) -> bool {
        self.lock()
            .get(&target.conversation_id)
            .is_some_and(|live| live.exchange_id == target.exchange_id)
    }

    fn is_live(&self, conversation_id: ConversationId) -> bool {
        self.lock().contains_key(&conversation_id)
    }

    fn send_control(&self, conversation_id: ConversationId, control: ExchangeControl) -> bool {
        self.lock()
            .get(&conversation_id)
            .is_some_and(|live| live.control_tx.send(control).is_ok())
    }

    fn release(&self, target: ExchangeTarget) {
        let mut live = self.lock();
        if live
            .get(&target.conversation_id)
            .is_some_and(|entry| entry.exchange_id == target.exchange_id)
        {
            live.remove(&target.conversation_id);
        }
    }
}

/// Frees the slot when the exchange ends, however it ends.
struct SlotLease {
    slots: Arc<SlotRegistry>,
    target: ExchangeTarget,
    /// Dropped last; wakes an exchange waiting to take over the slot.
    _released_tx: oneshot::Sender<()>,
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.slots.release(self.target);
    }
}
