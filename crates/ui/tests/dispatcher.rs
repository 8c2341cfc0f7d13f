//! End-to-end exchange tests against a scripted backend and a recording view.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::channel::mpsc;
use futures::stream;
use thoughtline::chat::{
    ChainPanel, ChatView, ConversationId, DispatchOptions, ExchangeId, ExchangeOutcome,
    ExchangeTarget, Phase, SessionDispatcher, ViewChange, ViewEvent, Viewport,
};
use thoughtline_llm::{
    BackendError, BackendResult, BoxFuture, ByteStream, ChatBackend, ChatRequest,
};
use thoughtline_protocol::ChainRole;

enum Script {
    Items(Vec<BackendResult<Bytes>>),
    Reject(BackendError),
    Channel(mpsc::UnboundedReceiver<BackendResult<Bytes>>),
}

impl Script {
    fn chunks(chunks: &[&str]) -> Self {
        Self::Items(
            chunks
                .iter()
                .map(|chunk| Ok(Bytes::copy_from_slice(chunk.as_bytes())))
                .collect(),
        )
    }
}

#[derive(Default)]
struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    fn new(scripts: impl IntoIterator<Item = Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            requests: Mutex::default(),
        })
    }
}

impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn open_stream<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, BackendResult<ByteStream>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request);
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .expect("no script left for request");

            match script {
                Script::Items(items) => Ok(Box::pin(stream::iter(items)) as ByteStream),
                Script::Reject(error) => Err(error),
                Script::Channel(rx) => Ok(Box::pin(rx) as ByteStream),
            }
        })
    }
}

#[derive(Debug, Clone)]
enum Record {
    Render(ViewEvent),
    Scroll(ExchangeTarget),
    Typing(ExchangeTarget, bool),
}

#[derive(Default)]
struct RecordingView {
    viewport: Mutex<Viewport>,
    records: Mutex<Vec<Record>>,
}

impl RecordingView {
    fn scrolled_up() -> Arc<Self> {
        let view = Self::default();
        *view.viewport.lock().unwrap() = Viewport::new(100.0, 800.0);
        Arc::new(view)
    }

    fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    fn renders(&self) -> Vec<ViewEvent> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                Record::Render(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    fn renders_for(&self, exchange: u64) -> Vec<ViewEvent> {
        self.renders()
            .into_iter()
            .filter(|event| event.target().exchange_id == ExchangeId::new(exchange))
            .collect()
    }

    fn scroll_count(&self) -> usize {
        self.records()
            .iter()
            .filter(|record| matches!(record, Record::Scroll(_)))
            .count()
    }

    fn typing(&self) -> Vec<(u64, bool)> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                Record::Typing(target, active) => Some((target.exchange_id.0, active)),
                _ => None,
            })
            .collect()
    }
}

impl ChatView for RecordingView {
    fn viewport(&self) -> Viewport {
        *self.viewport.lock().unwrap()
    }

    fn render(&self, event: ViewEvent) {
        self.records.lock().unwrap().push(Record::Render(event));
    }

    fn scroll_to_bottom(&self, target: ExchangeTarget) {
        self.records.lock().unwrap().push(Record::Scroll(target));
    }

    fn set_typing(&self, target: ExchangeTarget, active: bool) {
        self.records
            .lock()
            .unwrap()
            .push(Record::Typing(target, active));
    }
}

fn finished(outcome: ExchangeOutcome) -> thoughtline::chat::RenderState {
    match outcome {
        ExchangeOutcome::Finished(state) => state,
        ExchangeOutcome::Superseded(state) => panic!("unexpected supersession: {state:?}"),
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

fn frame(chunk: &str) -> BackendResult<Bytes> {
    Ok(Bytes::copy_from_slice(chunk.as_bytes()))
}

#[tokio::test]
async fn chain_then_split_final_frame() {
    let backend = ScriptedBackend::new([Script::chunks(&[
        "data: {\"type\":\"chain\",\"content\":\"Critic: too vague\"}\n",
        "data: {\"typ",
        "e\":\"final\",\"content\":\"Done.\"}\n",
    ])]);
    let view = Arc::new(RecordingView::default());
    let dispatcher = SessionDispatcher::new(backend.clone(), view.clone());

    let state = finished(
        dispatcher
            .run(ChatRequest::new("Explain lifetimes", "granite3-dense:2b"))
            .await,
    );

    assert_eq!(state.phase(), Phase::Done);
    assert_eq!(state.chain_log().len(), 1);
    assert_eq!(state.chain_log()[0].role, ChainRole::Critic);
    assert_eq!(state.final_text(), "Done.");
    assert!(state.failure().is_none());
    assert_eq!(
        state.chain_panel(),
        ChainPanel::Collapsed {
            summary: "Reasoning (1 step)".to_string()
        }
    );

    let renders = view.renders();
    assert!(renders.iter().any(|event| {
        event.change == ViewChange::FinalTextChanged
            && event.snapshot.phase() == Phase::StreamingFinal
            && event.snapshot.final_text() == "Done."
    }));
    assert_eq!(
        renders.last().map(|event| event.snapshot.phase()),
        Some(Phase::Done)
    );
    assert_eq!(view.scroll_count(), 2);
    assert_eq!(view.typing(), vec![(1, true), (1, false)]);
    assert_eq!(backend.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn token_frames_never_enter_chain_phase() {
    let backend = ScriptedBackend::new([Script::chunks(&[
        "data: {\"response\":\"Hel",
        "lo\"}\n",
    ])]);
    let view = Arc::new(RecordingView::default());
    let dispatcher = SessionDispatcher::new(backend, view.clone());

    let state = finished(dispatcher.run(ChatRequest::new("hi", "llama2")).await);

    assert_eq!(state.final_text(), "Hello");
    assert_eq!(state.phase(), Phase::Done);
    assert!(state.chain_log().is_empty());

    let renders = view.renders();
    assert!(
        renders
            .iter()
            .all(|event| event.snapshot.phase() != Phase::StreamingChain)
    );
    let last_streaming = renders
        .iter()
        .rev()
        .find(|event| event.snapshot.phase() == Phase::StreamingFinal)
        .expect("streaming render");
    assert_eq!(last_streaming.snapshot.final_text(), "Hello");
}

#[tokio::test]
async fn scrolled_up_viewport_is_left_alone() {
    let backend = ScriptedBackend::new([Script::chunks(&[
        "data: {\"type\":\"chain\",\"content\":\"Critic: a\"}\n",
        "data: {\"type\":\"final\",\"content\":\"b\"}\n",
    ])]);
    let view = RecordingView::scrolled_up();
    let dispatcher = SessionDispatcher::new(backend, view.clone());

    let state = finished(dispatcher.run(ChatRequest::new("hi", "llama2")).await);

    assert!(!state.auto_scroll_enabled());
    assert_eq!(view.scroll_count(), 0);
    assert_eq!(state.final_text(), "b");
}

#[tokio::test]
async fn rejected_request_fails_with_error_text() {
    let backend = ScriptedBackend::new([Script::Reject(BackendError::Status {
        stage: "send-request",
        status: 500,
        body: "boom".to_string(),
    })]);
    let view = Arc::new(RecordingView::default());
    let dispatcher = SessionDispatcher::new(backend, view.clone());

    let state = finished(dispatcher.run(ChatRequest::new("hi", "llama2")).await);

    assert_eq!(state.phase(), Phase::Failed);
    assert_eq!(state.final_text(), "Error: backend returned status 500: boom");
    assert_eq!(state.failure(), Some("backend returned status 500: boom"));
    assert_eq!(view.typing(), vec![(1, true), (1, false)]);
}

#[tokio::test]
async fn transport_drop_preserves_streamed_answer() {
    let backend = ScriptedBackend::new([Script::Items(vec![
        frame("data: {\"type\":\"chain\",\"content\":\"Critic: a\"}\n"),
        frame("data: {\"type\":\"final\",\"content\":\"Done.\"}\n"),
        Err(BackendError::Transport {
            stage: "read-chunk",
            message: "connection reset".to_string(),
        }),
    ])]);
    let view = Arc::new(RecordingView::default());
    let dispatcher = SessionDispatcher::new(backend, view.clone());

    let state = finished(dispatcher.run(ChatRequest::new("hi", "llama2")).await);

    assert_eq!(state.phase(), Phase::Failed);
    assert_eq!(state.final_text(), "Done.\n\n[response interrupted]");
    assert_eq!(state.chain_log().len(), 1);
    assert!(
        state
            .failure()
            .is_some_and(|failure| failure.contains("connection reset"))
    );
    assert_eq!(view.typing(), vec![(1, true), (1, false)]);
}

#[tokio::test(start_paused = true)]
async fn silent_stream_times_out() {
    let (tx, rx) = mpsc::unbounded();
    tx.unbounded_send(frame("data: {\"type\":\"chain\",\"content\":\"Critic: a\"}\n"))
        .expect("channel open");

    let backend = ScriptedBackend::new([Script::Channel(rx)]);
    let view = Arc::new(RecordingView::default());
    let dispatcher = SessionDispatcher::with_options(
        backend,
        view.clone(),
        DispatchOptions {
            idle_timeout: Duration::from_secs(5),
        },
    );

    let state = finished(dispatcher.run(ChatRequest::new("hi", "llama2")).await);

    assert_eq!(state.phase(), Phase::Failed);
    assert_eq!(state.chain_log().len(), 1);
    assert_eq!(
        state.final_text(),
        "Error: no response received for 5 seconds"
    );
    assert_eq!(view.typing(), vec![(1, true), (1, false)]);
    drop(tx);
}

#[tokio::test(start_paused = true)]
async fn slow_first_reasoning_round_still_completes() {
    let (tx, rx) = mpsc::unbounded();
    let backend = ScriptedBackend::new([Script::Channel(rx)]);
    let view = Arc::new(RecordingView::default());
    let dispatcher = SessionDispatcher::new(backend, view.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(120)).await;
        let _ = tx.unbounded_send(frame(
            "data: {\"type\":\"chain\",\"content\":\"Critic: a\"}\n",
        ));
        tokio::time::sleep(Duration::from_secs(45)).await;
        let _ = tx.unbounded_send(frame("data: {\"type\":\"final\",\"content\":\"Done.\"}\n"));
    });

    let state = finished(dispatcher.run(ChatRequest::new("hi", "llama2")).await);

    assert_eq!(state.phase(), Phase::Done);
    assert_eq!(state.final_text(), "Done.");
    assert!(state.failure().is_none());
}

#[tokio::test]
async fn new_exchange_supersedes_live_one_in_same_slot() {
    let (tx_a, rx_a) = mpsc::unbounded();
    let backend = ScriptedBackend::new([
        Script::Channel(rx_a),
        Script::chunks(&["data: {\"type\":\"final\",\"content\":\"Second answer\"}\n"]),
    ]);
    let view = Arc::new(RecordingView::default());
    let dispatcher = SessionDispatcher::new(backend, view.clone());

    let first = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move {
            dispatcher
                .run(ChatRequest::new("first", "llama2").with_chat_id(5))
                .await
        }
    });

    tx_a.unbounded_send(frame("data: {\"type\":\"chain\",\"content\":\"Critic: a\"}\n"))
        .expect("channel open");
    wait_until(|| !view.renders_for(1).is_empty()).await;
    let first_renders = view.renders_for(1).len();

    let second = finished(
        dispatcher
            .run(ChatRequest::new("second", "llama2").with_chat_id(5))
            .await,
    );
    assert_eq!(second.final_text(), "Second answer");
    assert_eq!(second.phase(), Phase::Done);

    let _ = tx_a.unbounded_send(frame("data: {\"type\":\"final\",\"content\":\"late\"}\n"));
    let first = first.await.expect("first exchange task");
    assert!(first.is_superseded());
    let first = first.into_state();
    assert_eq!(first.phase(), Phase::StreamingChain);
    assert!(first.failure().is_none());
    assert_eq!(first.final_text(), "");

    assert!(tx_a.is_closed());
    assert_eq!(view.renders_for(1).len(), first_renders);
    assert_eq!(
        view.typing(),
        vec![(1, true), (1, false), (2, true), (2, false)]
    );
    assert!(!dispatcher.is_live(ConversationId::new(5)));
}

#[tokio::test]
async fn separate_conversations_stream_independently() {
    let backend = ScriptedBackend::new([
        Script::chunks(&["data: {\"type\":\"final\",\"content\":\"one\"}\n"]),
        Script::chunks(&["data: {\"type\":\"final\",\"content\":\"two\"}\n"]),
    ]);
    let view = Arc::new(RecordingView::default());
    let dispatcher = SessionDispatcher::new(backend, view.clone());

    let (first, second) = tokio::join!(
        dispatcher.run(ChatRequest::new("a", "llama2").with_chat_id(1)),
        dispatcher.run(ChatRequest::new("b", "llama2").with_chat_id(2)),
    );

    assert!(!first.is_superseded());
    assert!(!second.is_superseded());
    assert_eq!(first.state().phase(), Phase::Done);
    assert_eq!(second.state().phase(), Phase::Done);
}

#[tokio::test]
async fn reasoning_toggle_reaches_live_exchange() {
    let (tx, rx) = mpsc::unbounded();
    let backend = ScriptedBackend::new([Script::Channel(rx)]);
    let view = Arc::new(RecordingView::default());
    let dispatcher = SessionDispatcher::new(backend, view.clone());
    let conversation = ConversationId::new(3);

    assert!(!dispatcher.toggle_reasoning(conversation));

    let exchange = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move {
            dispatcher
                .run(ChatRequest::new("hi", "llama2").with_chat_id(3))
                .await
        }
    });

    tx.unbounded_send(frame("data: {\"type\":\"chain\",\"content\":\"Critic: a\"}\n"))
        .expect("channel open");
    wait_until(|| !view.renders().is_empty()).await;
    assert!(dispatcher.is_live(conversation));

    assert!(dispatcher.toggle_reasoning(conversation));
    wait_until(|| {
        view.renders()
            .iter()
            .any(|event| event.change == ViewChange::ReasoningVisibilityChanged)
    })
    .await;
    let toggled = view
        .renders()
        .into_iter()
        .find(|event| event.change == ViewChange::ReasoningVisibilityChanged)
        .expect("toggle render");
    assert!(!toggled.snapshot.reasoning_visible());
    assert_eq!(toggled.snapshot.phase(), Phase::StreamingChain);

    tx.unbounded_send(frame("data: {\"type\":\"final\",\"content\":\"Done.\"}\n"))
        .expect("channel open");
    drop(tx);

    let state = finished(exchange.await.expect("exchange task"));
    assert_eq!(state.phase(), Phase::Done);
    assert!(!state.reasoning_visible());
    assert!(!dispatcher.is_live(conversation));
    assert!(!dispatcher.toggle_reasoning(conversation));
}

#[tokio::test]
async fn corrupted_frame_is_recorded_and_skipped() {
    let backend = ScriptedBackend::new([Script::chunks(&[
        "data: {\"type\":\"chain\",\"content\":\"Critic: a\"}\n",
        "data: {\"type\":\"chain\",\"content\n",
        "data: {\"type\":\"chain\",\"content\":\"Responder: b\"}\n",
    ])]);
    let view = Arc::new(RecordingView::default());
    let dispatcher = SessionDispatcher::new(backend, view.clone());

    let state = finished(dispatcher.run(ChatRequest::new("hi", "llama2")).await);

    assert_eq!(state.phase(), Phase::Done);
    assert_eq!(state.chain_log().len(), 2);
    assert_eq!(state.chain_log()[1].role, ChainRole::Responder);
    assert_eq!(state.diagnostics().len(), 1);
    assert_eq!(view.scroll_count(), 2);
}
