use std::fmt;

use thoughtline_protocol::{ChainRole, StreamEvent};

use crate::chat::events::ViewChange;
use crate::chat::message::ExchangeTarget;

/// Prefix of the answer text shown when an exchange fails before any answer streamed.
pub const FAILURE_PREFIX: &str = "Error: ";
/// Appended to a partially streamed answer when the exchange fails.
pub const INTERRUPTED_MARKER: &str = "\n\n[response interrupted]";

/// Lifecycle phase of one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Idle,
    StreamingChain,
    StreamingFinal,
    Done,
    Failed,
}

impl Phase {
    /// Monotonic ordering of phases; a transition never lowers the rank.
    pub fn rank(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::StreamingChain => 1,
            Self::StreamingFinal => 2,
            Self::Done | Self::Failed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::StreamingChain => "streaming_chain",
            Self::StreamingFinal => "streaming_final",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged segment of the reasoning log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    pub role: ChainRole,
    pub text: String,
}

/// What the reasoning panel should show right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainPanel {
    Empty,
    Expanded(String),
    Collapsed { summary: String },
}

/// View model for one exchange.
///
/// Created when the exchange starts and handed back to the caller when it ends; a new
/// exchange always starts from a fresh value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderState {
    target: ExchangeTarget,
    phase: Phase,
    chain_log: Vec<ChainEntry>,
    final_text: String,
    /// Byte offset in `final_text` where the answer segment still being streamed starts.
    open_answer_start: Option<usize>,
    reasoning_visible: bool,
    auto_scroll_enabled: bool,
    diagnostics: Vec<String>,
    failure: Option<String>,
}

impl RenderState {
    pub fn new(target: ExchangeTarget, auto_scroll_enabled: bool) -> Self {
        Self {
            target,
            phase: Phase::Idle,
            chain_log: Vec::new(),
            final_text: String::new(),
            open_answer_start: None,
            reasoning_visible: true,
            auto_scroll_enabled,
            diagnostics: Vec::new(),
            failure: None,
        }
    }

    pub fn target(&self) -> ExchangeTarget {
        self.target
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn chain_log(&self) -> &[ChainEntry] {
        &self.chain_log
    }

    pub fn final_text(&self) -> &str {
        &self.final_text
    }

    pub fn reasoning_visible(&self) -> bool {
        self.reasoning_visible
    }

    pub fn auto_scroll_enabled(&self) -> bool {
        self.auto_scroll_enabled
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Applies one classified event and reports which parts of the view changed.
    pub fn apply(&mut self, event: &StreamEvent) -> Vec<ViewChange> {
        if self.phase.is_terminal() {
            tracing::debug!(
                target = ?self.target,
                phase = %self.phase,
                kind = ?event.kind(),
                "ignoring stream event after terminal phase"
            );
            return Vec::new();
        }

        match event {
            StreamEvent::Chain { role, content, .. } => self.apply_chain(*role, content),
            StreamEvent::Final { content } => self.apply_final(content),
            StreamEvent::Token { content } => self.apply_token(content),
            StreamEvent::Malformed { raw, reason } => {
                self.diagnostics
                    .push(format!("malformed frame ({reason}): {raw}"));
                Vec::new()
            }
        }
    }

    /// Stream ended normally.
    pub fn complete(&mut self) -> Vec<ViewChange> {
        if self.phase.is_terminal() {
            return Vec::new();
        }

        self.open_answer_start = None;
        self.phase = Phase::Done;
        vec![ViewChange::PhaseChanged]
    }

    /// Transport failed. Whatever was already streamed stays visible.
    pub fn fail(&mut self, message: impl Into<String>) -> Vec<ViewChange> {
        if self.phase.is_terminal() {
            return Vec::new();
        }

        let message = message.into();
        if self.final_text.is_empty() {
            self.final_text = format!("{FAILURE_PREFIX}{message}");
        } else {
            self.final_text.push_str(INTERRUPTED_MARKER);
        }

        self.failure = Some(message);
        self.open_answer_start = None;
        self.phase = Phase::Failed;
        vec![ViewChange::FinalTextChanged, ViewChange::PhaseChanged]
    }

    /// User toggle for the reasoning panel; legal in every phase.
    pub fn toggle_reasoning(&mut self) -> Vec<ViewChange> {
        self.reasoning_visible = !self.reasoning_visible;
        vec![ViewChange::ReasoningVisibilityChanged]
    }

    /// Reasoning panel content, rebuilt from the whole log on every call.
    pub fn chain_panel(&self) -> ChainPanel {
        if self.chain_log.is_empty() {
            return ChainPanel::Empty;
        }

        if self.reasoning_visible {
            ChainPanel::Expanded(self.chain_text())
        } else {
            let steps = self.chain_log.len();
            let noun = if steps == 1 { "step" } else { "steps" };
            ChainPanel::Collapsed {
                summary: format!("Reasoning ({steps} {noun})"),
            }
        }
    }

    pub fn chain_text(&self) -> String {
        self.chain_log
            .iter()
            .map(|entry| entry.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn apply_chain(&mut self, role: ChainRole, content: &str) -> Vec<ViewChange> {
        let mut changes = Vec::new();
        if self.phase == Phase::Idle {
            self.phase = Phase::StreamingChain;
            changes.push(ViewChange::PhaseChanged);
        }

        // A chain segment after an answer starts a new reasoning round; its answer is
        // appended rather than replacing the previous one.
        self.open_answer_start = None;
        self.chain_log.push(ChainEntry {
            role,
            text: content.to_string(),
        });
        changes.push(ViewChange::ChainLogChanged);
        changes
    }

    fn apply_final(&mut self, content: &str) -> Vec<ViewChange> {
        let mut changes = self.enter_final_phase();

        // The final frame is authoritative for the segment tokens were streaming.
        let start = self
            .open_answer_start
            .take()
            .unwrap_or(self.final_text.len());
        self.final_text.truncate(start);
        self.final_text.push_str(content);

        changes.push(ViewChange::FinalTextChanged);
        changes
    }

    fn apply_token(&mut self, content: &str) -> Vec<ViewChange> {
        let mut changes = self.enter_final_phase();

        if self.open_answer_start.is_none() {
            self.open_answer_start = Some(self.final_text.len());
        }

        if !content.is_empty() {
            self.final_text.push_str(content);
            changes.push(ViewChange::FinalTextChanged);
        }
        changes
    }

    fn enter_final_phase(&mut self) -> Vec<ViewChange> {
        if self.phase == Phase::StreamingFinal {
            return Vec::new();
        }

        self.phase = Phase::StreamingFinal;
        let mut changes = vec![ViewChange::PhaseChanged];
        if self.reasoning_visible {
            self.reasoning_visible = false;
            changes.push(ViewChange::ReasoningVisibilityChanged);
        }
        changes
    }
}
