use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use crate::chat::events::{ViewChange, ViewEvent};
use crate::chat::message::ExchangeTarget;
use crate::chat::render::{ChainPanel, Phase, RenderState};
use crate::chat::scroll_manager::Viewport;
use crate::chat::view::ChatView;

/// Line-oriented view that writes exchanges to a terminal.
///
/// A terminal always follows its output, so the viewport is reported as pinned to the
/// bottom and scroll requests only flush.
pub struct TerminalView<W> {
    show_reasoning: bool,
    inner: Mutex<TerminalOutput<W>>,
}

struct TerminalOutput<W> {
    out: W,
    printed_answer: String,
    printed_steps: usize,
}

impl TerminalView<io::Stdout> {
    pub fn stdout(show_reasoning: bool) -> Self {
        Self::new(io::stdout(), show_reasoning)
    }
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, show_reasoning: bool) -> Self {
        Self {
            show_reasoning,
            inner: Mutex::new(TerminalOutput {
                out,
                printed_answer: String::new(),
                printed_steps: 0,
            }),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .out
    }

    fn write_event(&self, event: &ViewEvent) -> io::Result<()> {
        let mut output = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &event.snapshot;

        match event.change {
            ViewChange::ChainLogChanged if self.show_reasoning => output.write_steps(state),
            ViewChange::FinalTextChanged => output.write_answer(state.final_text()),
            ViewChange::PhaseChanged if state.phase().is_terminal() => {
                output.write_summary(state, self.show_reasoning)
            }
            _ => Ok(()),
        }
    }
}

impl<W: Write> TerminalOutput<W> {
    fn write_steps(&mut self, state: &RenderState) -> io::Result<()> {
        for entry in state.chain_log().iter().skip(self.printed_steps) {
            writeln!(self.out, "[{}] {}", entry.role, entry.text)?;
        }
        self.printed_steps = state.chain_log().len();
        self.out.flush()
    }

    fn write_answer(&mut self, text: &str) -> io::Result<()> {
        match text.strip_prefix(self.printed_answer.as_str()) {
            Some(suffix) => write!(self.out, "{suffix}")?,
            // A final frame rewrote text that was already streamed.
            None => write!(self.out, "\n{text}")?,
        }
        self.printed_answer = text.to_string();
        self.out.flush()
    }

    fn write_summary(&mut self, state: &RenderState, show_reasoning: bool) -> io::Result<()> {
        writeln!(self.out)?;
        if !show_reasoning
            && state.phase() == Phase::Done
            && let ChainPanel::Collapsed { summary } = state.chain_panel()
        {
            writeln!(self.out, "({summary})")?;
        }
        self.out.flush()
    }
}

impl<W: Write + Send> ChatView for TerminalView<W> {
    fn viewport(&self) -> Viewport {
        Viewport::default()
    }

    fn render(&self, event: ViewEvent) {
        if let Err(error) = self.write_event(&event) {
            tracing::warn!(target = ?event.target(), error = %error, "failed to write to terminal");
        }
    }

    fn scroll_to_bottom(&self, target: ExchangeTarget) {
        let mut output = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(error) = output.out.flush() {
            tracing::warn!(target = ?target, error = %error, "failed to flush terminal");
        }
    }

    fn set_typing(&self, target: ExchangeTarget, active: bool) {
        tracing::debug!(target = ?target, active, "typing indicator");
    }
}
