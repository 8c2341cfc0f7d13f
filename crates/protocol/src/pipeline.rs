use crate::classify::ReasoningClassifier;
use crate::event::StreamEvent;
use crate::frame::FrameDecoder;
use crate::line::{LineReassembler, LogicalLine};

/// Chunk-to-event ingestion for one response body.
///
/// Runs reassembly, frame decoding and role classification synchronously per chunk, so
/// events come out in exactly the order their bytes arrived.
#[derive(Debug, Default)]
pub struct EventPipeline {
    reassembler: LineReassembler,
    decoder: FrameDecoder,
    classifier: ReasoningClassifier,
}

impl EventPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes one transport chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let lines = self.reassembler.feed(chunk);
        self.decode_lines(lines)
    }

    /// Processes the trailing fragment once the transport reports end of stream.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let lines = self.reassembler.flush().into_iter().collect();
        self.decode_lines(lines)
    }

    fn decode_lines(&self, lines: Vec<LogicalLine>) -> Vec<StreamEvent> {
        lines
            .iter()
            .filter_map(|line| self.decoder.decode(line))
            .map(|event| self.classifier.classify(event))
            .collect()
    }
}
