//! Reassembly of newline-delimited text from arbitrarily chunked bytes.

use std::fmt;

const LINE_TERMINATOR: char = '\n';

/// One complete line of the response body, without its terminator.
///
/// A trailing `\r` is preserved so that reassembly stays byte-exact; frame decoding
/// ignores it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalLine(String);

impl LogicalLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LogicalLine {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Turns transport chunks into complete [`LogicalLine`]s.
///
/// Chunks may split a line, and may also split a multi-byte UTF-8 sequence; incomplete
/// sequences are held back as raw bytes until the rest of the character arrives.
#[derive(Debug, Default)]
pub struct LineReassembler {
    pending: String,
    undecoded: Vec<u8>,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every line it completed, in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<LogicalLine> {
        self.decode_into_pending(chunk);

        let Some(last_terminator) = self.pending.rfind(LINE_TERMINATOR) else {
            return Vec::new();
        };

        let fragment = self.pending.split_off(last_terminator + 1);
        let mut complete = std::mem::replace(&mut self.pending, fragment);
        complete.pop();

        complete
            .split(LINE_TERMINATOR)
            .map(LogicalLine::new)
            .collect()
    }

    /// Emits whatever is left once the transport reports end of stream.
    ///
    /// Dangling bytes of an unfinished UTF-8 sequence are decoded lossily.
    pub fn flush(&mut self) -> Option<LogicalLine> {
        if !self.undecoded.is_empty() {
            let rest = std::mem::take(&mut self.undecoded);
            self.pending.push_str(&String::from_utf8_lossy(&rest));
        }

        if self.pending.is_empty() {
            return None;
        }

        Some(LogicalLine(std::mem::take(&mut self.pending)))
    }

    /// True when no fragment is waiting for its terminator.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.undecoded.is_empty()
    }

    fn decode_into_pending(&mut self, chunk: &[u8]) {
        let carried;
        let mut bytes: &[u8] = if self.undecoded.is_empty() {
            chunk
        } else {
            self.undecoded.extend_from_slice(chunk);
            carried = std::mem::take(&mut self.undecoded);
            &carried
        };

        loop {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    self.pending.push_str(text);
                    return;
                }
                Err(error) => {
                    let (valid, rest) = bytes.split_at(error.valid_up_to());
                    self.pending.push_str(&String::from_utf8_lossy(valid));

                    match error.error_len() {
                        Some(invalid_len) => {
                            self.pending.push(char::REPLACEMENT_CHARACTER);
                            bytes = &rest[invalid_len..];
                        }
                        None => {
                            // Sequence is cut by the chunk boundary; wait for the next chunk.
                            self.undecoded.extend_from_slice(rest);
                            return;
                        }
                    }
                }
            }
        }
    }
}
