//! Assembles fragmented serial chunks into sample lines
//!
//! Only the first `\n` or `\r` inside each delivered chunk completes a line.
//! Whatever follows that terminator in the same chunk is dropped, it is not
//! carried into the next line. A line longer than [`MAX_LINE_LEN`] is
//! discarded along with everything up to its terminator.

/// Longest line kept while waiting for a terminator
pub const MAX_LINE_LEN: usize = 64;

/// Result of feeding one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A completed, trimmed, non-empty line
    Line(String),
    /// The in-progress line grew past the limit and was dropped
    Overflow { discarded: usize },
}

#[derive(Debug)]
pub struct LineAssembler {
    buffer: Vec<u8>,
    max_len: usize,
    overflowed: bool,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(max_len),
            max_len,
            overflowed: false,
        }
    }

    /// Bytes buffered for the line in progress
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Feed one delivered chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Option<LineEvent> {
        let terminator = chunk.iter().position(|&b| b == b'\n' || b == b'\r');
        let body = match terminator {
            Some(end) => &chunk[..end],
            None => chunk,
        };

        if self.overflowed {
            if terminator.is_some() {
                self.overflowed = false;
            }
            return None;
        }

        if self.buffer.len() + body.len() > self.max_len {
            let discarded = self.buffer.len() + body.len();
            self.buffer.clear();
            self.overflowed = terminator.is_none();
            return Some(LineEvent::Overflow { discarded });
        }

        self.buffer.extend_from_slice(body);
        if terminator.is_none() {
            return None;
        }

        let line = String::from_utf8_lossy(&self.buffer).trim().to_string();
        self.buffer.clear();

        if line.is_empty() {
            None
        } else {
            Some(LineEvent::Line(line))
        }
    }
}
