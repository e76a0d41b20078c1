// Newline framing for byte-stream transports
use bytes::{Buf, BytesMut};

/// Reassembles newline-delimited lines from arbitrarily split chunks.
///
/// Bytes are buffered until a `\n` arrives, so a UTF-8 sequence split across
/// chunks is decoded intact. The buffer has no size cap: a sender that never
/// emits a newline grows it without bound.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
    // prefix of `buffer` already known to hold no newline
    scanned: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every complete, non-empty, trimmed line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let raw = self.buffer.split_to(self.scanned + offset);
            self.buffer.advance(1);
            self.scanned = 0;

            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        self.scanned = self.buffer.len();
        lines
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
