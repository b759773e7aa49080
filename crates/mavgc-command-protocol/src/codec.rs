//! Line framing for the text command surface.
//!
//! Commands and replies are single lines terminated by `\n` (a preceding
//! `\r` is tolerated). Empty lines are skipped.

use bytes::BytesMut;

use crate::error::{CommandError, CommandResult};

/// Maximum command/reply line length, terminator excluded.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Accumulates bytes and yields complete lines.
#[derive(Debug, Default)]
pub struct LineCodec {
    buffer: BytesMut,
}

impl LineCodec {
    /// Create a new line codec.
    pub fn new() -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(256),
        }
    }

    /// Add received data to the buffer.
    ///
    /// Fails when the pending, unterminated line grows past
    /// [`MAX_LINE_LENGTH`]. That line is discarded; complete lines still
    /// waiting in the buffer are kept.
    pub fn push(&mut self, data: &[u8]) -> CommandResult<()> {
        self.buffer.extend_from_slice(data);
        let complete = self
            .buffer
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |end| end + 1);
        let pending = self.buffer.len() - complete;
        if pending > MAX_LINE_LENGTH {
            self.buffer.truncate(complete);
            return Err(CommandError::BufferOverflow {
                max: MAX_LINE_LENGTH,
                actual: pending,
            });
        }
        Ok(())
    }

    /// Try to decode a complete line from the buffer.
    pub fn decode_line(&mut self) -> Option<String> {
        loop {
            let end = self.buffer.iter().position(|&b| b == b'\n')?;
            let line_data = self.buffer.split_to(end + 1);
            let line = String::from_utf8_lossy(&line_data[..end]);
            let line = line.trim_end_matches('\r');
            if !line.trim().is_empty() {
                return Some(line.to_string());
            }
        }
    }

    /// Encode a line for transmission, appending the terminator.
    pub fn encode_line(line: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
