//! Per-connection parser state machine.
//!
//! The reactor feeds raw socket chunks in; the state machine buffers them and hands back zero
//! or more complete commands. Bytes are consumed only once a whole frame has arrived, so a
//! command split across reads keeps its tail buffered.

use sable_common::error::{SableError, SableResult};

use crate::protocol::{ParsedCommand, RespFrame};

/// Streaming RESP parser owned by one client connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    buffer: Vec<u8>,
}

impl ConnectionState {
    /// Creates an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a socket chunk to the parse buffer.
    pub fn feed_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet consumed by a complete frame.
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Pops the next complete command, or `None` when the buffer holds only a partial frame.
    ///
    /// # Errors
    ///
    /// Returns `SableError::Protocol` on malformed framing or a top-level frame that is not an
    /// array of bulk strings. Protocol errors are fatal to this connection.
    pub fn try_pop_command(&mut self) -> SableResult<Option<ParsedCommand>> {
        let Some((frame, consumed)) = RespFrame::parse(&self.buffer)? else {
            return Ok(None);
        };
        let _ = self.buffer.drain(..consumed);
        command_from_frame(frame).map(Some)
    }
}

/// Converts a top-level frame into a command: an array of bulk strings, name first.
fn command_from_frame(frame: RespFrame) -> SableResult<ParsedCommand> {
    let RespFrame::Array(items) = frame else {
        return Err(SableError::Protocol(
            "command frame must be an array of bulk strings".to_owned(),
        ));
    };

    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        let RespFrame::Bulk(payload) = item else {
            return Err(SableError::Protocol(
                "command frame must be an array of bulk strings".to_owned(),
            ));
        };
        parts.push(payload);
    }

    let Some(name_bytes) = parts.first() else {
        return Err(SableError::Protocol("command frame is empty".to_owned()));
    };
    let name = std::str::from_utf8(name_bytes)
        .map_err(|_| SableError::Protocol("command name is not valid UTF-8".to_owned()))?
        .to_ascii_uppercase();
    let args = parts.split_off(1);
    Ok(ParsedCommand { name, args })
}
