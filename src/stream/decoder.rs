//! Newline-delimited JSON framing
//!
//! The Icinga2 event stream sends one JSON object per line, but HTTP chunks
//! do not line up with records.

use crate::{Icinga2RtError, Result};
use serde::de::DeserializeOwned;

/// Longest unterminated line accepted before the stream is given up on
pub const MAX_LINE_LEN: usize = 1024 * 1024;

/// Buffers raw chunks and hands out complete lines
#[derive(Debug)]
pub struct LineDecoder {
    buf: Vec<u8>,
    max_line: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_LEN)
    }
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_line,
        }
    }

    /// Append a chunk
    ///
    /// # Errors
    /// [`Icinga2RtError::Decode`] when the unterminated tail grows past the
    /// line limit; the buffer is discarded.
    pub fn push(&mut self, chunk: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(chunk);

        let tail_start = self
            .buf
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |pos| pos + 1);
        let tail = self.buf.len() - tail_start;

        if tail > self.max_line {
            self.buf.clear();
            return Err(Icinga2RtError::Decode(format!(
                "line exceeds {} bytes without a newline",
                self.max_line
            )));
        }

        Ok(())
    }

    /// Next complete, non-blank line without its terminator
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !line.iter().all(u8::is_ascii_whitespace) {
                return Some(line);
            }
        }
        None
    }

    /// Decode the next complete line, if any
    pub fn decode_next<T: DeserializeOwned>(&mut self) -> Option<Result<T>> {
        self.next_line().map(|line| {
            serde_json::from_slice(&line).map_err(|e| {
                Icinga2RtError::Decode(format!(
                    "{}: {}",
                    e,
                    String::from_utf8_lossy(&line)
                ))
            })
        })
    }

    /// Bytes received but not yet terminated by a newline
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
