//! Bounded line reader.
//!
//! Reassembles terminator-delimited records from a byte stream that may
//! split a record across reads or coalesce several records into one.
//! Bytes after a terminator are carried over to the next call.
//!
//! The accumulation window is `max_len + 1` bytes and reads are capped to
//! the room left in it, so a peer that never sends a terminator is cut off
//! after at most `max_len + 1` bytes of the offending record.

use super::{Record, TERMINATOR};
use bytes::{Buf, BufMut, BytesMut};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// The peer broke the framing contract. The session must not read further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("no terminator within {limit} bytes")]
    TooLong { limit: usize },
    #[error("stream ended mid-record with {buffered} bytes pending")]
    Truncated { buffered: usize },
}

/// Errors produced while framing a request.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("framing violation: {0}")]
    Violation(#[from] Violation),
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

/// Produces records from `inner` one at a time.
pub struct LineReader<R> {
    inner: R,
    buffer: BytesMut,
    max_len: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Create a reader accepting records of at most `max_len` bytes.
    pub fn new(inner: R, max_len: usize) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(max_len + 1),
            max_len,
        }
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` when the peer closed the stream between records.
    pub async fn next_record(&mut self) -> Result<Option<Record>, FrameError> {
        let window = self.max_len + 1;

        loop {
            if let Some(pos) = find_terminator(&self.buffer) {
                let line = self.buffer.split_to(pos).freeze();
                self.buffer.advance(1);
                return Ok(Some(Record::from_frame(line)));
            }

            if self.buffer.len() >= window {
                return Err(Violation::TooLong {
                    limit: self.max_len,
                }
                .into());
            }

            let room = window - self.buffer.len();
            let mut limited = (&mut self.buffer).limit(room);
            let n = self.inner.read_buf(&mut limited).await?;
            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(Violation::Truncated {
                    buffered: self.buffer.len(),
                }
                .into());
            }
        }
    }

    /// Bytes received but not yet framed into a record.
    #[cfg(test)]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

fn find_terminator(buffer: &[u8]) -> Option<usize> {
    buffer.iter().position(|&b| b == TERMINATOR)
}
