//! Score lookup wire protocol.
//!
//! Requests and replies are newline-terminated ASCII records with no
//! length prefix:
//!
//! ```text
//! Request:  Ada Lovelace\n
//! Response: 64265\n
//!
//! Request:  Bilbo Baggins\n
//! Response: none\n
//! ```
//!
//! A request may arrive split across several transport reads, or several
//! requests may arrive in one read. Replies go out in request order.
//!
//! ## Bounds
//!
//! - Request names are at most [`MAX_NAME_LEN`] bytes. A peer that sends
//!   more without a terminator, or closes mid-record, is disconnected.
//! - Reply payloads are at most [`MAX_REPLY_LEN`] bytes: a decimal `u32`
//!   score or the literal `none`.

mod reader;
mod writer;

pub use reader::{FrameError, LineReader, Violation};
pub use writer::ReplyWriter;

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Record terminator on the wire.
pub const TERMINATOR: u8 = b'\n';

/// Longest request name accepted, excluding the terminator.
pub const MAX_NAME_LEN: usize = 29;

/// Longest reply payload, excluding the terminator.
pub const MAX_REPLY_LEN: usize = 10;

/// Reply payload for names missing from the table.
pub const NOT_FOUND: &[u8] = b"none";

/// A framed request: at most the reader's bound, never containing the terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record(Bytes);

impl Record {
    pub(crate) fn from_frame(line: Bytes) -> Self {
        debug_assert!(!line.contains(&TERMINATOR));
        Record(line)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// A bounded reply payload. Only constructible from a score or as `none`,
/// so every value fits in [`MAX_REPLY_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply(Bytes);

impl Reply {
    /// Decimal score reply. `u32::MAX` is 10 digits.
    pub fn score(points: u32) -> Self {
        let payload = points.to_string();
        debug_assert!(payload.len() <= MAX_REPLY_LEN);
        Reply(Bytes::from(payload))
    }

    pub fn none() -> Self {
        Reply(Bytes::from_static(NOT_FOUND))
    }

    pub fn payload(&self) -> &[u8] {
        &self.0
    }

    /// Append the wire encoding (payload plus terminator) to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.0.len() + 1);
        dst.extend_from_slice(&self.0);
        dst.put_u8(TERMINATOR);
    }
}
