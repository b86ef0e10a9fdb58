//! Request dispatch.
//!
//! Pure mapping from a framed request to what the session should do next.
//! No I/O happens here.

use crate::lookup::{Directive, Lookup, Resolution};
use crate::protocol::{Record, Reply};
use bytes::Bytes;
use std::time::Duration;

/// What the session does in response to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a normal reply.
    Reply(Reply),
    /// Send a normal reply in two writes.
    SplitReply { reply: Reply, pause: Duration },
    /// Send raw bytes outside the reply bounds, then keep serving.
    Unterminated(Bytes),
    /// Send this block until the write fails, then close.
    Flood(Bytes),
    /// Close without replying.
    Disconnect,
}

pub fn dispatch(lookup: &dyn Lookup, request: &Record) -> Action {
    match lookup.resolve(request.as_bytes()) {
        Resolution::Score(points) => Action::Reply(Reply::score(points)),
        Resolution::Missing => Action::Reply(Reply::none()),
        Resolution::Override(Directive::SplitReply { points, pause }) => Action::SplitReply {
            reply: Reply::score(points),
            pause,
        },
        Resolution::Override(Directive::Unterminated(bytes)) => Action::Unterminated(bytes),
        Resolution::Override(Directive::Flood(block)) => Action::Flood(block),
        Resolution::Override(Directive::Disconnect) => Action::Disconnect,
    }
}
