//! Per-connection session loop.
//!
//! One session owns one connection for its whole life and runs
//! read, dispatch, reply until a terminal state:
//!
//! ```text
//! AwaitingRequest --record--> Dispatching --action--> SendingReply --ok--> AwaitingRequest
//!        |                         |                       |
//!        +-- eof / violation ------+-- disconnect ---------+-- write error --> Closed
//! ```
//!
//! Every failure ends only this session. Nothing is retried.

use crate::dispatch::{dispatch, Action};
use crate::lookup::Lookup;
use crate::protocol::{FrameError, LineReader, Record, ReplyWriter, Violation, MAX_NAME_LEN};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::trace;

/// Why a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// Peer closed the stream between records.
    CleanClose,
    /// Peer broke the framing contract.
    FramingViolation(Violation),
    /// The lookup asked for the connection to be dropped.
    DispatcherClose,
    /// Reading from the peer failed.
    ReadFailure(io::Error),
    /// Writing to the peer failed.
    WriteFailure(io::Error),
    /// No complete request arrived within the idle timeout.
    IdleTimeout,
}

#[derive(Debug)]
enum State {
    AwaitingRequest,
    Dispatching(Record),
    SendingReply(Action),
    Closed(SessionEnd),
}

pub struct Session<R, W> {
    reader: LineReader<R>,
    writer: ReplyWriter<W>,
    lookup: Arc<dyn Lookup>,
    idle_timeout: Option<Duration>,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        reader: R,
        writer: W,
        lookup: Arc<dyn Lookup>,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            reader: LineReader::new(reader, MAX_NAME_LEN),
            writer: ReplyWriter::new(writer),
            lookup,
            idle_timeout,
        }
    }

    /// Serve the connection until it ends. Consumes the session, so both
    /// halves of the stream are dropped on return.
    pub async fn run(mut self) -> SessionEnd {
        let mut state = State::AwaitingRequest;
        loop {
            state = match state {
                State::AwaitingRequest => self.await_request().await,
                State::Dispatching(request) => match dispatch(self.lookup.as_ref(), &request) {
                    Action::Disconnect => State::Closed(SessionEnd::DispatcherClose),
                    action => State::SendingReply(action),
                },
                State::SendingReply(action) => self.send(action).await,
                State::Closed(end) => return end,
            };
        }
    }

    async fn await_request(&mut self) -> State {
        let next = match self.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.reader.next_record()).await {
                Ok(next) => next,
                Err(_) => return State::Closed(SessionEnd::IdleTimeout),
            },
            None => self.reader.next_record().await,
        };

        match next {
            Ok(Some(request)) => {
                trace!(%request, "Request framed");
                State::Dispatching(request)
            }
            Ok(None) => State::Closed(SessionEnd::CleanClose),
            Err(FrameError::Violation(violation)) => {
                State::Closed(SessionEnd::FramingViolation(violation))
            }
            Err(FrameError::Io(e)) => State::Closed(SessionEnd::ReadFailure(e)),
        }
    }

    async fn send(&mut self, action: Action) -> State {
        let result = match action {
            Action::Reply(reply) => self.writer.send(&reply).await,
            Action::SplitReply { reply, pause } => self.writer.send_split(&reply, pause).await,
            Action::Unterminated(bytes) => self.writer.send_raw(&bytes).await,
            Action::Flood(block) => Err(self.writer.flood(&block).await),
            Action::Disconnect => return State::Closed(SessionEnd::DispatcherClose),
        };

        match result {
            Ok(()) => State::AwaitingRequest,
            Err(e) => State::Closed(SessionEnd::WriteFailure(e)),
        }
    }
}
