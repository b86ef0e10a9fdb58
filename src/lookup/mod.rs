//! Name lookup capabilities.
//!
//! The session engine resolves every request through a [`Lookup`]. The
//! production implementation is a static [`ScoreTable`]; [`FixtureLookup`]
//! layers fault-injection names on top of any other lookup for exercising
//! client framing.

mod fixtures;
mod table;

pub use fixtures::FixtureLookup;
pub use table::{ScoreTable, TableError};

use bytes::Bytes;
use std::time::Duration;

/// Outcome of resolving a request name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Name found with this score.
    Score(u32),
    /// Name not in the table.
    Missing,
    /// Name bound to a non-lookup behavior.
    Override(Directive),
}

/// Behaviors a lookup can substitute for a plain reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Reply with `points`, written in two halves `pause` apart.
    SplitReply { points: u32, pause: Duration },
    /// Write these bytes with no terminator, then keep serving.
    Unterminated(Bytes),
    /// Write this block repeatedly until the peer stops accepting it.
    Flood(Bytes),
    /// Close the connection without replying.
    Disconnect,
}

/// Read-only name resolution shared by every connection.
pub trait Lookup: Send + Sync {
    fn resolve(&self, name: &[u8]) -> Resolution;
}
