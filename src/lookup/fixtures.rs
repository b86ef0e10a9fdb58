//! Fault-injection names for exercising client framing.
//!
//! Each fixture name makes the server misbehave in one specific way a
//! client must survive:
//!
//! | Name               | Behavior                                           |
//! |--------------------|----------------------------------------------------|
//! | `Bond, James Bond` | `3178689\n` sent in two writes 5 ms apart          |
//! | `Integer Overflow` | 11 digits with no newline                          |
//! | `Age of Vampires`  | digits with no newline until the client goes away  |
//! | `Terminator`       | connection closed with no reply                    |
//!
//! Every other name falls through to the wrapped lookup.

use super::{Directive, Lookup, Resolution};
use bytes::Bytes;
use std::time::Duration;

const SPLIT_REPLY_POINTS: u32 = 3178689;
const SPLIT_REPLY_PAUSE: Duration = Duration::from_millis(5);
const OVERFLOW_REPLY: &[u8] = b"18457062978";
const FLOOD_PATTERN: &[u8] = b"3041579826978832";
const FLOOD_BLOCK_LEN: usize = 1024;

pub struct FixtureLookup<L> {
    inner: L,
    flood_block: Bytes,
}

impl<L: Lookup> FixtureLookup<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            flood_block: Bytes::from(FLOOD_PATTERN.repeat(FLOOD_BLOCK_LEN / FLOOD_PATTERN.len())),
        }
    }
}

impl<L: Lookup> Lookup for FixtureLookup<L> {
    fn resolve(&self, name: &[u8]) -> Resolution {
        let directive = match name {
            b"Bond, James Bond" => Directive::SplitReply {
                points: SPLIT_REPLY_POINTS,
                pause: SPLIT_REPLY_PAUSE,
            },
            b"Integer Overflow" => Directive::Unterminated(Bytes::from_static(OVERFLOW_REPLY)),
            b"Age of Vampires" => Directive::Flood(self.flood_block.clone()),
            b"Terminator" => Directive::Disconnect,
            _ => return self.inner.resolve(name),
        };
        Resolution::Override(directive)
    }
}
