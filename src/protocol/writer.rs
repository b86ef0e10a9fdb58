//! Reply writer.
//!
//! `write_all` retries short writes with the remainder, so a reply may
//! leave in any number of transport writes. Errors are returned to the
//! session, which treats the connection as dead afterwards.

use super::Reply;
use bytes::BytesMut;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub struct ReplyWriter<W> {
    inner: W,
    scratch: BytesMut,
}

impl<W: AsyncWrite + Unpin> ReplyWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            scratch: BytesMut::with_capacity(64),
        }
    }

    /// Write `reply` followed by the terminator.
    pub async fn send(&mut self, reply: &Reply) -> io::Result<()> {
        self.scratch.clear();
        reply.encode(&mut self.scratch);
        self.inner.write_all(&self.scratch).await?;
        self.inner.flush().await
    }

    /// Write `reply` in two halves with `pause` between them.
    pub async fn send_split(&mut self, reply: &Reply, pause: Duration) -> io::Result<()> {
        self.scratch.clear();
        reply.encode(&mut self.scratch);
        let mid = self.scratch.len() / 2;

        self.inner.write_all(&self.scratch[..mid]).await?;
        self.inner.flush().await?;
        tokio::time::sleep(pause).await;
        self.inner.write_all(&self.scratch[mid..]).await?;
        self.inner.flush().await
    }

    /// Write bytes verbatim, with no terminator and no bound.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes).await?;
        self.inner.flush().await
    }

    /// Write `block` repeatedly until the transport refuses it.
    ///
    /// Only ever ends with the error that stopped it.
    pub async fn flood(&mut self, block: &[u8]) -> io::Error {
        loop {
            if let Err(e) = self.inner.write_all(block).await {
                return e;
            }
        }
    }
}
