//! TCP acceptor.
//!
//! Accepts connections and hands each one to its own task running a
//! [`Session`]. A stuck or misbehaving connection only ever blocks its own
//! task; the accept loop never waits on a session.

use crate::config::Config;
use crate::lookup::Lookup;
use crate::session::{Session, SessionEnd};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, trace};

/// Server instance
pub struct Server {
    listener: TcpListener,
    lookup: Arc<dyn Lookup>,
    idle_timeout: Option<Duration>,
}

impl Server {
    /// Bind the listening socket. Must be called inside a tokio runtime.
    pub fn bind(config: &Config, lookup: Arc<dyn Lookup>) -> io::Result<Self> {
        let listener = create_listener(config.listen, config.backlog).map_err(|e| {
            io::Error::new(e.kind(), format!("failed to listen on {}: {e}", config.listen))
        })?;

        Ok(Server {
            listener: TcpListener::from_std(listener)?,
            lookup,
            idle_timeout: config.idle_timeout,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Sessions already running are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        if let Ok(addr) = self.listener.local_addr() {
            info!(address = %addr, "Server listening");
        }
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down, no longer accepting connections");
                    return;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "New connection");
                        let lookup = Arc::clone(&self.lookup);
                        let idle_timeout = self.idle_timeout;

                        // Detached: the handle is dropped and never joined.
                        tokio::spawn(async move {
                            let end = handle_connection(stream, lookup, idle_timeout).await;
                            log_session_end(peer, &end);
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                },
            }
        }
    }
}

/// Serve a single client connection
async fn handle_connection(
    stream: TcpStream,
    lookup: Arc<dyn Lookup>,
    idle_timeout: Option<Duration>,
) -> SessionEnd {
    let (reader, writer) = stream.into_split();
    Session::new(reader, writer, lookup, idle_timeout).run().await
}

fn log_session_end(peer: SocketAddr, end: &SessionEnd) {
    match end {
        SessionEnd::CleanClose => trace!(%peer, "Connection closed by client"),
        SessionEnd::DispatcherClose => debug!(%peer, "Connection closed by directive"),
        SessionEnd::FramingViolation(violation) => {
            debug!(%peer, %violation, "Dropping client after framing violation")
        }
        SessionEnd::ReadFailure(e) => debug!(%peer, error = %e, "Read failed"),
        SessionEnd::WriteFailure(e) => debug!(%peer, error = %e, "Write failed"),
        SessionEnd::IdleTimeout => debug!(%peer, "Idle timeout"),
    }
}

fn create_listener(addr: SocketAddr, backlog: u32) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog.try_into().unwrap_or(i32::MAX))?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{FixtureLookup, ScoreTable};
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::tcp::OwnedReadHalf;
    use tokio::net::tcp::OwnedWriteHalf;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    struct TestServer {
        addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        handle: JoinHandle<()>,
    }

    fn test_config() -> Config {
        Config {
            listen: "127.0.0.1:0".parse().unwrap(),
            workers: 1,
            backlog: 16,
            idle_timeout: None,
            fixtures: false,
            scores: ScoreTable::builtin(),
            log_level: "info".to_string(),
        }
    }

    fn start(lookup: Arc<dyn Lookup>) -> TestServer {
        let server = Server::bind(&test_config(), lookup).unwrap();
        let addr = server.local_addr().unwrap();
        let (shutdown, rx) = oneshot::channel();
        let handle = tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));
        TestServer {
            addr,
            shutdown,
            handle,
        }
    }

    struct Client {
        reader: BufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    }

    impl Client {
        async fn connect(addr: SocketAddr) -> Self {
            let (reader, writer) = TcpStream::connect(addr).await.unwrap().into_split();
            Client {
                reader: BufReader::new(reader),
                writer,
            }
        }

        async fn send(&mut self, bytes: &[u8]) {
            self.writer.write_all(bytes).await.unwrap();
        }

        async fn recv(&mut self) -> String {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).await.unwrap();
            assert!(n > 0, "server closed before replying");
            line
        }

        async fn ask(&mut self, query: &str) -> String {
            self.send(query.as_bytes()).await;
            self.recv().await
        }

        /// True when the server closed without sending anything more.
        async fn closed(&mut self) -> bool {
            let mut rest = Vec::new();
            match self.reader.read_to_end(&mut rest).await {
                Ok(_) => rest.is_empty(),
                Err(e) => e.kind() == io::ErrorKind::ConnectionReset,
            }
        }
    }

    #[tokio::test]
    async fn test_normal_queries() {
        let server = start(Arc::new(ScoreTable::builtin()));
        let mut client = Client::connect(server.addr).await;

        assert_eq!(client.ask("Ada Lovelace\n").await, "64265\n");
        assert_eq!(client.ask("Hermione Granger\n").await, "49365\n");
        assert_eq!(client.ask("Frodo Baggins\n").await, "177\n");
        assert_eq!(client.ask("Alan Turing\n").await, "none\n");
        assert_eq!(client.ask("Frodo Baggins\n").await, "177\n");
        assert_eq!(
            client.ask("Jonathan Edward Peter Chapman\n").await,
            "2488897010\n"
        );
    }

    #[tokio::test]
    async fn test_interleaved_clients() {
        let server = start(Arc::new(ScoreTable::builtin()));
        let mut clients = [
            Client::connect(server.addr).await,
            Client::connect(server.addr).await,
        ];
        let queries = [
            [
                ("Victor Frankenstein\n", "19129\n"),
                ("Frodo Baggins\n", "177\n"),
                ("Hermione Granger\n", "49365\n"),
                ("Alan Turing\n", "none\n"),
                ("Frodo Baggins\n", "177\n"),
            ],
            [
                ("Frodo Baggins\n", "177\n"),
                ("Victor Frankenstein\n", "19129\n"),
                ("Ada Lovelace\n", "64265\n"),
                ("Hermione Granger\n", "49365\n"),
                ("Dennis Ritchie\n", "none\n"),
            ],
        ];

        for i in 0..5 {
            for (j, client) in clients.iter_mut().enumerate() {
                let (query, expected) = queries[j][i];
                assert_eq!(client.ask(query).await, expected);
            }
        }
    }

    #[tokio::test]
    async fn test_pipelined_clients_stay_isolated() {
        let server = start(Arc::new(ScoreTable::builtin()));
        let mut a = Client::connect(server.addr).await;
        let mut b = Client::connect(server.addr).await;

        a.send(b"Ada Lovelace\nFrodo").await;
        b.send(b"Victor Frankenstein\nHermione").await;
        a.send(b" Baggins\n").await;
        b.send(b" Granger\n").await;

        assert_eq!(b.recv().await, "19129\n");
        assert_eq!(b.recv().await, "49365\n");
        assert_eq!(a.recv().await, "64265\n");
        assert_eq!(a.recv().await, "177\n");
    }

    #[tokio::test]
    async fn test_split_message() {
        let server = start(Arc::new(ScoreTable::builtin()));
        let mut client = Client::connect(server.addr).await;

        client.send(b"Prof. Shriram K").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        client.send(b"rishnamurthi I\n").await;
        assert_eq!(client.recv().await, "none\n");
    }

    #[tokio::test]
    async fn test_merged_messages() {
        let server = start(Arc::new(ScoreTable::builtin()));
        let mut client = Client::connect(server.addr).await;

        client.send(b"Ada Lovelace\nFrodo Baggins\n").await;
        assert_eq!(client.recv().await, "64265\n");
        assert_eq!(client.recv().await, "177\n");
    }

    #[tokio::test]
    async fn test_second_message_too_long() {
        let server = start(Arc::new(ScoreTable::builtin()));
        let mut client = Client::connect(server.addr).await;

        assert_eq!(client.ask("Prof. Shriram Krishnamurthi I\n").await, "none\n");
        client.send(b"Prof. Shriram Krishnamurthi II").await;
        assert!(client.closed().await);
    }

    #[tokio::test]
    async fn test_violation_does_not_affect_other_clients() {
        let server = start(Arc::new(ScoreTable::builtin()));
        let mut good = Client::connect(server.addr).await;
        let mut bad = Client::connect(server.addr).await;

        bad.send(&[b'x'; 64]).await;
        assert!(bad.closed().await);
        assert_eq!(good.ask("Ada Lovelace\n").await, "64265\n");
    }

    #[tokio::test]
    async fn test_connect_query_close_loop() {
        let server = start(Arc::new(ScoreTable::builtin()));

        for _ in 0..15 {
            let mut client = Client::connect(server.addr).await;
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert_eq!(client.ask("Victor Frankenstein\n").await, "19129\n");
        }
    }

    #[tokio::test]
    async fn test_idle_client_does_not_block_accept() {
        let server = start(Arc::new(ScoreTable::builtin()));
        let mut idle = Client::connect(server.addr).await;
        idle.send(b"Ada Lov").await;

        let mut client = Client::connect(server.addr).await;
        assert_eq!(client.ask("Frodo Baggins\n").await, "177\n");

        idle.send(b"elace\n").await;
        assert_eq!(idle.recv().await, "64265\n");
    }

    #[tokio::test]
    async fn test_disconnect_directive() {
        let server = start(Arc::new(FixtureLookup::new(ScoreTable::builtin())));
        let mut client = Client::connect(server.addr).await;

        assert_eq!(client.ask("Ada Lovelace\n").await, "64265\n");
        client.send(b"Terminator\n").await;
        assert!(client.closed().await);
    }

    #[tokio::test]
    async fn test_split_reply_directive() {
        let server = start(Arc::new(FixtureLookup::new(ScoreTable::builtin())));
        let mut client = Client::connect(server.addr).await;

        assert_eq!(client.ask("Bond, James Bond\n").await, "3178689\n");
        assert_eq!(client.ask("Frodo Baggins\n").await, "177\n");
    }

    #[tokio::test]
    async fn test_directives_disabled_without_fixtures() {
        let server = start(Arc::new(ScoreTable::builtin()));
        let mut client = Client::connect(server.addr).await;

        assert_eq!(client.ask("Terminator\n").await, "none\n");
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let server = start(Arc::new(ScoreTable::builtin()));
        let mut client = Client::connect(server.addr).await;
        assert_eq!(client.ask("Ada Lovelace\n").await, "64265\n");

        server.shutdown.send(()).unwrap();
        server.handle.await.unwrap();

        // Sessions already running keep going.
        assert_eq!(client.ask("Frodo Baggins\n").await, "177\n");
        assert!(TcpStream::connect(server.addr).await.is_err());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_an_error() {
        let first = start(Arc::new(ScoreTable::builtin()));
        let mut config = test_config();
        config.listen = first.addr;

        // SO_REUSEADDR does not allow two live listeners on one port.
        let err = Server::bind(&config, Arc::new(ScoreTable::builtin())).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);
    }
}
