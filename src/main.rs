//! scoreline: a newline-delimited score lookup server
//!
//! Clients send a name terminated by `\n` and receive the name's score, or
//! `none`, terminated by `\n`. Requests may be pipelined, split across
//! packets, or coalesced; a client that breaks the framing bounds is
//! disconnected without a reply.
//!
//! Features:
//! - One task per connection, isolated from every other connection
//! - Static score table, built in or loaded from the config file
//! - Optional fault-injection names for testing client framing
//! - Optional per-connection idle timeout
//! - Configuration via CLI arguments or TOML file

mod config;
mod dispatch;
mod lookup;
mod protocol;
mod server;
mod session;

use config::Config;
use lookup::{FixtureLookup, Lookup};
use server::Server;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        workers = config.workers,
        backlog = config.backlog,
        idle_timeout = ?config.idle_timeout,
        fixtures = config.fixtures,
        scores = config.scores.len(),
        "Starting scoreline server"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let lookup: Arc<dyn Lookup> = if config.fixtures {
        Arc::new(FixtureLookup::new(config.scores.clone()))
    } else {
        Arc::new(config.scores.clone())
    };

    let server = Server::bind(&config, lookup)?;
    server.run_until(shutdown_signal()).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
}
