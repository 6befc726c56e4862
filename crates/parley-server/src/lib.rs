//! Parley production server.
//!
//! Wraps the Sans-IO [`parley_core::Broker`] with real I/O: Quinn for QUIC,
//! Tokio for tasks and timers, and the system clock and RNG.
//!
//! # Architecture
//!
//! - [`Coordinator`]: one task owning the broker; everything else talks to
//!   it through a [`CoordinatorHandle`]
//! - [`QuicTransport`]: accepts client connections
//! - per connection, a reader task decoding frames into commands and a writer
//!   task draining that connection's bounded outbound queue
//! - [`SystemEnv`]: production environment

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod connection;
mod coordinator;
mod error;
mod system_env;
mod transport;

use std::{future::Future, net::SocketAddr, time::Duration};

pub use connection::{ReadEnd, read_events, write_events};
pub use coordinator::{
    Coordinator, CoordinatorHandle, OUTBOUND_CAPACITY, Outbound, OutboundReceiver, OutboundSender,
    outbound_queue,
};
pub use error::ServerError;
use parley_core::{Broker, BrokerConfig};
pub use system_env::SystemEnv;
use tokio::task::JoinHandle;
pub use transport::{QuicConnection, QuicTransport};

/// How long shutdown waits for connections to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g. "0.0.0.0:4433")
    pub bind_address: String,
    /// Path to TLS certificate (PEM format)
    pub cert_path: Option<String>,
    /// Path to TLS private key (PEM format)
    pub key_path: Option<String>,
    /// Connections silent for this long are dropped
    pub idle_timeout: Duration,
    /// QUIC keep-alive interval; must be below `idle_timeout`
    pub keep_alive_interval: Duration,
    /// Broker tunables
    pub broker: BrokerConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4433".to_string(),
            cert_path: None,
            key_path: None,
            idle_timeout: Duration::from_secs(30),
            keep_alive_interval: Duration::from_secs(10),
            broker: BrokerConfig::default(),
        }
    }
}

/// Production parley server.
pub struct Server {
    transport: QuicTransport,
    coordinator: CoordinatorHandle,
    task: JoinHandle<()>,
}

impl Server {
    /// Validate the broker limits, bind the transport, and start the
    /// coordinator.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        config.broker.validate().map_err(|e| ServerError::Config(e.to_string()))?;
        let transport = QuicTransport::bind(&config)?;
        let broker = Broker::new(SystemEnv::new(), config.broker);
        let (coordinator, task) = Coordinator::spawn(broker);

        Ok(Self { transport, coordinator, task })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Handle for server-initiated pushes and queries.
    pub fn handle(&self) -> CoordinatorHandle {
        self.coordinator.clone()
    }

    /// Accept connections until `shutdown` resolves, then close every
    /// connection and stop the coordinator.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        tracing::info!(addr = %self.transport.local_addr()?, "server accepting connections");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                },
                accepted = self.transport.accept() => match accepted {
                    Ok(Some(connection)) => {
                        let coordinator = self.coordinator.clone();
                        tokio::spawn(serve(connection, coordinator));
                    },
                    Ok(None) => break,
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                },
            }
        }

        // Coordinator first so clients get a close reason, then the endpoint
        if self.coordinator.shutdown().is_ok() {
            self.task
                .await
                .map_err(|e| ServerError::Internal(format!("coordinator task failed: {e}")))?;
        }
        self.transport.close("server shutting down");
        if tokio::time::timeout(DRAIN_TIMEOUT, self.transport.wait_idle()).await.is_err() {
            tracing::warn!("connections did not drain in time");
        }

        Ok(())
    }
}

/// Run one client connection to completion.
async fn serve(connection: QuicConnection, coordinator: CoordinatorHandle) {
    let id = coordinator.next_connection_id();
    let remote = connection.remote_addr();

    let (send, recv) = match connection.accept_stream().await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::debug!(connection = %id, %remote, error = %e, "no event stream opened");
            return;
        },
    };

    let (outbound, queue) = outbound_queue();
    if coordinator.open(id, outbound).is_err() {
        connection.close("server shutting down");
        return;
    }
    tracing::debug!(connection = %id, %remote, "connection opened");

    let writer_connection = connection.clone();
    let writer = tokio::spawn(async move {
        match write_events(send, id, queue).await {
            Ok(Some(reason)) => writer_connection.close(&reason),
            // Queue dropped without a close: the reader already ended, or the
            // coordinator gave up on a slow consumer whose queue was full
            Ok(None) => writer_connection.close("connection closed"),
            Err(e) => {
                tracing::debug!(connection = %id, error = %e, "write failed");
                writer_connection.close("write failed");
            },
        }
    });

    let end = read_events(recv, id, &coordinator).await;
    if let ReadEnd::Malformed(reason) = &end {
        tracing::warn!(connection = %id, %reason, "closing malformed stream");
        connection.close("protocol error");
    }

    // Ignored if the coordinator already closed this connection itself
    let _ = coordinator.close(id, end.reason());
    if let Err(e) = writer.await {
        tracing::debug!(connection = %id, error = %e, "writer task failed");
    }
}
