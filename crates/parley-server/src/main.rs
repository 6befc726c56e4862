//! Parley server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with self-signed certificate (development)
//! parley-server --bind 0.0.0.0:4433
//!
//! # Start with TLS certificate (production)
//! parley-server --bind 0.0.0.0:4433 --cert cert.pem --key key.pem
//! ```
//!
//! Every flag can also be set through its `PARLEY_*` environment variable.

use std::time::Duration;

use clap::Parser;
use parley_core::BrokerConfig;
use parley_server::{Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parley chat broker
#[derive(Parser, Debug)]
#[command(name = "parley-server")]
#[command(about = "Real-time chat broker over QUIC")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, env = "PARLEY_BIND", default_value = "0.0.0.0:4433")]
    bind: String,

    /// Path to TLS certificate (PEM format)
    #[arg(short, long, env = "PARLEY_CERT")]
    cert: Option<String>,

    /// Path to TLS private key (PEM format)
    #[arg(short, long, env = "PARLEY_KEY")]
    key: Option<String>,

    /// Maximum concurrent connections
    #[arg(long, env = "PARLEY_MAX_CONNECTIONS", default_value = "10000")]
    max_connections: usize,

    /// Group every user joins on authenticate
    #[arg(long, env = "PARLEY_DEFAULT_GROUP", default_value = "general")]
    default_group: String,

    /// Typing indicator expiry in milliseconds
    #[arg(long, env = "PARLEY_TYPING_TIMEOUT_MS", default_value = "3000")]
    typing_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    #[arg(long, env = "PARLEY_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> ServerRuntimeConfig {
        let broker = BrokerConfig {
            default_group: self.default_group,
            typing_timeout: Duration::from_millis(self.typing_timeout_ms),
            max_connections: self.max_connections,
            ..Default::default()
        };

        ServerRuntimeConfig {
            bind_address: self.bind,
            cert_path: self.cert,
            key_path: self.key,
            broker,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = args.into_config();
    tracing::info!(
        bind = %config.bind_address,
        group = %config.broker.default_group,
        "parley starting"
    );

    if config.cert_path.is_none() || config.key_path.is_none() {
        tracing::warn!("no TLS certificate provided, generating a self-signed one");
    }

    let server = Server::bind(config)?;
    tracing::info!(addr = %server.local_addr()?, "server listening");

    server.run(shutdown_signal()).await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
