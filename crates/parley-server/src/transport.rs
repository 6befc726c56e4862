//! QUIC transport over Quinn.
//!
//! Each chat client holds one QUIC connection and opens a single
//! bidirectional stream on it. Inbound frames are read from the stream's
//! receive half and every outbound event is written to its send half, so a
//! client sees events in exactly the order the broker emitted them.
//!
//! TLS 1.3 comes from `rustls` with ALPN fixed to [`ALPN_PROTOCOL`]. When no
//! certificate is configured a self-signed one is generated for `localhost`;
//! that is only suitable for development.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use parley_proto::ALPN_PROTOCOL;
use quinn::{
    Endpoint, IdleTimeout, RecvStream, SendStream, ServerConfig, TransportConfig,
    crypto::rustls::QuicServerConfig,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use crate::{ServerRuntimeConfig, error::ServerError};

/// Bound QUIC endpoint accepting chat clients.
pub struct QuicTransport {
    endpoint: Endpoint,
}

impl QuicTransport {
    /// Bind an endpoint using the address, TLS material, and timeouts in
    /// `config`.
    pub fn bind(config: &ServerRuntimeConfig) -> Result<Self, ServerError> {
        let address = config.bind_address.as_str();
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let (certs, key) = match (&config.cert_path, &config.key_path) {
            (Some(cert), Some(key)) => load_pem(cert, key)?,
            _ => self_signed()?,
        };

        let mut server_config = server_config(certs, key)?;
        server_config.transport_config(Arc::new(transport_config(
            config.idle_timeout,
            config.keep_alive_interval,
        )?));

        let endpoint = Endpoint::server(server_config, addr)
            .map_err(|e| ServerError::Transport(format!("failed to create endpoint: {e}")))?;

        tracing::info!(%addr, "QUIC transport bound");

        Ok(Self { endpoint })
    }

    /// Wait for the next client handshake to complete.
    ///
    /// Returns `Ok(None)` once the endpoint is closed.
    pub async fn accept(&self) -> Result<Option<QuicConnection>, ServerError> {
        let Some(incoming) = self.endpoint.accept().await else {
            return Ok(None);
        };

        let connection = incoming
            .await
            .map_err(|e| ServerError::Transport(format!("handshake failed: {e}")))?;

        Ok(Some(QuicConnection { connection }))
    }

    /// Local address the endpoint is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.endpoint
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("failed to get local address: {e}")))
    }

    /// Close every connection and stop accepting new ones.
    pub fn close(&self, reason: &str) {
        self.endpoint.close(0u32.into(), reason.as_bytes());
    }

    /// Wait until all connections have drained after [`Self::close`].
    pub async fn wait_idle(&self) {
        self.endpoint.wait_idle().await;
    }
}

/// One client's QUIC connection.
///
/// Clones share the underlying connection, so the reader and writer tasks
/// can each hold one.
#[derive(Clone)]
pub struct QuicConnection {
    connection: quinn::Connection,
}

impl QuicConnection {
    /// Wait for the client to open its event stream.
    pub async fn accept_stream(&self) -> Result<(SendStream, RecvStream), ServerError> {
        self.connection
            .accept_bi()
            .await
            .map_err(|e| ServerError::Transport(format!("accept_bi failed: {e}")))
    }

    /// Remote peer address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    /// Close the connection with a human-readable reason.
    pub fn close(&self, reason: &str) {
        self.connection.close(0u32.into(), reason.as_bytes());
    }
}

fn load_pem(
    cert_path: &str,
    key_path: &str,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), ServerError> {
    let cert_pem = std::fs::read(cert_path)
        .map_err(|e| ServerError::Config(format!("failed to read cert '{cert_path}': {e}")))?;
    let key_pem = std::fs::read(key_path)
        .map_err(|e| ServerError::Config(format!("failed to read key '{key_path}': {e}")))?;

    let certs = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Config(format!("failed to parse certificates: {e}")))?;
    if certs.is_empty() {
        return Err(ServerError::Config(format!("no certificates in '{cert_path}'")));
    }

    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .map_err(|e| ServerError::Config(format!("failed to parse private key: {e}")))?
        .ok_or_else(|| ServerError::Config(format!("no private key in '{key_path}'")))?;

    Ok((certs, key))
}

fn self_signed() -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), ServerError> {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(|e| ServerError::Config(format!("failed to generate self-signed cert: {e}")))?;

    let key = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

    tracing::warn!("using self-signed certificate, not for production use");

    Ok((vec![cert.cert.der().clone()], key.into()))
}

fn server_config(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<ServerConfig, ServerError> {
    let mut tls = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_protocol_versions(&[&rustls::version::TLS13])
    .map_err(|e| ServerError::Config(format!("unsupported TLS versions: {e}")))?
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .map_err(|e| ServerError::Config(format!("invalid TLS config: {e}")))?;

    tls.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    let crypto = QuicServerConfig::try_from(tls)
        .map_err(|e| ServerError::Config(format!("QUIC config error: {e}")))?;

    Ok(ServerConfig::with_crypto(Arc::new(crypto)))
}

fn transport_config(
    idle_timeout: Duration,
    keep_alive_interval: Duration,
) -> Result<TransportConfig, ServerError> {
    let idle = IdleTimeout::try_from(idle_timeout)
        .map_err(|e| ServerError::Config(format!("idle timeout out of range: {e}")))?;

    let mut transport = TransportConfig::default();
    transport.max_idle_timeout(Some(idle));
    transport.keep_alive_interval(Some(keep_alive_interval));
    // Clients never need more than their one event stream
    transport.max_concurrent_bidi_streams(1u32.into());
    transport.max_concurrent_uni_streams(0u32.into());

    Ok(transport)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> ServerRuntimeConfig {
        ServerRuntimeConfig { bind_address: "127.0.0.1:0".to_string(), ..Default::default() }
    }

    #[tokio::test]
    async fn binds_with_self_signed_cert() {
        let transport = QuicTransport::bind(&local()).unwrap();

        assert_ne!(transport.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn rejects_invalid_address() {
        let config = ServerRuntimeConfig { bind_address: "not-an-address".into(), ..local() };

        assert!(matches!(QuicTransport::bind(&config), Err(ServerError::Config(_))));
    }

    #[tokio::test]
    async fn rejects_missing_cert_files() {
        let config = ServerRuntimeConfig {
            cert_path: Some("/nonexistent/cert.pem".into()),
            key_path: Some("/nonexistent/key.pem".into()),
            ..local()
        };

        assert!(matches!(QuicTransport::bind(&config), Err(ServerError::Config(_))));
    }

    #[tokio::test]
    async fn accept_returns_none_after_close() {
        let transport = QuicTransport::bind(&local()).unwrap();
        transport.close("test over");

        assert!(transport.accept().await.unwrap().is_none());
    }
}
