//! Per-connection reader and writer.
//!
//! The reader decodes frames from the client's stream and forwards known
//! events to the coordinator. The writer drains the connection's outbound
//! queue onto the stream. Both are generic over Tokio I/O traits so tests can
//! drive them with in-memory pipes.

use std::time::Duration;

use parley_core::ConnectionId;
use parley_proto::{ClientMessage, FrameDecoder, ServerMessage};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    coordinator::{CoordinatorHandle, Outbound, OutboundReceiver},
    error::ServerError,
};

const READ_CHUNK: usize = 8 * 1024;

/// A single write blocked longer than this means the client stopped reading.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a connection's reader stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEnd {
    /// Client finished its stream
    Finished,
    /// The byte stream could not be framed; the connection must be closed
    Malformed(String),
    /// The coordinator is gone
    Stopped,
}

impl ReadEnd {
    /// Close reason reported to the broker.
    pub fn reason(&self) -> String {
        match self {
            Self::Finished => "client disconnected".to_string(),
            Self::Malformed(reason) => format!("protocol error: {reason}"),
            Self::Stopped => "server shutting down".to_string(),
        }
    }
}

/// Read frames from `reader` until the stream ends, forwarding decoded events.
///
/// Payloads that fail to decode and unknown event names drop only that one
/// event. Framing errors end the read loop.
pub async fn read_events<R: AsyncRead + Unpin>(
    mut reader: R,
    connection: ConnectionId,
    coordinator: &CoordinatorHandle,
) -> ReadEnd {
    let mut decoder = FrameDecoder::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) => return ReadEnd::Finished,
            Ok(read) => read,
            Err(e) => {
                tracing::debug!(%connection, error = %e, "read failed");
                return ReadEnd::Finished;
            },
        };
        decoder.extend(&chunk[..read]);

        loop {
            let frame = match decoder.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => return ReadEnd::Malformed(e.to_string()),
            };

            match ClientMessage::from_frame(&frame) {
                Ok(Some(message)) => {
                    if coordinator.receive(connection, message).is_err() {
                        return ReadEnd::Stopped;
                    }
                },
                Ok(None) => tracing::debug!(%connection, event = %frame.event, "unknown event"),
                Err(e) => tracing::warn!(%connection, error = %e, "dropping malformed event"),
            }
        }
    }
}

/// Write queued events to `writer` in order.
///
/// Returns the close reason if the coordinator asked to close the connection,
/// or `None` once the queue is dropped. An event that cannot be encoded is
/// logged and skipped; only I/O failures and stalled writes end the writer.
pub async fn write_events<W: AsyncWrite + Unpin>(
    mut writer: W,
    connection: ConnectionId,
    mut outbound: OutboundReceiver,
) -> Result<Option<String>, ServerError> {
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Event(message) => {
                let bytes = match encode(&message) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let event = message.event();
                        tracing::warn!(%connection, event, error = %e, "dropping unencodable");
                        continue;
                    },
                };
                tokio::time::timeout(WRITE_TIMEOUT, writer.write_all(&bytes))
                    .await
                    .map_err(|_| ServerError::Transport("write stalled".to_string()))??;
            },
            Outbound::Close(reason) => {
                tracing::debug!(%connection, %reason, "closing on request");
                writer.flush().await?;
                return Ok(Some(reason));
            },
        }
    }

    writer.flush().await?;
    Ok(None)
}

fn encode(message: &ServerMessage) -> Result<bytes::Bytes, ServerError> {
    Ok(message.to_frame()?.to_bytes()?)
}
