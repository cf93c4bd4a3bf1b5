//! One long-lived event stream per client.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::http::{sse_frame, SSE_RESPONSE_HEAD};
use crate::protocol::stream_announcement;
use crate::registry::ConnectionRegistry;

const KEEPALIVE_FRAME: &[u8] = b": keep-alive\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The read side returned EOF or an error.
    PeerClosed,
    WriteFailed,
    /// The connection was removed from the registry.
    Cancelled,
}

/// Runs a stream until the peer goes away, a write fails, or the registry
/// cancels it. The connection is registered before the announcement is
/// written, so its id is resolvable by the time a client can read it, and it
/// is deregistered on every return path.
pub async fn serve_stream<R, W>(
    registry: &ConnectionRegistry,
    mut reader: R,
    mut writer: W,
    keepalive: Duration,
) -> io::Result<CloseReason>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let client_id = Uuid::new_v4().to_string();
    let (registration, mut events) = registry
        .register(client_id.clone())
        .map_err(|err| io::Error::new(io::ErrorKind::AlreadyExists, err))?;
    let handle = registration.handle().clone();

    writer.write_all(SSE_RESPONSE_HEAD.as_bytes()).await?;
    let announcement = sse_frame("message", &stream_announcement(&client_id));
    write_flush(&mut writer, announcement.as_bytes()).await?;
    tracing::info!(client_id = %client_id, "stream opened");

    let cancelled = handle.cancelled();
    tokio::pin!(cancelled);
    let mut ticker = interval_at(Instant::now() + keepalive, keepalive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut probe = [0_u8; 256];

    let reason = loop {
        tokio::select! {
            biased;
            () = &mut cancelled => break CloseReason::Cancelled,
            event = events.recv() => {
                let Some(event) = event else {
                    break CloseReason::Cancelled;
                };
                let frame = sse_frame("message", &event);
                if let Err(err) = write_flush(&mut writer, frame.as_bytes()).await {
                    tracing::warn!(client_id = %client_id, error = %err, "stream write failed");
                    break CloseReason::WriteFailed;
                }
            }
            _ = ticker.tick() => {
                if let Err(err) = write_flush(&mut writer, KEEPALIVE_FRAME).await {
                    tracing::debug!(client_id = %client_id, error = %err, "keepalive write failed");
                    break CloseReason::WriteFailed;
                }
            }
            read = reader.read(&mut probe) => {
                if matches!(read, Ok(0) | Err(_)) {
                    break CloseReason::PeerClosed;
                }
            }
        }
    };

    drop(registration);
    tracing::info!(client_id = %client_id, reason = ?reason, "stream closed");
    Ok(reason)
}

async fn write_flush<W>(writer: &mut W, bytes: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}
