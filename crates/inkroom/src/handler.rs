//! Per-connection handler: frame decoding, session dispatch, and the
//! outbound writer.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Spawn a writer task that drains the session's outbound queue
//!   2. Loop: receive frames → decode → hand to the session
//!   3. On close, error, or idle timeout: disconnect the session, let the
//!      writer flush, close the socket

use std::sync::Arc;

use inkroom_protocol::{
    ClientEvent, Codec, Envelope, JsonCodec, PlayerId, ServerEvent, unix_millis,
};
use inkroom_session::{Session, SessionError};
use inkroom_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::InkroomError;
use crate::server::ServerState;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), InkroomError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let player_id = PlayerId::from(conn_id);
    tracing::debug!(%conn_id, %player_id, "handling new connection");

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_outbound(Arc::clone(&conn), state.codec, outbound_rx));

    let mut session = Session::new(player_id, outbound_tx, state.registry.clone());
    let result = read_loop(&conn, &state, &mut session).await;

    // Leaving the room drops the room's copy of the outbound sender;
    // dropping the session drops ours, which lets the writer finish.
    session.disconnect().await;
    drop(session);
    if let Err(e) = writer.await {
        tracing::warn!(%player_id, error = %e, "writer task failed");
    }
    let _ = conn.close().await;

    tracing::debug!(%conn_id, %player_id, "connection finished");
    result
}

/// Reads frames until the client goes away or stays silent too long.
async fn read_loop(
    conn: &WebSocketConnection,
    state: &ServerState,
    session: &mut Session,
) -> Result<(), InkroomError> {
    let player_id = session.player_id();

    loop {
        let data = match tokio::time::timeout(state.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%player_id, "connection closed cleanly");
                return Ok(());
            }
            Ok(Err(e)) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                return Err(e.into());
            }
            Err(_) => {
                tracing::info!(%player_id, "connection idle too long, dropping");
                return Ok(());
            }
        };

        let envelope: Envelope<ClientEvent> = match state.codec.decode(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "failed to decode frame");
                session.report("undecoded", &SessionError::from(e));
                continue;
            }
        };

        tracing::trace!(%player_id, seq = envelope.seq, event = envelope.event.kind(), "event");
        session.dispatch(envelope.event).await;
    }
}

/// Writes queued events to the socket, in queue order, until every sender
/// is gone or the socket fails.
async fn write_outbound(
    conn: Arc<WebSocketConnection>,
    codec: JsonCodec,
    mut outbound: mpsc::UnboundedReceiver<ServerEvent>,
) {
    let mut seq: u64 = 1;

    while let Some(event) = outbound.recv().await {
        let envelope = Envelope {
            seq: next_seq(&mut seq),
            sent_at: unix_millis(),
            event,
        };
        let bytes = match codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(conn_id = %conn.id(), error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed, stopping writer");
            break;
        }
    }
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_seq_counts_up_from_current() {
        let mut seq = 1;
        assert_eq!(next_seq(&mut seq), 1);
        assert_eq!(next_seq(&mut seq), 2);
        assert_eq!(seq, 3);
    }
}
