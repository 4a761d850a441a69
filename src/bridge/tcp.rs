//! Newline-delimited JSON over TCP with automatic reconnection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::DispatchError;

use super::link::{DeviceLink, LinkEvent};
use super::wire::{DeviceMessage, OutboundMessage};

/// Live connection shared by the link and its supervisor.
#[derive(Debug)]
struct Connection {
    writer: OwnedWriteHalf,
    /// Dropped with the connection, which stops the supervisor's reader.
    _closed: oneshot::Sender<()>,
}

type Slot = Arc<Mutex<Option<Connection>>>;

/// Write side of a supervised TCP connection.
///
/// Cloning shares the same connection.
#[derive(Debug, Clone)]
pub struct TcpLink {
    connection: Slot,
}

#[async_trait]
impl DeviceLink for TcpLink {
    async fn send(&mut self, message: &OutboundMessage) -> Result<(), DispatchError> {
        let mut line =
            serde_json::to_vec(message).map_err(|e| DispatchError::Serialize(e.to_string()))?;
        line.push(b'\n');

        let mut guard = self.connection.lock().await;
        let connection = guard.as_mut().ok_or(DispatchError::NotConnected)?;
        if let Err(err) = connection.writer.write_all(&line).await {
            // Dropping the connection ends the read loop even if the read
            // half stays open, so the supervisor reconnects.
            *guard = None;
            return Err(DispatchError::Link(err.to_string()));
        }
        Ok(())
    }
}

/// Start a supervisor task that keeps a connection to `address` alive.
///
/// Returns the link, the inbound event stream, and the supervisor handle.
/// The supervisor exits once the event receiver is dropped.
pub fn spawn_tcp_link(
    address: impl Into<String>,
    reconnect_interval: Duration,
) -> (TcpLink, mpsc::UnboundedReceiver<LinkEvent>, JoinHandle<()>) {
    let address = address.into();
    let connection = Arc::new(Mutex::new(None));
    let (events, rx) = mpsc::unbounded_channel();

    let link = TcpLink {
        connection: Arc::clone(&connection),
    };
    let handle = tokio::spawn(supervise(address, reconnect_interval, connection, events));
    (link, rx, handle)
}

async fn supervise(
    address: String,
    reconnect_interval: Duration,
    connection: Slot,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    loop {
        match TcpStream::connect(&address).await {
            Ok(stream) => {
                info!(%address, "device connected");
                if let Err(err) = stream.set_nodelay(true) {
                    debug!(%err, "could not disable nagle");
                }
                let (read_half, write_half) = stream.into_split();
                let (closed_tx, closed_rx) = oneshot::channel();
                *connection.lock().await = Some(Connection {
                    writer: write_half,
                    _closed: closed_tx,
                });

                if events.send(LinkEvent::Connected).is_err() {
                    return;
                }
                let open = recv_loop(read_half, closed_rx, &events).await;

                *connection.lock().await = None;
                if !open || events.send(LinkEvent::Disconnected).is_err() {
                    return;
                }
                warn!(%address, "device disconnected");
            }
            Err(err) => {
                debug!(%address, %err, "connect failed");
            }
        }

        if events.is_closed() {
            return;
        }
        tokio::time::sleep(reconnect_interval).await;
    }
}

/// Forward device messages until EOF, a read error, or the connection being
/// dropped after a failed write.
///
/// Returns false when the event receiver is gone.
async fn recv_loop(
    read_half: OwnedReadHalf,
    mut closed: oneshot::Receiver<()>,
    events: &mpsc::UnboundedSender<LinkEvent>,
) -> bool {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        let next = tokio::select! {
            _ = &mut closed => {
                warn!("device write failed, dropping connection");
                return true;
            }
            next = lines.next_line() => next,
        };
        match next {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<DeviceMessage>(line) {
                    Ok(message) => {
                        if events.send(LinkEvent::Message(message)).is_err() {
                            return false;
                        }
                    }
                    Err(err) => warn!(%err, line, "ignoring malformed device message"),
                }
            }
            Ok(None) => return true,
            Err(err) => {
                warn!(%err, "device read failed");
                return true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::wire::{DeviceStatus, WireCommand};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_exchange_and_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let (mut link, mut events, handle) = spawn_tcp_link(address, Duration::from_millis(20));

        let (socket, _) = listener.accept().await.unwrap();
        assert_eq!(events.recv().await, Some(LinkEvent::Connected));

        link.send(&OutboundMessage::stop()).await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let sent: OutboundMessage =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(sent.cmd, WireCommand::Stop);

        write_half
            .write_all(b"not json\n{\"type\":\"status\",\"status\":\"IDLE\"}\n")
            .await
            .unwrap();
        match events.recv().await {
            Some(LinkEvent::Message(DeviceMessage::Status { status, .. })) => {
                assert_eq!(status, DeviceStatus::Idle)
            }
            other => panic!("unexpected event {:?}", other),
        }

        drop(lines);
        drop(write_half);
        assert_eq!(events.recv().await, Some(LinkEvent::Disconnected));
        assert_eq!(
            link.send(&OutboundMessage::stop()).await,
            Err(DispatchError::NotConnected)
        );

        let (_socket, _) = listener.accept().await.unwrap();
        assert_eq!(events.recv().await, Some(LinkEvent::Connected));

        drop(events);
        handle.abort();
    }

    #[tokio::test]
    async fn test_failed_write_reconnects_half_open_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let (link, mut events, handle) = spawn_tcp_link(address, Duration::from_millis(20));
        // The peer keeps its socket open, so the read half never sees EOF.
        let (_peer, _) = listener.accept().await.unwrap();
        assert_eq!(events.recv().await, Some(LinkEvent::Connected));

        // Same effect as a failed `write_all` in `send`.
        *link.connection.lock().await = None;

        assert_eq!(events.recv().await, Some(LinkEvent::Disconnected));
        let (_peer, _) = listener.accept().await.unwrap();
        assert_eq!(events.recv().await, Some(LinkEvent::Connected));

        drop(events);
        handle.abort();
    }
}
