// Copyright 2025 FlightMap Companion Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Async TCP connection layer with automatic reconnection.
//!
//! Provides a connection handle that manages the stream link to the simulator
//! bridge. The connection reconnects indefinitely after a fixed delay, drops
//! outbound frames while the link is not open, and shuts down deterministically
//! through a cancellation token.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Configuration for the bridge connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Bridge address in "host:port" format.
    pub address: String,
    /// Delay before reconnecting after disconnect.
    pub reconnect_delay: Duration,
    /// Channel buffer size for inbound events and outbound frames.
    pub buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: "localhost:8765".to_string(),
            reconnect_delay: Duration::from_secs(2),
            buffer_size: 1024,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Attempting to connect.
    Connecting,
    /// Link established; frames flow both ways.
    Open,
    /// Link lost; a reconnect attempt is scheduled.
    Reconnecting,
}

/// Events emitted by the connection.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Connection state changed.
    StateChanged(ConnectionState),
    /// One inbound text frame (newline-delimited).
    FrameReceived(String),
}

/// Cheap outbound handle for publishing frames to the bridge.
///
/// Frames sent while the connection is not [`ConnectionState::Open`] are
/// dropped silently; there is no queuing or retry for outbound state.
#[derive(Debug, Clone)]
pub struct Uplink {
    outbound_tx: mpsc::Sender<String>,
    state: Arc<RwLock<ConnectionState>>,
}

impl Uplink {
    /// Send one text frame, best-effort.
    ///
    /// No-op (not a failure) when the connection is not open.
    pub fn send(&self, frame: &str) {
        let open = self
            .state
            .read()
            .map(|s| *s == ConnectionState::Open)
            .unwrap_or(false);
        if open {
            let _ = self.outbound_tx.try_send(frame.to_string());
        }
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
            .read()
            .map(|s| *s)
            .unwrap_or(ConnectionState::Reconnecting)
    }
}

/// Handle to a managed bridge connection.
///
/// The connection runs in a background task and automatically reconnects
/// on disconnect. Use `recv()` to receive events and `uplink()` for a
/// cloneable outbound handle.
pub struct Connection {
    event_rx: mpsc::Receiver<ConnectionEvent>,
    uplink: Uplink,
    cancel_token: CancellationToken,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("cancel_token", &self.cancel_token)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Spawn a new connection task with the given configuration.
    ///
    /// Returns a handle that can be used to receive events, publish outbound
    /// frames, and shut down the connection.
    #[must_use]
    pub fn spawn(config: ConnectionConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.buffer_size);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.buffer_size);
        let state = Arc::new(RwLock::new(ConnectionState::Connecting));
        let cancel_token = CancellationToken::new();

        let task_state = Arc::clone(&state);
        let task_cancel = cancel_token.clone();

        tokio::spawn(async move {
            connection_loop(
                config.address,
                event_tx,
                outbound_rx,
                task_state,
                task_cancel,
                config.reconnect_delay,
            )
            .await;
        });

        Self {
            event_rx,
            uplink: Uplink { outbound_tx, state },
            cancel_token,
        }
    }

    /// Receive the next event from the connection.
    ///
    /// Returns `None` if the connection has been shut down.
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.event_rx.recv().await
    }

    /// Send one text frame, best-effort (dropped while not open).
    pub fn send(&self, frame: &str) {
        self.uplink.send(frame);
    }

    /// Get a cloneable outbound handle.
    #[must_use]
    pub fn uplink(&self) -> Uplink {
        self.uplink.clone()
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.uplink.state()
    }

    /// Shut down the connection and cancel any pending reconnect.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

fn set_state(
    state: &Arc<RwLock<ConnectionState>>,
    new_state: ConnectionState,
) {
    if let Ok(mut guard) = state.write() {
        *guard = new_state;
    }
}

async fn connection_loop(
    address: String,
    event_tx: mpsc::Sender<ConnectionEvent>,
    mut outbound_rx: mpsc::Receiver<String>,
    state: Arc<RwLock<ConnectionState>>,
    cancel_token: CancellationToken,
    reconnect_delay: Duration,
) {
    loop {
        if cancel_token.is_cancelled() {
            info!("Connection cancelled");
            return;
        }

        set_state(&state, ConnectionState::Connecting);
        if event_tx
            .send(ConnectionEvent::StateChanged(ConnectionState::Connecting))
            .await
            .is_err()
        {
            return; // Receiver dropped
        }

        info!("Connecting to {}...", address);

        match connect_and_process(&address, &event_tx, &mut outbound_rx, &state, &cancel_token)
            .await
        {
            Ok(DisconnectReason::ConnectionClosed) => {
                info!("Connection closed by bridge");
            }
            Ok(DisconnectReason::Cancelled) => {
                info!("Connection cancelled");
                return;
            }
            Err(e) => {
                error!("Connection error: {}", e);
            }
        }

        set_state(&state, ConnectionState::Reconnecting);
        if event_tx
            .send(ConnectionEvent::StateChanged(ConnectionState::Reconnecting))
            .await
            .is_err()
        {
            return;
        }

        warn!("Reconnecting in {} seconds...", reconnect_delay.as_secs_f64());

        tokio::select! {
            () = sleep(reconnect_delay) => {}
            () = cancel_token.cancelled() => {
                info!("Connection cancelled during reconnect delay");
                return;
            }
        }
    }
}

enum DisconnectReason {
    ConnectionClosed,
    Cancelled,
}

async fn connect_and_process(
    address: &str,
    event_tx: &mpsc::Sender<ConnectionEvent>,
    outbound_rx: &mut mpsc::Receiver<String>,
    state: &Arc<RwLock<ConnectionState>>,
    cancel_token: &CancellationToken,
) -> Result<DisconnectReason, Box<dyn std::error::Error + Send + Sync>> {
    let stream = TcpStream::connect(address).await?;
    info!("Connected to {}", address);

    // Outbound updates are fire-and-forget: anything queued while the link
    // was down is stale and must not be flushed on open
    while outbound_rx.try_recv().is_ok() {}

    set_state(state, ConnectionState::Open);
    if event_tx
        .send(ConnectionEvent::StateChanged(ConnectionState::Open))
        .await
        .is_err()
    {
        return Ok(DisconnectReason::Cancelled);
    }

    let (read_half, mut write_half) = stream.into_split();
    let reader = BufReader::new(read_half);
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            line_result = lines.next_line() => {
                match line_result {
                    Ok(Some(line)) => {
                        if event_tx
                            .send(ConnectionEvent::FrameReceived(line))
                            .await
                            .is_err()
                        {
                            return Ok(DisconnectReason::Cancelled);
                        }
                    }
                    Ok(None) => {
                        return Ok(DisconnectReason::ConnectionClosed);
                    }
                    Err(e) => {
                        return Err(Box::new(e));
                    }
                }
            }

            frame = outbound_rx.recv() => {
                match frame {
                    Some(frame) => {
                        write_half.write_all(frame.as_bytes()).await?;
                        write_half.write_all(b"\n").await?;
                    }
                    None => {
                        // All uplink handles dropped
                        return Ok(DisconnectReason::Cancelled);
                    }
                }
            }

            () = cancel_token.cancelled() => {
                return Ok(DisconnectReason::Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use tokio::time::{timeout, Instant};

    async fn wait_for_state(conn: &mut Connection, wanted: ConnectionState) {
        loop {
            match timeout(Duration::from_secs(2), conn.recv()).await {
                Ok(Some(ConnectionEvent::StateChanged(state))) if state == wanted => return,
                Ok(Some(_)) => continue,
                Ok(None) => panic!("connection shut down while waiting for {:?}", wanted),
                Err(_) => panic!("timed out waiting for {:?}", wanted),
            }
        }
    }

    async fn wait_for_frame(conn: &mut Connection) -> String {
        loop {
            match timeout(Duration::from_secs(2), conn.recv()).await {
                Ok(Some(ConnectionEvent::FrameReceived(frame))) => return frame,
                Ok(Some(_)) => continue,
                Ok(None) => panic!("connection shut down while waiting for frame"),
                Err(_) => panic!("timed out waiting for frame"),
            }
        }
    }

    #[test]
    fn test_uplink_drops_frames_when_not_open() {
        let (outbound_tx, mut outbound_rx) = mpsc::channel(8);
        let state = Arc::new(RwLock::new(ConnectionState::Connecting));
        let uplink = Uplink {
            outbound_tx,
            state: Arc::clone(&state),
        };

        uplink.send("dropped");
        assert!(outbound_rx.try_recv().is_err());

        set_state(&state, ConnectionState::Open);
        uplink.send("delivered");
        assert_eq!(outbound_rx.try_recv().unwrap(), "delivered");

        set_state(&state, ConnectionState::Reconnecting);
        uplink.send("dropped again");
        assert!(outbound_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_frame_delivery_and_single_reconnect_after_delay() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let mut conn = Connection::spawn(ConnectionConfig {
            address,
            reconnect_delay: Duration::from_millis(200),
            ..Default::default()
        });

        let (mut socket, _) = listener.accept().await.unwrap();
        wait_for_state(&mut conn, ConnectionState::Open).await;

        socket.write_all(b"42.2451,-83.5354,090\n").await.unwrap();
        socket.flush().await.unwrap();
        assert_eq!(wait_for_frame(&mut conn).await, "42.2451,-83.5354,090");

        // Close the link; the connection must schedule exactly one reconnect
        // after the configured delay
        let closed_at = Instant::now();
        drop(socket);
        wait_for_state(&mut conn, ConnectionState::Reconnecting).await;

        let (_socket2, _) = timeout(Duration::from_secs(2), listener.accept())
            .await
            .expect("no reconnect attempt arrived")
            .unwrap();
        assert!(closed_at.elapsed() >= Duration::from_millis(150));

        wait_for_state(&mut conn, ConnectionState::Open).await;
        conn.shutdown();
    }

    #[tokio::test]
    async fn test_outbound_frame_written_when_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let mut conn = Connection::spawn(ConnectionConfig {
            address,
            ..Default::default()
        });

        let (socket, _) = listener.accept().await.unwrap();
        wait_for_state(&mut conn, ConnectionState::Open).await;

        conn.send("{\"type\":\"radio_update\"}");

        let mut lines = BufReader::new(socket).lines();
        let line = timeout(Duration::from_secs(2), lines.next_line())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line.as_deref(), Some("{\"type\":\"radio_update\"}"));

        conn.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_cancels_reconnect() {
        // Grab a port with no listener behind it so connects fail
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut conn = Connection::spawn(ConnectionConfig {
            address,
            reconnect_delay: Duration::from_secs(30),
            ..Default::default()
        });

        wait_for_state(&mut conn, ConnectionState::Reconnecting).await;
        conn.shutdown();

        // The loop exits during the reconnect delay and the event stream ends
        let ended = timeout(Duration::from_secs(2), async {
            while conn.recv().await.is_some() {}
        })
        .await;
        assert!(ended.is_ok());
    }
}
