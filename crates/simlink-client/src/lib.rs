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

//! Client library for the flight-simulator moving-map telemetry feed.
//!
//! The simulator bridge streams one text frame per position fix
//! (`"lat,lon,heading"`) and accepts JSON frames for radio-state updates in
//! the opposite direction. This library provides layers that can be used
//! independently or composed together:
//!
//! - **Protocol layer**: frame parsing behind a trait seam
//! - **Tracker layer**: latest-known ownship position, last-write-wins
//! - **Connection layer**: async TCP with automatic reconnection, cancelable
//!   teardown, and best-effort outbound publishing
//!
//! # Quick Start
//!
//! Use the [`Client`] type for full-stack operation:
//!
//! ```no_run
//! use simlink_client::{Client, ClientConfig, ClientEvent, ConnectionConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut client = Client::spawn(ClientConfig {
//!         connection: ConnectionConfig {
//!             address: "localhost:8765".to_string(),
//!             ..Default::default()
//!         },
//!     });
//!
//!     while let Some(event) = client.process_next().await {
//!         if let ClientEvent::PositionUpdated(fix) = event {
//!             println!("{:.4},{:.4} hdg {:.0}", fix.latitude, fix.longitude, fix.heading);
//!         }
//!     }
//! }
//! ```

pub mod protocol;
pub mod tcp;
pub mod tracker;

use log::warn;

pub use protocol::{AircraftPosition, ParseError, Protocol, TelemetryParser};
pub use tcp::{Connection, ConnectionConfig, ConnectionEvent, ConnectionState, Uplink};
pub use tracker::PositionTracker;

/// Configuration for the full-stack client.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Connection configuration.
    pub connection: ConnectionConfig,
}

/// Events surfaced by [`Client::process_next`].
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Connection state changed.
    StateChanged(ConnectionState),
    /// A position fix arrived and the tracker was updated.
    PositionUpdated(AircraftPosition),
}

/// Full-stack telemetry client that wires all layers together.
///
/// The client manages the TCP connection, parses inbound frames, and keeps
/// the latest ownship position. Malformed frames are dropped with a warning
/// without disturbing the connection.
pub struct Client {
    connection: Connection,
    parser: TelemetryParser,
    tracker: PositionTracker,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("connection", &self.connection)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Spawn a new client with the given configuration.
    #[must_use]
    pub fn spawn(config: ClientConfig) -> Self {
        Self {
            connection: Connection::spawn(config.connection),
            parser: TelemetryParser::new(),
            tracker: PositionTracker::new(),
        }
    }

    /// Process connection events until one becomes an externally visible
    /// client event.
    ///
    /// Returns `None` once the connection has shut down.
    pub async fn process_next(&mut self) -> Option<ClientEvent> {
        loop {
            match self.connection.recv().await? {
                ConnectionEvent::StateChanged(state) => {
                    return Some(ClientEvent::StateChanged(state));
                }
                ConnectionEvent::FrameReceived(frame) => {
                    match self.parser.parse(frame.as_bytes()) {
                        Ok(Some(fix)) => {
                            self.tracker.update(fix);
                            return Some(ClientEvent::PositionUpdated(fix));
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!("Dropping malformed telemetry frame: {}", e);
                        }
                    }
                }
            }
        }
    }

    /// Get the most recent position fix, if any.
    #[must_use]
    pub fn latest_position(&self) -> Option<AircraftPosition> {
        self.tracker.latest()
    }

    /// Total fixes received this session.
    #[must_use]
    pub fn fix_count(&self) -> u64 {
        self.tracker.fix_count()
    }

    /// Get the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Get a cloneable outbound handle for best-effort publishing.
    #[must_use]
    pub fn uplink(&self) -> Uplink {
        self.connection.uplink()
    }

    /// Send one text frame, best-effort (dropped while not open).
    pub fn send(&self, frame: &str) {
        self.connection.send(frame);
    }

    /// Shut down the client and cancel any pending reconnect.
    pub fn shutdown(&self) {
        self.connection.shutdown();
    }
}
