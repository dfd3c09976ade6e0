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

//! Protocol layer for simulator telemetry parsing.
//!
//! The moving-map feed delivers one text frame per position fix in the form
//! `"<lat>,<lon>,<heading>"`. This module provides a trait-based abstraction
//! so other frame formats can be added behind the same seam.

mod telemetry;

pub use telemetry::TelemetryParser;

use thiserror::Error;

/// Errors that can occur during frame parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid frame format: {0}")]
    InvalidFormat(String),

    #[error("invalid value for field '{field}': {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Latest-known aircraft position as delivered by the telemetry feed.
///
/// Heading is in degrees, normalized to `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AircraftPosition {
    /// Latitude in degrees (WGS84).
    pub latitude: f64,
    /// Longitude in degrees (WGS84).
    pub longitude: f64,
    /// True heading in degrees.
    pub heading: f64,
}

/// Trait for telemetry frame parsers.
///
/// Implement this trait to add support for new feed formats.
pub trait Protocol {
    /// The message type produced by this parser.
    type Message;
    /// The error type for parsing failures.
    type Error;

    /// Parse input bytes into a message.
    ///
    /// Returns `Ok(Some(message))` if parsing succeeded,
    /// `Ok(None)` if the input is valid but doesn't produce a message,
    /// or `Err(error)` if parsing failed.
    fn parse(&mut self, input: &[u8]) -> Result<Option<Self::Message>, Self::Error>;
}
