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

//! Position-triple telemetry parser.
//!
//! Parses the comma-delimited position frames produced by the simulator
//! bridge:
//!
//! ```text
//! <lat>,<lon>,<heading>
//! ```
//!
//! All three fields are decimal numbers. Frames with a different field count
//! (status chatter from the bridge, blank keepalives) produce no message;
//! frames with the right shape but non-numeric fields are an error the caller
//! is expected to drop without tearing down the connection.

use super::{AircraftPosition, ParseError, Protocol};

/// Parser for `"lat,lon,heading"` position frames.
#[derive(Debug, Default)]
pub struct TelemetryParser;

impl TelemetryParser {
    /// Create a new telemetry parser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Protocol for TelemetryParser {
    type Message = AircraftPosition;
    type Error = ParseError;

    fn parse(&mut self, input: &[u8]) -> Result<Option<AircraftPosition>, ParseError> {
        let line = std::str::from_utf8(input)
            .map_err(|_| ParseError::InvalidFormat("invalid UTF-8".to_string()))?;

        parse_position_line(line)
    }
}

/// Parse a numeric field, mapping failures to a field-tagged error.
fn parse_field(field: &'static str, value: &str) -> Result<f64, ParseError> {
    value.trim().parse::<f64>().map_err(|_| ParseError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

/// Parse a single position frame.
fn parse_position_line(line: &str) -> Result<Option<AircraftPosition>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let parts: Vec<&str> = line.split(',').collect();

    // Anything that is not a triple is bridge chatter, not a position fix
    if parts.len() != 3 {
        return Ok(None);
    }

    let latitude = parse_field("latitude", parts[0])?;
    let longitude = parse_field("longitude", parts[1])?;
    let heading = parse_field("heading", parts[2])?;

    Ok(Some(AircraftPosition {
        latitude,
        longitude,
        heading: heading.rem_euclid(360.0),
    }))
}
