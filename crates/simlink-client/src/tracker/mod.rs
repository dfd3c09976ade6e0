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

//! Latest-position tracking.
//!
//! The map companion cares about exactly one aircraft: the one flying the
//! session. The tracker keeps the most recent fix (last-write-wins, arrival
//! order) and never resets it on its own — a dropped link leaves the last
//! known position on the map until fresh data arrives.

use chrono::{DateTime, Utc};

use crate::protocol::AircraftPosition;

/// Tracker for the ownship position.
#[derive(Debug, Default)]
pub struct PositionTracker {
    latest: Option<AircraftPosition>,
    last_fix_at: Option<DateTime<Utc>>,
    fix_count: u64,
}

impl PositionTracker {
    /// Create a tracker with no known position.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new fix, replacing the previous one.
    pub fn update(&mut self, fix: AircraftPosition) {
        self.latest = Some(fix);
        self.last_fix_at = Some(Utc::now());
        self.fix_count += 1;
    }

    /// Get the most recent fix, if any has arrived this session.
    #[must_use]
    pub fn latest(&self) -> Option<AircraftPosition> {
        self.latest
    }

    /// Timestamp of the most recent fix.
    #[must_use]
    pub fn last_fix_at(&self) -> Option<DateTime<Utc>> {
        self.last_fix_at
    }

    /// Total fixes received this session.
    #[must_use]
    pub fn fix_count(&self) -> u64 {
        self.fix_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut tracker = PositionTracker::new();
        assert!(tracker.latest().is_none());

        tracker.update(AircraftPosition {
            latitude: 42.2451,
            longitude: -83.5354,
            heading: 90.0,
        });
        tracker.update(AircraftPosition {
            latitude: 42.2460,
            longitude: -83.5340,
            heading: 91.0,
        });

        let latest = tracker.latest().unwrap();
        assert!((latest.latitude - 42.2460).abs() < 1e-9);
        assert!((latest.longitude - (-83.5340)).abs() < 1e-9);
        assert_eq!(tracker.fix_count(), 2);
    }

    #[test]
    fn test_position_retained_until_new_fix() {
        let mut tracker = PositionTracker::new();
        tracker.update(AircraftPosition {
            latitude: 42.2451,
            longitude: -83.5354,
            heading: 90.0,
        });

        // Nothing else touches the tracker (e.g. during a connection gap);
        // the last fix must survive
        let latest = tracker.latest().unwrap();
        assert!((latest.latitude - 42.2451).abs() < 1e-9);
        assert!((latest.longitude - (-83.5354)).abs() < 1e-9);
        assert!((latest.heading - 90.0).abs() < 1e-9);
        assert!(tracker.last_fix_at().is_some());
    }
}
