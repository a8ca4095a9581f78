//! Static infrastructure types: sections, tracks, and signals.
//!
//! Section occupancy is deliberately NOT part of [`Section`]; the occupancy
//! table owns the section-to-occupants mapping exclusively so that capacity
//! checks have a single source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{SectionId, SignalId, TrackId};

/// Operational status of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    Active,
    Maintenance,
    Blocked,
}

impl TrackStatus {
    /// Returns true if trains may be routed over this track.
    ///
    /// Maintenance and blocked tracks are both excluded from routing
    /// candidates; the distinction only matters for display and for which
    /// override command reopens them.
    pub fn is_routable(&self) -> bool {
        matches!(self, TrackStatus::Active)
    }
}

/// A physical track within a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,

    /// Display name (e.g. "Main Line UP").
    pub name: String,

    pub status: TrackStatus,

    /// Length in kilometres.
    pub length_km: f64,

    /// Permitted maximum speed in km/h.
    pub max_speed_kmh: u32,
}

/// Aspect shown by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Green,
    Yellow,
    Red,
}

/// A lineside signal within a section.
///
/// Signals are advisory state: they are mutated only on the single-writer
/// path, either by a manual override command or by the protective drop to
/// red that accompanies conflict detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,

    /// Display name (e.g. "NDLS Outer Signal").
    pub name: String,

    /// The section this signal protects.
    pub section: SectionId,

    pub status: SignalStatus,

    /// When the aspect last changed.
    pub last_updated: DateTime<Utc>,
}

impl Signal {
    /// Changes the aspect and stamps the update time.
    pub fn set_status(&mut self, status: SignalStatus, now: DateTime<Utc>) {
        self.status = status;
        self.last_updated = now;
    }
}

/// Static definition of a block section.
///
/// Capacity is the maximum number of trains the section may hold
/// simultaneously; the occupancy table enforces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,

    /// Display name (e.g. "New Delhi - Ghaziabad").
    pub name: String,

    /// Maximum simultaneous trains. Always at least 1.
    pub capacity: usize,

    /// Tracks within this section, in layout order.
    pub tracks: Vec<Track>,
}

impl Section {
    /// Returns true if at least one track is open to traffic.
    pub fn has_routable_track(&self) -> bool {
        self.tracks.iter().any(|t| t.status.is_routable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, status: TrackStatus) -> Track {
        Track {
            id: TrackId::new(id),
            name: "Main Line".to_string(),
            status,
            length_km: 22.5,
            max_speed_kmh: 130,
        }
    }

    #[test]
    fn only_active_tracks_are_routable() {
        assert!(TrackStatus::Active.is_routable());
        assert!(!TrackStatus::Maintenance.is_routable());
        assert!(!TrackStatus::Blocked.is_routable());
    }

    #[test]
    fn section_routable_when_any_track_open() {
        let section = Section {
            id: SectionId::new("NDLS-GZB"),
            name: "New Delhi - Ghaziabad".to_string(),
            capacity: 8,
            tracks: vec![
                track("TRK001", TrackStatus::Blocked),
                track("TRK002", TrackStatus::Active),
            ],
        };
        assert!(section.has_routable_track());
    }

    #[test]
    fn section_unroutable_when_all_tracks_closed() {
        let section = Section {
            id: SectionId::new("NDLS-GZB"),
            name: "New Delhi - Ghaziabad".to_string(),
            capacity: 8,
            tracks: vec![
                track("TRK001", TrackStatus::Blocked),
                track("TRK002", TrackStatus::Maintenance),
            ],
        };
        assert!(!section.has_routable_track());
    }

    #[test]
    fn signal_set_status_stamps_time() {
        let t0 = Utc::now();
        let mut signal = Signal {
            id: SignalId::new("SIG001"),
            name: "NDLS Outer Signal".to_string(),
            section: SectionId::new("NDLS-GZB"),
            status: SignalStatus::Green,
            last_updated: t0,
        };
        let t1 = t0 + chrono::Duration::seconds(30);
        signal.set_status(SignalStatus::Red, t1);
        assert_eq!(signal.status, SignalStatus::Red);
        assert_eq!(signal.last_updated, t1);
    }

    #[test]
    fn status_serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&TrackStatus::Maintenance).unwrap(),
            "\"maintenance\""
        );
        assert_eq!(
            serde_json::to_string(&SignalStatus::Yellow).unwrap(),
            "\"yellow\""
        );
    }
}
