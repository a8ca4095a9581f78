//! Train record and lifecycle types.
//!
//! A train's position state (scheduled, approaching, in-section, departed) is
//! modelled separately from its delay. Delay is an attribute in minutes, not
//! an exclusive state: a train can be in-section and delayed at the same
//! time, and collapsing the two into one enum would blow up combinatorially.
//! The dashboard-facing `display_status` derives the familiar five-way label
//! from the pair.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::ids::{SectionId, TrainId};

/// Where a train is in its lifecycle, independent of delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    /// Timetabled but not yet running.
    Scheduled,

    /// Running towards the first section of its route.
    Approaching,

    /// Occupying a section on its route.
    InSection,

    /// Cleared the final section of its route.
    Departed,
}

impl PositionState {
    /// Returns true if the train currently occupies a section.
    pub fn occupies_section(&self) -> bool {
        matches!(self, PositionState::InSection)
    }

    /// Returns true if the train still participates in scheduling.
    pub fn is_active(&self) -> bool {
        !matches!(self, PositionState::Departed)
    }
}

/// The five-way status label shown by the dashboard.
///
/// Derived, never stored: `delayed` is position state plus nonzero delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayStatus {
    Scheduled,
    Approaching,
    OnTime,
    Delayed,
    Departed,
}

/// Service class of a train. Affects nothing in the core except operator
/// context; priority between contesting trains is decided by passenger count
/// and delay, not class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceClass {
    Express,
    Passenger,
    Goods,
}

/// A train known to the scheduler.
///
/// IMPORTANT: `route_index` only ever increases; backwards movement is
/// impossible without an explicit reroute command, which replaces the route
/// and resets the index. `current_section()` is always the route entry at
/// `route_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Train {
    /// Operating number, unique within the region.
    pub id: TrainId,

    /// Human-facing service name (e.g. "Rajdhani Express").
    pub name: String,

    pub class: ServiceClass,

    /// Lifecycle position, orthogonal to delay.
    pub position: PositionState,

    /// Ordered section ids from origin to destination. Never empty.
    pub route: Vec<SectionId>,

    /// Index into `route` of the section the train is at (or will enter
    /// next, while `Scheduled`/`Approaching`). Monotonic.
    pub route_index: usize,

    /// Current speed in km/h.
    pub speed_kmh: u32,

    /// Accumulated delay in minutes. Never negative by construction.
    pub delay_minutes: u32,

    /// Passengers on board; the primary tie-break input for conflicts.
    pub passengers: u32,

    /// Timetabled arrival at the destination.
    pub scheduled_arrival: NaiveTime,
}

impl Train {
    /// Creates a scheduled train at the start of its route.
    ///
    /// Returns `None` if `route` is empty; a train with nowhere to go is a
    /// data error the caller must surface.
    pub fn new(
        id: TrainId,
        name: impl Into<String>,
        class: ServiceClass,
        route: Vec<SectionId>,
        passengers: u32,
        scheduled_arrival: NaiveTime,
    ) -> Option<Self> {
        if route.is_empty() {
            return None;
        }
        Some(Train {
            id,
            name: name.into(),
            class,
            position: PositionState::Scheduled,
            route,
            route_index: 0,
            speed_kmh: 0,
            delay_minutes: 0,
            passengers,
            scheduled_arrival,
        })
    }

    /// The section the train currently occupies, if it occupies one.
    pub fn current_section(&self) -> Option<&SectionId> {
        if self.position.occupies_section() {
            self.route.get(self.route_index)
        } else {
            None
        }
    }

    /// The next section on the route, if any remain.
    pub fn next_section(&self) -> Option<&SectionId> {
        match self.position {
            PositionState::Scheduled | PositionState::Approaching => {
                self.route.get(self.route_index)
            }
            PositionState::InSection => self.route.get(self.route_index + 1),
            PositionState::Departed => None,
        }
    }

    /// Remaining hops until the end of the route.
    pub fn remaining_hops(&self) -> usize {
        if self.position == PositionState::Departed {
            0
        } else {
            self.route.len().saturating_sub(self.route_index + 1)
        }
    }

    /// True if the train is at the final section of its route.
    pub fn at_final_section(&self) -> bool {
        self.position.occupies_section() && self.route_index + 1 == self.route.len()
    }

    /// Estimated arrival: scheduled arrival shifted by the current delay.
    pub fn estimated_arrival(&self) -> NaiveTime {
        self.scheduled_arrival + chrono::Duration::minutes(i64::from(self.delay_minutes))
    }

    /// The dashboard-facing status label.
    pub fn display_status(&self) -> DisplayStatus {
        match self.position {
            PositionState::Scheduled => DisplayStatus::Scheduled,
            PositionState::Approaching => DisplayStatus::Approaching,
            PositionState::Departed => DisplayStatus::Departed,
            PositionState::InSection => {
                if self.delay_minutes > 0 {
                    DisplayStatus::Delayed
                } else {
                    DisplayStatus::OnTime
                }
            }
        }
    }

    /// Adds delay minutes. Saturates instead of wrapping; a train more than
    /// `u32::MAX` minutes late has bigger problems than arithmetic.
    pub fn add_delay(&mut self, minutes: u32) {
        self.delay_minutes = self.delay_minutes.saturating_add(minutes);
    }
}
