//! Section occupancy tracking with capacity enforcement.
//!
//! The table exclusively owns the section-to-occupants mapping. Every
//! successful `enter`/`leave` returns an [`OccupancyEvent`] which the worker
//! forwards to the conflict detector, so detection is event-driven rather
//! than purely tick-based.
//!
//! Capacity checks and updates happen on the single-writer path; there is no
//! window in which two concurrent `enter` calls can both observe spare
//! capacity.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::TrackGraph;
use crate::types::{SectionId, TrainId};

/// Errors from occupancy mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OccupancyError {
    /// The section already holds `capacity` trains. An expected operational
    /// condition: the caller turns it into delay, not a crash.
    #[error("section {section} is at capacity ({capacity})")]
    CapacityExceeded {
        section: SectionId,
        capacity: usize,
    },

    /// `leave` was called for a train that is not in the section. This is a
    /// logic-bug signal, not a retryable condition.
    #[error("train {train} is not occupying section {section}")]
    NotOccupying {
        train: TrainId,
        section: SectionId,
    },

    /// The section id was never registered with the track graph.
    #[error("unknown section: {0}")]
    UnknownSection(SectionId),
}

/// Result type for occupancy operations.
pub type Result<T> = std::result::Result<T, OccupancyError>;

/// What changed in a section's occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyChange {
    Entered,
    Left,
}

/// Emitted on every successful occupancy mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyEvent {
    pub section: SectionId,
    pub train: TrainId,
    pub change: OccupancyChange,

    /// Occupant count after the change.
    pub occupants: usize,
}

/// The section-to-occupants table.
///
/// INVARIANT: for every section, `occupants.len() <= capacity`. `enter` is
/// the only code path that grows an occupant set and it checks capacity
/// first, so the invariant cannot be violated without bypassing this module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyTable {
    occupants: BTreeMap<SectionId, BTreeSet<TrainId>>,
    capacities: BTreeMap<SectionId, usize>,
}

impl OccupancyTable {
    /// Builds an empty table covering every section of the graph.
    pub fn new(graph: &TrackGraph) -> Self {
        let mut occupants = BTreeMap::new();
        let mut capacities = BTreeMap::new();
        for section in graph.sections() {
            occupants.insert(section.id.clone(), BTreeSet::new());
            capacities.insert(section.id.clone(), section.capacity);
        }
        OccupancyTable {
            occupants,
            capacities,
        }
    }

    /// Admits a train into a section.
    ///
    /// Fails with [`OccupancyError::CapacityExceeded`] when the section is
    /// full. On success returns the event describing the new occupancy.
    pub fn enter(&mut self, train: &TrainId, section: &SectionId) -> Result<OccupancyEvent> {
        let capacity = self.capacity(section)?;
        let set = self
            .occupants
            .get_mut(section)
            .ok_or_else(|| OccupancyError::UnknownSection(section.clone()))?;

        if set.len() >= capacity {
            return Err(OccupancyError::CapacityExceeded {
                section: section.clone(),
                capacity,
            });
        }

        set.insert(train.clone());
        Ok(OccupancyEvent {
            section: section.clone(),
            train: train.clone(),
            change: OccupancyChange::Entered,
            occupants: set.len(),
        })
    }

    /// Removes a train from a section.
    ///
    /// Fails with [`OccupancyError::NotOccupying`] if the train is not
    /// there; callers treat that as a bug, never as something to retry.
    pub fn leave(&mut self, train: &TrainId, section: &SectionId) -> Result<OccupancyEvent> {
        let set = self
            .occupants
            .get_mut(section)
            .ok_or_else(|| OccupancyError::UnknownSection(section.clone()))?;

        if !set.remove(train) {
            return Err(OccupancyError::NotOccupying {
                train: train.clone(),
                section: section.clone(),
            });
        }

        Ok(OccupancyEvent {
            section: section.clone(),
            train: train.clone(),
            change: OccupancyChange::Left,
            occupants: set.len(),
        })
    }

    /// Occupants of a section, in deterministic train-id order.
    pub fn occupants(&self, section: &SectionId) -> Result<&BTreeSet<TrainId>> {
        self.occupants
            .get(section)
            .ok_or_else(|| OccupancyError::UnknownSection(section.clone()))
    }

    /// Occupant count of a section.
    pub fn occupant_count(&self, section: &SectionId) -> Result<usize> {
        Ok(self.occupants(section)?.len())
    }

    fn capacity(&self, section: &SectionId) -> Result<usize> {
        self.capacities
            .get(section)
            .copied()
            .ok_or_else(|| OccupancyError::UnknownSection(section.clone()))
    }

    /// Occupancy as a percentage of capacity.
    ///
    /// Used by both the UI views and the conflict detector's severity
    /// scoring.
    pub fn utilization(&self, section: &SectionId) -> Result<f64> {
        let capacity = self.capacity(section)?;
        let count = self.occupant_count(section)?;
        if capacity == 0 {
            return Ok(0.0);
        }
        Ok(count as f64 / capacity as f64 * 100.0)
    }

    /// True when the section cannot admit another train.
    pub fn is_at_capacity(&self, section: &SectionId) -> Result<bool> {
        Ok(self.occupant_count(section)? >= self.capacity(section)?)
    }

    /// Average utilization across all sections, for the KPI snapshot.
    pub fn mean_utilization(&self) -> f64 {
        if self.capacities.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .capacities
            .keys()
            .map(|id| self.utilization(id).unwrap_or(0.0))
            .sum();
        total / self.capacities.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Section, Track, TrackId, TrackStatus};
    use proptest::prelude::*;

    fn graph_with_capacity(capacity: usize) -> TrackGraph {
        TrackGraph::new(
            vec![Section {
                id: SectionId::new("NDLS-GZB"),
                name: "New Delhi - Ghaziabad".to_string(),
                capacity,
                tracks: vec![Track {
                    id: TrackId::new("TRK001"),
                    name: "Main Line UP".to_string(),
                    status: TrackStatus::Active,
                    length_km: 22.5,
                    max_speed_kmh: 130,
                }],
            }],
            vec![],
        )
        .unwrap()
    }

    fn train(n: usize) -> TrainId {
        TrainId::new(format!("{:05}", n))
    }

    #[test]
    fn enter_returns_growing_count() {
        let mut table = OccupancyTable::new(&graph_with_capacity(3));
        let section = SectionId::new("NDLS-GZB");

        let e1 = table.enter(&train(1), &section).unwrap();
        assert_eq!(e1.occupants, 1);
        assert_eq!(e1.change, OccupancyChange::Entered);

        let e2 = table.enter(&train(2), &section).unwrap();
        assert_eq!(e2.occupants, 2);
    }

    #[test]
    fn ninth_train_into_capacity_eight_fails() {
        let mut table = OccupancyTable::new(&graph_with_capacity(8));
        let section = SectionId::new("NDLS-GZB");

        for n in 1..=8 {
            table.enter(&train(n), &section).unwrap();
        }
        assert!(table.is_at_capacity(&section).unwrap());

        let err = table.enter(&train(9), &section).unwrap_err();
        assert_eq!(
            err,
            OccupancyError::CapacityExceeded {
                section: section.clone(),
                capacity: 8,
            }
        );
        // The failed enter changed nothing.
        assert_eq!(table.occupant_count(&section).unwrap(), 8);
    }

    #[test]
    fn leave_of_absent_train_is_not_occupying() {
        let mut table = OccupancyTable::new(&graph_with_capacity(2));
        let section = SectionId::new("NDLS-GZB");

        let err = table.leave(&train(1), &section).unwrap_err();
        assert_eq!(
            err,
            OccupancyError::NotOccupying {
                train: train(1),
                section: section.clone(),
            }
        );
    }

    #[test]
    fn leave_frees_capacity() {
        let mut table = OccupancyTable::new(&graph_with_capacity(1));
        let section = SectionId::new("NDLS-GZB");

        table.enter(&train(1), &section).unwrap();
        assert!(table.enter(&train(2), &section).is_err());

        let event = table.leave(&train(1), &section).unwrap();
        assert_eq!(event.occupants, 0);
        assert!(table.enter(&train(2), &section).is_ok());
    }

    #[test]
    fn unknown_section_everywhere() {
        let mut table = OccupancyTable::new(&graph_with_capacity(1));
        let missing = SectionId::new("ZZZ");
        assert!(matches!(
            table.enter(&train(1), &missing),
            Err(OccupancyError::UnknownSection(_))
        ));
        assert!(matches!(
            table.leave(&train(1), &missing),
            Err(OccupancyError::UnknownSection(_))
        ));
        assert!(matches!(
            table.utilization(&missing),
            Err(OccupancyError::UnknownSection(_))
        ));
    }

    #[test]
    fn utilization_is_percentage() {
        let mut table = OccupancyTable::new(&graph_with_capacity(8));
        let section = SectionId::new("NDLS-GZB");
        assert_eq!(table.utilization(&section).unwrap(), 0.0);

        for n in 1..=4 {
            table.enter(&train(n), &section).unwrap();
        }
        assert_eq!(table.utilization(&section).unwrap(), 50.0);
    }

    proptest! {
        /// Capacity is never exceeded no matter the interleaving of enters
        /// and leaves.
        #[test]
        fn occupants_never_exceed_capacity(
            capacity in 1usize..10,
            ops in prop::collection::vec((0usize..20, prop::bool::ANY), 0..60),
        ) {
            let mut table = OccupancyTable::new(&graph_with_capacity(capacity));
            let section = SectionId::new("NDLS-GZB");

            for (n, is_enter) in ops {
                if is_enter {
                    let _ = table.enter(&train(n), &section);
                } else {
                    let _ = table.leave(&train(n), &section);
                }
                prop_assert!(table.occupant_count(&section).unwrap() <= capacity);
            }
        }

        /// enter then leave is a no-op on the occupant set.
        #[test]
        fn enter_leave_roundtrip(capacity in 1usize..10) {
            let mut table = OccupancyTable::new(&graph_with_capacity(capacity));
            let section = SectionId::new("NDLS-GZB");

            table.enter(&train(1), &section).unwrap();
            table.leave(&train(1), &section).unwrap();
            prop_assert_eq!(table.occupant_count(&section).unwrap(), 0);
        }
    }
}
