//! Conflict detection over occupancy and incoming routes.
//!
//! Detection is a pure read of the network state: it never mutates trains,
//! occupancy, or signals. Protective signal drops are *proposed* in the
//! report and applied by the single-writer worker, which keeps the ownership
//! rules simple (only the applier path mutates) without losing the automatic
//! red-drop behaviour.
//!
//! Detection runs on every occupancy-changed event, with a periodic tick as
//! a fallback for idle periods.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::state::NetworkState;
use crate::types::{SectionId, Train, TrainId};

/// How far ahead (in route hops) a train's path is scanned for contested
/// sections.
pub const DEFAULT_LOOKAHEAD_HOPS: usize = 3;

/// Severity bucket of a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A contested section: at capacity, with more traffic inbound.
///
/// Conflicts are derived data, recomputed each evaluation cycle and never
/// stored as owned entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub section: SectionId,

    /// Trains currently holding the section, in id order.
    pub occupants: Vec<TrainId>,

    /// Inbound trains contesting entry, highest priority first (see
    /// [`contest_order`]).
    pub contestants: Vec<TrainId>,

    /// Hops until the nearest contestant reaches the section.
    pub time_to_contact_hops: usize,

    pub severity: Severity,

    /// Numeric score behind the severity bucket; higher is worse.
    pub score: f64,

    pub detected_at: DateTime<Utc>,
}

impl Conflict {
    /// The highest-priority contesting train.
    pub fn priority_train(&self) -> Option<&TrainId> {
        self.contestants.first()
    }
}

/// Everything one detection pass found.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionReport {
    pub conflicts: Vec<Conflict>,

    /// Sections whose signals should drop to red as a protective measure.
    /// The worker applies these; detection itself never mutates.
    pub protect_sections: Vec<SectionId>,
}

impl DetectionReport {
    pub fn is_clear(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Deterministic priority order between two trains contesting a section.
///
/// Higher passenger count wins; ties go to the lower current delay; the
/// train id is the final tie-break. The result is total and reproducible
/// across runs, so every decision downstream of it is explainable.
pub fn contest_order(a: &Train, b: &Train) -> Ordering {
    b.passengers
        .cmp(&a.passengers)
        .then(a.delay_minutes.cmp(&b.delay_minutes))
        .then(a.id.cmp(&b.id))
}

/// Hops until `train` reaches `section` along its remaining route, if it
/// does within `horizon` hops. A train already in the section returns
/// `None`; it is an occupant, not a contestant.
fn hops_until(train: &Train, section: &SectionId, horizon: usize) -> Option<usize> {
    if !train.position.is_active() {
        return None;
    }
    let next_index = match train.position {
        crate::types::PositionState::InSection => train.route_index + 1,
        _ => train.route_index,
    };
    train
        .route
        .iter()
        .enumerate()
        .skip(next_index)
        .take(horizon)
        .find(|(_, s)| *s == section)
        .map(|(i, _)| i - next_index + 1)
}

fn score_and_severity(utilization: f64, time_to_contact: usize, horizon: usize) -> (f64, Severity) {
    // Utilization is 100 at detection time by construction; the inbound
    // pressure term dominates the ranking between conflicts.
    let pressure = (horizon.saturating_sub(time_to_contact) + 1) as f64 * 10.0;
    let score = utilization + pressure;
    let severity = match time_to_contact {
        0 | 1 => Severity::High,
        2 => Severity::Medium,
        _ => Severity::Low,
    };
    (score, severity)
}

/// Scans the network for contested sections.
///
/// A section conflicts when it is at capacity and at least one additional
/// train's route reaches it within `horizon` hops. Output order is
/// deterministic: sections in id order, contestants in [`contest_order`].
pub fn detect(state: &NetworkState, horizon: usize, now: DateTime<Utc>) -> DetectionReport {
    let mut report = DetectionReport::default();

    for section in state.graph.sections() {
        let Ok(at_capacity) = state.occupancy.is_at_capacity(&section.id) else {
            continue;
        };
        if !at_capacity {
            continue;
        }

        let mut contestants: Vec<(&Train, usize)> = state
            .trains
            .values()
            .filter_map(|t| hops_until(t, &section.id, horizon).map(|h| (t, h)))
            .collect();
        if contestants.is_empty() {
            continue;
        }
        contestants.sort_by(|(a, _), (b, _)| contest_order(a, b));

        let time_to_contact = contestants
            .iter()
            .map(|(_, h)| *h)
            .min()
            .unwrap_or(horizon);
        let utilization = state.occupancy.utilization(&section.id).unwrap_or(100.0);
        let (score, severity) = score_and_severity(utilization, time_to_contact, horizon);

        let occupants = state
            .occupancy
            .occupants(&section.id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();

        report.protect_sections.push(section.id.clone());
        report.conflicts.push(Conflict {
            section: section.id.clone(),
            occupants,
            contestants: contestants.into_iter().map(|(t, _)| t.id.clone()).collect(),
            time_to_contact_hops: time_to_contact,
            severity,
            score,
            detected_at: now,
        });
    }

    report
}
