//! The owned, authoritative network state.
//!
//! One [`NetworkState`] exists per region, owned by the scheduler worker.
//! All mutation flows through the command applier or the transition
//! functions; readers receive cloned snapshots. There is no ambient global
//! state anywhere in the crate — every read/derive operation takes the state
//! explicitly.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::TrackGraph;
use crate::occupancy::OccupancyTable;
use crate::types::{
    Recommendation, RecommendationId, RecommendationStatus, SectionId, Signal, SignalId,
    SignalStatus, Train, TrainId,
};

/// The complete mutable state of one network region.
///
/// `version` increases on every mutation batch; recommendations record the
/// version they were computed against so staleness is detectable at accept
/// time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkState {
    pub graph: TrackGraph,
    pub occupancy: OccupancyTable,
    pub trains: BTreeMap<TrainId, Train>,
    pub signals: BTreeMap<SignalId, Signal>,
    pub recommendations: BTreeMap<RecommendationId, Recommendation>,

    /// Monotonic mutation counter.
    pub version: u64,

    /// Next recommendation id to assign.
    next_recommendation: u64,

    /// Trains that have completed their route, for throughput KPIs.
    pub departed_count: u64,
}

impl NetworkState {
    /// Creates state for a region from its static graph, initial trains, and
    /// signals. Trains start unplaced; occupancy fills in as they enter.
    pub fn new(graph: TrackGraph, trains: Vec<Train>, signals: Vec<Signal>) -> Self {
        let occupancy = OccupancyTable::new(&graph);
        NetworkState {
            graph,
            occupancy,
            trains: trains.into_iter().map(|t| (t.id.clone(), t)).collect(),
            signals: signals.into_iter().map(|s| (s.id.clone(), s)).collect(),
            recommendations: BTreeMap::new(),
            version: 0,
            next_recommendation: 1,
            departed_count: 0,
        }
    }

    /// Records that a mutation batch happened.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    pub fn train(&self, id: &TrainId) -> Option<&Train> {
        self.trains.get(id)
    }

    pub fn train_mut(&mut self, id: &TrainId) -> Option<&mut Train> {
        self.trains.get_mut(id)
    }

    /// Allocates the next recommendation id.
    pub fn allocate_recommendation_id(&mut self) -> RecommendationId {
        let id = RecommendationId(self.next_recommendation);
        self.next_recommendation += 1;
        id
    }

    /// Inserts freshly generated recommendations, expiring any still-pending
    /// ones for the same sections: a newer evaluation supersedes them.
    pub fn replace_recommendations_for(
        &mut self,
        sections: &[SectionId],
        fresh: Vec<Recommendation>,
    ) {
        for rec in self.recommendations.values_mut() {
            if rec.status == RecommendationStatus::Pending && sections.contains(&rec.section) {
                rec.status = RecommendationStatus::Expired;
            }
        }
        for rec in fresh {
            self.recommendations.insert(rec.id, rec);
        }
    }

    /// Expires pending recommendations whose deadline has passed.
    ///
    /// Returns the ids that expired, for audit logging.
    pub fn expire_stale_recommendations(&mut self, now: DateTime<Utc>) -> Vec<RecommendationId> {
        let mut expired = Vec::new();
        for rec in self.recommendations.values_mut() {
            if rec.is_past_deadline(now) {
                rec.status = RecommendationStatus::Expired;
                expired.push(rec.id);
            }
        }
        expired
    }

    /// Pending recommendations, best first (confidence, then time savings).
    pub fn active_recommendations(&self) -> Vec<&Recommendation> {
        let mut active: Vec<&Recommendation> = self
            .recommendations
            .values()
            .filter(|r| r.status == RecommendationStatus::Pending)
            .collect();
        active.sort_by(|a, b| {
            b.confidence
                .cmp(&a.confidence)
                .then(b.savings.time_minutes.cmp(&a.savings.time_minutes))
                .then(a.id.cmp(&b.id))
        });
        active
    }

    /// Drops all signals protecting `section` to red, stamping `now`.
    ///
    /// Returns the ids of signals that actually changed aspect.
    pub fn drop_signals_to_red(
        &mut self,
        section: &SectionId,
        now: DateTime<Utc>,
    ) -> Vec<SignalId> {
        let mut changed = Vec::new();
        for signal in self.signals.values_mut() {
            if &signal.section == section && signal.status != SignalStatus::Red {
                signal.set_status(SignalStatus::Red, now);
                changed.push(signal.id.clone());
            }
        }
        changed
    }
}
