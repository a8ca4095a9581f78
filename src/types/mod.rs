//! Core domain types for the scheduler.
//!
//! This module contains the data model shared across components: typed
//! identifiers, infrastructure definitions, train records, and
//! recommendations. Derived data (conflicts, KPI snapshots) lives with the
//! components that compute it.

mod ids;
mod infrastructure;
mod recommendation;
mod train;

pub use ids::{RecommendationId, RequestId, SectionId, SignalId, TrackId, TrainId};
pub use infrastructure::{Section, Signal, SignalStatus, Track, TrackStatus};
pub use recommendation::{
    EstimatedSavings, Priority, Recommendation, RecommendationAction, RecommendationStatus,
};
pub use train::{DisplayStatus, PositionState, ServiceClass, Train};
