//! Network performance indicators derived from a state snapshot.
//!
//! Everything here is a pure read over [`NetworkState`]; nothing is stored.
//!
//! # Formulas
//!
//! - **Punctuality**: share of trains (all lifecycle states) with delay at
//!   or under the configured threshold, as a percentage. An empty network
//!   is 100% punctual.
//! - **Average delay**: arithmetic mean of delay minutes across all trains.
//! - **Throughput**: trains that have completed their route since startup.
//! - **Utilization**: mean section occupancy as a percentage of capacity.
//! - **Efficiency**: weighted blend of punctuality (60%) and a delay score
//!   (40%) that maps an average delay of 0..=60 minutes onto 100..=0.

use serde::{Deserialize, Serialize};

use crate::state::NetworkState;

/// Average delay (minutes) at which the delay score bottoms out.
const DELAY_SCORE_CEILING_MINUTES: f64 = 60.0;

/// A point-in-time KPI snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub punctuality_percent: f64,
    pub average_delay_minutes: f64,
    pub throughput: u64,
    pub utilization_percent: f64,
    pub efficiency_percent: f64,
}

/// Computes the KPI snapshot for a state.
///
/// `punctuality_threshold_minutes` is the delay at or under which a train
/// still counts as punctual.
pub fn compute(state: &NetworkState, punctuality_threshold_minutes: u32) -> KpiSnapshot {
    let total = state.trains.len();

    let (punctuality_percent, average_delay_minutes) = if total == 0 {
        (100.0, 0.0)
    } else {
        let punctual = state
            .trains
            .values()
            .filter(|t| t.delay_minutes <= punctuality_threshold_minutes)
            .count();
        let delay_sum: u64 = state.trains.values().map(|t| u64::from(t.delay_minutes)).sum();
        (
            punctual as f64 / total as f64 * 100.0,
            delay_sum as f64 / total as f64,
        )
    };

    let delay_score =
        100.0 * (1.0 - (average_delay_minutes / DELAY_SCORE_CEILING_MINUTES).min(1.0));
    let efficiency_percent = punctuality_percent * 0.6 + delay_score * 0.4;

    KpiSnapshot {
        punctuality_percent,
        average_delay_minutes,
        throughput: state.departed_count,
        utilization_percent: state.occupancy.mean_utilization(),
        efficiency_percent,
    }
}
