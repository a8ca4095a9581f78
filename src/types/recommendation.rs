//! Recommendation types produced by the advisory engine.
//!
//! A recommendation is a proposal, never a mutation: it is created by the
//! engine, and only an explicit accept/reject command moves it out of
//! `Pending`. Recommendations carry enough of the state they were computed
//! against (state version and occupant count) for the applier to detect
//! staleness at accept time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{RecommendationId, SectionId, TrainId};

/// Urgency bucket shown to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Lifecycle of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    /// Awaiting a controller (or auto-accept policy) decision.
    Pending,

    /// Accepted and applied.
    Accepted,

    /// Explicitly rejected by a controller.
    Rejected,

    /// Superseded by a newer evaluation for the same section, or past its
    /// deadline.
    Expired,
}

/// What the engine proposes to do, with the parameters needed to apply it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecommendationAction {
    /// Divert the train onto a replacement route.
    Reroute {
        /// Full replacement route, starting at the train's current section.
        new_route: Vec<SectionId>,
    },

    /// Hold the train where it is for a number of minutes.
    Hold { minutes: u32 },

    /// Slow the train to shift its arrival at the contested section.
    SpeedAdjustment { target_speed_kmh: u32 },

    /// Drop a section's signals to a protective aspect.
    SignalChange,
}

impl RecommendationAction {
    /// Short machine name for logging and audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            RecommendationAction::Reroute { .. } => "reroute",
            RecommendationAction::Hold { .. } => "hold",
            RecommendationAction::SpeedAdjustment { .. } => "speed_adjustment",
            RecommendationAction::SignalChange => "signal_change",
        }
    }
}

/// Estimated benefit of applying a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatedSavings {
    /// Minutes of delay avoided across affected trains.
    pub time_minutes: u32,

    /// Litres of fuel saved (braking/restart cycles avoided).
    pub fuel_litres: u32,
}

/// A ranked, advisory action proposed by the engine for one conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecommendationId,

    pub action: RecommendationAction,

    /// The train the action targets.
    pub train: TrainId,

    /// The contested section that produced this recommendation.
    pub section: SectionId,

    pub priority: Priority,

    /// Heuristic confidence, 0..=100. See the engine for the scoring rules.
    pub confidence: u8,

    pub savings: EstimatedSavings,

    /// One-line summary for the controller.
    pub summary: String,

    /// Why the engine chose this action over the alternatives.
    pub reasoning: String,

    pub status: RecommendationStatus,

    pub created_at: DateTime<Utc>,

    /// Accepting after this instant fails; the recommendation expires
    /// instead of being silently applied late.
    pub expires_at: DateTime<Utc>,

    /// State version the recommendation was computed against.
    pub state_version: u64,

    /// Occupant count of `section` at computation time. If it has drifted by
    /// accept time the recommendation is stale.
    pub section_occupants: usize,
}

impl Recommendation {
    /// Returns true if the recommendation can still be acted on at `now`.
    pub fn is_actionable(&self, now: DateTime<Utc>) -> bool {
        self.status == RecommendationStatus::Pending && now < self.expires_at
    }

    /// Returns true if the deadline has passed while still pending.
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.status == RecommendationStatus::Pending && now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(now: DateTime<Utc>) -> Recommendation {
        Recommendation {
            id: RecommendationId(1),
            action: RecommendationAction::Hold { minutes: 10 },
            train: TrainId::new("18448"),
            section: SectionId::new("NDLS-GZB"),
            priority: Priority::High,
            confidence: 85,
            savings: EstimatedSavings {
                time_minutes: 12,
                fuel_litres: 40,
            },
            summary: "Hold 18448 for 10 minutes".to_string(),
            reasoning: "Section at capacity; higher-priority 12302 clears in 1 hop".to_string(),
            status: RecommendationStatus::Pending,
            created_at: now,
            expires_at: now + chrono::Duration::minutes(5),
            state_version: 7,
            section_occupants: 8,
        }
    }

    #[test]
    fn pending_before_deadline_is_actionable() {
        let now = Utc::now();
        let rec = sample(now);
        assert!(rec.is_actionable(now));
        assert!(!rec.is_past_deadline(now));
    }

    #[test]
    fn pending_after_deadline_is_not_actionable() {
        let now = Utc::now();
        let rec = sample(now);
        let late = now + chrono::Duration::minutes(6);
        assert!(!rec.is_actionable(late));
        assert!(rec.is_past_deadline(late));
    }

    #[test]
    fn non_pending_is_never_actionable() {
        let now = Utc::now();
        let mut rec = sample(now);
        rec.status = RecommendationStatus::Accepted;
        assert!(!rec.is_actionable(now));
        assert!(!rec.is_past_deadline(now));
    }

    #[test]
    fn priority_orders_low_to_high() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
    }

    #[test]
    fn action_serde_is_tagged() {
        let action = RecommendationAction::Reroute {
            new_route: vec![SectionId::new("A-B"), SectionId::new("B-C")],
        };
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains("\"type\":\"reroute\""));
        let parsed: RecommendationAction = serde_json::from_str(&json).unwrap();
        assert_eq!(action, parsed);
    }

    #[test]
    fn serde_roundtrip() {
        let rec = sample(Utc::now());
        let json = serde_json::to_string(&rec).unwrap();
        let parsed: Recommendation = serde_json::from_str(&json).unwrap();
        assert_eq!(rec, parsed);
    }
}
