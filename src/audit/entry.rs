//! Audit entry types.
//!
//! An entry is immutable once written: the log only ever appends. The
//! command applier is the sole writer; every state mutation triggered from
//! outside the core produces exactly one entry, atomically with the
//! mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{SectionId, TrainId};

/// Who performed an audited action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    /// A human controller, identified by their operator id.
    Controller { id: String },

    /// The recommendation engine acting through an auto-accept policy.
    AiSystem,

    /// The scheduler itself (protective signal drops, expiry sweeps).
    System,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Controller { id } => write!(f, "{id}"),
            Actor::AiSystem => write!(f, "AI System"),
            Actor::System => write!(f, "System"),
        }
    }
}

/// The kind of event an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TrainMovement,
    TrainHold,
    Reroute,
    SpeedAdjustment,
    SignalOverride,
    SignalProtection,
    RecommendationAccepted,
    RecommendationRejected,
    RecommendationExpired,
}

impl EventKind {
    /// Display name used in the audit feed and the CSV export.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::TrainMovement => "Train Movement",
            EventKind::TrainHold => "Train Hold",
            EventKind::Reroute => "Route Change",
            EventKind::SpeedAdjustment => "Speed Adjustment",
            EventKind::SignalOverride => "Signal Override",
            EventKind::SignalProtection => "Signal Protection",
            EventKind::RecommendationAccepted => "Recommendation Accepted",
            EventKind::RecommendationRejected => "Recommendation Rejected",
            EventKind::RecommendationExpired => "Recommendation Expired",
        }
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic sequence number, assigned by the log.
    pub seq: u64,

    pub timestamp: DateTime<Utc>,

    pub event: EventKind,

    pub train: Option<TrainId>,

    pub section: Option<SectionId>,

    pub actor: Actor,

    /// Short verb phrase ("Hold applied", "Signal set to red").
    pub action: String,

    /// Free text; quote-escaped on CSV export.
    pub details: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_display() {
        assert_eq!(
            format!("{}", Actor::Controller { id: "CTR-104".to_string() }),
            "CTR-104"
        );
        assert_eq!(format!("{}", Actor::AiSystem), "AI System");
        assert_eq!(format!("{}", Actor::System), "System");
    }

    #[test]
    fn actor_serde_is_tagged() {
        let json = serde_json::to_string(&Actor::Controller {
            id: "CTR-104".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"kind\":\"controller\""));
        let parsed: Actor = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed,
            Actor::Controller {
                id: "CTR-104".to_string()
            }
        );
    }

    #[test]
    fn entry_serde_roundtrip() {
        let entry = AuditEntry {
            seq: 7,
            timestamp: Utc::now(),
            event: EventKind::TrainHold,
            train: Some(TrainId::new("18448")),
            section: Some(SectionId::new("BBS-CTC")),
            actor: Actor::AiSystem,
            action: "Hold applied".to_string(),
            details: "Held 10 minutes pending section clearance".to_string(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        let parsed: AuditEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, parsed);
    }
}
