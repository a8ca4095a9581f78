//! Command types accepted from the outside world.
//!
//! Every command carries a client-generated [`RequestId`] so retries after a
//! lost response are idempotent, and an [`Actor`] so the audit trail records
//! who asked.

use serde::{Deserialize, Serialize};

use crate::audit::Actor;
use crate::types::{RecommendationId, RequestId, SectionId, SignalId, SignalStatus, TrainId};

/// Scheduling weight of a command in the worker queue.
///
/// Emergency commands (holds, manual signal overrides) jump ahead of normal
/// ones; within a level the queue is FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandPriority {
    Normal,
    Emergency,
}

/// What the caller wants done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandKind {
    /// Apply a pending recommendation's action.
    AcceptRecommendation { recommendation: RecommendationId },

    /// Dismiss a pending recommendation without applying it.
    RejectRecommendation {
        recommendation: RecommendationId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Add delay minutes to a train immediately.
    HoldTrain { train: TrainId, minutes: u32 },

    /// Replace a train's remaining route. Without a route the applier plans
    /// a single-section diversion around the train's next hop.
    RerouteTrain {
        train: TrainId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        route: Option<Vec<SectionId>>,
    },

    /// Manually force a signal to an aspect.
    SetSignal {
        signal: SignalId,
        status: SignalStatus,
    },
}

impl CommandKind {
    pub fn priority(&self) -> CommandPriority {
        match self {
            CommandKind::HoldTrain { .. } | CommandKind::SetSignal { .. } => {
                CommandPriority::Emergency
            }
            CommandKind::AcceptRecommendation { .. }
            | CommandKind::RejectRecommendation { .. }
            | CommandKind::RerouteTrain { .. } => CommandPriority::Normal,
        }
    }

    /// Short machine name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::AcceptRecommendation { .. } => "accept_recommendation",
            CommandKind::RejectRecommendation { .. } => "reject_recommendation",
            CommandKind::HoldTrain { .. } => "hold_train",
            CommandKind::RerouteTrain { .. } => "reroute_train",
            CommandKind::SetSignal { .. } => "set_signal",
        }
    }
}

/// A complete externally-submitted command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub request_id: RequestId,
    pub actor: Actor,
    #[serde(flatten)]
    pub kind: CommandKind,
}

impl Command {
    pub fn priority(&self) -> CommandPriority {
        self.kind.priority()
    }
}
