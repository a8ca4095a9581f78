//! The command applier: the single entry point for externally-triggered
//! mutation.
//!
//! Every command is validated before anything is mutated, and the mutation
//! and its audit append are atomic: if the audit write fails the state is
//! rolled back to the pre-command snapshot and the command fails. Replayed
//! request ids return the original audit entry without re-mutating.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::audit::{AuditEntry, AuditError, AuditLog, AuditRecord, EventKind};
use crate::graph::UnknownSection;
use crate::occupancy::OccupancyError;
use crate::state::{NetworkState, TransitionError, apply_delay, reroute_train};
use crate::types::{
    RecommendationAction, RecommendationId, RecommendationStatus, SectionId, SignalId, TrainId,
};

use super::dedupe::SeenRequests;
use super::types::{Command, CommandKind};

/// Errors from applying a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command input is malformed or cannot be satisfied; reported to
    /// the actor, never fatal.
    #[error("invalid command: {0}")]
    Validation(String),

    #[error("unknown recommendation: {0}")]
    UnknownRecommendation(RecommendationId),

    /// The recommendation was already decided (accepted, rejected, or
    /// superseded).
    #[error("recommendation {0} is no longer pending")]
    NotPending(RecommendationId),

    /// The deadline passed before the accept arrived. The recommendation is
    /// marked expired; nothing else changes.
    #[error("recommendation {0} expired before it was accepted")]
    RecommendationExpired(RecommendationId),

    /// The section's occupancy drifted since the recommendation was
    /// computed; the caller should wait for a fresh evaluation.
    #[error("recommendation {0} is stale: occupancy changed since evaluation")]
    StaleRecommendation(RecommendationId),

    #[error("unknown signal: {0}")]
    UnknownSignal(SignalId),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Occupancy(#[from] OccupancyError),

    #[error(transparent)]
    UnknownSection(#[from] UnknownSection),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// Result type for command application.
pub type Result<T> = std::result::Result<T, CommandError>;

/// The outcome of a successfully applied (or replayed) command.
#[derive(Debug, Clone)]
pub struct AppliedCommand {
    pub entry: AuditEntry,

    /// True if this request id was already applied and the entry is the
    /// original one.
    pub duplicate: bool,
}

/// Owns the audit log and the seen-request table; applies commands against
/// a [`NetworkState`].
pub struct CommandApplier {
    log: AuditLog,
    seen: SeenRequests,
}

impl CommandApplier {
    pub fn new(log: AuditLog) -> Self {
        CommandApplier {
            log,
            seen: SeenRequests::new(),
        }
    }

    pub fn log(&self) -> &AuditLog {
        &self.log
    }

    /// Appends an internally-generated entry (movements, protective signal
    /// drops, expiry sweeps). These carry no request id and skip dedupe.
    pub fn append_event(&mut self, record: AuditRecord, now: DateTime<Utc>) -> Result<AuditEntry> {
        Ok(self.log.append(record, now)?)
    }

    /// Prunes request ids older than `ttl`. Returns how many were dropped.
    pub fn prune_seen(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
        self.seen.prune(now, ttl)
    }

    /// Validates and applies one command.
    ///
    /// On success the state mutation, the version bump, and the audit append
    /// have all happened; on failure the state is exactly as it was, except
    /// that accepting a past-deadline recommendation marks it expired.
    pub fn apply(
        &mut self,
        state: &mut NetworkState,
        command: Command,
        now: DateTime<Utc>,
    ) -> Result<AppliedCommand> {
        if let Some(entry) = self.seen.lookup(&command.request_id) {
            debug!(request_id = %command.request_id, "replayed command, returning original entry");
            return Ok(AppliedCommand {
                entry: entry.clone(),
                duplicate: true,
            });
        }

        let snapshot = state.clone();
        let record = self.execute(state, &command, now)?;
        state.bump_version();

        match self.log.append(record, now) {
            Ok(entry) => {
                self.seen.record(command.request_id, entry.clone(), now);
                Ok(AppliedCommand {
                    entry,
                    duplicate: false,
                })
            }
            Err(e) => {
                warn!(error = %e, "audit append failed, rolling back command");
                *state = snapshot;
                Err(e.into())
            }
        }
    }

    /// Performs the mutation for one command and builds its audit record.
    ///
    /// Validation happens before mutation in every arm, so an `Err` return
    /// leaves the state untouched (bar the deliberate expiry flip).
    fn execute(
        &mut self,
        state: &mut NetworkState,
        command: &Command,
        now: DateTime<Utc>,
    ) -> Result<AuditRecord> {
        let actor = command.actor.clone();
        match &command.kind {
            CommandKind::AcceptRecommendation { recommendation } => {
                let rec = state
                    .recommendations
                    .get(recommendation)
                    .ok_or(CommandError::UnknownRecommendation(*recommendation))?
                    .clone();

                if rec.status != RecommendationStatus::Pending {
                    return Err(CommandError::NotPending(rec.id));
                }
                if now >= rec.expires_at {
                    state
                        .recommendations
                        .get_mut(recommendation)
                        .expect("checked above")
                        .status = RecommendationStatus::Expired;
                    return Err(CommandError::RecommendationExpired(rec.id));
                }
                if rec.state_version != state.version {
                    let occupants = state.occupancy.occupant_count(&rec.section)?;
                    if occupants != rec.section_occupants {
                        return Err(CommandError::StaleRecommendation(rec.id));
                    }
                }

                let effect = match &rec.action {
                    RecommendationAction::Reroute { new_route } => {
                        reroute_train(state, &rec.train, new_route.clone())?;
                        format!("Rerouted via {}", join_route(new_route))
                    }
                    RecommendationAction::Hold { minutes } => {
                        let total = apply_delay(state, &rec.train, *minutes)?;
                        format!("Held {minutes} min; total delay now {total} min")
                    }
                    RecommendationAction::SpeedAdjustment { target_speed_kmh } => {
                        let train = state
                            .train_mut(&rec.train)
                            .ok_or_else(|| TransitionError::UnknownTrain(rec.train.clone()))?;
                        let previous = train.speed_kmh;
                        train.speed_kmh = *target_speed_kmh;
                        format!("Speed {previous} -> {target_speed_kmh} km/h")
                    }
                    RecommendationAction::SignalChange => {
                        let changed = state.drop_signals_to_red(&rec.section, now);
                        format!("{} signal(s) dropped to red", changed.len())
                    }
                };

                state
                    .recommendations
                    .get_mut(recommendation)
                    .expect("checked above")
                    .status = RecommendationStatus::Accepted;

                Ok(AuditRecord {
                    event: EventKind::RecommendationAccepted,
                    train: Some(rec.train),
                    section: Some(rec.section),
                    actor,
                    action: format!("Accepted {} ({})", rec.id, rec.action.kind()),
                    details: format!("{}. {effect}", rec.summary),
                })
            }

            CommandKind::RejectRecommendation {
                recommendation,
                reason,
            } => {
                let rec = state
                    .recommendations
                    .get_mut(recommendation)
                    .ok_or(CommandError::UnknownRecommendation(*recommendation))?;
                if rec.status != RecommendationStatus::Pending {
                    return Err(CommandError::NotPending(rec.id));
                }
                rec.status = RecommendationStatus::Rejected;
                let rec = rec.clone();

                Ok(AuditRecord {
                    event: EventKind::RecommendationRejected,
                    train: Some(rec.train),
                    section: Some(rec.section),
                    actor,
                    action: format!("Rejected {}", rec.id),
                    details: match reason {
                        Some(reason) => format!("{}. Reason: {reason}", rec.summary),
                        None => rec.summary,
                    },
                })
            }

            CommandKind::HoldTrain { train, minutes } => {
                let total = apply_delay(state, train, *minutes)?;
                let section = state
                    .train(train)
                    .expect("apply_delay checked existence")
                    .current_section()
                    .cloned();

                Ok(AuditRecord {
                    event: EventKind::TrainHold,
                    train: Some(train.clone()),
                    section,
                    actor,
                    action: format!("Held {minutes} min"),
                    details: format!("Total delay now {total} min"),
                })
            }

            CommandKind::RerouteTrain { train, route } => {
                let new_route = match route {
                    Some(route) => route.clone(),
                    None => plan_diversion(state, train)?.ok_or_else(|| {
                        CommandError::Validation(format!("no viable diversion for train {train}"))
                    })?,
                };
                reroute_train(state, train, new_route.clone())?;

                Ok(AuditRecord {
                    event: EventKind::Reroute,
                    train: Some(train.clone()),
                    section: new_route.first().cloned(),
                    actor,
                    action: "Route replaced".to_string(),
                    details: format!("New route: {}", join_route(&new_route)),
                })
            }

            CommandKind::SetSignal { signal, status } => {
                let sig = state
                    .signals
                    .get_mut(signal)
                    .ok_or_else(|| CommandError::UnknownSignal(signal.clone()))?;
                let previous = sig.status;
                sig.set_status(*status, now);
                let section = sig.section.clone();

                Ok(AuditRecord {
                    event: EventKind::SignalOverride,
                    train: None,
                    section: Some(section),
                    actor,
                    action: format!("Signal {signal} set to {status:?}"),
                    details: format!("Aspect {previous:?} -> {status:?}"),
                })
            }
        }
    }
}

/// Plans a single-section diversion around a train's next hop: the first
/// routable neighbor of the current section that is below capacity and
/// rejoins the route (or becomes the new final hop when the contested
/// section was the destination).
fn plan_diversion(state: &NetworkState, id: &TrainId) -> Result<Option<Vec<SectionId>>> {
    let train = state
        .train(id)
        .ok_or_else(|| TransitionError::UnknownTrain(id.clone()))?;
    if train.position == crate::types::PositionState::Departed {
        return Err(TransitionError::RouteExhausted(id.clone()).into());
    }

    let current = &train.route[train.route_index];
    let Some(next) = train.route.get(train.route_index + 1) else {
        // Already on the final section; nothing to divert around.
        return Ok(None);
    };
    let rejoin = train.route.get(train.route_index + 2);

    for via in state.graph.routable_neighbors(current)? {
        if via == next {
            continue;
        }
        if state.occupancy.is_at_capacity(via)? {
            continue;
        }
        let rejoins = match rejoin {
            Some(rejoin) => state.graph.are_adjacent(via, rejoin)?,
            None => true,
        };
        if rejoins {
            let mut route = vec![current.clone(), via.clone()];
            route.extend(train.route[train.route_index + 2..].iter().cloned());
            return Ok(Some(route));
        }
    }
    Ok(None)
}

fn join_route(route: &[SectionId]) -> String {
    route
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}
