//! The scheduler worker: the single task that owns and mutates the network
//! state for one region.
//!
//! # Event Loop
//!
//! 1. Receive messages from the channel (commands, movements, evaluation
//!    requests).
//! 2. Drain whatever else is already waiting, so queued commands can be
//!    reordered by priority before anything is applied.
//! 3. Apply commands in priority order, then movements, then run an
//!    evaluation cycle if anything mutated.
//! 4. On the evaluation tick: expiry sweep, conflict scan, recommendation
//!    refresh, protective signal drops, seen-request pruning.
//!
//! Readers never touch the worker: they clone a snapshot under a brief
//! `RwLock` read guard via [`WorkerHandle`]. The audit feed is served
//! through a message because the log lives with the applier.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::audit::{Actor, AuditEntry, AuditLog, AuditRecord, EventKind};
use crate::commands::{AppliedCommand, Command, CommandApplier, CommandError};
use crate::config::SchedulerConfig;
use crate::conflict::detect;
use crate::recommend::{EvalContext, evaluate_conflicts};
use crate::state::{AdvanceOutcome, NetworkState, TransitionError, advance_train};
use crate::types::{SectionId, TrainId};

use super::message::{CommandResult, WorkerMessage};
use super::queue::CommandQueue;

/// Errors from submitting work to the scheduler.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The worker has shut down or dropped the request (duplicate in-queue
    /// submission).
    #[error("scheduler worker is unavailable")]
    WorkerGone,

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Cheap-to-clone handle for talking to the worker.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerMessage>,
    state: Arc<RwLock<NetworkState>>,
}

impl WorkerHandle {
    /// A consistent copy of the current network state.
    pub async fn snapshot(&self) -> NetworkState {
        self.state.read().await.clone()
    }

    /// Submits a command and waits for its outcome.
    pub async fn submit(&self, command: Command) -> Result<AppliedCommand, SubmitError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WorkerMessage::Command { command, reply })
            .await
            .map_err(|_| SubmitError::WorkerGone)?;
        rx.await
            .map_err(|_| SubmitError::WorkerGone)?
            .map_err(SubmitError::Command)
    }

    /// Asks the worker to advance a train one hop.
    pub async fn advance(&self, train: TrainId) -> Result<(), SubmitError> {
        self.tx
            .send(WorkerMessage::AdvanceTrain(train))
            .await
            .map_err(|_| SubmitError::WorkerGone)
    }

    /// Forces an evaluation cycle ahead of the next tick.
    pub async fn evaluate(&self) -> Result<(), SubmitError> {
        self.tx
            .send(WorkerMessage::Evaluate)
            .await
            .map_err(|_| SubmitError::WorkerGone)
    }

    /// The full audit feed, oldest first.
    pub async fn audit_entries(&self) -> Result<Vec<AuditEntry>, SubmitError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WorkerMessage::AuditFeed { reply })
            .await
            .map_err(|_| SubmitError::WorkerGone)?;
        rx.await.map_err(|_| SubmitError::WorkerGone)
    }

    /// Requests a graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(WorkerMessage::Shutdown).await;
    }
}

/// The single-writer scheduler task for one region.
pub struct SchedulerWorker {
    config: SchedulerConfig,
    state: Arc<RwLock<NetworkState>>,
    applier: CommandApplier,
    queue: CommandQueue,
    rx: mpsc::Receiver<WorkerMessage>,

    /// Movement requests drained from the channel, applied after commands.
    pending_moves: Vec<TrainId>,

    /// An evaluation was explicitly requested.
    eval_requested: bool,
}

impl SchedulerWorker {
    /// Creates a worker and the handle to reach it.
    pub fn new(
        config: SchedulerConfig,
        initial: NetworkState,
        log: AuditLog,
    ) -> (SchedulerWorker, WorkerHandle) {
        let (tx, rx) = mpsc::channel(256);
        let state = Arc::new(RwLock::new(initial));
        let handle = WorkerHandle {
            tx,
            state: Arc::clone(&state),
        };
        let worker = SchedulerWorker {
            config,
            state,
            applier: CommandApplier::new(log),
            queue: CommandQueue::new(),
            rx,
            pending_moves: Vec::new(),
            eval_requested: false,
        };
        (worker, handle)
    }

    /// Runs the event loop until shutdown.
    #[instrument(skip(self, shutdown))]
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("scheduler worker started");

        let mut ticker = tokio::time::interval(self.config.evaluation_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown signal received");
                    break;
                }

                msg = self.rx.recv() => {
                    let Some(msg) = msg else {
                        info!("message channel closed");
                        break;
                    };
                    if self.ingest(msg) {
                        break;
                    }
                    // Drain whatever is already waiting so commands can be
                    // reordered by priority before we start applying.
                    let mut stop = false;
                    while let Ok(msg) = self.rx.try_recv() {
                        if self.ingest(msg) {
                            stop = true;
                            break;
                        }
                    }
                    self.process_backlog(Utc::now()).await;
                    if stop {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let now = Utc::now();
                    self.run_evaluation(now).await;
                    let pruned = self.applier.prune_seen(now, self.config.dedupe_ttl);
                    if pruned > 0 {
                        debug!(pruned, "pruned seen request ids");
                    }
                }
            }
        }

        info!("scheduler worker stopped");
    }

    /// Sorts one message into the backlog. Returns true on shutdown.
    fn ingest(&mut self, msg: WorkerMessage) -> bool {
        match msg {
            WorkerMessage::Command { command, reply } => {
                if !self.queue.push(command, Some(reply)) {
                    // Duplicate of an in-queue request; the dropped reply
                    // channel tells the submitter to retry later.
                    debug!("dropped duplicate in-queue command submission");
                }
                false
            }
            WorkerMessage::AdvanceTrain(train) => {
                self.pending_moves.push(train);
                false
            }
            WorkerMessage::Evaluate => {
                self.eval_requested = true;
                false
            }
            WorkerMessage::AuditFeed { reply } => {
                let _ = reply.send(self.applier.log().entries().to_vec());
                false
            }
            WorkerMessage::Shutdown => true,
        }
    }

    /// Applies queued commands (priority order), then pending movements,
    /// then evaluates if anything changed.
    async fn process_backlog(&mut self, now: DateTime<Utc>) {
        let mut mutated = false;

        while let Some(queued) = self.queue.pop() {
            let result: CommandResult = {
                let mut state = self.state.write().await;
                self.applier.apply(&mut state, queued.command, now)
            };
            if result.is_ok() {
                mutated = true;
            }
            if let Some(reply) = queued.reply {
                let _ = reply.send(result);
            }
        }

        for train in std::mem::take(&mut self.pending_moves) {
            if self.handle_advance(&train, now).await {
                mutated = true;
            }
        }

        if mutated || self.eval_requested {
            self.eval_requested = false;
            self.run_evaluation(now).await;
        }
    }

    /// Advances one train and records the movement. Returns true if the
    /// state changed.
    async fn handle_advance(&mut self, train: &TrainId, now: DateTime<Utc>) -> bool {
        let outcome = {
            let mut state = self.state.write().await;
            match advance_train(&mut state, train, self.config.delay_penalty_minutes) {
                Ok(outcome) => {
                    state.bump_version();
                    outcome
                }
                Err(TransitionError::RouteExhausted(_)) => {
                    // The traffic driver can race a departure; harmless.
                    debug!(%train, "advance requested for departed train");
                    return false;
                }
                Err(e) => {
                    warn!(%train, error = %e, "train advance failed");
                    return false;
                }
            }
        };

        let (section, action, details): (Option<SectionId>, &str, String) = match &outcome {
            AdvanceOutcome::EnteredNetwork { section, .. } => (
                Some(section.clone()),
                "Entered network",
                format!("Entered {section}"),
            ),
            AdvanceOutcome::Advanced { from, to, .. } => (
                Some(to.clone()),
                "Advanced",
                format!("Moved {from} to {to}"),
            ),
            AdvanceOutcome::Departed { from, .. } => (
                Some(from.clone()),
                "Departed",
                format!("Cleared {from} and completed route"),
            ),
            AdvanceOutcome::HeldAtCapacity {
                section,
                delay_added,
            } => (
                Some(section.clone()),
                "Held at capacity",
                format!("{section} full; delay increased by {delay_added} min"),
            ),
        };

        let record = AuditRecord {
            event: EventKind::TrainMovement,
            train: Some(train.clone()),
            section,
            actor: Actor::System,
            action: action.to_string(),
            details,
        };
        if let Err(e) = self.applier.append_event(record, now) {
            error!(%train, error = %e, "failed to record movement");
        }
        true
    }

    /// One evaluation cycle: expiry sweep, conflict scan, recommendation
    /// refresh, protective signal drops.
    async fn run_evaluation(&mut self, now: DateTime<Utc>) {
        let (expired, report, protected) = {
            let mut state = self.state.write().await;

            let expired = state.expire_stale_recommendations(now);

            let report = detect(&state, self.config.lookahead_hops, now);
            let sections: Vec<SectionId> =
                report.conflicts.iter().map(|c| c.section.clone()).collect();
            let fresh = evaluate_conflicts(
                &mut state,
                &report.conflicts,
                EvalContext {
                    now,
                    ttl: self.config.recommendation_ttl,
                },
            );
            state.replace_recommendations_for(&sections, fresh);

            let mut protected = Vec::new();
            for section in &report.protect_sections {
                let changed = state.drop_signals_to_red(section, now);
                if !changed.is_empty() {
                    protected.push((section.clone(), changed.len()));
                }
            }

            state.bump_version();
            (expired, report, protected)
        };

        for id in expired {
            let record = AuditRecord {
                event: EventKind::RecommendationExpired,
                train: None,
                section: None,
                actor: Actor::System,
                action: format!("Expired {id}"),
                details: "Deadline passed without a decision".to_string(),
            };
            if let Err(e) = self.applier.append_event(record, now) {
                error!(error = %e, "failed to record recommendation expiry");
            }
        }

        for (section, count) in protected {
            let record = AuditRecord {
                event: EventKind::SignalProtection,
                train: None,
                section: Some(section.clone()),
                actor: Actor::System,
                action: "Signals dropped to red".to_string(),
                details: format!("{count} signal(s) protecting contested section {section}"),
            };
            if let Err(e) = self.applier.append_event(record, now) {
                error!(error = %e, "failed to record signal protection");
            }
        }

        if !report.is_clear() {
            debug!(conflicts = report.conflicts.len(), "evaluation found conflicts");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::commands::CommandKind;
    use crate::graph::TrackGraph;
    use crate::types::{
        RequestId, Section, ServiceClass, Track, TrackId, TrackStatus, Train,
    };

    fn section(id: &str, capacity: usize) -> Section {
        Section {
            id: SectionId::new(id),
            name: id.to_string(),
            capacity,
            tracks: vec![Track {
                id: TrackId::new(format!("TRK-{id}")),
                name: "Main".to_string(),
                status: TrackStatus::Active,
                length_km: 10.0,
                max_speed_kmh: 110,
            }],
        }
    }

    /// Corridor W -> X -> Y with X at capacity 1.
    fn network() -> NetworkState {
        let graph = TrackGraph::new(
            vec![section("W", 4), section("X", 1), section("Y", 4)],
            vec![
                (SectionId::new("W"), SectionId::new("X")),
                (SectionId::new("X"), SectionId::new("Y")),
            ],
        )
        .unwrap();
        let train = |id: &str, pax: u32| {
            Train::new(
                TrainId::new(id),
                format!("Train {id}"),
                ServiceClass::Express,
                vec![SectionId::new("W"), SectionId::new("X"), SectionId::new("Y")],
                pax,
                NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            )
            .unwrap()
        };
        NetworkState::new(graph, vec![train("12302", 1200), train("18448", 980)], vec![])
    }

    fn spawn_worker() -> (WorkerHandle, CancellationToken) {
        let (worker, handle) =
            SchedulerWorker::new(SchedulerConfig::new(), network(), AuditLog::in_memory());
        let shutdown = CancellationToken::new();
        tokio::spawn(worker.run(shutdown.clone()));
        (handle, shutdown)
    }

    fn hold(request: &str, train: &str, minutes: u32) -> Command {
        Command {
            request_id: RequestId::new(request),
            actor: Actor::Controller {
                id: "CTR-104".to_string(),
            },
            kind: CommandKind::HoldTrain {
                train: TrainId::new(train),
                minutes,
            },
        }
    }

    #[tokio::test]
    async fn command_round_trip_mutates_and_audits() {
        let (handle, shutdown) = spawn_worker();

        let applied = handle.submit(hold("req-1", "12302", 10)).await.unwrap();
        assert!(!applied.duplicate);
        assert_eq!(applied.entry.event, EventKind::TrainHold);

        let snapshot = handle.snapshot().await;
        assert_eq!(
            snapshot.train(&TrainId::new("12302")).unwrap().delay_minutes,
            10
        );

        let feed = handle.audit_entries().await.unwrap();
        assert_eq!(feed.len(), 1);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn resubmitted_request_id_does_not_remutate() {
        let (handle, shutdown) = spawn_worker();

        let first = handle.submit(hold("req-1", "12302", 10)).await.unwrap();
        let second = handle.submit(hold("req-1", "12302", 10)).await.unwrap();

        assert!(second.duplicate);
        assert_eq!(first.entry, second.entry);
        let snapshot = handle.snapshot().await;
        assert_eq!(
            snapshot.train(&TrainId::new("12302")).unwrap().delay_minutes,
            10
        );
        assert_eq!(handle.audit_entries().await.unwrap().len(), 1);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn movements_trigger_conflict_evaluation() {
        let (handle, shutdown) = spawn_worker();

        // 12302 occupies X (capacity 1); 18448 follows one hop behind.
        handle.advance(TrainId::new("12302")).await.unwrap();
        handle.advance(TrainId::new("12302")).await.unwrap();
        handle.advance(TrainId::new("18448")).await.unwrap();
        handle.evaluate().await.unwrap();

        // The audit round trip serializes behind the evaluation.
        let feed = handle.audit_entries().await.unwrap();
        assert!(feed.iter().any(|e| e.event == EventKind::TrainMovement));

        let snapshot = handle.snapshot().await;
        assert!(
            !snapshot.active_recommendations().is_empty(),
            "contested X should produce a recommendation"
        );

        shutdown.cancel();
    }

    #[tokio::test]
    async fn shutdown_message_stops_the_loop() {
        let (worker, handle) =
            SchedulerWorker::new(SchedulerConfig::new(), network(), AuditLog::in_memory());
        let shutdown = CancellationToken::new();
        let join = tokio::spawn(worker.run(shutdown));

        handle.shutdown().await;
        join.await.unwrap();

        assert!(matches!(
            handle.submit(hold("req-1", "12302", 1)).await,
            Err(SubmitError::WorkerGone)
        ));
    }
}
