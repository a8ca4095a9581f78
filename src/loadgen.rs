//! Deterministic traffic generation.
//!
//! The scheduler core is deterministic; all load-testing randomness lives
//! here behind a seeded `ChaCha8Rng` so that identical seeds produce
//! identical traffic. The module also builds the demo corridor network the
//! binary runs against.

use chrono::NaiveTime;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::time::{Duration, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::graph::TrackGraph;
use crate::state::NetworkState;
use crate::types::{
    Section, SectionId, ServiceClass, Signal, SignalId, SignalStatus, Track, TrackId, TrackStatus,
    Train, TrainId,
};
use crate::worker::{SubmitError, WorkerHandle};

/// Default seed used when no explicit seed is provided.
const DEFAULT_SEED: u64 = 42;

/// Drives train movements through a [`WorkerHandle`] on a fixed cadence.
pub struct TrafficDriver {
    rng: ChaCha8Rng,
    trains: Vec<TrainId>,

    /// Probability (0..=1) that a given train attempts a hop on each tick.
    movement_chance: f64,
}

impl TrafficDriver {
    pub fn new(trains: Vec<TrainId>, seed: u64) -> Self {
        TrafficDriver {
            rng: ChaCha8Rng::seed_from_u64(seed),
            trains,
            movement_chance: 0.35,
        }
    }

    /// Picks the trains that move this tick. Deterministic for a given seed
    /// and call sequence.
    pub fn next_movements(&mut self) -> Vec<TrainId> {
        let mut movers: Vec<TrainId> = self
            .trains
            .iter()
            .filter(|_| self.rng.gen_bool(self.movement_chance))
            .cloned()
            .collect();
        // Shuffle so the same trains do not always contend in id order.
        movers.shuffle(&mut self.rng);
        movers
    }

    /// Runs until cancelled, submitting one batch of movements per tick.
    pub async fn run(mut self, handle: WorkerHandle, tick: Duration, shutdown: CancellationToken) {
        info!(trains = self.trains.len(), "traffic driver started");
        let mut ticker = interval(tick);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("traffic driver stopping");
                    return;
                }
                _ = ticker.tick() => {
                    for train in self.next_movements() {
                        debug!(%train, "requesting movement");
                        match handle.advance(train).await {
                            Ok(()) => {}
                            Err(SubmitError::WorkerGone) => {
                                warn!("scheduler gone; traffic driver stopping");
                                return;
                            }
                            Err(err) => warn!(error = %err, "movement rejected"),
                        }
                    }
                }
            }
        }
    }
}

fn section(id: &str, name: &str, capacity: usize, length_km: f64) -> Section {
    Section {
        id: SectionId::new(id),
        name: name.to_string(),
        capacity,
        tracks: vec![
            Track {
                id: TrackId::new(format!("TRK-{id}-UP")),
                name: format!("{name} Up"),
                status: TrackStatus::Active,
                length_km,
                max_speed_kmh: 110,
            },
            Track {
                id: TrackId::new(format!("TRK-{id}-DN")),
                name: format!("{name} Down"),
                status: TrackStatus::Active,
                length_km,
                max_speed_kmh: 110,
            },
        ],
    }
}

fn train(
    id: &str,
    name: &str,
    class: ServiceClass,
    route: &[&str],
    passengers: u32,
    arrival: (u32, u32),
) -> Train {
    let route = route.iter().map(|s| SectionId::new(*s)).collect();
    let scheduled = NaiveTime::from_hms_opt(arrival.0, arrival.1, 0)
        .unwrap_or(NaiveTime::MIN);
    // Routes in this module are hand-written over the corridor below and
    // are never empty.
    Train::new(
        TrainId::new(id),
        name.to_string(),
        class,
        route,
        passengers,
        scheduled,
    )
    .expect("demo routes are non-empty")
}

/// The Delhi-area demo corridor: a main line with a freight loop around its
/// busiest block section.
///
/// `NDLS-GZB` carries capacity 8 so that saturating it takes a realistic
/// amount of traffic; the loop via `NDLS-SBB` offers the diversion the
/// recommendation engine reaches for first.
pub fn demo_network() -> NetworkState {
    let sections = vec![
        section("NDLS", "New Delhi", 6, 2.0),
        section("NDLS-GZB", "New Delhi - Ghaziabad", 8, 19.5),
        section("NDLS-SBB", "New Delhi - Sahibabad Loop", 4, 22.0),
        section("GZB", "Ghaziabad", 6, 3.0),
        section("GZB-MB", "Ghaziabad - Moradabad", 4, 141.0),
        section("MB", "Moradabad", 4, 2.5),
    ];
    let links = vec![
        (SectionId::new("NDLS"), SectionId::new("NDLS-GZB")),
        (SectionId::new("NDLS"), SectionId::new("NDLS-SBB")),
        (SectionId::new("NDLS-GZB"), SectionId::new("GZB")),
        (SectionId::new("NDLS-SBB"), SectionId::new("GZB")),
        (SectionId::new("GZB"), SectionId::new("GZB-MB")),
        (SectionId::new("GZB-MB"), SectionId::new("MB")),
    ];
    let graph =
        TrackGraph::new(sections, links).expect("demo links reference demo sections");

    let main = &["NDLS", "NDLS-GZB", "GZB", "GZB-MB", "MB"];
    let loop_route = &["NDLS", "NDLS-SBB", "GZB", "GZB-MB", "MB"];
    let trains = vec![
        train("12302", "Rajdhani Express", ServiceClass::Express, main, 1200, (6, 0)),
        train("12004", "Shatabdi Express", ServiceClass::Express, main, 980, (6, 25)),
        train("14212", "Intercity Express", ServiceClass::Passenger, main, 850, (6, 50)),
        train("64102", "EMU Local", ServiceClass::Passenger, main, 1400, (7, 10)),
        train("64104", "EMU Local", ServiceClass::Passenger, main, 1350, (7, 30)),
        train("18448", "Hirakhand Express", ServiceClass::Passenger, main, 760, (7, 55)),
        train("22406", "Garib Rath", ServiceClass::Passenger, main, 1100, (8, 15)),
        train("12420", "Gomti Express", ServiceClass::Passenger, main, 690, (8, 40)),
        train("NFRT1", "Container Freight", ServiceClass::Goods, loop_route, 0, (9, 0)),
        train("NFRT2", "Coal Freight", ServiceClass::Goods, loop_route, 0, (9, 45)),
    ];

    let signals = vec![
        Signal {
            id: SignalId::new("SIG-NDLS-GZB"),
            name: "Ghaziabad Line Home".to_string(),
            section: SectionId::new("NDLS-GZB"),
            status: SignalStatus::Green,
            last_updated: chrono::Utc::now(),
        },
        Signal {
            id: SignalId::new("SIG-NDLS-SBB"),
            name: "Sahibabad Loop Home".to_string(),
            section: SectionId::new("NDLS-SBB"),
            status: SignalStatus::Green,
            last_updated: chrono::Utc::now(),
        },
        Signal {
            id: SignalId::new("SIG-GZB-MB"),
            name: "Moradabad Line Home".to_string(),
            section: SectionId::new("GZB-MB"),
            status: SignalStatus::Green,
            last_updated: chrono::Utc::now(),
        },
    ];

    NetworkState::new(graph, trains, signals)
}

/// Default seed for the demo binary.
pub fn default_seed() -> u64 {
    DEFAULT_SEED
}
