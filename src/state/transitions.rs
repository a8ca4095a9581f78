//! Train lifecycle transitions.
//!
//! Transition functions mutate a [`NetworkState`] through the occupancy
//! table so the capacity invariant holds at every step. They are only ever
//! called from the single-writer path (the command applier or the worker's
//! movement handling); nothing here takes a lock.

use thiserror::Error;

use crate::graph::UnknownSection;
use crate::occupancy::{OccupancyError, OccupancyEvent};
use crate::types::{PositionState, SectionId, TrainId};

use super::store::NetworkState;

/// Errors from train transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The train id is not registered. A data error, fatal to the triggering
    /// command only.
    #[error("unknown train: {0}")]
    UnknownTrain(TrainId),

    /// The train has already departed; there is no further section to
    /// advance into.
    #[error("train {0} has exhausted its route")]
    RouteExhausted(TrainId),

    /// A replacement route must start where the train currently is.
    #[error("route must start at {expected}, got {got}")]
    DiscontinuousRoute {
        expected: SectionId,
        got: SectionId,
    },

    /// Consecutive route hops must be joined by a junction.
    #[error("no junction joins {from} to {to}")]
    UnreachableHop { from: SectionId, to: SectionId },

    /// A replacement route with no sections is meaningless.
    #[error("replacement route is empty")]
    EmptyRoute,

    #[error(transparent)]
    UnknownSection(#[from] UnknownSection),

    #[error(transparent)]
    Occupancy(#[from] OccupancyError),
}

/// Result type for transitions.
pub type Result<T> = std::result::Result<T, TransitionError>;

/// What happened when a train was advanced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// A scheduled/approaching train entered the first section of its route.
    EnteredNetwork {
        section: SectionId,
        events: Vec<OccupancyEvent>,
    },

    /// The train moved from one section to the next on its route.
    Advanced {
        from: SectionId,
        to: SectionId,
        events: Vec<OccupancyEvent>,
    },

    /// The train cleared the final section of its route and departed.
    Departed {
        from: SectionId,
        events: Vec<OccupancyEvent>,
    },

    /// The next section is at capacity; the train stays put and accrues
    /// delay. This is the primary driver of realistic delay accumulation.
    HeldAtCapacity {
        section: SectionId,
        delay_added: u32,
    },
}

impl AdvanceOutcome {
    /// Occupancy events produced by this advance, if any.
    pub fn events(&self) -> &[OccupancyEvent] {
        match self {
            AdvanceOutcome::EnteredNetwork { events, .. }
            | AdvanceOutcome::Advanced { events, .. }
            | AdvanceOutcome::Departed { events, .. } => events,
            AdvanceOutcome::HeldAtCapacity { .. } => &[],
        }
    }
}

/// Moves a train to the next section of its route.
///
/// Entry is attempted before the old section is released, so a full next
/// section leaves the train exactly where it was (plus `delay_penalty`
/// minutes of delay). At the final section the train departs instead;
/// advancing a departed train fails with [`TransitionError::RouteExhausted`].
pub fn advance_train(
    state: &mut NetworkState,
    id: &TrainId,
    delay_penalty: u32,
) -> Result<AdvanceOutcome> {
    let train = state
        .train(id)
        .ok_or_else(|| TransitionError::UnknownTrain(id.clone()))?;

    match train.position {
        PositionState::Departed => Err(TransitionError::RouteExhausted(id.clone())),

        PositionState::Scheduled | PositionState::Approaching => {
            let target = train.route[train.route_index].clone();
            match state.occupancy.enter(id, &target) {
                Ok(event) => {
                    let train = state.train_mut(id).expect("checked above");
                    train.position = PositionState::InSection;
                    Ok(AdvanceOutcome::EnteredNetwork {
                        section: target,
                        events: vec![event],
                    })
                }
                Err(OccupancyError::CapacityExceeded { .. }) => {
                    let train = state.train_mut(id).expect("checked above");
                    train.position = PositionState::Approaching;
                    train.add_delay(delay_penalty);
                    Ok(AdvanceOutcome::HeldAtCapacity {
                        section: target,
                        delay_added: delay_penalty,
                    })
                }
                Err(other) => Err(other.into()),
            }
        }

        PositionState::InSection => {
            let current = train.route[train.route_index].clone();

            if train.at_final_section() {
                let leave = state.occupancy.leave(id, &current)?;
                let train = state.train_mut(id).expect("checked above");
                train.position = PositionState::Departed;
                train.speed_kmh = 0;
                state.departed_count += 1;
                return Ok(AdvanceOutcome::Departed {
                    from: current,
                    events: vec![leave],
                });
            }

            let next = train.route[train.route_index + 1].clone();
            match state.occupancy.enter(id, &next) {
                Ok(enter) => {
                    let leave = state.occupancy.leave(id, &current)?;
                    let train = state.train_mut(id).expect("checked above");
                    train.route_index += 1;
                    Ok(AdvanceOutcome::Advanced {
                        from: current,
                        to: next,
                        events: vec![enter, leave],
                    })
                }
                Err(OccupancyError::CapacityExceeded { .. }) => {
                    let train = state.train_mut(id).expect("checked above");
                    train.add_delay(delay_penalty);
                    Ok(AdvanceOutcome::HeldAtCapacity {
                        section: next,
                        delay_added: delay_penalty,
                    })
                }
                Err(other) => Err(other.into()),
            }
        }
    }
}

/// Adds delay minutes to a train.
///
/// Negative input is unrepresentable by construction (`u32`); a zero-minute
/// hold is accepted as a no-op.
pub fn apply_delay(state: &mut NetworkState, id: &TrainId, minutes: u32) -> Result<u32> {
    let train = state
        .train_mut(id)
        .ok_or_else(|| TransitionError::UnknownTrain(id.clone()))?;
    train.add_delay(minutes);
    Ok(train.delay_minutes)
}

/// Replaces a train's remaining route.
///
/// The new route must start at the train's current section (continuity
/// invariant) and every hop must be a registered section joined to its
/// predecessor by a junction. Nothing is mutated until the whole route
/// validates.
pub fn reroute_train(
    state: &mut NetworkState,
    id: &TrainId,
    new_route: Vec<SectionId>,
) -> Result<()> {
    let train = state
        .train(id)
        .ok_or_else(|| TransitionError::UnknownTrain(id.clone()))?;

    if train.position == PositionState::Departed {
        return Err(TransitionError::RouteExhausted(id.clone()));
    }
    let Some(first) = new_route.first() else {
        return Err(TransitionError::EmptyRoute);
    };

    // Continuity: the route starts where the train is (or, for a train not
    // yet on the network, where it will enter).
    let anchor = train.route[train.route_index].clone();
    if *first != anchor {
        return Err(TransitionError::DiscontinuousRoute {
            expected: anchor,
            got: first.clone(),
        });
    }

    for section in &new_route {
        state.graph.section(section)?;
    }
    for pair in new_route.windows(2) {
        if !state.graph.are_adjacent(&pair[0], &pair[1])? {
            return Err(TransitionError::UnreachableHop {
                from: pair[0].clone(),
                to: pair[1].clone(),
            });
        }
    }

    let train = state.train_mut(id).expect("checked above");
    train.route = new_route;
    train.route_index = 0;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TrackGraph;
    use crate::types::{Section, ServiceClass, Track, TrackId, TrackStatus, Train};
    use chrono::NaiveTime;

    fn section(id: &str, capacity: usize) -> Section {
        Section {
            id: SectionId::new(id),
            name: id.to_string(),
            capacity,
            tracks: vec![Track {
                id: TrackId::new(format!("TRK-{id}")),
                name: "Main".to_string(),
                status: TrackStatus::Active,
                length_km: 15.0,
                max_speed_kmh: 110,
            }],
        }
    }

    /// Linear A-B -> B-C -> C-D with a D-E diversion off B-C.
    fn graph() -> TrackGraph {
        TrackGraph::new(
            vec![
                section("A-B", 2),
                section("B-C", 1),
                section("C-D", 2),
                section("D-E", 2),
            ],
            vec![
                (SectionId::new("A-B"), SectionId::new("B-C")),
                (SectionId::new("A-B"), SectionId::new("D-E")),
                (SectionId::new("B-C"), SectionId::new("C-D")),
                (SectionId::new("D-E"), SectionId::new("C-D")),
            ],
        )
        .unwrap()
    }

    fn train(id: &str, route: &[&str], passengers: u32) -> Train {
        Train::new(
            TrainId::new(id),
            format!("Train {id}"),
            ServiceClass::Express,
            route.iter().map(|s| SectionId::new(*s)).collect(),
            passengers,
            NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn state_with(trains: Vec<Train>) -> NetworkState {
        NetworkState::new(graph(), trains, vec![])
    }

    #[test]
    fn scheduled_train_enters_network() {
        let mut state = state_with(vec![train("12302", &["A-B", "B-C"], 1200)]);
        let id = TrainId::new("12302");

        let outcome = advance_train(&mut state, &id, 5).unwrap();
        assert!(matches!(
            outcome,
            AdvanceOutcome::EnteredNetwork { ref section, .. } if section == &SectionId::new("A-B")
        ));
        assert_eq!(
            state.train(&id).unwrap().position,
            PositionState::InSection
        );
        assert_eq!(
            state
                .occupancy
                .occupant_count(&SectionId::new("A-B"))
                .unwrap(),
            1
        );
    }

    #[test]
    fn advance_moves_occupancy_between_sections() {
        let mut state = state_with(vec![train("12302", &["A-B", "B-C"], 1200)]);
        let id = TrainId::new("12302");
        advance_train(&mut state, &id, 5).unwrap();

        let outcome = advance_train(&mut state, &id, 5).unwrap();
        match outcome {
            AdvanceOutcome::Advanced { from, to, events } => {
                assert_eq!(from, SectionId::new("A-B"));
                assert_eq!(to, SectionId::new("B-C"));
                assert_eq!(events.len(), 2);
            }
            other => panic!("expected Advanced, got {other:?}"),
        }
        assert_eq!(
            state
                .occupancy
                .occupant_count(&SectionId::new("A-B"))
                .unwrap(),
            0
        );
        assert_eq!(
            state
                .occupancy
                .occupant_count(&SectionId::new("B-C"))
                .unwrap(),
            1
        );
    }

    #[test]
    fn full_next_section_holds_train_and_adds_delay() {
        // B-C has capacity 1; blocker occupies it first.
        let mut state = state_with(vec![
            train("11111", &["B-C", "C-D"], 500),
            train("12302", &["A-B", "B-C", "C-D"], 1200),
        ]);
        let blocker = TrainId::new("11111");
        let held = TrainId::new("12302");
        advance_train(&mut state, &blocker, 5).unwrap();
        advance_train(&mut state, &held, 5).unwrap();

        let outcome = advance_train(&mut state, &held, 5).unwrap();
        assert_eq!(
            outcome,
            AdvanceOutcome::HeldAtCapacity {
                section: SectionId::new("B-C"),
                delay_added: 5,
            }
        );

        let t = state.train(&held).unwrap();
        assert_eq!(t.delay_minutes, 5);
        assert_eq!(t.current_section(), Some(&SectionId::new("A-B")));
        // Still occupying the old section, never entered the full one.
        assert_eq!(
            state
                .occupancy
                .occupant_count(&SectionId::new("A-B"))
                .unwrap(),
            1
        );
        assert_eq!(
            state
                .occupancy
                .occupant_count(&SectionId::new("B-C"))
                .unwrap(),
            1
        );
    }

    #[test]
    fn final_section_advance_departs() {
        let mut state = state_with(vec![train("12302", &["A-B"], 1200)]);
        let id = TrainId::new("12302");
        advance_train(&mut state, &id, 5).unwrap();

        let outcome = advance_train(&mut state, &id, 5).unwrap();
        assert!(matches!(outcome, AdvanceOutcome::Departed { .. }));
        assert_eq!(state.train(&id).unwrap().position, PositionState::Departed);
        assert_eq!(state.departed_count, 1);

        let err = advance_train(&mut state, &id, 5).unwrap_err();
        assert_eq!(err, TransitionError::RouteExhausted(id));
    }

    #[test]
    fn route_progress_is_monotonic_without_reroute() {
        let mut state = state_with(vec![train("12302", &["A-B", "B-C", "C-D"], 1200)]);
        let id = TrainId::new("12302");

        let mut last_index = 0;
        for _ in 0..6 {
            let _ = advance_train(&mut state, &id, 5);
            let t = state.train(&id).unwrap();
            assert!(t.route_index >= last_index);
            last_index = t.route_index;
        }
    }

    #[test]
    fn apply_delay_accumulates() {
        let mut state = state_with(vec![train("12302", &["A-B"], 1200)]);
        let id = TrainId::new("12302");
        assert_eq!(apply_delay(&mut state, &id, 10).unwrap(), 10);
        assert_eq!(apply_delay(&mut state, &id, 0).unwrap(), 10);
        assert_eq!(apply_delay(&mut state, &id, 15).unwrap(), 25);
    }

    #[test]
    fn reroute_requires_continuity() {
        let mut state = state_with(vec![train("12302", &["A-B", "B-C", "C-D"], 1200)]);
        let id = TrainId::new("12302");
        advance_train(&mut state, &id, 5).unwrap();

        // First hop is not the current section.
        let err = reroute_train(
            &mut state,
            &id,
            vec![SectionId::new("D-E"), SectionId::new("C-D")],
        )
        .unwrap_err();
        assert_eq!(
            err,
            TransitionError::DiscontinuousRoute {
                expected: SectionId::new("A-B"),
                got: SectionId::new("D-E"),
            }
        );

        // Valid diversion: A-B -> D-E -> C-D.
        reroute_train(
            &mut state,
            &id,
            vec![
                SectionId::new("A-B"),
                SectionId::new("D-E"),
                SectionId::new("C-D"),
            ],
        )
        .unwrap();
        let t = state.train(&id).unwrap();
        assert_eq!(t.route_index, 0);
        assert_eq!(t.current_section(), Some(&SectionId::new("A-B")));
    }

    #[test]
    fn reroute_rejects_unknown_and_unreachable_hops() {
        let mut state = state_with(vec![train("12302", &["A-B", "B-C"], 1200)]);
        let id = TrainId::new("12302");
        advance_train(&mut state, &id, 5).unwrap();

        let err = reroute_train(
            &mut state,
            &id,
            vec![SectionId::new("A-B"), SectionId::new("ZZZ")],
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::UnknownSection(_)));

        // A-B and C-D are not joined directly.
        let err = reroute_train(
            &mut state,
            &id,
            vec![SectionId::new("A-B"), SectionId::new("C-D")],
        )
        .unwrap_err();
        assert_eq!(
            err,
            TransitionError::UnreachableHop {
                from: SectionId::new("A-B"),
                to: SectionId::new("C-D"),
            }
        );

        // Failed reroutes leave the route untouched.
        assert_eq!(state.train(&id).unwrap().route.len(), 2);
    }

    #[test]
    fn reroute_of_departed_train_fails() {
        let mut state = state_with(vec![train("12302", &["A-B"], 1200)]);
        let id = TrainId::new("12302");
        advance_train(&mut state, &id, 5).unwrap();
        advance_train(&mut state, &id, 5).unwrap();

        let err = reroute_train(&mut state, &id, vec![SectionId::new("A-B")]).unwrap_err();
        assert_eq!(err, TransitionError::RouteExhausted(id));
    }
}
