//! Authoritative network state and train lifecycle transitions.
//!
//! - [`store`]: the owned state for one region (graph, occupancy, trains,
//!   signals, recommendations) with a monotonic version counter.
//! - [`transitions`]: the train state machine operating on the store.

mod store;
mod transitions;

pub use store::NetworkState;
pub use transitions::{AdvanceOutcome, TransitionError, advance_train, apply_delay, reroute_train};
