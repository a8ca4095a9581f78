//! Externally-submitted commands: types, request-id dedupe, and the
//! single-writer applier that turns a command into a state mutation plus an
//! audit entry.

mod applier;
mod dedupe;
mod types;

pub use applier::{AppliedCommand, CommandApplier, CommandError};
pub use dedupe::{DEFAULT_DEDUPE_TTL, SeenRequests};
pub use types::{Command, CommandKind, CommandPriority};
