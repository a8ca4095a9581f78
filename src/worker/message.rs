//! Messages accepted by the scheduler worker.
//!
//! The worker receives these over a `tokio::sync::mpsc` channel and
//! processes them serially; that single consumer is what makes the
//! mutation path single-writer.

use tokio::sync::oneshot;

use crate::audit::AuditEntry;
use crate::commands::{AppliedCommand, Command, CommandError};
use crate::types::TrainId;

/// Result delivered back to a command submitter.
pub type CommandResult = std::result::Result<AppliedCommand, CommandError>;

/// Messages that can be sent to the scheduler worker.
#[derive(Debug)]
pub enum WorkerMessage {
    /// An externally-submitted command. Queued by priority; the reply
    /// carries the audit entry or the typed error.
    Command {
        command: Command,
        reply: oneshot::Sender<CommandResult>,
    },

    /// A train should attempt to move to the next section of its route.
    /// Sent by the traffic driver on its movement schedule.
    AdvanceTrain(TrainId),

    /// Run an evaluation cycle now instead of waiting for the next tick.
    Evaluate,

    /// Request a copy of the audit feed.
    AuditFeed {
        reply: oneshot::Sender<Vec<AuditEntry>>,
    },

    /// Finish the current message and exit the event loop.
    Shutdown,
}
