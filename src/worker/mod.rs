//! The single-writer scheduler task: message types, the priority command
//! queue, and the event loop.

mod message;
mod queue;
mod worker;

pub use message::{CommandResult, WorkerMessage};
pub use queue::{CommandQueue, QueuedCommand};
pub use worker::{SchedulerWorker, SubmitError, WorkerHandle};
