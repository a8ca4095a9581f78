//! Priority queue for pending commands.
//!
//! Commands are ordered by priority (emergency first), then by sequence
//! number (FIFO within a priority level), so a hold or signal override
//! submitted during a burst of routine commands is applied promptly without
//! reordering the rest.

use std::collections::{BinaryHeap, HashSet};

use tokio::sync::oneshot;

use crate::commands::{Command, CommandPriority};
use crate::types::RequestId;

use super::message::CommandResult;

/// A command waiting in the queue, with the channel to answer on.
#[derive(Debug)]
pub struct QueuedCommand {
    pub command: Command,

    /// Where to send the outcome; `None` for fire-and-forget submissions.
    pub reply: Option<oneshot::Sender<CommandResult>>,

    priority: CommandPriority,

    /// FIFO ordering within the same priority level.
    sequence: u64,
}

// Ordering considers only priority and sequence; the reply channel is
// irrelevant to queue position.
impl PartialEq for QueuedCommand {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedCommand {}

impl PartialOrd for QueuedCommand {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedCommand {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap: higher priority first, then lower
        // sequence number first (reversed for FIFO).
        match self.priority.cmp(&other.priority) {
            std::cmp::Ordering::Equal => other.sequence.cmp(&self.sequence),
            ordering => ordering,
        }
    }
}

/// Priority queue over pending commands with in-queue request-id dedupe.
#[derive(Debug, Default)]
pub struct CommandQueue {
    heap: BinaryHeap<QueuedCommand>,
    next_sequence: u64,

    /// Request ids currently queued, to drop duplicate submissions of a
    /// command that has not been applied yet.
    queued_ids: HashSet<RequestId>,
}

impl CommandQueue {
    pub fn new() -> Self {
        CommandQueue::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, request_id: &RequestId) -> bool {
        self.queued_ids.contains(request_id)
    }

    /// Enqueues a command. Returns `false` (dropping the reply channel, so
    /// the duplicate submitter sees a closed channel) if the same request id
    /// is already waiting.
    pub fn push(&mut self, command: Command, reply: Option<oneshot::Sender<CommandResult>>) -> bool {
        if self.queued_ids.contains(&command.request_id) {
            return false;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.queued_ids.insert(command.request_id.clone());
        let priority = command.priority();
        self.heap.push(QueuedCommand {
            command,
            reply,
            priority,
            sequence,
        });
        true
    }

    /// Pops the highest-priority command.
    pub fn pop(&mut self) -> Option<QueuedCommand> {
        let queued = self.heap.pop()?;
        self.queued_ids.remove(&queued.command.request_id);
        Some(queued)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::audit::Actor;
    use crate::commands::CommandKind;
    use crate::types::{RecommendationId, TrainId};

    fn normal(request: &str) -> Command {
        Command {
            request_id: RequestId::new(request),
            actor: Actor::System,
            kind: CommandKind::AcceptRecommendation {
                recommendation: RecommendationId(1),
            },
        }
    }

    fn emergency(request: &str) -> Command {
        Command {
            request_id: RequestId::new(request),
            actor: Actor::System,
            kind: CommandKind::HoldTrain {
                train: TrainId::new("12302"),
                minutes: 5,
            },
        }
    }

    #[test]
    fn emergency_pops_before_normal() {
        let mut queue = CommandQueue::new();
        queue.push(normal("n1"), None);
        queue.push(emergency("e1"), None);
        queue.push(normal("n2"), None);

        assert_eq!(queue.pop().unwrap().command.request_id.as_str(), "e1");
        assert_eq!(queue.pop().unwrap().command.request_id.as_str(), "n1");
        assert_eq!(queue.pop().unwrap().command.request_id.as_str(), "n2");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn duplicate_request_id_is_dropped_while_queued() {
        let mut queue = CommandQueue::new();
        assert!(queue.push(normal("n1"), None));
        assert!(!queue.push(normal("n1"), None));
        assert_eq!(queue.len(), 1);

        // Once popped, the id can be queued again (the applier's seen-table
        // handles post-apply replays).
        queue.pop();
        assert!(queue.push(normal("n1"), None));
    }

    proptest! {
        /// Emergency commands always drain before normal ones; FIFO holds
        /// within each level.
        #[test]
        fn priority_then_fifo(
            normal_count in 1usize..6,
            emergency_count in 1usize..6,
        ) {
            let mut queue = CommandQueue::new();
            for i in 0..normal_count {
                queue.push(normal(&format!("n{i}")), None);
            }
            for i in 0..emergency_count {
                queue.push(emergency(&format!("e{i}")), None);
            }

            for i in 0..emergency_count {
                let popped = queue.pop().unwrap();
                prop_assert_eq!(popped.command.request_id.as_str(), format!("e{i}"));
            }
            for i in 0..normal_count {
                let popped = queue.pop().unwrap();
                prop_assert_eq!(popped.command.request_id.as_str(), format!("n{i}"));
            }
            prop_assert!(queue.is_empty());
        }

        /// Length tracks pushes and pops.
        #[test]
        fn length_is_accurate(push_count in 0usize..20, pop_count in 0usize..20) {
            let mut queue = CommandQueue::new();
            for i in 0..push_count {
                queue.push(normal(&format!("n{i}")), None);
            }
            let pops = pop_count.min(push_count);
            for _ in 0..pops {
                queue.pop();
            }
            prop_assert_eq!(queue.len(), push_count - pops);
        }
    }
}
