//! Request-id deduplication.
//!
//! Clients retry commands after a lost response; replaying a mutation would
//! double a hold or re-accept a recommendation. The applier records the
//! audit entry produced for each request id and returns it verbatim on a
//! replay. Entries older than the retention period are pruned so the table
//! cannot grow without bound.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::audit::AuditEntry;
use crate::types::RequestId;

/// Default retention for seen request ids.
pub const DEFAULT_DEDUPE_TTL: Duration = Duration::hours(24);

/// Seen request ids with the audit entry each one produced.
#[derive(Debug, Default)]
pub struct SeenRequests {
    seen: HashMap<RequestId, (AuditEntry, DateTime<Utc>)>,
}

impl SeenRequests {
    pub fn new() -> Self {
        SeenRequests::default()
    }

    /// The entry a previously applied request produced, if any.
    pub fn lookup(&self, request_id: &RequestId) -> Option<&AuditEntry> {
        self.seen.get(request_id).map(|(entry, _)| entry)
    }

    /// Records a successfully applied request. Failed commands are never
    /// recorded so the client may retry them.
    pub fn record(&mut self, request_id: RequestId, entry: AuditEntry, now: DateTime<Utc>) {
        self.seen.insert(request_id, (entry, now));
    }

    /// Drops ids recorded before `now - ttl`. Returns how many were pruned.
    pub fn prune(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let cutoff = now - ttl;
        let before = self.seen.len();
        self.seen.retain(|_, (_, recorded)| *recorded > cutoff);
        before - self.seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{Actor, EventKind};

    fn entry(seq: u64) -> AuditEntry {
        AuditEntry {
            seq,
            timestamp: Utc::now(),
            event: EventKind::TrainHold,
            train: None,
            section: None,
            actor: Actor::System,
            action: "test".to_string(),
            details: String::new(),
        }
    }

    #[test]
    fn recorded_id_is_found() {
        let mut seen = SeenRequests::new();
        let id = RequestId::new("req-1");
        assert!(seen.lookup(&id).is_none());

        seen.record(id.clone(), entry(1), Utc::now());
        assert_eq!(seen.lookup(&id).map(|e| e.seq), Some(1));
        assert!(seen.lookup(&RequestId::new("req-2")).is_none());
    }

    #[test]
    fn prune_respects_ttl() {
        let mut seen = SeenRequests::new();
        let now = Utc::now();
        seen.record(RequestId::new("old"), entry(1), now - Duration::hours(25));
        seen.record(RequestId::new("fresh"), entry(2), now);

        let pruned = seen.prune(now, DEFAULT_DEDUPE_TTL);
        assert_eq!(pruned, 1);
        assert!(seen.lookup(&RequestId::new("old")).is_none());
        assert!(seen.lookup(&RequestId::new("fresh")).is_some());
    }
}
