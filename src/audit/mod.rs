//! Audit trail: immutable entries, the append-only log, the read-side feed,
//! and the CSV export.

mod entry;
mod export;
mod feed;
mod log;

pub use entry::{Actor, AuditEntry, EventKind};
pub use export::to_csv;
pub use feed::{AuditFilter, AuditPage, paginate};
pub use log::{AuditError, AuditLog, AuditRecord};
