//! Read-side filtering and pagination over the audit feed.
//!
//! The feed serves the dashboard newest-first; the underlying log stays
//! oldest-first (append order).

use serde::Serialize;

use super::entry::{AuditEntry, EventKind};
use crate::types::TrainId;

/// Optional predicates applied before pagination. All present fields must
/// match.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub event: Option<EventKind>,
    pub train: Option<TrainId>,
    /// Matches the actor's display form (operator id, "AI System", "System").
    pub user: Option<String>,
}

impl AuditFilter {
    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(event) = self.event
            && entry.event != event
        {
            return false;
        }
        if let Some(train) = &self.train
            && entry.train.as_ref() != Some(train)
        {
            return false;
        }
        if let Some(user) = &self.user
            && entry.actor.to_string() != *user
        {
            return false;
        }
        true
    }
}

/// One page of the feed, newest entries first.
#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    /// 1-based page number as requested.
    pub page: usize,
    pub per_page: usize,
    /// Total entries matching the filter, across all pages.
    pub total: usize,
}

/// Filters and paginates the feed. `page` is 1-based; a page past the end
/// yields an empty page with the correct total.
pub fn paginate(
    entries: &[AuditEntry],
    filter: &AuditFilter,
    page: usize,
    per_page: usize,
) -> AuditPage {
    let page = page.max(1);
    let per_page = per_page.max(1);

    let matching: Vec<&AuditEntry> = entries
        .iter()
        .rev()
        .filter(|e| filter.matches(e))
        .collect();
    let total = matching.len();

    let entries = matching
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .cloned()
        .collect();

    AuditPage {
        entries,
        page,
        per_page,
        total,
    }
}
