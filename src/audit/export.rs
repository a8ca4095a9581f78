//! CSV export of the audit trail.
//!
//! The export is a download for compliance review, so the column layout is
//! fixed: `Timestamp,Event,Train ID,Section ID,User,Action,Details`. The
//! details column is always quoted (it carries free text); the other columns
//! are quoted only when they contain a comma, quote, or newline.

use std::fmt::Write;

use super::entry::AuditEntry;

const HEADER: &str = "Timestamp,Event,Train ID,Section ID,User,Action,Details";

/// Renders entries as a CSV document, oldest first, including the header
/// row.
pub fn to_csv(entries: &[AuditEntry]) -> String {
    let mut out = String::with_capacity(64 + entries.len() * 96);
    out.push_str(HEADER);
    out.push('\n');

    for entry in entries {
        let _ = write!(
            out,
            "{},{},{},{},{},{},{}",
            escape(&entry.timestamp.to_rfc3339()),
            escape(entry.event.label()),
            escape(entry.train.as_ref().map_or("", |t| t.as_str())),
            escape(entry.section.as_ref().map_or("", |s| s.as_str())),
            escape(&entry.actor.to_string()),
            escape(&entry.action),
            quote(&entry.details),
        );
        out.push('\n');
    }

    out
}

/// Quotes a field only when CSV requires it.
fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        quote(field)
    } else {
        field.to_string()
    }
}

/// Always-quoted form, with internal quotes doubled per RFC 4180.
fn quote(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 2);
    out.push('"');
    for c in field.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::audit::entry::{Actor, EventKind};
    use crate::types::{SectionId, TrainId};

    fn entry(details: &str) -> AuditEntry {
        AuditEntry {
            seq: 1,
            timestamp: Utc.with_ymd_and_hms(2026, 8, 26, 10, 30, 0).unwrap(),
            event: EventKind::TrainHold,
            train: Some(TrainId::new("12302")),
            section: Some(SectionId::new("NDLS-GZB")),
            actor: Actor::Controller {
                id: "CTR-104".to_string(),
            },
            action: "Hold applied".to_string(),
            details: details.to_string(),
        }
    }

    #[test]
    fn header_is_exact() {
        let csv = to_csv(&[]);
        assert_eq!(csv, "Timestamp,Event,Train ID,Section ID,User,Action,Details\n");
    }

    #[test]
    fn details_are_always_quoted() {
        let csv = to_csv(&[entry("plain text")]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.ends_with(",\"plain text\""));
    }

    #[test]
    fn quotes_in_details_are_doubled() {
        let csv = to_csv(&[entry("held at \"NDLS\" junction, 5 min")]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.ends_with(",\"held at \"\"NDLS\"\" junction, 5 min\""));
    }

    #[test]
    fn other_fields_escape_only_when_needed() {
        let mut e = entry("x");
        e.action = "Set signal, then held".to_string();
        let csv = to_csv(&[e]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains(",\"Set signal, then held\","));
        // Train id with no special characters stays bare.
        assert!(row.contains(",12302,"));
    }

    #[test]
    fn missing_train_and_section_are_empty_columns() {
        let mut e = entry("x");
        e.train = None;
        e.section = None;
        let csv = to_csv(&[e]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains("Train Hold,,,CTR-104,"));
    }
}
