//! Read-only projections: timeline, integrity report and audit export.
//!
//! Nothing here holds state; every projection is recomputed from the store
//! and the verifier on each call.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use custody_ledger_core::{
    verify_stored, CustodyEvent, EventHash, EventType, PreviousHash, StoredEvent, SubjectId,
    SubjectStatus, VerificationReport,
};
use custody_ledger_store::LedgerStore;

use crate::error::{LedgerError, Result};
use crate::ledger::Ledger;

/// An event with its verification flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    #[serde(flatten)]
    pub event: CustodyEvent,
    /// Verification passed up to and including this event.
    pub verified: bool,
}

/// The event at which a chain broke.
///
/// Type and time are absent when the stored row no longer decodes; `damage`
/// then says what failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokenEvent {
    pub sequence_number: u64,
    pub event_type: Option<EventType>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub damage: Option<String>,
}

impl BrokenEvent {
    fn of(row: &StoredEvent) -> Self {
        match row {
            StoredEvent::Decoded(e) => Self {
                sequence_number: e.sequence_number,
                event_type: Some(e.event_type()),
                occurred_at: Some(e.occurred_at),
                damage: None,
            },
            StoredEvent::Corrupt {
                sequence_number,
                detail,
            } => Self {
                sequence_number: *sequence_number,
                event_type: None,
                occurred_at: None,
                damage: Some(detail.clone()),
            },
        }
    }
}

/// Verifier output plus the context an auditor needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub subject_id: SubjectId,
    pub generated_at: DateTime<Utc>,
    pub chain_length: u64,
    pub head_status: Option<SubjectStatus>,
    pub head_hash: Option<EventHash>,
    #[serde(flatten)]
    pub verification: VerificationReport,
    pub broken_event: Option<BrokenEvent>,
    /// One-line human-readable pass/fail summary.
    pub summary: String,
}

/// Output format for [`Ledger::export_report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Text,
}

impl FromStr for ExportFormat {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "text" | "txt" => Ok(ExportFormat::Text),
            other => Err(LedgerError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Timeline and integrity report together, as exported.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditExport {
    pub integrity: IntegrityReport,
    pub timeline: Vec<TimelineEntry>,
}

impl<S: LedgerStore> Ledger<S> {
    // ─────────────────────────────────────────────────────────────────────────
    // Projections
    // ─────────────────────────────────────────────────────────────────────────

    /// A subject's chain with a per-event verified flag.
    ///
    /// Rows that no longer decode have no entry; every entry from the first
    /// failure onward is unverified.
    pub async fn get_timeline(&self, subject_id: &SubjectId) -> Result<Vec<TimelineEntry>> {
        let (rows, report) = self.verified_rows(subject_id).await?;
        Ok(timeline(rows, &report))
    }

    /// Run the verifier and summarize the result.
    pub async fn get_integrity_report(&self, subject_id: &SubjectId) -> Result<IntegrityReport> {
        let (rows, report) = self.verified_rows(subject_id).await?;
        Ok(self.integrity(subject_id, &rows, report))
    }

    /// Render timeline and integrity report for export.
    pub async fn export_report(&self, subject_id: &SubjectId, format: ExportFormat) -> Result<String> {
        let (rows, report) = self.verified_rows(subject_id).await?;
        let export = AuditExport {
            integrity: self.integrity(subject_id, &rows, report.clone()),
            timeline: timeline(rows, &report),
        };

        match format {
            ExportFormat::Json => Ok(serde_json::to_string_pretty(&export)?),
            ExportFormat::Text => Ok(render_text(&export)),
        }
    }

    async fn verified_rows(
        &self,
        subject_id: &SubjectId,
    ) -> Result<(Vec<StoredEvent>, VerificationReport)> {
        let rows = self.store().get_stored_chain(subject_id).await?;
        let report = verify_stored(0, Some(PreviousHash::Genesis), &rows);
        Ok((rows, report))
    }

    fn integrity(
        &self,
        subject_id: &SubjectId,
        rows: &[StoredEvent],
        verification: VerificationReport,
    ) -> IntegrityReport {
        let head = rows.last().and_then(StoredEvent::event);
        let broken_event = verification
            .first_failure_index
            .and_then(|i| rows.get(i as usize))
            .map(BrokenEvent::of);

        let len = rows.len() as u64;
        let summary = summarize(subject_id, len, &verification, broken_event.as_ref());

        IntegrityReport {
            subject_id: subject_id.clone(),
            generated_at: self.clock().now(),
            chain_length: len,
            head_status: head.map(|h| h.subject_status),
            head_hash: head.map(|h| h.current_hash),
            verification,
            broken_event,
            summary,
        }
    }
}

fn timeline(rows: Vec<StoredEvent>, report: &VerificationReport) -> Vec<TimelineEntry> {
    rows.into_iter()
        .enumerate()
        .filter_map(|(i, row)| {
            row.into_event().map(|event| TimelineEntry {
                verified: report.is_verified(i as u64),
                event,
            })
        })
        .collect()
}

fn summarize(
    subject_id: &SubjectId,
    len: u64,
    report: &VerificationReport,
    broken: Option<&BrokenEvent>,
) -> String {
    if len == 0 {
        return format!("{subject_id}: no custody history");
    }
    if report.valid {
        return format!("{subject_id}: PASS - all {len} events verified");
    }

    let at = match (report.first_failure_index, broken) {
        (Some(i), Some(BrokenEvent { event_type: Some(t), .. })) => format!("event {i} ({t:?})"),
        (Some(i), Some(_)) => format!("event {i} (unreadable)"),
        (Some(i), None) => format!("event {i}"),
        (None, _) => "unknown event".to_string(),
    };
    let reason = report
        .reason
        .map(|r| r.to_string())
        .unwrap_or_else(|| "unknown reason".to_string());
    format!(
        "{subject_id}: FAIL - chain broken at {at}: {reason}; {} of {len} events checked",
        report.events_checked
    )
}

fn render_text(export: &AuditExport) -> String {
    let report = &export.integrity;
    let mut out = String::new();

    out.push_str("CUSTODY AUDIT REPORT\n");
    out.push_str(&format!("Subject:   {}\n", report.subject_id));
    out.push_str(&format!(
        "Generated: {}\n",
        report.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    out.push_str(&format!("Events:    {}\n", report.chain_length));
    if let Some(status) = report.head_status {
        out.push_str(&format!("Status:    {}\n", status.as_str()));
    }
    if let Some(hash) = report.head_hash {
        out.push_str(&format!("Head:      {}\n", hash));
    }
    out.push_str(&format!("Integrity: {}\n", report.summary));
    if let Some(BrokenEvent {
        sequence_number,
        damage: Some(damage),
        ..
    }) = &report.broken_event
    {
        out.push_str(&format!("Damaged:   event {sequence_number}: {damage}\n"));
    }

    if export.timeline.is_empty() {
        return out;
    }

    out.push('\n');
    out.push_str(&format!(
        "{:<5} {:<4} {:<20} {:<20} {:<10} {:<24} {}\n",
        "SEQ", "OK", "OCCURRED AT", "EVENT", "STATUS", "ACTOR", "LOCATION"
    ));
    for entry in &export.timeline {
        let e = &entry.event;
        out.push_str(&format!(
            "{:<5} {:<4} {:<20} {:<20} {:<10} {:<24} {}\n",
            e.sequence_number,
            if entry.verified { "yes" } else { "NO" },
            e.occurred_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            format!("{:?}", e.event_type()),
            e.subject_status.as_str(),
            format!("{} ({})", e.actor.name, e.actor.role),
            e.location,
        ));
    }
    out
}
