//! Batch run reports.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::models::record::{ExtractedRecord, RecordOutcome};
use crate::storage::SkippedObject;

/// Summary of one output record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSummary {
    /// Source identifier.
    pub id: String,

    /// `parsed` or `fallback`.
    pub status: String,

    pub invoice_number: Option<String>,
    pub total: Option<String>,
    pub currency: Option<String>,

    /// Parse failure reason for fallback records.
    pub reason: Option<String>,
}

impl RecordSummary {
    pub fn from_record(record: &ExtractedRecord, outcome: &RecordOutcome) -> Self {
        let reason = match outcome {
            RecordOutcome::Parsed => None,
            RecordOutcome::Fallback { reason } => Some(reason.clone()),
        };

        Self {
            id: record.id().unwrap_or_default().to_string(),
            status: outcome.label().to_string(),
            invoice_number: record.lookup("invoice_number").and_then(scalar_text),
            total: record.lookup("amount.total").and_then(scalar_text),
            currency: record.lookup("amount.currency").and_then(scalar_text),
            reason,
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Served model the batch ran against.
    pub model: String,

    /// Objects returned by the listing.
    pub listed: usize,

    /// Images sent to inference.
    pub loaded: usize,

    /// Objects left out of the batch.
    pub skipped: Vec<SkippedObject>,

    pub parsed: usize,
    pub fallback: usize,

    /// Generated tokens, when the inference service reports them.
    pub tokens: Option<u64>,

    /// Key the dataset was uploaded to; `None` when nothing was written.
    pub output_key: Option<String>,

    pub records: Vec<RecordSummary>,
}

impl BatchReport {
    /// Report for a run that has not produced anything yet.
    pub fn started(model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            model: model.into(),
            listed: 0,
            loaded: 0,
            skipped: Vec::new(),
            parsed: 0,
            fallback: 0,
            tokens: None,
            output_key: None,
            records: Vec::new(),
        }
    }

    /// Record summaries and counts for the output records.
    pub fn record_outputs(&mut self, records: &[ExtractedRecord], outcomes: &[RecordOutcome]) {
        self.records = records
            .iter()
            .zip(outcomes)
            .map(|(record, outcome)| RecordSummary::from_record(record, outcome))
            .collect();
        self.parsed = outcomes.iter().filter(|o| o.is_parsed()).count();
        self.fallback = outcomes.len() - self.parsed;
    }

    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Number of output records.
    pub fn total(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_summary_of_parsed_record() {
        let mut record = ExtractedRecord::from_map(
            json!({
                "invoice_number": "405027",
                "amount": {"total": 279.01, "currency": "USD"}
            })
            .as_object()
            .cloned()
            .unwrap(),
        );
        record.set_id("images/a.png");

        let summary = RecordSummary::from_record(&record, &RecordOutcome::Parsed);
        assert_eq!(
            summary,
            RecordSummary {
                id: "images/a.png".to_string(),
                status: "parsed".to_string(),
                invoice_number: Some("405027".to_string()),
                total: Some("279.01".to_string()),
                currency: Some("USD".to_string()),
                reason: None,
            }
        );
    }

    #[test]
    fn test_counts() {
        let mut a = ExtractedRecord::empty();
        a.set_id("a");
        let mut b = ExtractedRecord::empty();
        b.set_id("b");

        let mut report = BatchReport::started("test-model");
        report.record_outputs(
            &[a, b],
            &[
                RecordOutcome::Parsed,
                RecordOutcome::Fallback {
                    reason: "no JSON object found".to_string(),
                },
            ],
        );
        report.finish();

        assert_eq!(report.parsed, 1);
        assert_eq!(report.fallback, 1);
        assert_eq!(report.total(), 2);
        assert_eq!(report.records[1].reason.as_deref(), Some("no JSON object found"));
        assert!(report.elapsed() >= chrono::Duration::zero());
    }
}
