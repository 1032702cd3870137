//! Resilient JSON parsing of model completions.

use serde_json::Value;
use tracing::{debug, error};

use crate::error::ExtractionError;
use crate::models::record::{ExtractedRecord, RecordOutcome};

use super::{Result, locate_json_object, preview};

/// A record recovered from one completion, with how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub record: ExtractedRecord,
    pub outcome: RecordOutcome,
}

/// Parser that never fails a batch on malformed output.
#[derive(Debug, Clone)]
pub struct RecoveryParser {
    /// Characters of raw output included in diagnostics.
    preview_chars: usize,
}

impl RecoveryParser {
    /// Create a parser with the default 500-character previews.
    pub fn new() -> Self {
        Self { preview_chars: 500 }
    }

    /// Set the diagnostic preview length.
    pub fn with_preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = chars;
        self
    }

    /// Strictly parse the JSON object located in `raw`.
    pub fn parse(&self, index: usize, raw: &str) -> Result<ExtractedRecord> {
        let candidate = locate_json_object(raw);
        if candidate.is_empty() {
            return Err(ExtractionError::JsonParse {
                index,
                reason: "no JSON object found".to_string(),
            });
        }

        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => Ok(ExtractedRecord::from_map(map)),
            Ok(other) => Err(ExtractionError::JsonParse {
                index,
                reason: format!("expected an object, got {}", json_kind(&other)),
            }),
            Err(e) => Err(ExtractionError::JsonParse {
                index,
                reason: e.to_string(),
            }),
        }
    }

    /// Parse `raw`, substituting the empty record on failure.
    pub fn recover(&self, index: usize, raw: &str) -> Recovered {
        debug!(
            "Raw model output {}: {}",
            index,
            preview(raw, self.preview_chars)
        );

        match self.parse(index, raw) {
            Ok(record) => {
                debug!("Parsed JSON for output {}", index);
                Recovered {
                    record,
                    outcome: RecordOutcome::Parsed,
                }
            }
            Err(e) => {
                let reason = match &e {
                    ExtractionError::JsonParse { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                error!("Issue with decoding JSON for model output {}: {}", index, reason);
                error!(
                    "JSON string attempted to parse: {}",
                    preview(locate_json_object(raw), self.preview_chars)
                );
                Recovered {
                    record: ExtractedRecord::empty(),
                    outcome: RecordOutcome::Fallback { reason },
                }
            }
        }
    }

    /// Recover one record per completion, in order.
    pub fn recover_all<S: AsRef<str>>(&self, completions: &[S]) -> Vec<Recovered> {
        completions
            .iter()
            .enumerate()
            .map(|(index, raw)| self.recover(index, raw.as_ref()))
            .collect()
    }
}

impl Default for RecoveryParser {
    fn default() -> Self {
        Self::new()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
