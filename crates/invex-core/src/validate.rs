//! Optional schema validation stage.
//!
//! Validation is a capability: the pipeline runs it only when a validator
//! is installed. The invoice validator normalizes instead of rejecting, so
//! it never breaks the one-record-per-image guarantee.

use tracing::debug;

use crate::models::invoice::Invoice;
use crate::models::record::ExtractedRecord;

/// Trait for record validators.
pub trait RecordValidator: Send + Sync {
    /// Validate and normalize one record. Must return a record for every
    /// input.
    fn validate(&self, record: ExtractedRecord) -> ExtractedRecord;

    /// Name used in logs.
    fn name(&self) -> &str;
}

/// Validator coercing records into the invoice schema.
///
/// Output records contain every schema field (missing ones as `null`) and
/// drop keys the schema does not know.
#[derive(Debug, Clone, Default)]
pub struct InvoiceValidator;

impl InvoiceValidator {
    pub fn new() -> Self {
        Self
    }
}

impl RecordValidator for InvoiceValidator {
    fn validate(&self, record: ExtractedRecord) -> ExtractedRecord {
        let mut invoice = Invoice::from_record(record.as_map());
        invoice.normalize();

        let normalized = invoice.to_record();
        let dropped = record
            .as_map()
            .keys()
            .filter(|k| !normalized.contains_key(k.as_str()))
            .count();
        if dropped > 0 {
            debug!("Dropped {} keys outside the invoice schema", dropped);
        }

        ExtractedRecord::from_map(normalized)
    }

    fn name(&self) -> &str {
        "invoice-schema"
    }
}
