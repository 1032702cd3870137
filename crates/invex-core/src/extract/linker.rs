//! Re-attaching source identifiers to recovered records.

use crate::error::ExtractionError;
use crate::models::record::ExtractedRecord;

use super::Result;

/// Set `id` on every record from the identifier at the same position.
///
/// The sequences must have equal length; a mismatch means completions and
/// images are no longer aligned, and the batch is rejected rather than
/// silently truncated. Nothing is mutated on error.
pub fn link_ids<S: AsRef<str>>(records: &mut [ExtractedRecord], ids: &[S]) -> Result<()> {
    if records.len() != ids.len() {
        return Err(ExtractionError::LengthMismatch {
            records: records.len(),
            ids: ids.len(),
        });
    }

    for (record, id) in records.iter_mut().zip(ids) {
        record.set_id(id.as_ref());
    }
    Ok(())
}
