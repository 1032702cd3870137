//! JSON Lines output.

use std::fs::File;
use std::io::{BufWriter, Write};

use tracing::{error, info};

use crate::error::{InvexError, SinkError};
use crate::models::record::ExtractedRecord;
use crate::storage::BlobStore;

/// Name of the staged file inside the scratch directory.
const STAGED_FILE: &str = "data.jsonl";

/// Write records as compact JSON objects, one per `\n`-terminated line.
///
/// Returns the number of lines written.
pub fn write_jsonl<W: Write>(records: &[ExtractedRecord], writer: W) -> Result<usize, SinkError> {
    let mut writer = BufWriter::new(writer);
    for (index, record) in records.iter().enumerate() {
        serde_json::to_writer(&mut writer, record).map_err(|e| SinkError::Serialize {
            index,
            reason: e.to_string(),
        })?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(records.len())
}

/// Serialize records to a JSONL string.
pub fn to_jsonl_string(records: &[ExtractedRecord]) -> Result<String, SinkError> {
    let mut buffer = Vec::new();
    write_jsonl(records, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| SinkError::Serialize {
        index: 0,
        reason: e.to_string(),
    })
}

/// Stage records in a scratch file and upload it to `key`.
///
/// The scratch directory is removed when this returns, whether the upload
/// succeeded or not.
pub async fn export_jsonl(
    records: &[ExtractedRecord],
    store: &dyn BlobStore,
    key: &str,
) -> Result<(), InvexError> {
    let scratch = tempfile::tempdir()?;
    let staged = scratch.path().join(STAGED_FILE);

    let written = write_jsonl(records, File::create(&staged)?)?;

    store.put_file(key, &staged).await.inspect_err(|e| {
        error!("Issue uploading {} to {}: {}", key, store.location(), e);
    })?;

    info!(
        "Exported {} records to {}/{}",
        written,
        store.location(),
        key
    );
    Ok(())
}
