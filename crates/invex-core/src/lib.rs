//! Core library for batch invoice extraction with vision language models.
//!
//! This crate provides:
//! - Image loading from S3 or a local directory
//! - Prompt rendering for the Qwen2.5-VL chat template
//! - Recovery of JSON records from free-form model output
//! - Optional normalization to the invoice schema
//! - JSON Lines export and batch orchestration

pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod sink;
pub mod storage;
pub mod validate;

pub use error::{InvexError, Result};
pub use extract::{Recovered, RecoveryParser, link_ids, locate_json_object};
pub use models::config::InvexConfig;
pub use models::invoice::Invoice;
pub use models::record::{ExtractedRecord, RecordOutcome};
pub use pipeline::{BatchPipeline, assemble_records};
pub use report::{BatchReport, RecordSummary};
pub use storage::{BlobStore, LocalStore};
#[cfg(feature = "s3")]
pub use storage::S3Store;
pub use validate::{InvoiceValidator, RecordValidator};

/// Re-export inference types.
pub use invex_inference::{Completion, ImageInput, InferenceBackend, SamplingParams};

#[cfg(feature = "ollama")]
pub use invex_inference::{OllamaBackend, OllamaConfig};
