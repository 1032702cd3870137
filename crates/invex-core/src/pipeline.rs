//! Batch orchestration.
//!
//! One run covers every image under the source prefix: load, prompt, a
//! single inference call for the whole batch, recovery, optional
//! validation, id linking, then one JSONL upload.

use std::sync::Arc;

use invex_inference::{Completion, InferenceBackend, SamplingParams};
use tracing::{debug, info, warn};

use crate::error::{ExtractionError, Result};
use crate::extract::{RecoveryParser, link_ids};
use crate::models::config::{DEFAULT_OUTPUT_FILE, InvexConfig};
use crate::models::invoice::Invoice;
use crate::models::record::{ExtractedRecord, RecordOutcome};
use crate::prompt::invoice_prompt;
use crate::report::BatchReport;
use crate::sink::export_jsonl;
use crate::storage::{BlobStore, load_images};
use crate::validate::{InvoiceValidator, RecordValidator};

/// Turn completions into id-linked records, in order.
///
/// Parsing never fails: unparsable completions become empty records. The
/// validator, when given, runs on parsed records only and before linking so
/// the `id` key survives.
/// Fails only when completions and ids cannot be paired.
pub fn assemble_records<C, I>(
    parser: &RecoveryParser,
    validator: Option<&dyn RecordValidator>,
    completions: &[C],
    ids: &[I],
) -> std::result::Result<(Vec<ExtractedRecord>, Vec<RecordOutcome>), ExtractionError>
where
    C: AsRef<str>,
    I: AsRef<str>,
{
    if completions.len() != ids.len() {
        return Err(ExtractionError::LengthMismatch {
            records: completions.len(),
            ids: ids.len(),
        });
    }

    let (mut records, outcomes): (Vec<_>, Vec<_>) = parser
        .recover_all(completions)
        .into_iter()
        .map(|r| (r.record, r.outcome))
        .unzip();

    // Fallback records stay empty so they serialize as `{"id": ...}`
    if let Some(validator) = validator {
        debug!("Validating {} records with {}", records.len(), validator.name());
        records = records
            .into_iter()
            .zip(&outcomes)
            .map(|(record, outcome)| {
                if outcome.is_parsed() {
                    validator.validate(record)
                } else {
                    record
                }
            })
            .collect();
    }

    link_ids(&mut records, ids)?;
    Ok((records, outcomes))
}

/// Batch extraction pipeline from a source store to a sink store.
pub struct BatchPipeline {
    source: Arc<dyn BlobStore>,
    sink: Arc<dyn BlobStore>,
    backend: Arc<dyn InferenceBackend>,
    validator: Option<Box<dyn RecordValidator>>,
    parser: RecoveryParser,
    prompt: String,
    params: SamplingParams,
    source_prefix: String,
    output_key: String,
}

impl BatchPipeline {
    /// Create a pipeline with the invoice prompt and default settings.
    pub fn new(
        source: Arc<dyn BlobStore>,
        sink: Arc<dyn BlobStore>,
        backend: Arc<dyn InferenceBackend>,
    ) -> Self {
        Self {
            source,
            sink,
            backend,
            validator: None,
            parser: RecoveryParser::new(),
            prompt: invoice_prompt(),
            params: SamplingParams::default(),
            source_prefix: String::new(),
            output_key: DEFAULT_OUTPUT_FILE.to_string(),
        }
    }

    /// Create a pipeline configured from `config`.
    pub fn from_config(
        config: &InvexConfig,
        source: Arc<dyn BlobStore>,
        sink: Arc<dyn BlobStore>,
        backend: Arc<dyn InferenceBackend>,
    ) -> Self {
        let mut params = config.sampling_params();
        if config.pipeline.guided_decoding {
            params = params.with_guided_json(Invoice::json_schema());
        }

        let mut pipeline = Self::new(source, sink, backend)
            .with_sampling(params)
            .with_parser(RecoveryParser::new().with_preview_chars(config.pipeline.preview_chars))
            .with_source_prefix(&config.storage.source_prefix)
            .with_output_key(config.destination_key());

        if config.pipeline.validate {
            pipeline = pipeline.with_validator(Box::new(InvoiceValidator::new()));
        }
        pipeline
    }

    pub fn with_validator(mut self, validator: Box<dyn RecordValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_parser(mut self, parser: RecoveryParser) -> Self {
        self.parser = parser;
        self
    }

    /// Replace the rendered prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_sampling(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_source_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.source_prefix = prefix.into();
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    pub fn output_key(&self) -> &str {
        &self.output_key
    }

    /// Run one batch.
    ///
    /// Listing, inference, linking and upload failures abort the batch and
    /// nothing is uploaded. An empty batch skips inference and upload.
    pub async fn run(&self) -> Result<BatchReport> {
        let mut report = BatchReport::started(self.backend.model_name());

        info!(
            "Loading images from {} with prefix {}",
            self.source.location(),
            self.source_prefix
        );
        let batch = load_images(self.source.as_ref(), &self.source_prefix).await?;
        report.listed = batch.listed;
        report.loaded = batch.len();
        report.skipped = batch.skipped.clone();

        if batch.is_empty() {
            warn!("No images to process, skipping inference and upload");
            report.finish();
            return Ok(report);
        }

        let (ids, images) = batch.into_parts();

        info!(
            "Running inference on {} images with {}",
            images.len(),
            self.backend.model_name()
        );
        let completions = self
            .backend
            .generate(&self.prompt, &images, &self.params)
            .await?;
        info!("Received {} completions", completions.len());
        report.tokens = log_tokens(&completions);

        let texts: Vec<&str> = completions.iter().map(|c| c.text.as_str()).collect();
        let (records, outcomes) =
            assemble_records(&self.parser, self.validator.as_deref(), &texts, &ids)?;
        report.record_outputs(&records, &outcomes);
        info!(
            "Extracted {} records ({} parsed, {} fallback)",
            records.len(),
            report.parsed,
            report.fallback
        );

        info!(
            "Uploading dataset to {}/{}",
            self.sink.location(),
            self.output_key
        );
        export_jsonl(&records, self.sink.as_ref(), &self.output_key).await?;
        report.output_key = Some(self.output_key.clone());

        report.finish();
        info!("Batch finished in {}ms", report.elapsed().num_milliseconds());
        Ok(report)
    }
}

/// Log per-output token counts and return their sum, if any were reported.
fn log_tokens(completions: &[Completion]) -> Option<u64> {
    let mut total = None;
    for (index, completion) in completions.iter().enumerate() {
        if let Some(tokens) = completion.tokens {
            debug!("Output {} generated {} tokens", index, tokens);
            *total.get_or_insert(0) += u64::from(tokens);
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvexError;
    use crate::storage::LocalStore;
    use async_trait::async_trait;
    use invex_inference::{ImageInput, InferenceError};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::Mutex;

    /// Backend replaying canned completions and recording its calls.
    struct ScriptedBackend {
        outputs: Vec<String>,
        calls: Mutex<Vec<(usize, Option<serde_json::Value>)>>,
    }

    impl ScriptedBackend {
        fn new(outputs: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                outputs: outputs.iter().map(|s| s.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(usize, Option<serde_json::Value>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl InferenceBackend for ScriptedBackend {
        async fn generate(
            &self,
            _prompt: &str,
            images: &[ImageInput],
            params: &SamplingParams,
        ) -> invex_inference::Result<Vec<Completion>> {
            self.calls
                .lock()
                .unwrap()
                .push((images.len(), params.guided_json.clone()));
            Ok(self
                .outputs
                .iter()
                .map(|text| Completion::new(text.as_str()).with_tokens(10))
                .collect())
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl InferenceBackend for FailingBackend {
        async fn generate(
            &self,
            _prompt: &str,
            _images: &[ImageInput],
            _params: &SamplingParams,
        ) -> invex_inference::Result<Vec<Completion>> {
            Err(InferenceError::Status {
                status: 503,
                body: "model is loading".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([0, 0, 0]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn write_images(root: &Path, names: &[&str]) {
        let dir = root.join("images");
        std::fs::create_dir_all(&dir).unwrap();
        for name in names {
            std::fs::write(dir.join(name), png_bytes()).unwrap();
        }
    }

    fn pipeline(root: &Path, backend: Arc<dyn InferenceBackend>) -> BatchPipeline {
        let store: Arc<dyn BlobStore> = Arc::new(LocalStore::new(root));
        BatchPipeline::new(store.clone(), store, backend)
            .with_source_prefix("images/")
            .with_output_key("processed/data.jsonl")
    }

    #[tokio::test]
    async fn test_run_writes_one_line_per_image() {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path(), &["img1.png", "img2.png", "img3.png"]);
        std::fs::write(dir.path().join("images/readme.txt"), b"skip me").unwrap();

        let backend = ScriptedBackend::new(&[
            "{\"total\": 100.0}",
            "not json",
            "{\"total\": 50}",
        ]);
        let report = pipeline(dir.path(), backend.clone()).run().await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("processed/data.jsonl")).unwrap();
        assert_eq!(
            written,
            concat!(
                "{\"total\":100.0,\"id\":\"images/img1.png\"}\n",
                "{\"id\":\"images/img2.png\"}\n",
                "{\"total\":50,\"id\":\"images/img3.png\"}\n",
            )
        );

        assert_eq!(backend.calls().len(), 1);
        assert_eq!(backend.calls()[0].0, 3);
        assert_eq!(report.listed, 4);
        assert_eq!(report.loaded, 3);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.parsed, 2);
        assert_eq!(report.fallback, 1);
        assert_eq!(report.tokens, Some(30));
        assert_eq!(report.output_key.as_deref(), Some("processed/data.jsonl"));
        assert_eq!(report.records[1].status, "fallback");
    }

    #[tokio::test]
    async fn test_empty_batch_skips_inference_and_upload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();

        let backend = ScriptedBackend::new(&[]);
        let report = pipeline(dir.path(), backend.clone()).run().await.unwrap();

        assert!(backend.calls().is_empty());
        assert_eq!(report.total(), 0);
        assert_eq!(report.output_key, None);
        assert!(!dir.path().join("processed/data.jsonl").exists());
    }

    #[tokio::test]
    async fn test_completion_count_mismatch_aborts_before_upload() {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path(), &["a.png", "b.png"]);

        let backend = ScriptedBackend::new(&["{\"total\": 1}"]);
        let result = pipeline(dir.path(), backend).run().await;

        assert!(matches!(
            result,
            Err(InvexError::Extraction(ExtractionError::LengthMismatch {
                records: 1,
                ids: 2
            }))
        ));
        assert!(!dir.path().join("processed/data.jsonl").exists());
    }

    #[tokio::test]
    async fn test_inference_failure_aborts_before_upload() {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path(), &["a.png"]);

        let result = pipeline(dir.path(), Arc::new(FailingBackend)).run().await;

        assert!(matches!(result, Err(InvexError::Inference(_))));
        assert!(!dir.path().join("processed/data.jsonl").exists());
    }

    #[tokio::test]
    async fn test_from_config_enables_guided_decoding_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path(), &["a.png"]);

        let mut config = InvexConfig::default();
        config.storage.source_prefix = "images/".to_string();
        config.storage.destination_prefix = "processed/".to_string();
        config.pipeline.validate = true;

        let backend = ScriptedBackend::new(&[
            r#"{"invoice_number": "405027", "amount": {"total": "279.01", "currency": "usd"}}"#,
        ]);
        let store: Arc<dyn BlobStore> = Arc::new(LocalStore::new(dir.path()));
        let pipeline = BatchPipeline::from_config(&config, store.clone(), store, backend.clone());
        assert_eq!(pipeline.output_key(), "processed/data.jsonl");

        let report = pipeline.run().await.unwrap();

        let calls = backend.calls();
        assert_eq!(calls[0].1, Some(Invoice::json_schema()));
        assert_eq!(report.records[0].currency.as_deref(), Some("USD"));

        let written = std::fs::read_to_string(dir.path().join("processed/data.jsonl")).unwrap();
        let line: serde_json::Value = serde_json::from_str(written.trim_end()).unwrap();
        assert_eq!(line["id"], "images/a.png");
        assert_eq!(line["amount"]["total"], 279.01);
    }

    #[test]
    fn test_assemble_records_validates_before_linking() {
        let validator = InvoiceValidator::new();
        let (records, outcomes) = assemble_records(
            &RecoveryParser::new(),
            Some(&validator),
            &["{\"invoice_number\": \"1\"}", "garbage"],
            &["a", "b"],
        )
        .unwrap();

        assert_eq!(records[0].id(), Some("a"));
        assert_eq!(records[1].id(), Some("b"));
        assert!(outcomes[0].is_parsed());
        assert!(!outcomes[1].is_parsed());
    }

    #[test]
    fn test_validation_leaves_fallback_records_empty() {
        let validator = InvoiceValidator::new();
        let (records, _) = assemble_records(
            &RecoveryParser::new(),
            Some(&validator),
            &["I could not read this invoice."],
            &["img2"],
        )
        .unwrap();

        assert_eq!(
            serde_json::to_string(&records[0]).unwrap(),
            r#"{"id":"img2"}"#
        );
    }
}
