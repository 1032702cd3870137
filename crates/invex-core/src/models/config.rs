//! Configuration structures for the extraction pipeline.
//!
//! Settings are layered: built-in defaults, then an optional JSON file, then
//! environment variables (a `.env` file in the working directory is read
//! first), then command-line flags. The result is validated once and stays
//! immutable for the run.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use invex_inference::SamplingParams;

use crate::error::ConfigError;

/// File name appended to a destination prefix that ends with `/`.
pub const DEFAULT_OUTPUT_FILE: &str = "data.jsonl";

/// Main configuration for the invex pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvexConfig {
    /// Served model settings.
    pub model: ModelConfig,

    /// Decoding settings.
    pub sampling: SamplingConfig,

    /// Inference service connection.
    pub inference: InferenceConfig,

    /// Object storage locations.
    pub storage: StorageConfig,

    /// Pipeline stage switches.
    pub pipeline: PipelineConfig,
}

/// Model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier as known to the inference service.
    pub name: String,

    /// Fraction of GPU memory the model server may claim, in (0, 1].
    pub gpu_memory_utilization: f32,

    /// Maximum concurrent sequences (requests in flight).
    pub max_num_seqs: usize,

    /// Maximum model context length, a multiple of 8.
    pub max_model_len: u32,

    /// Credential token for gated models or authenticated endpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "qwen2.5vl:7b".to_string(),
            gpu_memory_utilization: 0.9,
            max_num_seqs: 4,
            max_model_len: 4096,
            api_token: None,
        }
    }
}

/// Sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Maximum generated tokens per image, a multiple of 8.
    pub max_tokens: u32,

    /// Sampling temperature in [0, 1].
    pub temperature: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.0,
        }
    }
}

/// Inference service connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL of the inference server.
    pub url: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            timeout_secs: 600,
        }
    }
}

/// Object storage locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Bucket holding both the source images and the output.
    pub bucket: String,

    /// Prefix under which source images are listed.
    pub source_prefix: String,

    /// Output object key, or a prefix ending in `/`.
    pub destination_prefix: String,

    /// Region override (falls back to the AWS environment).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible stores such as MinIO.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Pipeline stage switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Send the invoice JSON Schema to constrain decoding.
    pub guided_decoding: bool,

    /// Normalize records against the invoice schema before linking.
    pub validate: bool,

    /// Characters of raw output shown in diagnostics.
    pub preview_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            guided_decoding: true,
            validate: false,
            preview_chars: 500,
        }
    }
}

impl InvexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from `path` when given, otherwise start from defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overlay settings from the process environment and a `.env` file.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        // A missing .env file is the normal case.
        let _ = dotenvy::dotenv();
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Overlay settings from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MODEL_NAME") {
            self.model.name = v;
        }
        if let Some(v) = get("GPU_MEMORY_UTILISATION") {
            self.model.gpu_memory_utilization = parse_env("GPU_MEMORY_UTILISATION", &v)?;
        }
        if let Some(v) = get("MAX_NUM_SEQS") {
            self.model.max_num_seqs = parse_env("MAX_NUM_SEQS", &v)?;
        }
        if let Some(v) = get("MAX_MODEL_LEN") {
            self.model.max_model_len = parse_env("MAX_MODEL_LEN", &v)?;
        }
        if let Some(v) = get("HF_TOKEN") {
            self.model.api_token = Some(v);
        }
        if let Some(v) = get("MAX_TOKENS") {
            self.sampling.max_tokens = parse_env("MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("TEMPERATURE") {
            self.sampling.temperature = parse_env("TEMPERATURE", &v)?;
        }
        if let Some(v) = get("INVEX_INFERENCE_URL") {
            self.inference.url = v;
        }
        if let Some(v) = get("S3_BUCKET") {
            self.storage.bucket = v;
        }
        if let Some(v) = get("S3_PREPROCESSED_IMAGES_DIR_PREFIX") {
            self.storage.source_prefix = v;
        }
        if let Some(v) = get("S3_PROCESSED_DATASET_PREFIX") {
            self.storage.destination_prefix = v;
        }
        if let Some(v) = get("INVEX_GUIDED_DECODING") {
            self.pipeline.guided_decoding = parse_flag("INVEX_GUIDED_DECODING", &v)?;
        }
        if let Some(v) = get("INVEX_VALIDATE") {
            self.pipeline.validate = parse_flag("INVEX_VALIDATE", &v)?;
        }

        Ok(())
    }

    /// Check model and sampling settings against their allowed ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.name.trim().is_empty() {
            return Err(ConfigError::Missing("model.name".to_string()));
        }

        let gpu = self.model.gpu_memory_utilization;
        if !(gpu > 0.0 && gpu <= 1.0) {
            return Err(invalid("model.gpu_memory_utilization", "must be in (0, 1]"));
        }

        if self.model.max_num_seqs == 0 {
            return Err(invalid("model.max_num_seqs", "must be greater than 0"));
        }

        check_multiple_of_8("model.max_model_len", self.model.max_model_len)?;
        check_multiple_of_8("sampling.max_tokens", self.sampling.max_tokens)?;

        let temperature = self.sampling.temperature;
        if !(0.0..=1.0).contains(&temperature) {
            return Err(invalid("sampling.temperature", "must be in [0, 1]"));
        }

        if self.inference.url.trim().is_empty() {
            return Err(ConfigError::Missing("inference.url".to_string()));
        }
        if self.inference.timeout_secs == 0 {
            return Err(invalid("inference.timeout_secs", "must be greater than 0"));
        }

        Ok(())
    }

    /// Check that object storage locations are set.
    pub fn require_storage(&self) -> Result<(), ConfigError> {
        let storage = &self.storage;
        for (field, value) in [
            ("storage.bucket", &storage.bucket),
            ("storage.source_prefix", &storage.source_prefix),
            ("storage.destination_prefix", &storage.destination_prefix),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(field.to_string()));
            }
        }
        Ok(())
    }

    /// Object key the output dataset is uploaded to.
    pub fn destination_key(&self) -> String {
        output_key(&self.storage.destination_prefix)
    }

    /// Decoding parameters for the inference service, without a schema.
    pub fn sampling_params(&self) -> SamplingParams {
        SamplingParams {
            max_tokens: self.sampling.max_tokens,
            temperature: self.sampling.temperature,
            context_length: self.model.max_model_len,
            guided_json: None,
        }
    }

    /// Connection settings for the Ollama backend.
    #[cfg(feature = "ollama")]
    pub fn ollama_config(&self) -> invex_inference::OllamaConfig {
        invex_inference::OllamaConfig {
            base_url: self.inference.url.clone(),
            model: self.model.name.clone(),
            api_token: self.model.api_token.clone(),
            max_in_flight: self.model.max_num_seqs,
            timeout: std::time::Duration::from_secs(self.inference.timeout_secs),
        }
    }
}

/// Resolve a destination prefix into an object key.
pub fn output_key(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        format!("{}{}", prefix, DEFAULT_OUTPUT_FILE)
    } else {
        prefix.to_string()
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn check_multiple_of_8(field: &str, value: u32) -> Result<(), ConfigError> {
    if value == 0 || value % 8 != 0 {
        return Err(invalid(field, "must be a positive multiple of 8"));
    }
    Ok(())
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = InvexConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.pipeline.guided_decoding);
        assert!(!config.pipeline.validate);
    }

    #[test]
    fn test_env_overlay() {
        let vars = env(&[
            ("MODEL_NAME", "qwen2.5vl:3b"),
            ("MAX_NUM_SEQS", "8"),
            ("TEMPERATURE", "0.2"),
            ("HF_TOKEN", "secret"),
            ("S3_BUCKET", "invoices"),
            ("S3_PREPROCESSED_IMAGES_DIR_PREFIX", "images/"),
            ("S3_PROCESSED_DATASET_PREFIX", "processed/"),
            ("INVEX_VALIDATE", "true"),
        ]);

        let mut config = InvexConfig::default();
        config.apply_env_from(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.model.name, "qwen2.5vl:3b");
        assert_eq!(config.model.max_num_seqs, 8);
        assert_eq!(config.sampling.temperature, 0.2);
        assert_eq!(config.model.api_token.as_deref(), Some("secret"));
        assert_eq!(config.storage.bucket, "invoices");
        assert!(config.pipeline.validate);
        assert_eq!(config.destination_key(), "processed/data.jsonl");
        assert!(config.require_storage().is_ok());
    }

    #[test]
    fn test_env_rejects_garbage() {
        let vars = env(&[("MAX_TOKENS", "lots")]);
        let mut config = InvexConfig::default();
        let err = config.apply_env_from(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref name, .. } if name == "MAX_TOKENS"));
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let vars = env(&[("MODEL_NAME", "  ")]);
        let mut config = InvexConfig::default();
        config.apply_env_from(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.model.name, ModelConfig::default().name);
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = InvexConfig::default();
        config.model.gpu_memory_utilization = 0.0;
        assert!(config.validate().is_err());

        let mut config = InvexConfig::default();
        config.model.gpu_memory_utilization = 1.0;
        assert!(config.validate().is_ok());

        let mut config = InvexConfig::default();
        config.model.max_num_seqs = 0;
        assert!(config.validate().is_err());

        let mut config = InvexConfig::default();
        config.model.max_model_len = 4095;
        assert!(config.validate().is_err());

        let mut config = InvexConfig::default();
        config.sampling.max_tokens = 0;
        assert!(config.validate().is_err());

        let mut config = InvexConfig::default();
        config.sampling.temperature = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_require_storage() {
        let config = InvexConfig::default();
        assert!(matches!(
            config.require_storage(),
            Err(ConfigError::Missing(field)) if field == "storage.bucket"
        ));
    }

    #[test]
    fn test_output_key() {
        assert_eq!(output_key("processed/data.jsonl"), "processed/data.jsonl");
        assert_eq!(output_key("processed/"), "processed/data.jsonl");
        assert_eq!(output_key(""), "data.jsonl");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: InvexConfig =
            serde_json::from_str(r#"{"sampling": {"temperature": 0.5}}"#).unwrap();
        assert_eq!(config.sampling.temperature, 0.5);
        assert_eq!(config.sampling.max_tokens, 4096);
        assert_eq!(config.model.max_num_seqs, 4);
    }

    #[test]
    fn test_sampling_params() {
        let params = InvexConfig::default().sampling_params();
        assert_eq!(params.max_tokens, 4096);
        assert_eq!(params.context_length, 4096);
        assert!(params.guided_json.is_none());
    }
}
