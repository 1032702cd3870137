//! Request and response types shared by all backends.

use serde::{Deserialize, Serialize};

/// One encoded image handed to the model.
///
/// The bytes are the original file contents (JPEG, PNG, ...); backends
/// transport them as-is and let the server decode them.
#[derive(Debug, Clone)]
pub struct ImageInput {
    bytes: Vec<u8>,
}

impl ImageInput {
    /// Wrap encoded image bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Raw encoded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size of the encoded image in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Base64 (standard alphabet, padded) encoding of the image.
    #[cfg(feature = "ollama")]
    pub fn to_base64(&self) -> String {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

impl From<Vec<u8>> for ImageInput {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// Decoding parameters applied to every image of a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplingParams {
    /// Maximum number of generated tokens per completion.
    pub max_tokens: u32,

    /// Sampling temperature (0.0 = greedy).
    pub temperature: f32,

    /// Context window the server should allocate.
    pub context_length: u32,

    /// JSON Schema constraining the output, when guided decoding is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guided_json: Option<serde_json::Value>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.0,
            context_length: 4096,
            guided_json: None,
        }
    }
}

impl SamplingParams {
    /// Attach a JSON Schema for guided decoding.
    pub fn with_guided_json(mut self, schema: serde_json::Value) -> Self {
        self.guided_json = Some(schema);
        self
    }
}

/// Raw text produced for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// Generated text, unparsed.
    pub text: String,

    /// Number of generated tokens, when the service reports it.
    pub tokens: Option<u32>,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens: None,
        }
    }

    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.tokens = Some(tokens);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guided_json_is_omitted_when_absent() {
        let params = SamplingParams::default();
        let json = serde_json::to_value(&params).unwrap();
        assert!(json.get("guided_json").is_none());

        let params = params.with_guided_json(serde_json::json!({"type": "object"}));
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["guided_json"]["type"], "object");
    }

    #[cfg(feature = "ollama")]
    #[test]
    fn test_image_base64() {
        let image = ImageInput::new(b"abc".to_vec());
        assert_eq!(image.to_base64(), "YWJj");
        assert_eq!(image.len(), 3);
    }
}
