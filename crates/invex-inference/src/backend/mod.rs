//! Inference backend implementations.

#[cfg(feature = "ollama")]
pub mod ollama;

use async_trait::async_trait;

use crate::{Completion, ImageInput, Result, SamplingParams};

/// Trait for vision-language inference backends.
///
/// A backend receives the whole batch at once and returns only when every
/// completion is available. Implementations may parallelize internally but
/// must return exactly one completion per image, in input order.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Generate one completion per image for the same prompt.
    ///
    /// # Arguments
    /// * `prompt` - Fully rendered prompt (chat template already applied)
    /// * `images` - Encoded images, one request each
    /// * `params` - Decoding parameters shared by the batch
    async fn generate(
        &self,
        prompt: &str,
        images: &[ImageInput],
        params: &SamplingParams,
    ) -> Result<Vec<Completion>>;

    /// Identifier of the served model.
    fn model_name(&self) -> &str;
}
