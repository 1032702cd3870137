//! Vision-language inference abstraction for invex.
//!
//! This crate provides a unified interface for generating text from a
//! prompt and a batch of images against a served model:
//! - `ollama` backend talking to the `/api/generate` endpoint in raw mode
//!
//! Backends are one-to-one and order-preserving: the completion at index
//! `i` always belongs to the image at index `i`.

mod backend;
mod error;
mod request;

pub use backend::InferenceBackend;
pub use error::InferenceError;
pub use request::{Completion, ImageInput, SamplingParams};

#[cfg(feature = "ollama")]
pub use backend::ollama::{OllamaBackend, OllamaConfig};

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
