//! Remote model access for SdgScan.
//!
//! Provides the [`GenerationCapability`] trait the pipeline is written
//! against, and [`GeminiProvider`], its Gemini REST implementation.

pub mod capability;
pub mod gemini;
pub mod image;

pub use capability::{
    GenerationCapability, classify_http_error, classify_request_error, missing_api_key_error,
};
pub use gemini::GeminiProvider;
pub use image::{ImageInput, sniff_mime_type};
