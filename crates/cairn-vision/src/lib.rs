//! # cairn-vision
//!
//! Image analysis provider abstraction for cairn.
//!
//! This crate provides:
//! - The pluggable `VisionProvider` trait and its `VisionOutcome` result
//! - A placeholder provider for deployments without a real backend
//! - An HTTP OCR provider for Ollama-compatible vision endpoints
//! - A composite provider that merges results and aggregates failures
//!
//! # Example
//!
//! ```rust,no_run
//! use cairn_vision::{provider_from_env, VisionProvider};
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = provider_from_env();
//!     let outcome = provider.analyze(b"...image bytes...", "image/png").await;
//!     println!("{} labels, success={}", outcome.labels.len(), outcome.success);
//! }
//! ```

pub mod composite;
pub mod config;
pub mod ocr_http;
pub mod placeholder;
pub mod provider;

// Re-export core types
pub use cairn_core::*;

pub use composite::CompositeProvider;
pub use config::provider_from_env;
pub use ocr_http::HttpOcrProvider;
pub use placeholder::{PlaceholderProvider, PLACEHOLDER_NOTICE};
pub use provider::{VisionOutcome, VisionProvider};
