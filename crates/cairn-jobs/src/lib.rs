//! # cairn-jobs
//!
//! Background analysis worker for cairn.
//!
//! This crate provides:
//! - A worker that claims queued analysis runs and executes them concurrently
//! - The image analysis handler that drives vision providers and records outcomes
//! - Graceful shutdown and an event stream for observing run progress
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cairn_jobs::{AnalysisWorker, ImageAnalysisHandler, WorkerConfig};
//! use cairn_vision::provider_from_env;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = cairn_db::Database::connect("postgres://localhost/cairn").await?;
//!
//!     let handler = ImageAnalysisHandler::new(db.clone(), provider_from_env());
//!     let worker = AnalysisWorker::new(db, WorkerConfig::from_env(), Arc::new(handler));
//!     let handle = worker.start();
//!
//!     // Observe run progress
//!     let mut events = handle.events();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("worker event: {:?}", event);
//!         }
//!     });
//!
//!     // ... later
//!     handle.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod analyze;
pub mod handler;
pub mod worker;

// Re-export core types
pub use cairn_core::*;

pub use analyze::ImageAnalysisHandler;
pub use handler::{AnalysisHandler, NoOpHandler, RunContext, RunResult};
pub use worker::{AnalysisWorker, WorkerConfig, WorkerEvent, WorkerHandle};

/// Default maximum retry attempts for failed runs.
pub const DEFAULT_MAX_RETRIES: i32 = cairn_core::defaults::RUN_MAX_RETRIES;

/// Default safety-net poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = cairn_core::defaults::ANALYSIS_POLL_INTERVAL_MS;
