//! # cairn-core
//!
//! Core types, traits, and abstractions for cairn.
//!
//! This crate provides:
//! - Domain models (users, sessions, notes, image attachments, analysis runs)
//! - Repository traits implemented by `cairn-db`
//! - The shared `Error`/`Result` types
//! - Upload validation and checksum helpers
//! - Centralized defaults and structured logging field names

pub mod checksum;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uploads;
pub mod uuid_utils;

pub use checksum::{checksum_bytes, checksum_reader};
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
pub use uploads::{detect_content_type, sanitize_filename, validate_image, ValidationResult};
pub use uuid_utils::new_v7;
