//! HTTP request handlers.
//!
//! Handlers are grouped by resource. Each module owns its request and
//! response types and the `utoipa` path annotations that document them.

pub mod attachments;
pub mod auth;
pub mod notes;
