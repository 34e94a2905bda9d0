//! Structured logging schema and field name constants for cairn.
//!
//! All crates use these constants for consistent structured logging fields.
//! This ensures log aggregation tools (Loki, Elasticsearch) can query by
//! standardized field names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → run → sub-calls.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "auth", "db", "jobs", "vision", "storage"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "worker", "pool", "composite", "ocr_http", "attachments"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "upload", "analyze", "claim_next", "signin"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Account UUID acting or being acted on.
pub const USER_ID: &str = "user_id";

/// Note UUID being operated on.
pub const NOTE_ID: &str = "note_id";

/// Image attachment UUID being operated on.
pub const ATTACHMENT_ID: &str = "attachment_id";

/// Analysis run UUID being processed.
pub const RUN_ID: &str = "run_id";

/// Vision provider name.
pub const PROVIDER: &str = "provider";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Payload size in bytes.
pub const SIZE_BYTES: &str = "size_bytes";

/// Characters of extracted text produced by a run.
pub const TEXT_LEN: &str = "text_len";

/// Number of labels produced by a run.
pub const LABEL_COUNT: &str = "label_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
