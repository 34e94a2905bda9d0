//! Centralized default constants for cairn.
//!
//! **This module is the single source of truth** for all shared default values.
//! All crates should reference these constants instead of defining their own
//! magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// UPLOADS
// =============================================================================

/// Maximum image upload size in bytes (10 MB).
///
/// Enforced before any record mutation: an oversized upload is rejected with
/// a specific message and the note's prior attachment is left untouched.
pub const MAX_IMAGE_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// Content types accepted for image uploads.
///
/// `image/jpg` is not a registered MIME type but is sent by enough clients
/// to be worth accepting alongside `image/jpeg`.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// Maximum filename length (ext4/NTFS compatible).
pub const FILENAME_MAX_LENGTH: usize = 255;

/// Maximum request body size in bytes (16 MB).
///
/// Uploads arrive as base64 inside a JSON body; a 10 MB image inflates to
/// roughly 13.4 MB encoded, plus envelope.
pub const MAX_BODY_SIZE_BYTES: usize = 16 * 1024 * 1024;

// =============================================================================
// CHECKSUMS
// =============================================================================

/// Chunk size for streaming checksum computation (64 KB).
///
/// The digest is chunk-size independent; this only bounds the read buffer.
pub const CHECKSUM_CHUNK_SIZE: usize = 64 * 1024;

// =============================================================================
// NOTES
// =============================================================================

/// Maximum note title length in characters.
pub const NOTE_TITLE_MAX_LENGTH: usize = 200;

// =============================================================================
// AUTH
// =============================================================================

/// Minimum password length in characters, enforced at signup.
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Length of generated token secrets (alphanumeric chars, excluding prefix).
pub const TOKEN_SECRET_LENGTH: usize = 48;

/// Environment variable overriding the access token lifetime in minutes.
pub const ENV_ACCESS_TOKEN_MINUTES: &str = "ACCESS_TOKEN_MINUTES";

/// Environment variable overriding the refresh token lifetime in days.
pub const ENV_REFRESH_TOKEN_DAYS: &str = "REFRESH_TOKEN_DAYS";

/// Default access token lifetime in minutes.
pub const ACCESS_TOKEN_LIFETIME_MINUTES: i64 = 15;

/// Default refresh token lifetime in days.
pub const REFRESH_TOKEN_LIFETIME_DAYS: i64 = 7;

// =============================================================================
// ANALYSIS WORKER
// =============================================================================

/// Environment variable for the worker poll interval.
pub const ENV_ANALYSIS_POLL_INTERVAL_MS: &str = "ANALYSIS_POLL_INTERVAL_MS";

/// Environment variable for the worker concurrency bound.
pub const ENV_ANALYSIS_MAX_CONCURRENT: &str = "ANALYSIS_MAX_CONCURRENT";

/// Environment variable for the per-run timeout.
pub const ENV_ANALYSIS_TIMEOUT_SECS: &str = "ANALYSIS_TIMEOUT_SECS";

/// Default worker safety-net poll interval in milliseconds.
///
/// With event-driven waking the worker sleeps until notified; this interval
/// only covers edge cases (crash recovery, external SQL inserts, races
/// between notify and claim).
pub const ANALYSIS_POLL_INTERVAL_MS: u64 = 60_000;

/// Default maximum concurrent analysis runs per worker.
pub const ANALYSIS_MAX_CONCURRENT: usize = 4;

/// Default per-run timeout in seconds (5 minutes).
pub const ANALYSIS_TIMEOUT_SECS: u64 = 300;

/// Default maximum retry count for runs that failed before reaching the
/// attachment (infrastructure faults; provider failures are terminal).
pub const RUN_MAX_RETRIES: i32 = 3;

/// Default run priority (1=highest, 10=lowest).
pub const RUN_PRIORITY: i32 = 5;

/// Worker lifecycle event broadcast channel capacity.
pub const WORKER_EVENT_CAPACITY: usize = 256;

// =============================================================================
// VISION PROVIDERS
// =============================================================================

/// Environment variable for the external OCR endpoint. Unset means the
/// OCR-backed provider is not installed.
pub const ENV_VISION_OCR_URL: &str = "VISION_OCR_URL";

/// Environment variable for the OCR model name.
pub const ENV_VISION_OCR_MODEL: &str = "VISION_OCR_MODEL";

/// Default OCR model requested from the external endpoint.
pub const DEFAULT_VISION_OCR_MODEL: &str = "qwen3-vl:8b";

/// Timeout for OCR provider requests in seconds.
pub const VISION_REQUEST_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// STORAGE
// =============================================================================

/// Environment variable for the file storage base directory.
pub const ENV_STORAGE_PATH: &str = "STORAGE_PATH";

/// Default file storage base directory.
pub const DEFAULT_STORAGE_PATH: &str = "./data";

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 8000;

/// Default rate limit: max requests per period.
pub const RATE_LIMIT_REQUESTS: u64 = 100;

/// Default rate limit: period in seconds.
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

/// Default CORS max-age in seconds (1 hour).
pub const CORS_MAX_AGE_SECS: u64 = 3600;

/// Read an env var parsed as `u64`, warning and falling back on bad values.
pub fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(val) => match val.parse::<u64>() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(var = name, value = %val, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Read an env var parsed as `usize`, warning and falling back on bad values.
pub fn env_usize(name: &str, default: usize) -> usize {
    match std::env::var(name) {
        Ok(val) => match val.parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(var = name, value = %val, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Read an env var parsed as `i64`, warning and falling back on bad values.
pub fn env_i64(name: &str, default: i64) -> i64 {
    match std::env::var(name) {
        Ok(val) => match val.parse::<i64>() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(var = name, value = %val, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_limits_are_consistent() {
        const {
            assert!(MAX_IMAGE_SIZE_BYTES < MAX_BODY_SIZE_BYTES);
            assert!(CHECKSUM_CHUNK_SIZE < MAX_IMAGE_SIZE_BYTES);
        }
    }

    #[test]
    fn allowed_types_are_images() {
        for ty in ALLOWED_IMAGE_TYPES {
            assert!(ty.starts_with("image/"), "{} is not an image type", ty);
        }
    }

    #[test]
    fn token_lifetimes_ordered() {
        const {
            assert!(ACCESS_TOKEN_LIFETIME_MINUTES * 60 < REFRESH_TOKEN_LIFETIME_DAYS * 86_400);
        }
    }

    #[test]
    fn env_u64_falls_back_on_garbage() {
        std::env::set_var("CAIRN_TEST_ENV_U64", "not-a-number");
        assert_eq!(env_u64("CAIRN_TEST_ENV_U64", 42), 42);
        std::env::remove_var("CAIRN_TEST_ENV_U64");
    }

    #[test]
    fn env_u64_reads_valid_value() {
        std::env::set_var("CAIRN_TEST_ENV_U64_VALID", "7");
        assert_eq!(env_u64("CAIRN_TEST_ENV_U64_VALID", 42), 7);
        std::env::remove_var("CAIRN_TEST_ENV_U64_VALID");
    }

    #[test]
    fn env_u64_uses_default_when_unset() {
        assert_eq!(env_u64("CAIRN_TEST_ENV_U64_UNSET", 9), 9);
    }
}
