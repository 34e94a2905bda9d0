//! Streaming SHA-256 checksums for attachment bytes.
//!
//! The digest is a plain lowercase hex string with no algorithm prefix; it
//! is stored on the attachment record once, immediately after upload, and
//! never changes afterwards.

use sha2::{Digest, Sha256};
use std::io::Read;

use crate::defaults::CHECKSUM_CHUNK_SIZE;
use crate::error::Result;

/// Compute the hex SHA-256 digest of a reader's contents.
///
/// Reads in fixed-size chunks, so the input is never materialized beyond
/// one buffer. Identical bytes yield an identical digest regardless of how
/// the reader delivers them.
pub fn checksum_reader<R: Read>(mut reader: R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHECKSUM_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compute the hex SHA-256 digest of an in-memory slice.
///
/// Agrees with [`checksum_reader`] for the same bytes; used where the upload
/// path already holds the full payload.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
