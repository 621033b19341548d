//! Content checksum utilities
//!
//! Config file content is checksummed with MD5; the digest travels with
//! the record and with every member's config reference, so a member can
//! detect a stale or corrupted file without fetching the content.

use md5::{Digest, Md5};

/// Compute the lowercase hex MD5 digest of config file content.
#[must_use]
pub fn content_md5(content: &str) -> String {
    let digest = Md5::digest(content.as_bytes());
    hex::encode(digest)
}

/// Verify content against a previously computed digest.
#[must_use]
pub fn verify_content_md5(content: &str, expected: &str) -> bool {
    content_md5(content) == expected
}
