//! Content checksums for photo transfers.

use md5::{Digest, Md5};

/// Lowercase hex MD5 of `bytes`, as sent in the `Content-MD5` header of a
/// photo upload.
pub fn content_md5(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}
