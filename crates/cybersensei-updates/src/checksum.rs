//! SHA-256 package checksums in the `sha256:<hex>` format

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::{fs::File, io::AsyncReadExt};

use crate::error::Result;

/// Algorithm prefix used by the Central service
pub const SHA256_PREFIX: &str = "sha256:";

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Format a raw digest as `sha256:<lower-case hex>`
pub fn format_sha256(digest: &[u8]) -> String {
    format!("{}{}", SHA256_PREFIX, hex::encode(digest))
}

/// Checksum of an in-memory buffer
pub fn bytes_checksum(bytes: &[u8]) -> String {
    format_sha256(&Sha256::digest(bytes))
}

/// Checksum of a file on disk, read sequentially
pub async fn file_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format_sha256(&hasher.finalize()))
}

/// Compare a declared checksum with a computed one, ignoring case and
/// surrounding whitespace
pub fn matches(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}
