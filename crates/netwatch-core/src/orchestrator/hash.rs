//! Streamed content hashing for `FileMetadata::content_hash` (§4.7, §7).

use std::io::Read;
use std::path::Path;

use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::warn;

const STREAM_CHUNK_SIZE: usize = 1 << 20;

/// SHA-256 of `path`, streamed in fixed-size chunks; on any I/O failure
/// substitutes a random fallback identifier rather than aborting the
/// pipeline (§7: "Hash computation failure is non-fatal").
pub fn content_hash_or_fallback(path: &Path) -> String {
    match hash_file(path) {
        Ok(digest) => digest,
        Err(err) => {
            warn!(error = %err, path = %path.display(), "content hash failed, substituting random identifier");
            random_fallback_identifier()
        }
    }
}

fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; STREAM_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

fn random_fallback_identifier() -> String {
    let bytes: [u8; 16] = rand::thread_rng().r#gen();
    format!("fallback-{}", hex_encode(&bytes))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn hashes_known_content_deterministically() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        let digest_a = content_hash_or_fallback(file.path());
        let digest_b = content_hash_or_fallback(file.path());
        assert_eq!(digest_a, digest_b);
        assert!(!digest_a.starts_with("fallback-"));
    }

    #[test]
    fn falls_back_to_random_identifier_on_missing_file() {
        let digest = content_hash_or_fallback(Path::new("/nonexistent/path/does-not-exist"));
        assert!(digest.starts_with("fallback-"));
    }
}
