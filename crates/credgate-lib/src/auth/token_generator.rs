// ============================
// crates/credgate-lib/src/auth/token_generator.rs
// ============================
//! Reset token generation and at-rest hashing.
//!
//! Raw tokens carry 256 bits of CSPRNG output. Only their SHA-256 is persisted.
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const RESET_TOKEN_BYTES: usize = 32;

/// New raw reset token, URL-safe base64 without padding
pub fn generate_secure_token() -> String {
    generate_secure_token_with_size(RESET_TOKEN_BYTES)
}

/** Random token of `bytes` CSPRNG bytes
# Arguments
* `bytes` - entropy in bytes, before encoding */
pub fn generate_secure_token_with_size(bytes: usize) -> String {
    let mut raw = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut raw);
    URL_SAFE_NO_PAD.encode(raw)
}

/// One-way hash of a raw token, hex encoded. This is what gets persisted.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time comparison of two token hashes
pub fn token_hashes_match(a: &str, b: &str) -> bool {
    bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}
