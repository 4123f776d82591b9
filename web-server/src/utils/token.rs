// web-server/src/utils/token.rs
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Sha256, Digest};

/// Bytes of entropy in a session key
const SESSION_KEY_BYTES: usize = 32;

/// Generate `length` random bytes from the operating system CSPRNG, hex encoded
pub fn generate_secure_token(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Create an unguessable session key (64 hex characters)
pub fn create_session_key() -> String {
    generate_secure_token(SESSION_KEY_BYTES)
}

/// Hash bytes using SHA-256, hex encoded
pub fn hash_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

/// Compare two secrets without short-circuiting on the first mismatch
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
