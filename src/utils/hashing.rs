//! Token hashing and generation helpers

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes in an opaque token (hex encoded to 64 chars)
pub const TOKEN_BYTES: usize = 32;

/// Length of the token prefix that may appear in logs
pub const LOG_PREFIX_LEN: usize = 8;

/// SHA-256 of a token, hex encoded. Only this form is ever persisted.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a new opaque high-entropy token
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Char-boundary safe prefix of at most `len` characters
pub fn prefix(token: &str, len: usize) -> &str {
    match token.char_indices().nth(len) {
        Some((idx, _)) => &token[..idx],
        None => token,
    }
}

/// Prefix suitable for log fields
pub fn log_prefix(token: &str) -> &str {
    prefix(token, LOG_PREFIX_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_hex() {
        let h = hash_token("abc");
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn generated_tokens_are_unique_and_sized() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert_ne!(a, b);
    }

    #[test]
    fn prefix_handles_short_and_multibyte_input() {
        assert_eq!(prefix("abc", 16), "abc");
        assert_eq!(prefix("ééééé", 2), "éé");
        assert_eq!(log_prefix("0123456789abcdef"), "01234567");
    }
}
