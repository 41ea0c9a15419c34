/// Project API keys
///
/// Every project carries exactly one data-plane credential of the form
/// `plinth_` followed by 32 random base62 characters. Only the SHA-256
/// hash is stored; the plaintext is shown once at creation or rotation
/// and cannot be recovered afterwards. A short plaintext prefix is kept
/// alongside the hash so listings can identify a key without exposing
/// it.
///
/// # Example
///
/// ```
/// use plinth_shared::auth::api_key::{generate_api_key, validate_api_key_format, verify_api_key};
///
/// let (key, hash) = generate_api_key();
/// assert!(validate_api_key_format(&key));
/// assert!(verify_api_key(&key, &hash));
/// ```

use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

const KEY_PREFIX: &str = "plinth_";

/// Random base62 characters after the prefix
const KEY_RANDOM_LENGTH: usize = 32;

/// Total key length: prefix plus random part
pub const API_KEY_LENGTH: usize = KEY_PREFIX.len() + KEY_RANDOM_LENGTH;

/// Plaintext characters stored for display, e.g. `plinth_abc12`
pub const KEY_DISPLAY_PREFIX_LENGTH: usize = 12;

/// Generates a fresh key and its storage hash
///
/// Returns `(plaintext, sha256_hex)`. The plaintext must be handed to
/// the caller immediately; only the hash goes into the database. The
/// random part is drawn from `thread_rng`, giving a 62^32 key space.
pub fn generate_api_key() -> (String, String) {
    let random_part: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_RANDOM_LENGTH)
        .map(char::from)
        .collect();

    let key = format!("{}{}", KEY_PREFIX, random_part);
    let hash = hash_api_key(&key);

    (key, hash)
}

/// SHA-256 of the plaintext key, hex encoded (64 characters)
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// First [`KEY_DISPLAY_PREFIX_LENGTH`] characters, for listings
pub fn extract_key_prefix(key: &str) -> String {
    key.chars().take(KEY_DISPLAY_PREFIX_LENGTH).collect()
}

/// Checks the shape of a presented key before any database work
///
/// A well-formed key is exactly [`API_KEY_LENGTH`] characters, starts
/// with `plinth_`, and is alphanumeric after the prefix. Rejecting
/// malformed keys here keeps garbage out of the hash lookup.
pub fn validate_api_key_format(key: &str) -> bool {
    key.len() == API_KEY_LENGTH
        && key.starts_with(KEY_PREFIX)
        && key[KEY_PREFIX.len()..].chars().all(|c| c.is_ascii_alphanumeric())
}

/// Compares a plaintext key against a stored hash in constant time
pub fn verify_api_key(key: &str, stored_hash: &str) -> bool {
    constant_time_compare(&hash_api_key(key), stored_hash)
}

/// Equality without early exit on the first differing byte
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_are_well_formed_and_distinct() {
        let (key_a, hash_a) = generate_api_key();
        let (key_b, hash_b) = generate_api_key();

        assert_eq!(key_a.len(), API_KEY_LENGTH);
        assert!(key_a.starts_with(KEY_PREFIX));
        assert!(validate_api_key_format(&key_a));

        assert_ne!(key_a, key_b);
        assert_ne!(hash_a, hash_b);
    }

    #[test]
    fn test_hash_is_deterministic_hex_sha256() {
        let hash = hash_api_key("plinth_test123");

        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_api_key("plinth_test123"));
        assert_ne!(hash, hash_api_key("plinth_test124"));
    }

    #[test]
    fn test_prefix_extraction_redacts_the_rest() {
        assert_eq!(extract_key_prefix("plinth_abc123xyz456"), "plinth_abc12");
        assert_eq!(extract_key_prefix("short").len(), 5);
    }

    #[test]
    fn test_format_validation_rejects_malformed_keys() {
        assert!(validate_api_key_format("plinth_abcdefghijklmnopqrstuvwxyz123456"));
        assert!(validate_api_key_format("plinth_ABCDEFGHIJKLMNOPQRSTUVWXYZ123456"));

        let bad = [
            "wrongx_abcdefghijklmnopqrstuvwxyz123456",        // wrong prefix
            "plinth_short",                                    // too short
            "plinth_abcdefghijklmnopqrstuvwxyz1234567890",     // too long
            "plinth_abc!defghijklmnopqrstuvwxyz12345",         // punctuation
            "abcdefghijklmnopqrstuvwxyz1234567890123",         // no prefix
            "",
        ];
        for key in bad {
            assert!(!validate_api_key_format(key), "{:?} should be rejected", key);
        }
    }

    #[test]
    fn test_verify_accepts_only_the_matching_key() {
        let (key, hash) = generate_api_key();
        let (other_key, _) = generate_api_key();

        assert!(verify_api_key(&key, &hash));
        assert!(!verify_api_key(&other_key, &hash));
        assert!(!verify_api_key("", &hash));
    }

    #[test]
    fn test_constant_time_compare_semantics() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
        assert!(!constant_time_compare("", "x"));
    }

    #[test]
    fn test_unicode_prefix_extraction_counts_characters() {
        // Prefix extraction is by character, never split mid-codepoint
        let prefix = extract_key_prefix("plinth_密码密码密码");
        assert_eq!(prefix.chars().count(), KEY_DISPLAY_PREFIX_LENGTH);
    }
}
