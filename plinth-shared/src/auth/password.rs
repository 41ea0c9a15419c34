/// Password hashing for control-plane accounts
///
/// Plinth stores Argon2id hashes in PHC string format. The parameters are
/// pinned here rather than taken from `Argon2::default()` so that a crate
/// upgrade cannot silently weaken new hashes; verification reads whatever
/// parameters are embedded in the stored string, so old hashes keep
/// working after a parameter bump.
///
/// # Example
///
/// ```
/// use plinth_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("hunter2-but-longer")?;
/// assert!(verify_password("hunter2-but-longer", &hash)?);
/// assert!(!verify_password("hunter2", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Memory cost in KiB (64 MiB)
const ARGON2_MEMORY_KIB: u32 = 65536;

/// Number of passes over memory
const ARGON2_ITERATIONS: u32 = 3;

/// Degree of parallelism
const ARGON2_LANES: u32 = 4;

/// Hash output length in bytes
const ARGON2_OUTPUT_LEN: usize = 32;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Hashing a new password failed
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Verification failed for a reason other than a mismatch
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// The stored hash is not a valid PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = ParamsBuilder::new()
        .m_cost(ARGON2_MEMORY_KIB)
        .t_cost(ARGON2_ITERATIONS)
        .p_cost(ARGON2_LANES)
        .output_len(ARGON2_OUTPUT_LEN)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password with a fresh random salt
///
/// Returns the full PHC string, e.g.
/// `$argon2id$v=19$m=65536,t=3,p=4$<salt>$<hash>`, which embeds the
/// algorithm, parameters, and salt needed for later verification.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC hash
///
/// Returns `Ok(false)` on a mismatch. Any other failure (unparseable
/// hash, unsupported algorithm) surfaces as an error so callers don't
/// confuse "wrong password" with "corrupt hash column".
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    // Parameters come from the stored hash, not from hasher()
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!(
            "Verification failed: {}",
            e
        ))),
    }
}

/// Validates password strength at registration time
///
/// Requires at least [`MIN_PASSWORD_LENGTH`] characters and at least one
/// uppercase letter, lowercase letter, digit, and non-alphanumeric
/// character. Returns the first unmet requirement as the error message.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }

    let checks: [(&str, fn(char) -> bool); 4] = [
        ("uppercase letter", char::is_uppercase),
        ("lowercase letter", char::is_lowercase),
        ("digit", |c| c.is_ascii_digit()),
        ("special character", |c| !c.is_alphanumeric()),
    ];

    for (requirement, test) in checks {
        if !password.chars().any(test) {
            return Err(format!("Password must contain at least one {}", requirement));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_pins_parameters() {
        let hash = hash_password("pinned-params-check").expect("Hash should succeed");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("v=19"));
        assert!(hash.contains(&format!("m={}", ARGON2_MEMORY_KIB)));
        assert!(hash.contains(&format!("t={}", ARGON2_ITERATIONS)));
        assert!(hash.contains(&format!("p={}", ARGON2_LANES)));
    }

    #[test]
    fn test_same_password_different_hashes() {
        let a = hash_password("repeated").expect("Hash should succeed");
        let b = hash_password("repeated").expect("Hash should succeed");

        // Fresh salt every time
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_accepts_correct_and_rejects_wrong() {
        let hash = hash_password("the-right-one").expect("Hash should succeed");

        assert!(verify_password("the-right-one", &hash).unwrap());
        assert!(!verify_password("the-wrong-one", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_surfaces_corrupt_hashes_as_errors() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
        assert!(verify_password("anything", "$argon2id$truncated").is_err());
    }

    #[test]
    fn test_roundtrip_awkward_inputs() {
        for password in [
            "with spaces in it",
            "punctuation!@#$%^&*()",
            "unicode-密码-パスワード",
            &"x".repeat(128),
        ] {
            let hash = hash_password(password).expect("Hash should succeed");
            assert!(
                verify_password(password, &hash).expect("Verify should succeed"),
                "Password {:?} should roundtrip",
                password
            );
        }
    }

    #[test]
    fn test_strength_accepts_conforming_passwords() {
        for password in ["MyP@ssw0rd!", "Str0ng-Passw0rd!", "C0mpl3x#Pwd"] {
            assert!(
                validate_password_strength(password).is_ok(),
                "{:?} should pass",
                password
            );
        }
    }

    #[test]
    fn test_strength_names_the_missing_requirement() {
        let cases = [
            ("Sh0rt!", "8 characters"),
            ("all-lower-1!", "uppercase"),
            ("ALL-UPPER-1!", "lowercase"),
            ("NoDigitsHere!", "digit"),
            ("NoSpecial123", "special character"),
        ];

        for (password, expected) in cases {
            let err = validate_password_strength(password).unwrap_err();
            assert!(
                err.contains(expected),
                "{:?} should fail mentioning {:?}, got {:?}",
                password,
                expected,
                err
            );
        }
    }

    #[test]
    fn test_strength_counts_characters_not_bytes() {
        // 8 multibyte characters, more than 8 bytes
        assert!(validate_password_strength("Pa1!密码密码").is_ok());
    }
}
