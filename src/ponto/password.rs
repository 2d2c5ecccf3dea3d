//! Password hashing and verification.
//!
//! The scheme set is closed: adding one means adding an enum variant, not
//! mutating a dispatch table at runtime. Hashing and verification are
//! CPU-bound on purpose, so the async wrappers run them on the blocking pool.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HashScheme {
    #[default]
    Argon2id,
}

impl std::str::FromStr for HashScheme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "argon2id" | "argon2" => Ok(Self::Argon2id),
            other => Err(format!("unsupported hash scheme: {other}")),
        }
    }
}

impl HashScheme {
    /// Hash a plaintext password into a PHC-format string.
    ///
    /// # Errors
    /// Returns an error if the hashing primitive fails.
    pub fn hash(self, password: &str) -> Result<String> {
        match self {
            Self::Argon2id => {
                let salt = SaltString::generate(&mut OsRng);
                Argon2::default()
                    .hash_password(password.as_bytes(), &salt)
                    .map(|hash| hash.to_string())
                    .map_err(|err| anyhow!("Failed to hash password: {err}"))
            }
        }
    }

    /// Verify a plaintext password against a stored PHC hash. A malformed
    /// hash verifies as false, it never panics.
    #[must_use]
    pub fn verify(self, hash: &str, password: &str) -> bool {
        match self {
            Self::Argon2id => {
                let Ok(parsed) = PasswordHash::new(hash) else {
                    return false;
                };
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            }
        }
    }
}

/// [`HashScheme::hash`] on the blocking pool.
///
/// # Errors
/// Returns an error if hashing fails or the blocking task is cancelled.
pub async fn hash_blocking(scheme: HashScheme, password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || scheme.hash(&password)).await?
}

/// [`HashScheme::verify`] on the blocking pool.
///
/// # Errors
/// Returns an error if the blocking task is cancelled.
pub async fn verify_blocking(scheme: HashScheme, hash: String, password: String) -> Result<bool> {
    Ok(tokio::task::spawn_blocking(move || scheme.verify(&hash, &password)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let scheme = HashScheme::Argon2id;
        let hash = scheme.hash("foobar").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(scheme.verify(&hash, "foobar"));
        assert!(!scheme.verify(&hash, "wrong"));
    }

    #[test]
    fn test_hash_salts_differ() {
        let scheme = HashScheme::Argon2id;
        let one = scheme.hash("same").unwrap();
        let two = scheme.hash("same").unwrap();

        assert_ne!(one, two);
        assert!(scheme.verify(&one, "same"));
        assert!(scheme.verify(&two, "same"));
    }

    #[test]
    fn test_verify_malformed_hash() {
        let scheme = HashScheme::Argon2id;
        assert!(!scheme.verify("", "password"));
        assert!(!scheme.verify("not-a-hash", "password"));
    }

    #[test]
    fn test_scheme_from_str() {
        assert_eq!("argon2id".parse::<HashScheme>(), Ok(HashScheme::Argon2id));
        assert_eq!("Argon2".parse::<HashScheme>(), Ok(HashScheme::Argon2id));
        assert!("bcrypt".parse::<HashScheme>().is_err());
    }

    #[tokio::test]
    async fn test_blocking_wrappers() {
        let scheme = HashScheme::Argon2id;
        let hash = hash_blocking(scheme, "foobar".to_string()).await.unwrap();
        assert!(
            verify_blocking(scheme, hash.clone(), "foobar".to_string())
                .await
                .unwrap()
        );
        assert!(!verify_blocking(scheme, hash, "nope".to_string())
            .await
            .unwrap());
    }
}
