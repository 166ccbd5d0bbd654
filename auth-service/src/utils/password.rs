use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sha2::{Digest, Sha256};

use crate::services::AuthError;

/// Plaintext secret (user password or service secret). Never printed.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

/// Hash a secret with Argon2id. The salt is embedded in the PHC string.
pub fn hash_password(password: &Password) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_str().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(password: &Password, password_hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| AuthError::Internal(anyhow::anyhow!("Invalid password hash format: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_str().as_bytes(), &parsed)
        .is_ok())
}

/// Hex SHA-256 digest, used to keep issued service tokens out of storage.
pub fn hash_secret_digest(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_salted_argon2() {
        let password = Password::new("correct horse battery");
        let first = hash_password(&password).unwrap();
        let second = hash_password(&password).unwrap();

        assert!(first.starts_with("$argon2"));
        assert_ne!(first, second);
        assert!(verify_password(&password, &first).unwrap());
        assert!(verify_password(&password, &second).unwrap());
    }

    #[test]
    fn wrong_password_is_a_mismatch_not_an_error() {
        let hash = hash_password(&Password::new("correct horse battery")).unwrap();
        assert!(!verify_password(&Password::new("wrong"), &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password(&Password::new("x"), "not-a-phc-string").is_err());
    }

    #[test]
    fn debug_output_is_redacted() {
        let rendered = format!("{:?}", Password::new("hunter2"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn digest_is_stable_hex() {
        let digest = hash_secret_digest("token");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_secret_digest("token"));
    }
}
