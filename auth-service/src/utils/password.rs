use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Newtype for secret material (passwords, raw refresh tokens) to prevent
/// accidental logging.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Newtype for an Argon2 PHC hash string.
#[derive(Debug, Clone)]
pub struct SecretHash(String);

impl SecretHash {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Hash a secret using Argon2id with a generated salt.
///
/// Used for passwords and for refresh tokens at rest; both must go through
/// the same deliberately slow, adaptive hash.
pub fn hash_secret(secret: &Secret) -> Result<SecretHash, anyhow::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let hash = argon2
        .hash_password(secret.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash secret: {}", e))?
        .to_string();

    Ok(SecretHash::new(hash))
}

/// Verify a secret against a stored hash.
///
/// Returns Ok(()) on match. Argon2 verification is constant-time with
/// respect to the hash comparison.
pub fn verify_secret(secret: &Secret, hash: &SecretHash) -> Result<(), anyhow::Error> {
    let parsed_hash = PasswordHash::new(hash.as_str())
        .map_err(|e| anyhow::anyhow!("Invalid hash format: {}", e))?;

    Argon2::default()
        .verify_password(secret.as_str().as_bytes(), &parsed_hash)
        .map_err(|_| anyhow::anyhow!("Secret verification failed"))
}

/// Convenience check returning a bool, for scanning session candidates.
pub fn secret_matches(secret: &Secret, hash: &SecretHash) -> bool {
    verify_secret(secret, hash).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_secret() {
        let password = Secret::new("mySecurePassword123".to_string());
        let hash = hash_secret(&password).expect("Failed to hash");

        assert!(!hash.as_str().is_empty());
        assert!(hash.as_str().starts_with("$argon2"));
    }

    #[test]
    fn test_verify_secret_correct() {
        let password = Secret::new("mySecurePassword123".to_string());
        let hash = hash_secret(&password).expect("Failed to hash");

        assert!(verify_secret(&password, &hash).is_ok());
    }

    #[test]
    fn test_verify_secret_incorrect() {
        let password = Secret::new("mySecurePassword123".to_string());
        let hash = hash_secret(&password).expect("Failed to hash");

        let wrong = Secret::new("wrongPassword".to_string());
        assert!(verify_secret(&wrong, &hash).is_err());
    }

    #[test]
    fn test_different_hashes_for_same_secret() {
        let password = Secret::new("mySecurePassword123".to_string());
        let hash1 = hash_secret(&password).expect("Failed to hash");
        let hash2 = hash_secret(&password).expect("Failed to hash");

        // Random salt means distinct hashes that both verify
        assert_ne!(hash1.as_str(), hash2.as_str());
        assert!(secret_matches(&password, &hash1));
        assert!(secret_matches(&password, &hash2));
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let password = Secret::new("hunter2".to_string());
        assert_eq!(format!("{:?}", password), "Secret(..)");
    }
}
