//! Password hashing and admin-issued credentials

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::Rng;
use rand::seq::SliceRandom;

const PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()";

/// Hash a plaintext password with Argon2 and a random salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    Ok(hash)
}

/// Check a plaintext password against a stored hash
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Random password for accounts created by an admin
pub fn generate_password(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..PASSWORD_CHARSET.len());
            PASSWORD_CHARSET[idx] as char
        })
        .collect()
}

/// Login email derived from a display name, e.g. `Ada Lovelace` -> `ada.lovelace@example.com`
pub fn generate_email(name: &str, domain: &str) -> String {
    let local = name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(".");
    format!("{}@{}", local, domain)
}

/// Four random digits, appended to a generated email when the plain one is taken
pub fn random_suffix() -> String {
    let digits: Vec<char> = "0123456789".chars().collect();
    let mut rng = rand::thread_rng();
    (0..4)
        .filter_map(|_| digits.choose(&mut rng).copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() -> Result<()> {
        let hash = hash_password("s3cret!")?;
        assert_ne!(hash, "s3cret!");
        assert!(verify_password("s3cret!", &hash)?);
        assert!(!verify_password("wrong", &hash)?);
        Ok(())
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_generated_password_uses_charset() {
        let password = generate_password(8);
        assert_eq!(password.chars().count(), 8);
        assert!(password.bytes().all(|b| PASSWORD_CHARSET.contains(&b)));
    }

    #[test]
    fn test_generated_email_joins_name_parts() {
        assert_eq!(
            generate_email("Ada   Lovelace", "example.com"),
            "ada.lovelace@example.com"
        );
        assert_eq!(random_suffix().len(), 4);
    }
}
