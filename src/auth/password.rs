use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::error::ApiError;

const SPECIAL_CHARS: &str = "@$!%*?&";

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Password policy: at least 8 characters with an upper-case letter, a
/// lower-case letter, a digit and one of `@$!%*?&`.
pub fn validate_strength(plain: &str) -> Result<(), ApiError> {
    let long_enough = plain.chars().count() >= 8;
    let has_lower = plain.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = plain.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = plain.chars().any(|c| c.is_ascii_digit());
    let has_special = plain.chars().any(|c| SPECIAL_CHARS.contains(c));

    if long_enough && has_lower && has_upper && has_digit && has_special {
        Ok(())
    } else {
        Err(ApiError::Validation(
            "Password must be at least 8 characters and contain an upper case letter, \
             a lower case letter, a digit and a special character"
                .into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "TestTest123!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("TestTest123!").expect("hashing should succeed");
        assert!(!verify_password("WrongWrong123!", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        assert!(verify_password("anything", "not-a-valid-hash").is_err());
    }

    #[test]
    fn strength_rejects_short_password() {
        assert!(validate_strength("short1!").is_err());
    }

    #[test]
    fn strength_rejects_missing_uppercase() {
        assert!(validate_strength("alllowercase1!").is_err());
    }

    #[test]
    fn strength_accepts_valid_password() {
        assert!(validate_strength("TestTest123!").is_ok());
    }
}
