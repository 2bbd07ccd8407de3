//! Password hashing and verification utilities.
//!
//! New hashes are Argon2 PHC strings. Stored bcrypt hashes are still
//! accepted, either raw (`$2b$...`) or base64-wrapped as written by older
//! account files.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("argon2: {0}")]
    Argon2(argon2::password_hash::Error),
    #[error("bcrypt: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error("unrecognised password hash format")]
    UnknownFormat,
}

impl From<argon2::password_hash::Error> for PasswordError {
    fn from(e: argon2::password_hash::Error) -> Self {
        Self::Argon2(e)
    }
}

/// Hash a password using default Argon2 settings.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    Ok(argon2
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Verify a password against a stored hash of any supported format.
///
/// A wrong password is `Ok(false)`; `Err` means the stored hash itself is
/// unusable.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    if stored.starts_with("$argon2") {
        let hash = PasswordHash::new(stored)?;
        return Ok(Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok());
    }
    if stored.starts_with("$2") {
        return Ok(bcrypt::verify(password, stored)?);
    }

    let decoded = STANDARD
        .decode(stored)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|s| s.starts_with("$2"))
        .ok_or(PasswordError::UnknownFormat)?;
    Ok(bcrypt::verify(password, &decoded)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argon2_roundtrip() {
        let hash = hash_password("hunter2x").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2x", &hash).unwrap());
        assert!(!verify_password("hunter2", &hash).unwrap());
    }

    #[test]
    fn salts_differ() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn legacy_bcrypt_raw_and_wrapped() {
        let raw = bcrypt::hash("oldpass", 4).unwrap();
        assert!(verify_password("oldpass", &raw).unwrap());
        assert!(!verify_password("nope", &raw).unwrap());

        let wrapped = STANDARD.encode(raw.as_bytes());
        assert!(verify_password("oldpass", &wrapped).unwrap());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(matches!(
            verify_password("x", "plaintext?"),
            Err(PasswordError::UnknownFormat)
        ));
    }
}
