use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier,
    Version,
};
use log::error;
use rand::rngs::OsRng;

use crate::errors::AppError;

#[cfg(not(test))]
fn params() -> Params {
    Params::default()
}

// Cheapest legal cost; verification reads the cost back from the PHC string.
#[cfg(test)]
fn params() -> Params {
    Params::new(Params::MIN_M_COST, Params::MIN_T_COST, Params::MIN_P_COST, None).unwrap_or_default()
}

fn hasher() -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params())
}

/// Argon2id with a fresh salt, encoded as a PHC string.
pub fn hash_password(pwd: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    hasher()
        .hash_password(pwd.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("password hashing failed: {}", e);
            AppError::InternalError
        })
}

pub fn verify_password(pwd: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => hasher().verify_password(pwd.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_own_hash() {
        let stored = hash_password("correct horse").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("battery staple", &stored));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn rejects_values_that_are_not_phc_strings() {
        assert!(!verify_password("pwd", "pwd"));
        assert!(!verify_password("pwd", ""));
        assert!(!verify_password("pwd", "abcdEFGH12345678$0A1B2C"));
    }

    #[test]
    fn verifies_hashes_made_with_default_cost() {
        let salt = SaltString::generate(&mut OsRng);
        let stored = Argon2::default()
            .hash_password(b"secret1", &salt)
            .unwrap()
            .to_string();
        assert!(verify_password("secret1", &stored));
    }
}
