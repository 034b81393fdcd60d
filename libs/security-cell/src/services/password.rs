use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use tracing::instrument;

/// Argon2id password hashing with a per-password salt. Verification goes
/// through the PHC string so parameter upgrades re-verify old hashes.
pub struct PasswordService;

impl PasswordService {
    #[instrument(skip(password))]
    pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2.hash_password(password.as_bytes(), &salt)?;
        Ok(password_hash.to_string())
    }

    #[instrument(skip(password, hash))]
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
        let parsed_hash = PasswordHash::new(hash)?;
        let argon2 = Argon2::default();

        match argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Registration-time strength gate. Returns the list of unmet rules.
    pub fn strength_issues(password: &str) -> Vec<String> {
        let mut issues = Vec::new();

        if password.len() < 8 {
            issues.push("Password must be at least 8 characters long".to_string());
        }
        if !password.chars().any(|c| c.is_lowercase()) {
            issues.push("Password must contain a lowercase letter".to_string());
        }
        if !password.chars().any(|c| c.is_uppercase()) {
            issues.push("Password must contain an uppercase letter".to_string());
        }
        if !password.chars().any(|c| c.is_numeric()) {
            issues.push("Password must contain a digit".to_string());
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_accepts_correct_password() {
        let hash = PasswordService::hash_password("Str0ngPassw0rd").unwrap();
        assert!(PasswordService::verify_password("Str0ngPassw0rd", &hash).unwrap());
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = PasswordService::hash_password("Str0ngPassw0rd").unwrap();
        assert!(!PasswordService::verify_password("WrongPassword1", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let h1 = PasswordService::hash_password("Str0ngPassw0rd").unwrap();
        let h2 = PasswordService::hash_password("Str0ngPassw0rd").unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn strength_issues_flags_weak_passwords() {
        assert!(!PasswordService::strength_issues("short").is_empty());
        assert!(!PasswordService::strength_issues("alllowercase1").is_empty());
        assert!(PasswordService::strength_issues("Str0ngPassw0rd").is_empty());
    }
}
