use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("hash password: {e}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("parse password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Strength rules applied at registration, password change, and reset
/// confirm. Returns the message to surface under the offending field.
pub fn validate_strength(password: &str, username: &str, email: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters long.".into());
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err("Password cannot be entirely numeric.".into());
    }
    let email_local = email.split('@').next().unwrap_or("");
    if (!username.is_empty() && password.eq_ignore_ascii_case(username))
        || (!email_local.is_empty() && password.eq_ignore_ascii_case(email_local))
    {
        return Err("Password is too similar to your account details.".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Str0ngPass!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        assert!(verify_password("anything", "not-a-valid-hash").is_err());
    }

    #[test]
    fn strength_rejects_short_passwords() {
        assert!(validate_strength("short1", "alice", "a@x.com").is_err());
    }

    #[test]
    fn strength_rejects_all_numeric() {
        assert!(validate_strength("123456789", "alice", "a@x.com").is_err());
    }

    #[test]
    fn strength_rejects_username_lookalike() {
        assert!(validate_strength("alicealice", "alicealice", "a@x.com").is_err());
        assert!(validate_strength("Bobsecret", "alice", "bobsecret@x.com").is_err());
    }

    #[test]
    fn strength_accepts_reasonable_password() {
        assert!(validate_strength("Str0ngPass!", "alice", "a@x.com").is_ok());
    }
}
