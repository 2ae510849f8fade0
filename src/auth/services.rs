use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use tracing::error;

use crate::auth::{repo::UserStore, repo_types::User};

pub const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9@.+_-]{3,150}$").unwrap();
    // Verified against when the username is unknown so both paths cost one hash.
    static ref DUMMY_HASH: Option<String> = hash_password("not-a-real-password").ok();
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!("hash password: {e}")
        })
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!("parse password hash: {e}")
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Returns the user only when `username` exists and `password` matches.
pub async fn authenticate(
    users: &dyn UserStore,
    username: &str,
    password: &str,
) -> anyhow::Result<Option<User>> {
    match users.find_by_username(username).await? {
        Some(user) => {
            let ok = verify_password(password, &user.password_hash)?;
            Ok(ok.then_some(user))
        }
        None => {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(password, dummy);
            }
            Ok(None)
        }
    }
}

/// Validates a signup form, returning the message to show on failure.
pub fn check_signup(username: &str, password: &str, confirm: &str) -> Result<(), &'static str> {
    if !is_valid_username(username) {
        return Err("Enter a valid username: 3-150 letters, digits and @/./+/-/_ only.");
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err("This password is too short. It must contain at least 8 characters.");
    }
    if password != confirm {
        return Err("The two password fields didn't match.");
    }
    Ok(())
}
