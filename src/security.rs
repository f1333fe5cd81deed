use anyhow::{Result, anyhow};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{SaltString, PasswordHash};
use tracing::info;

use crate::storage::{EntityStore, User};

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

/// Unparseable hashes never verify.
pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

/// Seed the studio administrator when the user store holds nobody with that email.
/// Returns true when a user was created.
pub fn ensure_default_admin(users: &dyn EntityStore<User>, email: &str, password: &str) -> Result<bool> {
    if users.find_by_unique_key(email)?.is_some() { return Ok(false); }
    let hash = hash_password(password)?;
    let admin = users.save(User::new(email, "Admin", "Admin", &hash, true))?;
    info!(target: "startup", "seeded default admin email={} id={:?}", email, admin.id);
    Ok(true)
}
