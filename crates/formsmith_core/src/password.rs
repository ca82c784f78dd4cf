//! Password hashing — thin wrapper over bcrypt so the cost factor and
//! error mapping live in one place.

use crate::error::FormsmithError;

pub fn hash(plain: &str) -> Result<String, FormsmithError> {
    bcrypt::hash(plain, bcrypt::DEFAULT_COST)
        .map_err(|e| FormsmithError::Internal(anyhow::anyhow!("bcrypt hash failed: {e}")))
}

/// Returns false on mismatch AND on a malformed stored hash — a broken
/// hash must never authenticate.
pub fn verify(plain: &str, hashed: &str) -> bool {
    bcrypt::verify(plain, hashed).unwrap_or(false)
}

/// Minimum length only; composition rules are the frontend's problem.
pub fn check_strength(plain: &str) -> Result<(), FormsmithError> {
    if plain.len() < 8 {
        return Err(FormsmithError::InvalidInput(
            "password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}
