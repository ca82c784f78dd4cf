//! JWT middleware — validates Bearer tokens and injects `Principal`.
//!
//! Tokens are HS256, signed at login with the same shared secret. Core
//! logic never reads raw tokens; it only sees the validated Principal.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum::Extension;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use formsmith_core::error::FormsmithError;
use formsmith_core::principal::{JwtClaims, Principal};
use formsmith_core::types::User;

use crate::error::AppError;

const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Clone)]
pub struct JwtConfig {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtConfig {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Sign a login token for a user.
    pub fn sign(&self, user: &User) -> Result<String, FormsmithError> {
        let claims = JwtClaims {
            sub: Some(user.user_id.to_string()),
            roles: Some(vec![user.role.as_str().to_string()]),
            exp: (Utc::now() + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| FormsmithError::Internal(anyhow::anyhow!("jwt encode failed: {e}")))
    }

    fn verify(&self, token: &str) -> Result<Principal, FormsmithError> {
        let data = decode::<JwtClaims>(token, &self.decoding, &Validation::default())
            .map_err(|e| FormsmithError::Unauthorized(format!("invalid token: {e}")))?;
        Principal::from_jwt_claims(&data.claims)
    }
}

/// Layer applied to the protected route group. Rejects missing or
/// invalid tokens with 401; on success the `Principal` is available as
/// a request extension.
pub async fn jwt_auth(
    Extension(config): Extension<JwtConfig>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError(FormsmithError::Unauthorized(
                "missing bearer token".into(),
            ))
        })?;

    let principal = config.verify(token)?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use formsmith_core::types::Role;
    use uuid::Uuid;

    fn user(role: Role) -> User {
        User {
            user_id: Uuid::new_v4(),
            email: "a@example.com".into(),
            display_name: "A".into(),
            password_hash: String::new(),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let cfg = JwtConfig::from_secret(b"test-secret");
        let u = user(Role::Admin);
        let token = cfg.sign(&u).unwrap();
        let principal = cfg.verify(&token).unwrap();
        assert_eq!(principal.user_id, u.user_id);
        assert!(principal.is_admin());
    }

    #[test]
    fn wrong_secret_rejected() {
        let cfg = JwtConfig::from_secret(b"secret-a");
        let other = JwtConfig::from_secret(b"secret-b");
        let token = cfg.sign(&user(Role::User)).unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn garbage_token_rejected() {
        let cfg = JwtConfig::from_secret(b"secret");
        assert!(cfg.verify("not.a.jwt").is_err());
    }
}
