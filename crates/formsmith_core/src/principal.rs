use uuid::Uuid;

use crate::error::FormsmithError;
use crate::types::Role;

/// Validated caller identity, built from JWT claims at the server
/// boundary. Core logic never reads raw tokens; handlers pass this in
/// explicitly — no implicit or thread-local identity anywhere.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub roles: Vec<String>,
}

impl Principal {
    /// Construct from validated JWT claims (server middleware calls this).
    pub fn from_jwt_claims(claims: &JwtClaims) -> Result<Self, FormsmithError> {
        let sub = claims
            .sub
            .as_deref()
            .ok_or_else(|| FormsmithError::Unauthorized("missing sub claim".into()))?;
        let user_id = Uuid::parse_str(sub)
            .map_err(|_| FormsmithError::Unauthorized("sub claim is not a user id".into()))?;
        Ok(Self {
            user_id,
            roles: claims.roles.clone().unwrap_or_default(),
        })
    }

    /// Construct explicitly for in-process callers and tests.
    pub fn in_process(user_id: Uuid, roles: Vec<String>) -> Self {
        Self { user_id, roles }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin.as_str())
    }

    pub fn require_admin(&self) -> Result<(), FormsmithError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(FormsmithError::Forbidden(format!(
                "{} is not an admin",
                self.user_id
            )))
        }
    }

    /// Admin or the named user themselves.
    pub fn require_self_or_admin(&self, user_id: Uuid) -> Result<(), FormsmithError> {
        if self.is_admin() || self.user_id == user_id {
            Ok(())
        } else {
            Err(FormsmithError::Forbidden(format!(
                "{} may not act on user {user_id}",
                self.user_id
            )))
        }
    }
}

/// JWT claims shape produced at login and expected by the middleware.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct JwtClaims {
    pub sub: Option<String>,
    pub roles: Option<Vec<String>>,
    pub exp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: Option<&str>, roles: &[&str]) -> JwtClaims {
        JwtClaims {
            sub: sub.map(|s| s.to_string()),
            roles: Some(roles.iter().map(|r| r.to_string()).collect()),
            exp: 0,
        }
    }

    #[test]
    fn from_jwt_claims_happy_path() {
        let id = Uuid::new_v4();
        let p = Principal::from_jwt_claims(&claims(Some(&id.to_string()), &["admin"])).unwrap();
        assert_eq!(p.user_id, id);
        assert!(p.is_admin());
    }

    #[test]
    fn from_jwt_claims_missing_sub() {
        let err = Principal::from_jwt_claims(&claims(None, &[])).unwrap_err();
        assert!(matches!(err, FormsmithError::Unauthorized(_)));
    }

    #[test]
    fn from_jwt_claims_garbage_sub() {
        let err = Principal::from_jwt_claims(&claims(Some("not-a-uuid"), &[])).unwrap_err();
        assert!(matches!(err, FormsmithError::Unauthorized(_)));
    }

    #[test]
    fn require_admin_rejects_plain_user() {
        let p = Principal::in_process(Uuid::new_v4(), vec!["user".into()]);
        assert!(matches!(
            p.require_admin(),
            Err(FormsmithError::Forbidden(_))
        ));
    }

    #[test]
    fn self_or_admin() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let p = Principal::in_process(me, vec!["user".into()]);
        assert!(p.require_self_or_admin(me).is_ok());
        assert!(p.require_self_or_admin(other).is_err());

        let admin = Principal::in_process(Uuid::new_v4(), vec!["admin".into()]);
        assert!(admin.require_self_or_admin(other).is_ok());
    }
}
