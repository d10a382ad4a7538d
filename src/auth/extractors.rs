use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::accounts::{errors::AccountError, repo_types::Role};

/// Identity proven by a valid bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    /// Resolves which account a request acts on. A token only ever acts on its own subject,
    /// whatever the role.
    pub fn target(&self, requested: Option<Uuid>) -> Result<Uuid, AccountError> {
        match requested {
            None => Ok(self.id),
            Some(id) if id == self.id => Ok(id),
            Some(id) => {
                warn!(caller = %self.id, role = %self.role, target = %id, "cross-account request refused");
                Err(AccountError::Forbidden)
            }
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AccountError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AccountError::Unauthorized("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or(AccountError::Unauthorized("Invalid Authorization header"))?;

        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err(AccountError::Unauthorized("Invalid or expired token"));
            }
        };

        Ok(AuthUser {
            id: claims.sub,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_account_is_default_target() {
        let me = AuthUser { id: Uuid::new_v4(), role: Role::User };
        assert_eq!(me.target(None).unwrap(), me.id);
        assert_eq!(me.target(Some(me.id)).unwrap(), me.id);
    }

    #[test]
    fn no_role_may_target_another_account() {
        let other = Uuid::new_v4();
        let user = AuthUser { id: Uuid::new_v4(), role: Role::User };
        assert!(matches!(user.target(Some(other)), Err(AccountError::Forbidden)));

        let admin = AuthUser { id: Uuid::new_v4(), role: Role::Admin };
        assert!(matches!(admin.target(Some(other)), Err(AccountError::Forbidden)));
        assert_eq!(admin.target(None).unwrap(), admin.id);
    }
}
