use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::role::Role;
use crate::models::{Claims, TokenType};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only for sub-admins
    pub branch_code: Option<String>,
}

impl AuthUser {
    /// Builds the caller from verified claims; only access tokens qualify.
    pub fn from_claims(claims: Claims) -> Result<Self, ApiError> {
        if claims.token_type != TokenType::Access {
            return Err(ApiError::Unauthorized("Access token required".to_string()));
        }

        let role = Role::from_id(claims.role)
            .ok_or_else(|| ApiError::Unauthorized("Invalid role".to_string()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            branch_code: claims.branch_code,
        })
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin only".to_string()))
        }
    }

    pub fn require_staff(&self) -> Result<(), ApiError> {
        if matches!(self.role, Role::Admin | Role::SubAdmin) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Staff only".to_string()))
        }
    }
}

pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, ApiError> {
    // set by auth_middleware on protected scopes
    if let Some(user) = req.extensions().get::<AuthUser>() {
        return Ok(user.clone());
    }

    let token = bearer_token(req).ok_or_else(|| ApiError::Unauthorized("Missing token".to_string()))?;

    let config = req
        .app_data::<Data<Config>>()
        .ok_or(ApiError::Internal)?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid token".to_string()))?;

    AuthUser::from_claims(claims)
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: u8, token_type: TokenType) -> Claims {
        Claims {
            user_id: 1,
            sub: "admin@example.com".into(),
            role,
            exp: usize::MAX,
            jti: "jti".into(),
            token_type,
            branch_code: None,
        }
    }

    #[test]
    fn refresh_token_cannot_authenticate_requests() {
        assert!(matches!(
            AuthUser::from_claims(claims(1, TokenType::Refresh)),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn sub_admin_is_staff_but_not_admin() {
        let user = AuthUser::from_claims(claims(Role::SubAdmin.id(), TokenType::Access)).unwrap();

        assert!(user.require_staff().is_ok());
        assert!(matches!(user.require_admin(), Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(AuthUser::from_claims(claims(42, TokenType::Access)).is_err());
    }
}
