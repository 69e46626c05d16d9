use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};

use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;

fn reject(req: ServiceRequest, err: ApiError) -> Result<ServiceResponse<BoxBody>, Error> {
    tracing::debug!(path = %req.path(), reason = %err, "Rejected unauthenticated request");
    Ok(req.into_response(err.error_response()))
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let secret = match req.app_data::<Data<Config>>() {
        Some(config) => config.jwt_secret.clone(),
        None => return reject(req, ApiError::Internal),
    };

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(v) => v.to_owned(),
            Err(_) => {
                let err = ApiError::Unauthorized("Invalid Authorization header encoding".to_string());
                return reject(req, err);
            }
        },
        None => {
            let err = ApiError::Unauthorized("Missing Authorization header".to_string());
            return reject(req, err);
        }
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t,
        None => {
            let err = ApiError::Unauthorized("Authorization header must start with Bearer".to_string());
            return reject(req, err);
        }
    };

    let auth_user = match verify_token(token, &secret).map_err(|_| {
        ApiError::Unauthorized("Invalid or expired token".to_string())
    }) {
        Ok(claims) => match AuthUser::from_claims(claims) {
            Ok(user) => user,
            Err(err) => return reject(req, err),
        },
        Err(err) => return reject(req, err),
    };

    req.extensions_mut().insert(auth_user);

    next.call(req).await
}
