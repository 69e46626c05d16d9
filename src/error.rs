use actix_web::{HttpResponse, ResponseError, http::StatusCode, web};
use derive_more::Display;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::error;
use validator::ValidationErrors;

use crate::db::is_integrity_violation;

/// Field name (camelCase, as sent by the client) to error message.
pub type FieldErrors = BTreeMap<&'static str, String>;

#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "{}", _0)]
    BadRequest(String),
    #[display(fmt = "Validation failed")]
    Validation(FieldErrors),
    #[display(fmt = "{}", _0)]
    Unauthorized(String),
    #[display(fmt = "{}", _0)]
    Forbidden(String),
    #[display(fmt = "{}", _0)]
    NotFound(String),
    #[display(fmt = "{}", _0)]
    Conflict(String),
    #[display(fmt = "Internal Server Error")]
    Internal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    status_code: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a FieldErrors>,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let errors = match self {
            ApiError::Validation(errors) => Some(errors),
            _ => None,
        };

        HttpResponse::build(status).json(ErrorBody {
            status_code: status.as_u16(),
            message: self.to_string(),
            errors,
        })
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        if is_integrity_violation(&e) {
            return ApiError::Conflict("Record already exists".to_string());
        }
        error!(error = %e, "Database error");
        ApiError::Internal
    }
}

/// First message per field, keyed by the client-facing name in `names`.
/// Fields missing from `names` are dropped; a rule without a message
/// reports its code.
pub fn collect_field_errors(
    errors: &ValidationErrors,
    names: &[(&str, &'static str)],
) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, errs)| {
            let (_, key) = names.iter().find(|(name, _)| *name == &*field)?;
            let first = errs.first()?;
            let message = first
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| first.code.to_string());
            Some((*key, message))
        })
        .collect()
}

fn malformed_request(err: impl std::fmt::Display) -> actix_web::Error {
    ApiError::BadRequest(err.to_string()).into()
}

/// Extractor configs so rejected bodies, query strings and path segments
/// are rendered with the same envelope as handler errors.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| malformed_request(err))
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| malformed_request(err))
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| malformed_request(err))
}
