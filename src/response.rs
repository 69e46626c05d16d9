use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::Serialize;
use utoipa::ToSchema;

/// Uniform success envelope: `{statusCode, data, message}`.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    #[schema(example = 200)]
    pub status_code: u16,
    pub data: T,
    #[schema(example = "Student updated successfully")]
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data,
            message: message.into(),
        }
    }

    pub fn ok(data: T, message: impl Into<String>) -> HttpResponse {
        HttpResponse::Ok().json(Self::new(StatusCode::OK, data, message))
    }

    pub fn created(data: T, message: impl Into<String>) -> HttpResponse {
        HttpResponse::Created().json(Self::new(StatusCode::CREATED, data, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_serializes_camel_case() {
        let envelope = ApiResponse::new(StatusCode::OK, json!({"id": "a"}), "user fetched successfully");
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(
            value,
            json!({
                "statusCode": 200,
                "data": {"id": "a"},
                "message": "user fetched successfully"
            })
        );
    }

    #[test]
    fn null_data_is_kept_in_envelope() {
        let value = serde_json::to_value(ApiResponse::new(StatusCode::OK, (), "Student deleted successfully")).unwrap();
        assert!(value.get("data").unwrap().is_null());
    }
}
