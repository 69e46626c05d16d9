use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// A staff account as exposed to admins. The password hash is never selected.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubAdmin {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = "Priya Sharma")]
    pub staff_name: Option<String>,
    #[schema(example = "9876543210")]
    pub mobile: Option<String>,
    #[schema(example = "priya@example.com")]
    pub email: Option<String>,
    #[schema(example = "HYD")]
    pub branch_code: Option<String>,
    pub is_active: bool,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

pub const SUB_ADMIN_COLUMNS: &str =
    "id, staff_name, mobile, email, branch_code, is_active, last_login_at, created_at";
