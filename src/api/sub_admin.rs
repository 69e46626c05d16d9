use actix_web::{HttpResponse, web};
use sqlx::MySqlPool;
use tracing::{debug, error, info};

use crate::{
    auth::{auth::AuthUser, password::hash_password},
    config::Config,
    db::is_integrity_violation,
    error::ApiError,
    model::{
        role::Role,
        sub_admin::{BranchOption, FormMode, SubAdminForm, ValidSubAdmin},
        user::{SUB_ADMIN_COLUMNS, SubAdmin},
    },
    response::ApiResponse,
    utils::query_cache::{CacheKey, QueryCache, Resource, SUB_ADMIN_WRITE},
};

fn parse_user_id(raw: &str) -> Result<u64, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::BadRequest("sub-admin ID is required".to_string()));
    }
    raw.parse::<u64>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid sub-admin ID: {raw}")))
}

fn not_found(id: u64) -> ApiError {
    ApiError::NotFound(format!("No sub-admin found with this id {id}"))
}

/// Duplicate e-mail gets a specific message; everything else goes through `From`.
fn write_error(e: sqlx::Error) -> ApiError {
    if is_integrity_violation(&e) {
        ApiError::Conflict("A user with this email already exists".to_string())
    } else {
        ApiError::from(e)
    }
}

fn hash(password: &str) -> Result<String, ApiError> {
    hash_password(password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ApiError::Internal
    })
}

async fn fetch_sub_admin(pool: &MySqlPool, id: u64) -> Result<Option<SubAdmin>, sqlx::Error> {
    let sql = format!("SELECT {SUB_ADMIN_COLUMNS} FROM users WHERE id = ? AND role_id = ?");
    sqlx::query_as::<_, SubAdmin>(&sql)
        .bind(id)
        .bind(Role::SubAdmin.id())
        .fetch_optional(pool)
        .await
}

/// Builds the UPDATE for an edit; the password column is only touched when a
/// new password was supplied.
fn update_statement(valid: &ValidSubAdmin) -> &'static str {
    if valid.password.is_some() {
        "UPDATE users SET staff_name = ?, mobile = ?, email = ?, username = ?, branch_code = ?, \
         password = ? WHERE id = ? AND role_id = ?"
    } else {
        "UPDATE users SET staff_name = ?, mobile = ?, email = ?, username = ?, branch_code = ? \
         WHERE id = ? AND role_id = ?"
    }
}

/// List sub-admins
#[utoipa::path(
    get,
    path = "/api/sub-admin",
    responses(
        (status = 200, description = "All sub-admin accounts", body = [SubAdmin]),
        (status = 403, description = "Admin only")
    ),
    tag = "Sub Admin",
    security(("bearer_auth" = []))
)]
pub async fn list_sub_admins(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<QueryCache>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let key = CacheKey::new(Resource::SubAdmins, "all");
    let seen = cache.generation(Resource::SubAdmins);
    if let Some(cached) = cache.get(&key).await {
        debug!("Serving sub-admin list from cache");
        return Ok(ApiResponse::ok(&*cached, "Sub-admins fetched successfully"));
    }

    let sql = format!(
        "SELECT {SUB_ADMIN_COLUMNS} FROM users WHERE role_id = ? ORDER BY created_at DESC"
    );
    let rows = sqlx::query_as::<_, SubAdmin>(&sql)
        .bind(Role::SubAdmin.id())
        .fetch_all(pool.get_ref())
        .await?;

    let value = serde_json::to_value(&rows).map_err(|e| {
        error!(error = %e, "Failed to serialize sub-admins");
        ApiError::Internal
    })?;
    let cached = cache.insert(key, value, seen).await;

    Ok(ApiResponse::ok(&*cached, "Sub-admins fetched successfully"))
}

/// Create a sub-admin
#[utoipa::path(
    post,
    path = "/api/sub-admin",
    request_body = SubAdminForm,
    responses(
        (status = 201, description = "Sub-admin created", body = SubAdmin),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "statusCode": 400,
            "message": "Validation failed",
            "errors": {"mobile": "Mobile number must be 10 digits"}
        })),
        (status = 409, description = "E-mail already in use")
    ),
    tag = "Sub Admin",
    security(("bearer_auth" = []))
)]
pub async fn create_sub_admin(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    cache: web::Data<QueryCache>,
    form: web::Json<SubAdminForm>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let valid = form
        .into_inner()
        .validate(FormMode::Add, &config.branch_codes)
        .map_err(ApiError::Validation)?;
    let password = valid.password.as_deref().ok_or(ApiError::Internal)?;
    let hashed = hash(password)?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, password, role_id, staff_name, mobile, email, branch_code, is_active)
        VALUES (?, ?, ?, ?, ?, ?, ?, TRUE)
        "#,
    )
    .bind(&valid.email)
    .bind(&hashed)
    .bind(Role::SubAdmin.id())
    .bind(&valid.staff_name)
    .bind(&valid.mobile)
    .bind(&valid.email)
    .bind(&valid.branch_code)
    .execute(pool.get_ref())
    .await
    .map_err(write_error)?;

    let id = result.last_insert_id();
    cache.invalidate(SUB_ADMIN_WRITE);
    info!(id, branch = %valid.branch_code, admin_id = auth.user_id, "Sub-admin created");

    let created = fetch_sub_admin(pool.get_ref(), id)
        .await?
        .ok_or(ApiError::Internal)?;

    Ok(ApiResponse::created(created, "Sub-admin created successfully"))
}

/// Get a sub-admin
#[utoipa::path(
    get,
    path = "/api/sub-admin/{id}",
    params(("id" = u64, Path, description = "Sub-admin user id")),
    responses(
        (status = 200, description = "Sub-admin found", body = SubAdmin),
        (status = 404, description = "Sub-admin not found")
    ),
    tag = "Sub Admin",
    security(("bearer_auth" = []))
)]
pub async fn get_sub_admin(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let id = parse_user_id(&path)?;

    let sub_admin = fetch_sub_admin(pool.get_ref(), id)
        .await?
        .ok_or_else(|| not_found(id))?;

    Ok(ApiResponse::ok(sub_admin, "Sub-admin fetched successfully"))
}

/// Update a sub-admin; a blank password keeps the current one
#[utoipa::path(
    put,
    path = "/api/sub-admin/{id}",
    params(("id" = u64, Path, description = "Sub-admin user id")),
    request_body = SubAdminForm,
    responses(
        (status = 200, description = "Updated sub-admin", body = SubAdmin),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Sub-admin not found"),
        (status = 409, description = "E-mail already in use")
    ),
    tag = "Sub Admin",
    security(("bearer_auth" = []))
)]
pub async fn update_sub_admin(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    cache: web::Data<QueryCache>,
    path: web::Path<String>,
    form: web::Json<SubAdminForm>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let id = parse_user_id(&path)?;

    let valid = form
        .into_inner()
        .validate(FormMode::Edit, &config.branch_codes)
        .map_err(ApiError::Validation)?;

    let hashed = valid.password.as_deref().map(hash).transpose()?;

    let mut query = sqlx::query(update_statement(&valid))
        .bind(&valid.staff_name)
        .bind(&valid.mobile)
        .bind(&valid.email)
        .bind(&valid.email)
        .bind(&valid.branch_code);
    if let Some(hashed) = &hashed {
        query = query.bind(hashed);
    }
    query
        .bind(id)
        .bind(Role::SubAdmin.id())
        .execute(pool.get_ref())
        .await
        .map_err(write_error)?;

    let updated = fetch_sub_admin(pool.get_ref(), id)
        .await?
        .ok_or_else(|| not_found(id))?;

    cache.invalidate(SUB_ADMIN_WRITE);
    info!(
        id,
        password_changed = hashed.is_some(),
        admin_id = auth.user_id,
        "Sub-admin updated"
    );

    Ok(ApiResponse::ok(updated, "Sub-admin updated successfully"))
}

/// Delete a sub-admin
#[utoipa::path(
    delete,
    path = "/api/sub-admin/{id}",
    params(("id" = u64, Path, description = "Sub-admin user id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Sub-admin not found")
    ),
    tag = "Sub Admin",
    security(("bearer_auth" = []))
)]
pub async fn delete_sub_admin(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<QueryCache>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let id = parse_user_id(&path)?;

    let result = sqlx::query("DELETE FROM users WHERE id = ? AND role_id = ?")
        .bind(id)
        .bind(Role::SubAdmin.id())
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(not_found(id));
    }

    cache.invalidate(SUB_ADMIN_WRITE);
    info!(id, admin_id = auth.user_id, "Sub-admin deleted");

    Ok(ApiResponse::ok((), "Sub-admin deleted successfully"))
}

/// Office branches a sub-admin can be assigned to
#[utoipa::path(
    get,
    path = "/api/sub-admin/branches",
    responses((status = 200, description = "Branch options", body = [BranchOption])),
    tag = "Sub Admin",
    security(("bearer_auth" = []))
)]
pub async fn list_branches(
    auth: AuthUser,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let branches: Vec<BranchOption> = config
        .branch_codes
        .iter()
        .map(|code| BranchOption {
            code: code.clone(),
            label: code.clone(),
        })
        .collect();

    Ok(ApiResponse::ok(branches, "Branches fetched successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{TokenSubject, generate_access_token};
    use actix_web::{App, http::StatusCode, test as actix_test};

    fn config() -> Config {
        Config::for_tests()
    }

    fn bearer(role: Role) -> String {
        let subject = TokenSubject {
            user_id: 1,
            username: "admin@example.com",
            role: role.id(),
            branch_code: None,
        };
        let token = generate_access_token(&subject, "test-secret", 60).unwrap();
        format!("Bearer {token}")
    }

    #[test]
    fn user_ids_are_numeric() {
        assert_eq!(parse_user_id(" 42 ").unwrap(), 42);
        assert!(matches!(parse_user_id(""), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_user_id("abc"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn blank_password_leaves_hash_column_alone() {
        let form = SubAdminForm {
            staff_name: "Priya".into(),
            mobile: "9876543210".into(),
            email: "priya@example.com".into(),
            password: String::new(),
            branch_code: "HYD".into(),
        };
        let valid = form.validate(FormMode::Edit, &config().branch_codes).unwrap();
        assert!(!update_statement(&valid).contains("password"));

        let valid = ValidSubAdmin {
            password: Some("new-pass".into()),
            ..valid
        };
        assert!(update_statement(&valid).contains("password = ?"));
    }

    #[actix_web::test]
    async fn branches_are_served_from_configuration() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(config()))
                .route("/branches", web::get().to(list_branches)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/branches")
            .insert_header(("Authorization", bearer(Role::Admin)))
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["statusCode"], 200);
        assert_eq!(body["data"][1]["code"], "BLR");
    }

    #[actix_web::test]
    async fn sub_admins_cannot_manage_branches() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(config()))
                .route("/branches", web::get().to(list_branches)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/branches")
            .insert_header(("Authorization", bearer(Role::SubAdmin)))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
