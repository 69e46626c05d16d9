use actix_web::{HttpResponse, web};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::payment::Payment,
    model::student_registration::{
        self as registration, CreateRegistration, RegistrationDetail, RegistrationStatus,
        StudentRegistration, form_view, new_id, new_stid,
    },
    response::ApiResponse,
    utils::db_utils::{build_update_sql, execute_update, like_pattern},
    utils::query_cache::{CacheKey, QueryCache, REGISTRATION_WRITE, Resource},
};

pub const EXPORT_FILE_NAME: &str = "student-registration-list.csv";

/// Column order of the export; matches the serialized field order.
const EXPORT_HEADER: [&str; 30] = [
    "id", "stid", "studentName", "dateOfBirth", "mobileNumber", "email", "parentMobile",
    "fathersName", "nationality", "gender", "registrationDate", "addressLine1", "addressLine2",
    "country", "state", "city", "district", "pincode", "abroadMasters", "courseName",
    "passportNumber", "serviceCharge", "academicYear", "officeCity", "processedBy",
    "counselorName", "assigneeName", "status", "createdAt", "updatedAt",
];

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase", default)]
#[into_params(parameter_in = Query)]
pub struct RegistrationQuery {
    #[schema(example = 1)]
    /// Page number, starting at 1
    pub page: Option<u32>,
    #[schema(example = 20)]
    /// Items per page (1..=100)
    pub per_page: Option<u32>,
    #[schema(example = "ABROADMASTERS-USA")]
    /// Masters destination; `ALL` disables the filter
    pub abroad_masters: Option<String>,
    #[schema(example = "TEAM-1")]
    /// Processing team
    pub processed_by: Option<String>,
    #[schema(example = "FALL-2025")]
    /// Academic term
    pub academic_year: Option<String>,
    #[schema(example = "Confirmed")]
    /// Confirmed, Rejected or Hold
    pub status: Option<String>,
    #[schema(example = "2025-01-01")]
    /// Registration date lower bound, inclusive
    pub from_date: Option<String>,
    #[schema(example = "2025-01-31")]
    /// Registration date upper bound, inclusive
    pub to_date: Option<String>,
    /// Substring of name, email or mobile number
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Str(String),
    DateTime(DateTime<Utc>),
}

/// `WHERE ...` fragment plus its bind values, in placeholder order.
#[derive(Debug, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub args: Vec<FilterValue>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPage {
    pub items: Vec<StudentRegistration>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 137)]
    pub total: i64,
}

/// `None` for absent, blank or `ALL` selections.
fn selected(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("ALL"))
}

fn filter_date(value: &Option<String>, field: &str) -> Result<Option<NaiveDate>, ApiError> {
    selected(value)
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| ApiError::BadRequest(format!("{field} must be YYYY-MM-DD")))
        })
        .transpose()
}

fn start_of(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

impl RegistrationQuery {
    pub fn pagination(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        (page, per_page)
    }

    /// Rows to skip; computed wide so huge page numbers cannot overflow.
    pub fn offset(&self) -> u64 {
        let (page, per_page) = self.pagination();
        (u64::from(page) - 1) * u64::from(per_page)
    }

    /// All active filters joined with AND.
    pub fn where_clause(&self) -> Result<WhereClause, ApiError> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut args = Vec::new();

        let equals = [
            ("abroad_masters = ?", &self.abroad_masters),
            ("processed_by = ?", &self.processed_by),
            ("academic_year = ?", &self.academic_year),
        ];
        for (condition, value) in equals {
            if let Some(v) = selected(value) {
                conditions.push(condition);
                args.push(FilterValue::Str(v.to_string()));
            }
        }

        if let Some(status) = selected(&self.status) {
            let status: RegistrationStatus = status.parse().map_err(|_| {
                ApiError::BadRequest("status must be one of Confirmed, Rejected, Hold".to_string())
            })?;
            conditions.push("status = ?");
            args.push(FilterValue::Str(status.as_ref().to_string()));
        }

        if let Some(from) = filter_date(&self.from_date, "fromDate")? {
            let from = start_of(from).ok_or(ApiError::Internal)?;
            conditions.push("registration_date >= ?");
            args.push(FilterValue::DateTime(from));
        }

        // inclusive of the whole `to` day
        if let Some(to) = filter_date(&self.to_date, "toDate")? {
            let next_day = start_of(to).ok_or(ApiError::Internal)? + Duration::days(1);
            conditions.push("registration_date < ?");
            args.push(FilterValue::DateTime(next_day));
        }

        if let Some(term) = selected(&self.search) {
            conditions.push("(student_name LIKE ? OR email LIKE ? OR mobile_number LIKE ?)");
            let like = like_pattern(term);
            args.push(FilterValue::Str(like.clone()));
            args.push(FilterValue::Str(like.clone()));
            args.push(FilterValue::Str(like));
        }

        let sql = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        Ok(WhereClause { sql, args })
    }
}

macro_rules! bind_filters {
    ($query:expr, $args:expr) => {{
        let mut q = $query;
        for arg in $args {
            q = match arg {
                FilterValue::Str(s) => q.bind(s.clone()),
                FilterValue::DateTime(d) => q.bind(*d),
            };
        }
        q
    }};
}

/// Validates a path id; registrations are keyed by UUID.
pub fn parse_id(raw: &str) -> Result<String, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::BadRequest("student ID is required".to_string()));
    }
    Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| ApiError::BadRequest(format!("Invalid student ID: {raw}")))
}

fn not_found(id: &str) -> ApiError {
    ApiError::NotFound(format!("No student found with this id {id}"))
}

/// A delete that matched nothing is a missing resource, not a success.
pub fn ensure_deleted(rows_affected: u64, id: &str) -> Result<(), ApiError> {
    if rows_affected == 0 {
        Err(not_found(id))
    } else {
        Ok(())
    }
}

async fn fetch_registration(
    pool: &MySqlPool,
    id: &str,
) -> Result<Option<StudentRegistration>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?",
        registration::SELECT_COLUMNS,
        registration::TABLE
    );
    sqlx::query_as::<_, StudentRegistration>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// List registrations
#[utoipa::path(
    get,
    path = "/api/student-registration",
    params(RegistrationQuery),
    responses(
        (status = 200, description = "Filtered, paginated registrations", body = RegistrationPage),
        (status = 400, description = "Invalid filter value"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Student Registration",
    security(("bearer_auth" = []))
)]
pub async fn list_registrations(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<QueryCache>,
    query: web::Query<RegistrationQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;

    let (page, per_page) = query.pagination();
    let offset = i64::try_from(query.offset())
        .map_err(|_| ApiError::BadRequest("page is out of range".to_string()))?;
    let filter = query.where_clause()?;

    let key = CacheKey::new(
        Resource::Registrations,
        format!("{}|{:?}|{page}|{per_page}", filter.sql, filter.args),
    );
    let seen = cache.generation(Resource::Registrations);
    if let Some(cached) = cache.get(&key).await {
        debug!("Serving registration list from cache");
        return Ok(ApiResponse::ok(&*cached, "Students fetched successfully"));
    }

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) FROM {} {}", registration::TABLE, filter.sql);
    debug!(sql = %count_sql, args = ?filter.args, "Counting registrations");

    let total = bind_filters!(sqlx::query_scalar::<_, i64>(&count_sql), &filter.args)
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, sql = %count_sql, "Failed to count registrations");
            ApiError::Internal
        })?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT {} FROM {} {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        registration::SELECT_COLUMNS,
        registration::TABLE,
        filter.sql
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching registrations");

    let items = bind_filters!(
        sqlx::query_as::<_, StudentRegistration>(&data_sql),
        &filter.args
    )
    .bind(i64::from(per_page))
    .bind(offset)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, sql = %data_sql, "Failed to fetch registrations");
        ApiError::Internal
    })?;

    let page = RegistrationPage {
        items,
        page,
        per_page,
        total,
    };
    let value = serde_json::to_value(&page).map_err(|e| {
        error!(error = %e, "Failed to serialize registration page");
        ApiError::Internal
    })?;
    let cached = cache.insert(key, value, seen).await;

    Ok(ApiResponse::ok(&*cached, "Students fetched successfully"))
}

/// Create a registration
#[utoipa::path(
    post,
    path = "/api/student-registration",
    request_body = CreateRegistration,
    responses(
        (status = 201, description = "Registration created", body = StudentRegistration),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "statusCode": 400,
            "message": "Validation failed",
            "errors": {"studentName": "Student name is required"}
        })),
        (status = 409, description = "Duplicate student id")
    ),
    tag = "Student Registration",
    security(("bearer_auth" = []))
)]
pub async fn create_registration(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<QueryCache>,
    payload: web::Json<CreateRegistration>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;

    let new = payload.into_inner().validate().map_err(ApiError::Validation)?;
    let id = new_id();
    let stid = new_stid(Utc::now());
    let p = &new.payload;

    sqlx::query(
        r#"
        INSERT INTO student_registrations
            (id, stid, student_name, date_of_birth, mobile_number, email, parent_mobile,
             fathers_name, nationality, gender, registration_date, address_line1, address_line2,
             country, state, city, district, pincode, abroad_masters, course_name,
             passport_number, service_charge, academic_year, office_city, processed_by,
             counselor_name, assignee_name, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&stid)
    .bind(p.student_name.trim())
    .bind(new.date_of_birth)
    .bind(p.mobile_number.trim())
    .bind(&p.email)
    .bind(&p.parent_mobile)
    .bind(&p.fathers_name)
    .bind(&p.nationality)
    .bind(&p.gender)
    .bind(new.registration_date)
    .bind(&p.address_line1)
    .bind(&p.address_line2)
    .bind(&p.country)
    .bind(&p.state)
    .bind(&p.city)
    .bind(&p.district)
    .bind(&p.pincode)
    .bind(p.abroad_masters.trim())
    .bind(&p.course_name)
    .bind(&p.passport_number)
    .bind(p.service_charge)
    .bind(&p.academic_year)
    .bind(&p.office_city)
    .bind(&p.processed_by)
    .bind(&p.counselor_name)
    .bind(&p.assignee_name)
    .bind(new.status.as_ref())
    .execute(pool.get_ref())
    .await?;

    cache.invalidate(REGISTRATION_WRITE);
    info!(%id, %stid, user_id = auth.user_id, "Registration created");

    let created = fetch_registration(pool.get_ref(), &id)
        .await?
        .ok_or(ApiError::Internal)?;

    Ok(ApiResponse::created(created, "Student registered successfully"))
}

/// Get a registration with its payments
#[utoipa::path(
    get,
    path = "/api/student-registration/{id}",
    params(("id" = String, Path, description = "Registration id (UUID)")),
    responses(
        (status = 200, description = "Registration found", body = RegistrationDetail),
        (status = 400, description = "Missing or invalid id"),
        (status = 404, description = "Registration not found", body = Object, example = json!({
            "statusCode": 404,
            "message": "No student found with this id 5f1c7c1e-3a7e-4a53-9d34-0d6f2d7c2a10"
        }))
    ),
    tag = "Student Registration",
    security(("bearer_auth" = []))
)]
pub async fn get_registration(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;
    let id = parse_id(&path)?;

    let registration = fetch_registration(pool.get_ref(), &id)
        .await?
        .ok_or_else(|| not_found(&id))?;

    let payments = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, registration_id, amount, status, created_at
        FROM payments
        WHERE registration_id = ?
        ORDER BY created_at DESC
        "#,
    )
    .bind(&id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(ApiResponse::ok(
        RegistrationDetail {
            registration,
            payments,
        },
        "user fetched successfully",
    ))
}

/// Get a registration prepared for the edit form
#[utoipa::path(
    get,
    path = "/api/student-registration/{id}/form",
    params(("id" = String, Path, description = "Registration id (UUID)")),
    responses(
        (status = 200, description = "Registration with dates as YYYY-MM-DD", body = Object, example = json!({
            "statusCode": 200,
            "data": {"studentName": "Ravi Kumar", "dateOfBirth": "2002-05-14", "registrationDate": ""},
            "message": "Form data fetched successfully"
        })),
        (status = 404, description = "Registration not found")
    ),
    tag = "Student Registration",
    security(("bearer_auth" = []))
)]
pub async fn get_registration_form(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;
    let id = parse_id(&path)?;

    let registration = fetch_registration(pool.get_ref(), &id)
        .await?
        .ok_or_else(|| not_found(&id))?;

    let view = form_view(&registration).map_err(|e| {
        error!(error = %e, %id, "Failed to build form view");
        ApiError::Internal
    })?;

    Ok(ApiResponse::ok(view, "Form data fetched successfully"))
}

/// Update a registration (partial)
#[utoipa::path(
    put,
    path = "/api/student-registration/{id}",
    params(("id" = String, Path, description = "Registration id (UUID)")),
    request_body(content = Object, description = "Any subset of editable fields; id, stid, createdAt and updatedAt are ignored"),
    responses(
        (status = 200, description = "Updated registration", body = StudentRegistration),
        (status = 400, description = "Invalid id or payload"),
        (status = 404, description = "Registration not found")
    ),
    tag = "Student Registration",
    security(("bearer_auth" = []))
)]
pub async fn update_registration(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<QueryCache>,
    path: web::Path<String>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;
    let id = parse_id(&path)?;

    let update = build_update_sql(
        registration::TABLE,
        &body,
        registration::IMMUTABLE_FIELDS,
        registration::EDITABLE_COLUMNS,
        "id",
        &id,
    )?;
    debug!(sql = %update.sql, %id, "Updating registration");

    execute_update(pool.get_ref(), update).await?;

    // read back to return the record; a missing row surfaces here as 404
    let updated = fetch_registration(pool.get_ref(), &id)
        .await?
        .ok_or_else(|| not_found(&id))?;

    cache.invalidate(REGISTRATION_WRITE);
    info!(%id, user_id = auth.user_id, "Registration updated");

    Ok(ApiResponse::ok(updated, "Student updated successfully"))
}

/// Delete a registration
#[utoipa::path(
    delete,
    path = "/api/student-registration/{id}",
    params(("id" = String, Path, description = "Registration id (UUID)")),
    responses(
        (status = 200, description = "Deleted", body = Object, example = json!({
            "statusCode": 200,
            "data": null,
            "message": "Student deleted successfully"
        })),
        (status = 400, description = "Missing or invalid id"),
        (status = 404, description = "Registration not found")
    ),
    tag = "Student Registration",
    security(("bearer_auth" = []))
)]
pub async fn delete_registration(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<QueryCache>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;
    let id = parse_id(&path)?;

    let result = sqlx::query("DELETE FROM student_registrations WHERE id = ?")
        .bind(&id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, %id, "Failed to delete registration");
            ApiError::Internal
        })?;

    ensure_deleted(result.rows_affected(), &id)?;

    cache.invalidate(REGISTRATION_WRITE);
    info!(%id, user_id = auth.user_id, "Registration deleted");

    Ok(ApiResponse::ok((), "Student deleted successfully"))
}

/// Accumulates registrations into an in-memory CSV document.
pub struct CsvExport {
    writer: csv::Writer<Vec<u8>>,
    rows: usize,
}

impl CsvExport {
    pub fn new() -> Result<Self, csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(EXPORT_HEADER)?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn push(&mut self, row: &StudentRegistration) -> Result<(), csv::Error> {
        self.writer.serialize(row)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(self) -> Result<Vec<u8>, ApiError> {
        self.writer.into_inner().map_err(|e| {
            error!(error = %e, "Failed to flush CSV export");
            ApiError::Internal
        })
    }
}

fn export_error(e: csv::Error) -> ApiError {
    error!(error = %e, "Failed to write CSV export");
    ApiError::Internal
}

/// Export the filtered registrations as CSV
#[utoipa::path(
    get,
    path = "/api/student-registration/export",
    params(RegistrationQuery),
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv"),
        (status = 400, description = "Invalid filter value")
    ),
    tag = "Student Registration",
    security(("bearer_auth" = []))
)]
pub async fn export_registrations(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RegistrationQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;

    let filter = query.where_clause()?;
    let sql = format!(
        "SELECT {} FROM {} {} ORDER BY created_at DESC",
        registration::SELECT_COLUMNS,
        registration::TABLE,
        filter.sql
    );

    let mut export = CsvExport::new().map_err(export_error)?;
    let mut stream =
        bind_filters!(sqlx::query_as::<_, StudentRegistration>(&sql), &filter.args).fetch(pool.get_ref());

    while let Some(row) = stream.next().await {
        export.push(&row?).map_err(export_error)?;
    }

    info!(rows = export.rows(), user_id = auth.user_id, "Registrations exported");
    let body = export.finish()?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{EXPORT_FILE_NAME}\""),
        ))
        .body(body))
}
