use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use sqlx::MySqlPool;
use tracing::{debug, error, info};

use crate::{
    auth::auth::AuthUser,
    config::Config,
    dashboard::{
        DashboardSummary, GroupCount, Kpis,
        buckets::{MonthlyCount, month_buckets, window_start},
        day_range::{day_range, local_date, offset_from_minutes},
        named_counts,
    },
    error::ApiError,
    model::payment::PaymentStatus,
    response::ApiResponse,
    utils::query_cache::{CacheKey, QueryCache, Resource},
};

async fn count(pool: &MySqlPool, sql: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await
}

async fn count_payments(pool: &MySqlPool, status: PaymentStatus) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payments WHERE status = ?")
        .bind(status.as_ref())
        .fetch_one(pool)
        .await
}

async fn group_counts(pool: &MySqlPool, sql: &str) -> Result<Vec<GroupCount>, sqlx::Error> {
    sqlx::query_as::<_, GroupCount>(sql).fetch_all(pool).await
}

/// Dashboard KPIs and chart series
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Dashboard summary", body = DashboardSummary),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Dashboard",
    security(("bearer_auth" = []))
)]
pub async fn dashboard_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    cache: web::Data<QueryCache>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;

    let offset_minutes = config.report_utc_offset_minutes;
    let offset = offset_from_minutes(offset_minutes).ok_or_else(|| {
        error!(offset_minutes, "Report offset out of range");
        ApiError::Internal
    })?;

    let now = Utc::now();
    let today = local_date(now, offset);

    // one entry per reporting day; writes and logins invalidate it
    let key = CacheKey::new(Resource::Dashboard, today.to_string());
    let seen = cache.generation(Resource::Dashboard);
    if let Some(cached) = cache.get(&key).await {
        debug!("Serving dashboard from cache");
        return Ok(ApiResponse::ok(&*cached, "Dashboard fetched successfully"));
    }

    let today_range = day_range(now, offset);
    let since: DateTime<Utc> = window_start(today)
        .and_then(|day| offset.from_local_datetime(&day.and_time(NaiveTime::MIN)).single())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| {
            error!(%today, "Could not compute monthly window start");
            ApiError::Internal
        })?;

    debug!(%today, %since, start = %today_range.start, end = %today_range.end, "Building dashboard");

    let pool = pool.get_ref();

    let monthly = async {
        // months are taken in the reporting offset, not in UTC
        sqlx::query_as::<_, MonthlyCount>(
            r#"
            SELECT
                CAST(YEAR(DATE_ADD(created_at, INTERVAL ? MINUTE)) AS SIGNED) AS year,
                CAST(MONTH(DATE_ADD(created_at, INTERVAL ? MINUTE)) AS SIGNED) AS month,
                COUNT(*) AS total
            FROM student_registrations
            WHERE created_at >= ?
            GROUP BY year, month
            ORDER BY year, month
            "#,
        )
        .bind(offset_minutes)
        .bind(offset_minutes)
        .bind(since)
        .fetch_all(pool)
        .await
    };

    let logins_today = async {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM employee_login_details WHERE login_time >= ? AND login_time <= ?",
        )
        .bind(today_range.start)
        .bind(today_range.end)
        .fetch_one(pool)
        .await
    };

    let (
        total_students,
        pending_payments,
        approved_payments,
        invoices_generated,
        active_employees,
        logins_today,
        monthly,
        payment_status,
        masters,
    ) = futures::try_join!(
        count(pool, "SELECT COUNT(*) FROM student_registrations"),
        count_payments(pool, PaymentStatus::Pending),
        count_payments(pool, PaymentStatus::Approved),
        count(pool, "SELECT COUNT(*) FROM payments"),
        count(pool, "SELECT COUNT(*) FROM users WHERE is_active = TRUE"),
        logins_today,
        monthly,
        group_counts(
            pool,
            "SELECT status AS name, COUNT(*) AS value FROM payments GROUP BY status ORDER BY status",
        ),
        group_counts(
            pool,
            "SELECT abroad_masters AS name, COUNT(*) AS value FROM student_registrations \
             GROUP BY abroad_masters ORDER BY value DESC",
        ),
    )
    .map_err(|e| {
        error!(error = %e, "Failed to load dashboard");
        ApiError::Internal
    })?;

    let summary = DashboardSummary {
        kpis: Kpis {
            total_students,
            pending_payments,
            approved_payments,
            invoices_generated,
            active_employees,
            logins_today,
        },
        monthly_registrations: month_buckets(today, &monthly),
        payment_status: named_counts(payment_status),
        masters_distribution: named_counts(masters),
    };

    info!(user_id = auth.user_id, "Dashboard computed");

    let value = serde_json::to_value(&summary).map_err(|e| {
        error!(error = %e, "Failed to serialize dashboard");
        ApiError::Internal
    })?;
    let cached = cache.insert(key, value, seen).await;

    Ok(ApiResponse::ok(&*cached, "Dashboard fetched successfully"))
}
