use crate::api::student_registration::{RegistrationPage, RegistrationQuery};
use crate::dashboard::buckets::MonthBucket;
use crate::dashboard::{DashboardSummary, Kpis, NamedCount};
use crate::model::payment::{Payment, PaymentStatus};
use crate::model::student_registration::{
    CreateRegistration, RegistrationDetail, RegistrationStatus, StudentRegistration,
};
use crate::model::sub_admin::{BranchOption, SubAdminForm};
use crate::model::user::SubAdmin;
use crate::models::LoginReqDto;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

/// Registers the `bearer_auth` scheme referenced by protected paths.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Registration Desk API",
        version = "1.0.0",
        description = r#"
## Student Registration Back Office

Back-office API for a study-abroad consultancy: student registrations,
their payments, staff accounts and a KPI dashboard.

### 🔹 Key Features
- **Student Registration**
  - Create, edit, delete and view registrations with their payments
  - Filter by destination, team, academic year, status, date range and free text
  - Export the filtered list as CSV
- **Sub Admins**
  - Manage branch staff accounts (admin only)
- **Dashboard**
  - Totals, payment status, masters destinations, last six months and logins today

### 🔐 Security
All `/api` endpoints need a **JWT Bearer** access token from `/auth/login`.

### 📦 Response Format
- Success: `{statusCode, data, message}`
- Error: `{statusCode, message}`, plus `errors` for field validation

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::student_registration::list_registrations,
        crate::api::student_registration::create_registration,
        crate::api::student_registration::get_registration,
        crate::api::student_registration::get_registration_form,
        crate::api::student_registration::update_registration,
        crate::api::student_registration::delete_registration,
        crate::api::student_registration::export_registrations,

        crate::api::sub_admin::list_sub_admins,
        crate::api::sub_admin::create_sub_admin,
        crate::api::sub_admin::get_sub_admin,
        crate::api::sub_admin::update_sub_admin,
        crate::api::sub_admin::delete_sub_admin,
        crate::api::sub_admin::list_branches,

        crate::api::dashboard::dashboard_summary
    ),
    components(
        schemas(
            LoginReqDto,
            StudentRegistration,
            RegistrationStatus,
            RegistrationDetail,
            RegistrationPage,
            RegistrationQuery,
            CreateRegistration,
            Payment,
            PaymentStatus,
            SubAdmin,
            SubAdminForm,
            BranchOption,
            DashboardSummary,
            Kpis,
            MonthBucket,
            NamedCount
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and token rotation"),
        (name = "Student Registration", description = "Student registration APIs"),
        (name = "Sub Admin", description = "Branch staff account APIs"),
        (name = "Dashboard", description = "KPI and chart APIs"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_protected_path_is_documented() {
        let doc = ApiDoc::openapi();

        for path in [
            "/api/student-registration",
            "/api/student-registration/{id}",
            "/api/student-registration/{id}/form",
            "/api/student-registration/export",
            "/api/sub-admin/branches",
            "/api/dashboard",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
