use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::FieldErrors;
use crate::model::payment::Payment;
use crate::utils::db_utils::{Column, ColumnKind, parse_date_input};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display, AsRefStr,
)]
pub enum RegistrationStatus {
    Confirmed,
    Rejected,
    Hold,
}

impl TryFrom<String> for RegistrationStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentRegistration {
    #[schema(example = "5f1c7c1e-3a7e-4a53-9d34-0d6f2d7c2a10")]
    pub id: String,
    #[schema(example = "STU-2410-3FA2C1")]
    pub stid: String,

    // personal info
    #[schema(example = "Ravi Kumar")]
    pub student_name: String,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub date_of_birth: Option<DateTime<Utc>>,
    #[schema(example = "9876543210")]
    pub mobile_number: String,
    pub email: Option<String>,
    pub parent_mobile: Option<String>,
    pub fathers_name: Option<String>,
    pub nationality: Option<String>,
    pub gender: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub registration_date: Option<DateTime<Utc>>,

    // address
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub pincode: Option<String>,

    // course details
    #[schema(example = "ABROADMASTERS-USA")]
    pub abroad_masters: String,
    pub course_name: Option<String>,
    pub passport_number: Option<String>,
    pub service_charge: Option<f64>,
    #[schema(example = "FALL-2025")]
    pub academic_year: Option<String>,
    pub office_city: Option<String>,
    #[schema(example = "TEAM-1")]
    pub processed_by: Option<String>,
    pub counselor_name: Option<String>,
    pub assignee_name: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: RegistrationStatus,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

pub const TABLE: &str = "student_registrations";

pub const SELECT_COLUMNS: &str = "id, stid, student_name, date_of_birth, mobile_number, email, \
    parent_mobile, fathers_name, nationality, gender, registration_date, address_line1, \
    address_line2, country, state, city, district, pincode, abroad_masters, course_name, \
    passport_number, service_charge, academic_year, office_city, processed_by, counselor_name, \
    assignee_name, status, created_at, updated_at";

/// Fields the server owns; never taken from a client payload.
pub const IMMUTABLE_FIELDS: &[&str] = &["id", "stid", "createdAt", "updatedAt"];

/// Client-editable fields and the columns they write.
pub const EDITABLE_COLUMNS: &[Column] = &[
    Column::new("studentName", "student_name", ColumnKind::RequiredText),
    Column::new("dateOfBirth", "date_of_birth", ColumnKind::Date),
    Column::new("mobileNumber", "mobile_number", ColumnKind::RequiredText),
    Column::new("email", "email", ColumnKind::Text),
    Column::new("parentMobile", "parent_mobile", ColumnKind::Text),
    Column::new("fathersName", "fathers_name", ColumnKind::Text),
    Column::new("nationality", "nationality", ColumnKind::Text),
    Column::new("gender", "gender", ColumnKind::Text),
    Column::new("registrationDate", "registration_date", ColumnKind::Date),
    Column::new("addressLine1", "address_line1", ColumnKind::Text),
    Column::new("addressLine2", "address_line2", ColumnKind::Text),
    Column::new("country", "country", ColumnKind::Text),
    Column::new("state", "state", ColumnKind::Text),
    Column::new("city", "city", ColumnKind::Text),
    Column::new("district", "district", ColumnKind::Text),
    Column::new("pincode", "pincode", ColumnKind::Text),
    Column::new("abroadMasters", "abroad_masters", ColumnKind::RequiredText),
    Column::new("courseName", "course_name", ColumnKind::Text),
    Column::new("passportNumber", "passport_number", ColumnKind::Text),
    Column::new("serviceCharge", "service_charge", ColumnKind::Number),
    Column::new("academicYear", "academic_year", ColumnKind::Text),
    Column::new("officeCity", "office_city", ColumnKind::Text),
    Column::new("processedBy", "processed_by", ColumnKind::Text),
    Column::new("counselorName", "counselor_name", ColumnKind::Text),
    Column::new("assigneeName", "assignee_name", ColumnKind::Text),
    Column::new("status", "status", ColumnKind::RegistrationStatus),
];

/// A registration together with its payments, as returned by `GET /{id}`.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDetail {
    #[serde(flatten)]
    pub registration: StudentRegistration,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRegistration {
    #[schema(example = "Ravi Kumar")]
    pub student_name: String,
    #[schema(example = "2002-05-14")]
    pub date_of_birth: Option<String>,
    #[schema(example = "9876543210")]
    pub mobile_number: String,
    pub email: Option<String>,
    pub parent_mobile: Option<String>,
    pub fathers_name: Option<String>,
    pub nationality: Option<String>,
    pub gender: Option<String>,
    #[schema(example = "2025-01-10")]
    pub registration_date: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub pincode: Option<String>,
    #[schema(example = "ABROADMASTERS-USA")]
    pub abroad_masters: String,
    pub course_name: Option<String>,
    pub passport_number: Option<String>,
    pub service_charge: Option<f64>,
    pub academic_year: Option<String>,
    pub office_city: Option<String>,
    pub processed_by: Option<String>,
    pub counselor_name: Option<String>,
    pub assignee_name: Option<String>,
    pub status: Option<RegistrationStatus>,
}

/// Create payload after validation, with parsed dates.
#[derive(Debug)]
pub struct NewRegistration {
    pub payload: CreateRegistration,
    pub date_of_birth: Option<DateTime<Utc>>,
    pub registration_date: Option<DateTime<Utc>>,
    pub status: RegistrationStatus,
}

impl CreateRegistration {
    pub fn validate(self) -> Result<NewRegistration, FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.student_name.trim().is_empty() {
            errors.insert("studentName", "Student name is required".to_string());
        }
        if self.mobile_number.trim().is_empty() {
            errors.insert("mobileNumber", "Mobile number is required".to_string());
        }
        if self.abroad_masters.trim().is_empty() {
            errors.insert("abroadMasters", "Masters destination is required".to_string());
        }

        let date_of_birth = optional_date(self.date_of_birth.as_deref(), "dateOfBirth", &mut errors);
        let registration_date =
            optional_date(self.registration_date.as_deref(), "registrationDate", &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        let status = self.status.unwrap_or(RegistrationStatus::Hold);
        Ok(NewRegistration {
            payload: self,
            date_of_birth,
            registration_date,
            status,
        })
    }
}

fn optional_date(
    raw: Option<&str>,
    field: &'static str,
    errors: &mut FieldErrors,
) -> Option<DateTime<Utc>> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match parse_date_input(raw) {
        Some(d) => Some(d),
        None => {
            errors.insert(field, "Expected a date in YYYY-MM-DD format".to_string());
            None
        }
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Human-readable student id: `STU-<yymm>-<6 hex>`.
pub fn new_stid(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("STU-{}-{}", now.format("%y%m"), suffix[..6].to_uppercase())
}

/// `YYYY-MM-DD` slice suitable for a native date input; empty when absent.
pub fn form_date(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Registration rendered for the edit form: same fields, dates normalised.
pub fn form_view(registration: &StudentRegistration) -> Result<Value, serde_json::Error> {
    let mut view = serde_json::to_value(registration)?;
    if let Value::Object(fields) = &mut view {
        fields.insert(
            "dateOfBirth".to_string(),
            Value::String(form_date(registration.date_of_birth)),
        );
        fields.insert(
            "registrationDate".to_string(),
            Value::String(form_date(registration.registration_date)),
        );
    }
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> StudentRegistration {
        let created = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        StudentRegistration {
            id: "5f1c7c1e-3a7e-4a53-9d34-0d6f2d7c2a10".into(),
            stid: "STU-2501-ABCDEF".into(),
            student_name: "Ravi Kumar".into(),
            date_of_birth: Some(Utc.with_ymd_and_hms(2002, 5, 14, 0, 0, 0).unwrap()),
            mobile_number: "9876543210".into(),
            email: Some("ravi@example.com".into()),
            parent_mobile: None,
            fathers_name: None,
            nationality: Some("Indian".into()),
            gender: None,
            registration_date: None,
            address_line1: None,
            address_line2: None,
            country: None,
            state: None,
            city: None,
            district: None,
            pincode: None,
            abroad_masters: "ABROADMASTERS-USA".into(),
            course_name: None,
            passport_number: None,
            service_charge: Some(25000.0),
            academic_year: Some("FALL-2025".into()),
            office_city: None,
            processed_by: Some("TEAM-1".into()),
            counselor_name: None,
            assignee_name: None,
            status: RegistrationStatus::Confirmed,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn form_view_slices_dates_and_blanks_missing_ones() {
        let view = form_view(&sample()).unwrap();

        assert_eq!(view["dateOfBirth"], "2002-05-14");
        assert_eq!(view["registrationDate"], "");
        assert_eq!(view["studentName"], "Ravi Kumar");
        assert_eq!(view["status"], "Confirmed");
    }

    #[test]
    fn status_parses_from_column_text() {
        assert_eq!(
            RegistrationStatus::try_from("Hold".to_string()).unwrap(),
            RegistrationStatus::Hold
        );
        assert!(RegistrationStatus::try_from("hold?".to_string()).is_err());
    }

    #[test]
    fn stid_carries_year_month_prefix() {
        let now = Utc.with_ymd_and_hms(2024, 10, 3, 0, 0, 0).unwrap();
        let stid = new_stid(now);

        assert!(stid.starts_with("STU-2410-"));
        assert_eq!(stid.len(), "STU-2410-".len() + 6);
    }

    #[test]
    fn create_payload_requires_name_mobile_and_destination() {
        let payload: CreateRegistration = serde_json::from_value(serde_json::json!({
            "studentName": " ",
            "mobileNumber": "",
            "abroadMasters": "",
            "dateOfBirth": "14/05/2002"
        }))
        .unwrap();

        let errors = payload.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains_key("dateOfBirth"));
    }

    #[test]
    fn create_payload_defaults_status_to_hold() {
        let payload: CreateRegistration = serde_json::from_value(serde_json::json!({
            "studentName": "Asha",
            "mobileNumber": "9000000000",
            "abroadMasters": "ABROADMASTERS-UK",
            "registrationDate": "2025-02-01"
        }))
        .unwrap();

        let new = payload.validate().unwrap();
        assert_eq!(new.status, RegistrationStatus::Hold);
        assert_eq!(form_date(new.registration_date), "2025-02-01");
    }
}
