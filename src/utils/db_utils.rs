use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use sqlx::MySqlPool;

use crate::error::{ApiError, FieldErrors};
use crate::model::student_registration::RegistrationStatus;

/// How a JSON value is checked and converted before it is bound to a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    RequiredText,
    Date,
    Number,
    RegistrationStatus,
}

/// Maps a client-facing (camelCase) field to its column.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub field: &'static str,
    pub column: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn new(field: &'static str, column: &'static str, kind: ColumnKind) -> Self {
        Self { field, column, kind }
    }
}

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    F64(f64),
    DateTime(DateTime<Utc>),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Accepts `YYYY-MM-DD` (date input), RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS`.
pub fn parse_date_input(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc())
}

/// `%term%` with LIKE wildcards in the term escaped.
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn convert(column: &Column, value: &Value) -> Result<SqlValue, String> {
    match (column.kind, value) {
        (ColumnKind::Text, Value::String(s)) => Ok(SqlValue::String(s.clone())),
        (ColumnKind::Text, Value::Null) => Ok(SqlValue::Null),
        (ColumnKind::Text, _) => Err("must be a string".to_string()),

        (ColumnKind::RequiredText, Value::String(s)) if !s.trim().is_empty() => {
            Ok(SqlValue::String(s.clone()))
        }
        (ColumnKind::RequiredText, _) => Err("is required".to_string()),

        (ColumnKind::Date, Value::Null) => Ok(SqlValue::Null),
        (ColumnKind::Date, Value::String(s)) if s.trim().is_empty() => Ok(SqlValue::Null),
        (ColumnKind::Date, Value::String(s)) => parse_date_input(s)
            .map(SqlValue::DateTime)
            .ok_or_else(|| "expected a date in YYYY-MM-DD format".to_string()),
        (ColumnKind::Date, _) => Err("expected a date in YYYY-MM-DD format".to_string()),

        (ColumnKind::Number, Value::Null) => Ok(SqlValue::Null),
        (ColumnKind::Number, Value::Number(n)) => n
            .as_f64()
            .map(SqlValue::F64)
            .ok_or_else(|| "must be a number".to_string()),
        // form inputs post numbers as strings
        (ColumnKind::Number, Value::String(s)) if s.trim().is_empty() => Ok(SqlValue::Null),
        (ColumnKind::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(SqlValue::F64)
            .map_err(|_| "must be a number".to_string()),
        (ColumnKind::Number, _) => Err("must be a number".to_string()),

        (ColumnKind::RegistrationStatus, Value::String(s)) => s
            .parse::<RegistrationStatus>()
            .map(|status| SqlValue::String(status.as_ref().to_string()))
            .map_err(|_| "must be one of Confirmed, Rejected, Hold".to_string()),
        (ColumnKind::RegistrationStatus, _) => {
            Err("must be one of Confirmed, Rejected, Hold".to_string())
        }
    }
}

/// Drops server-owned fields from a client payload.
pub fn strip_fields(payload: &mut Map<String, Value>, fields: &[&str]) {
    for field in fields {
        payload.remove(*field);
    }
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
///
/// Only whitelisted columns are written; `immutable` fields are silently
/// ignored, so their persisted values survive the update.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    immutable: &[&str],
    columns: &[Column],
    id_column: &str,
    id_value: &str,
) -> Result<SqlUpdate, ApiError> {
    let mut obj = payload
        .as_object()
        .cloned()
        .ok_or_else(|| ApiError::BadRequest("Payload must be a JSON object".to_string()))?;

    strip_fields(&mut obj, immutable);

    if obj.is_empty() {
        return Err(ApiError::BadRequest("No fields provided for update".to_string()));
    }

    let mut assignments = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);
    let mut errors = FieldErrors::new();

    for (key, value) in &obj {
        let column = columns
            .iter()
            .find(|c| c.field == key)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown field: {key}")))?;

        match convert(column, value) {
            Ok(v) => {
                assignments.push(format!("{} = ?", column.column));
                values.push(v);
            }
            Err(msg) => {
                errors.insert(column.field, format!("{} {}", column.field, msg));
            }
        }
    }

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        assignments.join(", "),
        id_column
    );

    // WHERE id = ?
    values.push(SqlValue::String(id_value.to_string()));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::student_registration::{EDITABLE_COLUMNS, IMMUTABLE_FIELDS, TABLE};
    use chrono::TimeZone;
    use serde_json::json;

    fn build(payload: Value) -> Result<SqlUpdate, ApiError> {
        build_update_sql(
            TABLE,
            &payload,
            IMMUTABLE_FIELDS,
            EDITABLE_COLUMNS,
            "id",
            "abc",
        )
    }

    #[test]
    fn immutable_fields_never_reach_the_statement() {
        let update = build(json!({
            "id": "other",
            "stid": "STU-0000-000000",
            "createdAt": "2020-01-01T00:00:00Z",
            "updatedAt": "2020-01-01T00:00:00Z",
            "studentName": "Asha"
        }))
        .unwrap();

        assert_eq!(
            update.sql,
            "UPDATE student_registrations SET student_name = ? WHERE id = ?"
        );
        assert_eq!(
            update.values,
            vec![
                SqlValue::String("Asha".into()),
                SqlValue::String("abc".into())
            ]
        );
    }

    #[test]
    fn payload_of_only_immutable_fields_is_rejected() {
        let err = build(json!({"id": "x", "stid": "y"})).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(msg) if msg == "No fields provided for update"));
    }

    #[test]
    fn unknown_field_is_a_client_fault() {
        let err = build(json!({"student_name; DROP TABLE x": "1"})).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn values_are_converted_per_column_kind() {
        let update = build(json!({
            "dateOfBirth": "2002-05-14",
            "registrationDate": "",
            "serviceCharge": "25000.50",
            "status": "Rejected"
        }))
        .unwrap();

        assert_eq!(
            update.values,
            vec![
                SqlValue::DateTime(Utc.with_ymd_and_hms(2002, 5, 14, 0, 0, 0).unwrap()),
                SqlValue::Null,
                SqlValue::F64(25000.5),
                SqlValue::String("Rejected".into()),
                SqlValue::String("abc".into()),
            ]
        );
    }

    #[test]
    fn invalid_values_are_reported_per_field() {
        let err = build(json!({
            "status": "Pending",
            "studentName": "",
            "serviceCharge": true
        }))
        .unwrap_err();

        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 3);
        assert!(errors.contains_key("status"));
        assert!(errors.contains_key("studentName"));
        assert!(errors.contains_key("serviceCharge"));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(matches!(build(json!([1, 2])), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn date_input_accepts_rfc3339_and_plain_dates() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap();
        assert_eq!(parse_date_input("2024-03-02T00:00:00+05:30"), Some(expected));
        assert_eq!(parse_date_input("2024-03-01T18:30:00"), Some(expected));
        assert!(parse_date_input("01/03/2024").is_none());
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
