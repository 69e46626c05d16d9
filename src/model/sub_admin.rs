use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::error::{FieldErrors, collect_field_errors};

pub const MOBILE_DIGITS: usize = 10;

/// Whether the draft creates an account or edits an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Add,
    Edit,
}

/// Sub-admin account draft as posted by the management modal.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SubAdminForm {
    #[schema(example = "Priya Sharma")]
    pub staff_name: String,
    #[schema(example = "9876543210")]
    pub mobile: String,
    #[schema(example = "priya@example.com")]
    pub email: String,
    #[schema(example = "s3cret-pass")]
    pub password: String,
    #[schema(example = "HYD")]
    pub branch_code: String,
}

/// A draft that passed validation. `password` is `None` when an edit keeps
/// the current one.
#[derive(Debug)]
pub struct ValidSubAdmin {
    pub staff_name: String,
    pub mobile: String,
    pub email: String,
    pub password: Option<String>,
    pub branch_code: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BranchOption {
    #[schema(example = "HYD")]
    pub code: String,
    #[schema(example = "HYD")]
    pub label: String,
}

/// Keeps digits only and truncates to ten of them.
pub fn sanitize_mobile(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_digit)
        .take(MOBILE_DIGITS)
        .collect()
}

/// Normalised draft fields with their shape rules.
#[derive(Debug, Validate)]
struct Draft {
    #[validate(length(min = 1, message = "Staff name is required"))]
    staff_name: String,
    #[validate(
        length(min = 1, message = "Mobile number is required"),
        custom(function = "ten_digits", message = "Mobile number must be 10 digits")
    )]
    mobile: String,
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Enter a valid email")
    )]
    email: String,
    #[validate(length(min = 1, message = "Office branch is required"))]
    branch_code: String,
}

/// Draft field to the name the client posted it under.
const DRAFT_FIELDS: &[(&str, &str)] = &[
    ("staff_name", "staffName"),
    ("mobile", "mobile"),
    ("email", "email"),
    ("branch_code", "branchCode"),
];

fn ten_digits(mobile: &str) -> Result<(), ValidationError> {
    if mobile.len() == MOBILE_DIGITS {
        Ok(())
    } else {
        Err(ValidationError::new("mobile_digits"))
    }
}

impl SubAdminForm {
    pub fn validate(
        self,
        mode: FormMode,
        branch_codes: &[String],
    ) -> Result<ValidSubAdmin, FieldErrors> {
        let draft = Draft {
            staff_name: self.staff_name.trim().to_string(),
            mobile: sanitize_mobile(&self.mobile),
            email: self.email.trim().to_lowercase(),
            branch_code: self.branch_code.trim().to_uppercase(),
        };

        let mut errors = match draft.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => collect_field_errors(&e, DRAFT_FIELDS),
        };

        let password = match (mode, self.password.is_empty()) {
            (FormMode::Add, true) => {
                errors.insert("password", "Password is required".to_string());
                None
            }
            (FormMode::Edit, true) => None,
            (_, false) => Some(self.password),
        };

        if !draft.branch_code.is_empty() && !branch_codes.iter().any(|b| *b == draft.branch_code) {
            errors.insert("branchCode", "Unknown office branch".to_string());
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ValidSubAdmin {
            staff_name: draft.staff_name,
            mobile: draft.mobile,
            email: draft.email,
            password,
            branch_code: draft.branch_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branches() -> Vec<String> {
        vec!["HYD".to_string(), "BLR".to_string()]
    }

    fn draft() -> SubAdminForm {
        SubAdminForm {
            staff_name: "Priya Sharma".into(),
            mobile: "98765 43210".into(),
            email: "Priya@Example.com".into(),
            password: "s3cret".into(),
            branch_code: "hyd".into(),
        }
    }

    #[test]
    fn mobile_keeps_digits_and_truncates() {
        assert_eq!(sanitize_mobile("98-76-543-210x"), "9876543210");
        assert_eq!(sanitize_mobile("+91 98765 43210"), "9198765432");
        assert_eq!(sanitize_mobile("abc"), "");
    }

    #[test]
    fn valid_draft_is_normalised() {
        let valid = draft().validate(FormMode::Add, &branches()).unwrap();

        assert_eq!(valid.mobile, "9876543210");
        assert_eq!(valid.email, "priya@example.com");
        assert_eq!(valid.branch_code, "HYD");
        assert_eq!(valid.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn password_required_only_when_adding() {
        let mut form = draft();
        form.password.clear();
        let errors = form.validate(FormMode::Add, &branches()).unwrap_err();
        assert_eq!(errors.get("password").map(String::as_str), Some("Password is required"));

        let mut form = draft();
        form.password.clear();
        let valid = form.validate(FormMode::Edit, &branches()).unwrap();
        assert!(valid.password.is_none());
    }

    #[test]
    fn every_missing_field_is_reported() {
        let errors = SubAdminForm::default()
            .validate(FormMode::Add, &branches())
            .unwrap_err();

        let fields: Vec<_> = errors.keys().copied().collect();
        assert_eq!(fields, vec!["branchCode", "email", "mobile", "password", "staffName"]);
    }

    #[test]
    fn short_mobile_bad_email_and_unknown_branch_are_rejected() {
        let form = SubAdminForm {
            mobile: "12345".into(),
            email: "priya.example.com".into(),
            branch_code: "MUM".into(),
            ..draft()
        };

        let errors = form.validate(FormMode::Edit, &branches()).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors["mobile"], "Mobile number must be 10 digits");
        assert_eq!(errors["email"], "Enter a valid email");
        assert_eq!(errors["branchCode"], "Unknown office branch");
    }

    #[test]
    fn blank_email_is_missing_rather_than_malformed() {
        let form = SubAdminForm {
            email: "   ".into(),
            ..draft()
        };

        let errors = form.validate(FormMode::Add, &branches()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["email"], "Email is required");
    }

    #[test]
    fn email_needs_a_single_at_sign() {
        for email in ["priya@@example.com", "@example.com", "priya@"] {
            let form = SubAdminForm {
                email: email.into(),
                ..draft()
            };
            let errors = form.validate(FormMode::Edit, &branches()).unwrap_err();
            assert_eq!(errors["email"], "Enter a valid email", "{email}");
        }
    }
}
