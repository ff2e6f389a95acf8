//! Request payloads for resume create/edit and their validation rules.
//!
//! Section collections are optional on edit: `None` leaves the stored rows
//! untouched, `Some(rows)` replaces them (formset semantics).

use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidateUrl, ValidationError, ValidationErrors};

use crate::errors::{AppError, FieldError};

fn default_title() -> String {
    "My Resume".to_string()
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResumeInput {
    #[serde(default = "default_title")]
    #[validate(
        custom(function = "not_blank", message = "This field is required."),
        length(max = 200, message = "Ensure this value has at most 200 characters.")
    )]
    pub title: String,
    #[validate(
        custom(function = "not_blank", message = "This field is required."),
        length(max = 200, message = "Ensure this value has at most 200 characters.")
    )]
    pub full_name: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(
        custom(function = "not_blank", message = "This field is required."),
        length(max = 20, message = "Ensure this value has at most 20 characters.")
    )]
    pub phone: String,
    #[validate(custom(function = "not_blank", message = "This field is required."))]
    pub address: String,
    #[serde(default)]
    #[validate(custom(function = "http_url", message = "Enter a valid URL."))]
    pub linkedin_url: String,
    #[serde(default)]
    #[validate(custom(function = "http_url", message = "Enter a valid URL."))]
    pub github_url: String,
    #[serde(default)]
    #[validate(custom(function = "http_url", message = "Enter a valid URL."))]
    pub portfolio_url: String,
    #[validate(custom(function = "not_blank", message = "This field is required."))]
    pub skills: String,

    #[serde(default)]
    pub education: Option<Vec<EducationInput>>,
    #[serde(default)]
    pub work_experience: Option<Vec<WorkExperienceInput>>,
    #[serde(default)]
    pub extracurricular_activities: Option<Vec<ActivityInput>>,
    #[serde(default)]
    pub certifications: Option<Vec<CertificationInput>>,
    #[serde(default)]
    pub projects: Option<Vec<ProjectInput>>,
}

/// Fields every section row carries.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EntryMeta {
    /// Known row to update. Absent (or unknown to this resume) means insert.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Marks an existing row for removal.
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub order: i32,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_current: bool,
    #[serde(default)]
    pub description: String,
}

impl EntryMeta {
    /// End before start is only allowed while the entry is ongoing.
    fn date_range_error(&self) -> Option<FieldError> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if !self.is_current && end < start => Some(FieldError::new(
                "end_date",
                "End date cannot be before start date.",
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EducationInput {
    #[serde(flatten)]
    pub meta: EntryMeta,
    #[validate(
        custom(function = "not_blank", message = "This field is required."),
        length(max = 200, message = "Ensure this value has at most 200 characters.")
    )]
    pub institution: String,
    #[validate(
        custom(function = "not_blank", message = "This field is required."),
        length(max = 200, message = "Ensure this value has at most 200 characters.")
    )]
    pub degree: String,
    #[serde(default)]
    #[validate(length(max = 200, message = "Ensure this value has at most 200 characters."))]
    pub field_of_study: String,
    #[serde(default)]
    #[validate(length(max = 50, message = "Ensure this value has at most 50 characters."))]
    pub grade: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WorkExperienceInput {
    #[serde(flatten)]
    pub meta: EntryMeta,
    #[validate(
        custom(function = "not_blank", message = "This field is required."),
        length(max = 200, message = "Ensure this value has at most 200 characters.")
    )]
    pub company: String,
    #[validate(
        custom(function = "not_blank", message = "This field is required."),
        length(max = 200, message = "Ensure this value has at most 200 characters.")
    )]
    pub position: String,
    #[serde(default)]
    #[validate(length(max = 200, message = "Ensure this value has at most 200 characters."))]
    pub location: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ActivityInput {
    #[serde(flatten)]
    pub meta: EntryMeta,
    #[validate(
        custom(function = "not_blank", message = "This field is required."),
        length(max = 200, message = "Ensure this value has at most 200 characters.")
    )]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 200, message = "Ensure this value has at most 200 characters."))]
    pub organization: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CertificationInput {
    #[serde(flatten)]
    pub meta: EntryMeta,
    #[validate(
        custom(function = "not_blank", message = "This field is required."),
        length(max = 200, message = "Ensure this value has at most 200 characters.")
    )]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 200, message = "Ensure this value has at most 200 characters."))]
    pub issuer: String,
    #[serde(default)]
    #[validate(length(max = 200, message = "Ensure this value has at most 200 characters."))]
    pub credential_id: String,
    #[serde(default)]
    #[validate(custom(function = "http_url", message = "Enter a valid URL."))]
    pub credential_url: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProjectInput {
    #[serde(flatten)]
    pub meta: EntryMeta,
    #[validate(
        custom(function = "not_blank", message = "This field is required."),
        length(max = 200, message = "Ensure this value has at most 200 characters.")
    )]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 200, message = "Ensure this value has at most 200 characters."))]
    pub role: String,
    #[serde(default)]
    #[validate(custom(function = "http_url", message = "Enter a valid URL."))]
    pub url: String,
    #[serde(default)]
    pub technologies: String,
}

/// Section rows share the bookkeeping in [`EntryMeta`].
trait SectionInput: Validate {
    fn meta(&self) -> &EntryMeta;
}

macro_rules! section_input {
    ($($ty:ty),+) => {
        $(impl SectionInput for $ty {
            fn meta(&self) -> &EntryMeta {
                &self.meta
            }
        })+
    };
}

section_input!(EducationInput, WorkExperienceInput, ActivityInput, CertificationInput, ProjectInput);

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required").with_message("This field is required.".into()));
    }
    Ok(())
}

/// Empty is allowed; anything else must parse as an http(s) URL.
fn http_url(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }
    let is_http = value.starts_with("https://") || value.starts_with("http://");
    if is_http && value.validate_url() {
        Ok(())
    } else {
        Err(ValidationError::new("url").with_message("Enter a valid URL.".into()))
    }
}

/// Appends `errors` as `FieldError`s under `prefix`, sorted by field name.
fn collect(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    for (field, field_errors) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        for error in field_errors.iter() {
            let message = error
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "Validation failed".to_string());
            out.push(FieldError::new(path.clone(), message));
        }
    }
}

/// Validates every row not marked for deletion.
fn collect_section<T: SectionInput>(section: &str, rows: &Option<Vec<T>>, out: &mut Vec<FieldError>) {
    for (i, row) in rows.iter().flatten().enumerate() {
        let meta = row.meta();
        if meta.delete {
            continue;
        }
        let prefix = format!("{section}[{i}]");
        if let Err(errors) = meta.validate() {
            collect(&prefix, &errors, out);
        }
        if let Some(error) = meta.date_range_error() {
            out.push(FieldError::new(format!("{prefix}.{}", error.field), error.message));
        }
        if let Err(errors) = row.validate() {
            collect(&prefix, &errors, out);
        }
    }
}

impl ResumeInput {
    /// Runs every rule and reports all failing fields at once.
    pub fn validate_form(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();

        if let Err(e) = self.validate() {
            collect("", &e, &mut errors);
        }
        collect_section("education", &self.education, &mut errors);
        collect_section("work_experience", &self.work_experience, &mut errors);
        collect_section(
            "extracurricular_activities",
            &self.extracurricular_activities,
            &mut errors,
        );
        collect_section("certifications", &self.certifications, &mut errors);
        collect_section("projects", &self.projects, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::InvalidForm(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> serde_json::Value {
        json!({
            "full_name": "Jane Doe",
            "email": "jane@example.com",
            "phone": "+1 555 0100",
            "address": "1 Main Street",
            "skills": "Python, SQL, Go",
            "github_url": "https://github.com/janedoe",
            "education": [
                { "institution": "MIT", "degree": "BSc", "start_date": "2015-09-01", "end_date": "2019-06-01" }
            ]
        })
    }

    fn parse(value: serde_json::Value) -> ResumeInput {
        serde_json::from_value(value).unwrap()
    }

    fn field_errors(input: &ResumeInput) -> Vec<String> {
        match input.validate_form() {
            Ok(()) => vec![],
            Err(AppError::InvalidForm(errors)) => errors.into_iter().map(|e| e.field).collect(),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_valid_payload_passes_and_applies_defaults() {
        let input = parse(valid());
        assert!(input.validate_form().is_ok());
        assert_eq!(input.title, "My Resume");
        assert!(input.work_experience.is_none());

        let education = input.education.unwrap();
        assert_eq!(education[0].meta.order, 0);
        assert_eq!(education[0].meta.id, None);
        assert!(!education[0].meta.delete);
    }

    #[test]
    fn test_required_personal_fields() {
        let mut value = valid();
        value["full_name"] = json!("  ");
        value["address"] = json!("");
        let errors = field_errors(&parse(value));
        assert_eq!(errors, vec!["address", "full_name"]);
    }

    #[test]
    fn test_email_and_url_shapes() {
        let mut value = valid();
        value["email"] = json!("jane.example.com");
        value["linkedin_url"] = json!("linkedin.com/in/jane");
        value["portfolio_url"] = json!("ftp://jane.dev");
        let errors = field_errors(&parse(value));
        assert_eq!(errors, vec!["email", "linkedin_url", "portfolio_url"]);
    }

    #[test]
    fn test_malformed_email_domains_are_rejected() {
        for email in ["a@b..c", "jane@", "@example.com", "jane doe@example.com"] {
            let mut value = valid();
            value["email"] = json!(email);
            assert_eq!(field_errors(&parse(value)), vec!["email"], "{email}");
        }
    }

    #[test]
    fn test_error_messages_come_through() {
        let mut value = valid();
        value["phone"] = json!("");
        value["github_url"] = json!("github.com/jane");
        let Err(AppError::InvalidForm(errors)) = parse(value).validate_form() else {
            panic!("expected form errors");
        };
        assert_eq!(errors[0], FieldError::new("github_url", "Enter a valid URL."));
        assert_eq!(errors[1], FieldError::new("phone", "This field is required."));
    }

    #[test]
    fn test_length_limits() {
        let mut value = valid();
        value["phone"] = json!("0".repeat(21));
        value["full_name"] = json!("x".repeat(201));
        let errors = field_errors(&parse(value));
        assert_eq!(errors, vec!["full_name", "phone"]);
    }

    #[test]
    fn test_section_rows_are_validated_with_indexed_paths() {
        let mut value = valid();
        value["education"] = json!([
            { "institution": "MIT", "degree": "BSc" },
            { "institution": "", "degree": "MSc", "order": -1 }
        ]);
        value["work_experience"] = json!([
            { "company": "Acme", "position": "", "start_date": "2020-01-01", "end_date": "2019-01-01" }
        ]);
        let errors = field_errors(&parse(value));
        assert_eq!(
            errors,
            vec![
                "education[1].order",
                "education[1].institution",
                "work_experience[0].end_date",
                "work_experience[0].position",
            ]
        );
    }

    #[test]
    fn test_current_entry_ignores_end_date_order() {
        let mut value = valid();
        value["work_experience"] = json!([
            { "company": "Acme", "position": "Engineer", "start_date": "2020-01-01",
              "end_date": "2019-01-01", "is_current": true }
        ]);
        assert!(parse(value).validate_form().is_ok());
    }

    #[test]
    fn test_rows_marked_for_deletion_are_not_validated() {
        let mut value = valid();
        value["projects"] = json!([
            { "id": "7d1c1f7e-8f4b-4a53-9a43-3a3f0c8b5e10", "name": "", "delete": true }
        ]);
        assert!(parse(value).validate_form().is_ok());
    }

    #[test]
    fn test_invalid_form_is_unprocessable() {
        use axum::response::IntoResponse;
        let mut value = valid();
        value["skills"] = json!("");
        let err = parse(value).validate_form().unwrap_err();
        assert_eq!(
            err.into_response().status(),
            axum::http::StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
