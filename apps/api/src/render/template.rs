//! Template Renderer: fills a named Handlebars template with a resume aggregate.
//!
//! The registry runs in strict mode: a template that references a field the
//! context does not carry fails with [`TemplateError::MissingField`] instead of
//! silently rendering an empty string.

use std::path::Path;

use chrono::NaiveDate;
use handlebars::{Handlebars, RenderErrorReason};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::models::resume::{
    ActivityRow, CertificationRow, EducationRow, ProjectRow, ResumeAggregate, SectionEntry,
    WorkExperienceRow,
};

/// Template used for PDF export.
pub const PDF_TEMPLATE: &str = "resumes/pdf";
/// Template used for the in-browser preview.
pub const PREVIEW_TEMPLATE: &str = "resumes/preview";

const BODY_PARTIAL: &str = "resume_body";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    #[error("template requires missing field '{0}'")]
    MissingField(String),

    #[error("template rendering failed: {0}")]
    Render(String),

    #[error("template '{name}' is invalid: {reason}")]
    Invalid { name: String, reason: String },

    #[error("failed to read template directory: {0}")]
    Io(#[from] std::io::Error),
}

pub struct TemplateRenderer {
    registry: Handlebars<'static>,
}

impl TemplateRenderer {
    /// Registers the built-in templates, then any `*.hbs` file under
    /// `template_dir` (which may override a built-in of the same name).
    pub fn new(template_dir: Option<&Path>) -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);

        let mut renderer = Self { registry };
        renderer.register_partial(BODY_PARTIAL, include_str!("../../templates/resume_body.hbs"))?;
        renderer.register(PDF_TEMPLATE, include_str!("../../templates/resumes/pdf.hbs"))?;
        renderer.register(
            PREVIEW_TEMPLATE,
            include_str!("../../templates/resumes/preview.hbs"),
        )?;

        if let Some(dir) = template_dir {
            let loaded = renderer.register_directory(dir)?;
            info!("Registered {loaded} template(s) from {}", dir.display());
        }

        Ok(renderer)
    }

    pub fn register(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        self.registry
            .register_template_string(name, source)
            .map_err(|e| TemplateError::Invalid {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }

    fn register_partial(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        self.registry
            .register_partial(name, source)
            .map_err(|e| TemplateError::Invalid {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }

    fn register_directory(&mut self, root: &Path) -> Result<usize, TemplateError> {
        let mut pending = vec![root.to_path_buf()];
        let mut count = 0;

        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.extension().and_then(|e| e.to_str()) != Some("hbs") {
                    continue;
                }
                let Ok(relative) = path.with_extension("").strip_prefix(root).map(Path::to_path_buf)
                else {
                    continue;
                };
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let source = std::fs::read_to_string(&path)?;
                if name == BODY_PARTIAL {
                    self.register_partial(&name, &source)?;
                } else {
                    self.register(&name, &source)?;
                }
                count += 1;
            }
        }

        Ok(count)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.registry.has_template(name)
    }

    /// Renders `name` with the aggregate's fields. Pure: same aggregate, same output.
    pub fn render(&self, name: &str, aggregate: &ResumeAggregate) -> Result<String, TemplateError> {
        if !self.has_template(name) {
            return Err(TemplateError::UnknownTemplate(name.to_string()));
        }
        let context = build_context(aggregate);
        self.registry
            .render(name, &context)
            .map_err(|e| match e.reason() {
                RenderErrorReason::MissingVariable(path) => {
                    TemplateError::MissingField(path.clone().unwrap_or_default())
                }
                _ => TemplateError::Render(e.to_string()),
            })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Template context
// ────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ResumeView<'a> {
    title: &'a str,
    full_name: &'a str,
    email: &'a str,
    phone: &'a str,
    address: &'a str,
    linkedin_url: &'a str,
    github_url: &'a str,
    portfolio_url: &'a str,
    skills: &'a str,
    skills_list: Vec<String>,
}

/// A section row plus its preformatted date range.
#[derive(Serialize)]
struct EntryView<'a, T: Serialize> {
    #[serde(flatten)]
    row: &'a T,
    date_range: String,
}

#[derive(Serialize)]
struct Context<'a> {
    resume: ResumeView<'a>,
    education: Vec<EntryView<'a, EducationRow>>,
    work_experience: Vec<EntryView<'a, WorkExperienceRow>>,
    extracurricular_activities: Vec<EntryView<'a, ActivityRow>>,
    certifications: Vec<EntryView<'a, CertificationRow>>,
    projects: Vec<EntryView<'a, ProjectRow>>,
}

fn entries<T: Serialize + SectionEntry>(rows: &[T]) -> Vec<EntryView<'_, T>> {
    rows.iter()
        .map(|row| EntryView {
            row,
            date_range: format_date_range(row),
        })
        .collect()
}

fn build_context(aggregate: &ResumeAggregate) -> Value {
    let r = &aggregate.resume;
    let context = Context {
        resume: ResumeView {
            title: &r.title,
            full_name: &r.full_name,
            email: &r.email,
            phone: &r.phone,
            address: &r.address,
            linkedin_url: &r.linkedin_url,
            github_url: &r.github_url,
            portfolio_url: &r.portfolio_url,
            skills: &r.skills,
            skills_list: r.skills_list(),
        },
        education: entries(&aggregate.education),
        work_experience: entries(&aggregate.work_experience),
        extracurricular_activities: entries(&aggregate.extracurricular_activities),
        certifications: entries(&aggregate.certifications),
        projects: entries(&aggregate.projects),
    };
    // Plain data with string keys: serialization cannot fail.
    serde_json::to_value(context).unwrap_or(Value::Null)
}

fn month_year(date: NaiveDate) -> String {
    date.format("%b %Y").to_string()
}

/// `Sep 2018 – Jun 2022`, `Jan 2023 – Present`, or an empty string when undated.
fn format_date_range<T: SectionEntry>(entry: &T) -> String {
    let start = entry.start_date().map(month_year);
    let end = if entry.is_current() {
        Some("Present".to_string())
    } else {
        entry.effective_end_date().map(month_year)
    };
    match (start, end) {
        (Some(s), Some(e)) => format!("{s} – {e}"),
        (Some(s), None) => s,
        (None, Some(e)) => e,
        (None, None) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resume::fixtures::*;
    use uuid::Uuid;

    fn renderer() -> TemplateRenderer {
        TemplateRenderer::new(None).unwrap()
    }

    #[test]
    fn test_pdf_template_contains_personal_fields_and_skills() {
        let agg = aggregate(resume("Jane Doe", "Python, SQL, Go"), vec![]);
        let html = renderer().render(PDF_TEMPLATE, &agg).unwrap();
        assert!(html.contains("Jane Doe"));
        for skill in ["Python", "SQL", "Go"] {
            assert!(html.contains(&format!("<li>{skill}</li>")), "missing {skill}");
        }
        assert!(!html.contains("{{"), "unresolved placeholder left in output");
    }

    #[test]
    fn test_sections_rendered_once_each_in_display_order() {
        let rid = Uuid::new_v4();
        let rows = vec![
            education(rid, "Zeta College", "BA", 2, date(2001, 1, 1)),
            education(rid, "Alpha University", "BSc", 0, date(2012, 9, 1)),
            education(rid, "Beta Institute", "MSc", 0, date(2016, 9, 1)),
        ];
        let agg = aggregate(resume("Jane Doe", "Go"), rows);
        let html = renderer().render(PDF_TEMPLATE, &agg).unwrap();

        assert_eq!(html.matches(r#"data-section="education""#).count(), 3);
        assert_eq!(html.matches(r#"data-section="work_experience""#).count(), 0);

        let beta = html.find("Beta Institute").unwrap();
        let alpha = html.find("Alpha University").unwrap();
        let zeta = html.find("Zeta College").unwrap();
        assert!(beta < alpha && alpha < zeta, "entries out of order");
    }

    #[test]
    fn test_preview_template_shares_body() {
        let rid = Uuid::new_v4();
        let agg = aggregate(
            resume("Jane Doe", "Go"),
            vec![education(rid, "Alpha University", "BSc", 0, None)],
        );
        let html = renderer().render(PREVIEW_TEMPLATE, &agg).unwrap();
        assert!(html.contains("Alpha University"));
        assert!(html.contains("Jane Doe"));
    }

    #[test]
    fn test_values_are_html_escaped() {
        let agg = aggregate(resume("<script>alert(1)</script>", "Go"), vec![]);
        let html = renderer().render(PDF_TEMPLATE, &agg).unwrap();
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_missing_field_is_template_error() {
        let mut r = renderer();
        r.register("custom", "<p>{{resume.nickname}}</p>").unwrap();
        let agg = aggregate(resume("Jane Doe", ""), vec![]);
        let err = r.render("custom", &agg).unwrap_err();
        assert!(matches!(err, TemplateError::MissingField(_)), "got {err:?}");
    }

    #[test]
    fn test_unknown_template_is_rejected() {
        let agg = aggregate(resume("Jane Doe", ""), vec![]);
        let err = renderer().render("resumes/fancy", &agg).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownTemplate(name) if name == "resumes/fancy"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let rid = Uuid::new_v4();
        let agg = aggregate(
            resume("Jane Doe", "Go, Rust"),
            vec![education(rid, "Alpha University", "BSc", 0, date(2012, 9, 1))],
        );
        let r = renderer();
        assert_eq!(
            r.render(PDF_TEMPLATE, &agg).unwrap(),
            r.render(PDF_TEMPLATE, &agg).unwrap()
        );
    }

    #[test]
    fn test_date_range_formats() {
        let rid = Uuid::new_v4();
        let mut row = work(rid, "Acme", 0, date(2020, 1, 15));
        row.end_date = date(2022, 6, 30);
        assert_eq!(format_date_range(&row), "Jan 2020 – Jun 2022");
        row.is_current = true;
        assert_eq!(format_date_range(&row), "Jan 2020 – Present");
        row.start_date = None;
        row.is_current = false;
        row.end_date = None;
        assert_eq!(format_date_range(&row), "");
    }

    #[test]
    fn test_template_dir_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("resumes")).unwrap();
        std::fs::write(
            dir.path().join("resumes/pdf.hbs"),
            "<h1>{{resume.full_name}} (custom)</h1>",
        )
        .unwrap();
        let r = TemplateRenderer::new(Some(dir.path())).unwrap();
        let agg = aggregate(resume("Jane Doe", ""), vec![]);
        assert_eq!(
            r.render(PDF_TEMPLATE, &agg).unwrap(),
            "<h1>Jane Doe (custom)</h1>"
        );
    }
}
