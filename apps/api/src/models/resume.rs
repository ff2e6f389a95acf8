use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub linkedin_url: String,
    pub github_url: String,
    pub portfolio_url: String,
    /// Free text, comma separated. See [`ResumeRow::skills_list`].
    pub skills: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResumeRow {
    pub fn skills_list(&self) -> Vec<String> {
        split_skills(&self.skills)
    }
}

/// Splits a comma-separated skills field into trimmed, non-empty tokens,
/// preserving their order.
pub fn split_skills(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EducationRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub institution: String,
    pub degree: String,
    pub field_of_study: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub grade: String,
    pub description: String,
    #[serde(rename = "order")]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkExperienceRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub company: String,
    pub position: String,
    pub location: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub description: String,
    #[serde(rename = "order")]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub title: String,
    pub organization: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub description: String,
    #[serde(rename = "order")]
    pub sort_order: i32,
}

/// `start_date` is the issue date, `end_date` the expiry; `is_current` means
/// the credential does not expire.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CertificationRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub name: String,
    pub issuer: String,
    pub credential_id: String,
    pub credential_url: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub description: String,
    #[serde(rename = "order")]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub name: String,
    pub role: String,
    pub url: String,
    pub technologies: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub description: String,
    #[serde(rename = "order")]
    pub sort_order: i32,
}

/// Shared shape of every resume section row: display order plus a date range.
pub trait SectionEntry {
    fn sort_order(&self) -> i32;
    fn start_date(&self) -> Option<NaiveDate>;
    fn stored_end_date(&self) -> Option<NaiveDate>;
    fn is_current(&self) -> bool;

    /// The end of the entry's date range. A current entry is open-ended
    /// whatever `end_date` holds.
    fn effective_end_date(&self) -> Option<NaiveDate> {
        if self.is_current() {
            None
        } else {
            self.stored_end_date()
        }
    }
}

macro_rules! section_entry {
    ($($row:ty),+ $(,)?) => {
        $(
            impl SectionEntry for $row {
                fn sort_order(&self) -> i32 {
                    self.sort_order
                }
                fn start_date(&self) -> Option<NaiveDate> {
                    self.start_date
                }
                fn stored_end_date(&self) -> Option<NaiveDate> {
                    self.end_date
                }
                fn is_current(&self) -> bool {
                    self.is_current
                }
            }
        )+
    };
}

section_entry!(
    EducationRow,
    WorkExperienceRow,
    ActivityRow,
    CertificationRow,
    ProjectRow,
);

/// Display ordering: `order` ascending, then `start_date` descending.
/// Undated entries go after dated ones within the same `order`.
pub fn compare_entries<T: SectionEntry>(a: &T, b: &T) -> Ordering {
    a.sort_order()
        .cmp(&b.sort_order())
        .then_with(|| match (a.start_date(), b.start_date()) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// Stable sort by [`compare_entries`].
pub fn sort_entries<T: SectionEntry>(entries: &mut [T]) {
    entries.sort_by(compare_entries);
}

/// A resume plus all of its section rows, loaded together and treated as
/// one consistency unit by the renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeAggregate {
    pub resume: ResumeRow,
    pub education: Vec<EducationRow>,
    pub work_experience: Vec<WorkExperienceRow>,
    pub extracurricular_activities: Vec<ActivityRow>,
    pub certifications: Vec<CertificationRow>,
    pub projects: Vec<ProjectRow>,
}

impl ResumeAggregate {
    /// Builds an aggregate with every section collection put in display order.
    pub fn new(
        resume: ResumeRow,
        mut education: Vec<EducationRow>,
        mut work_experience: Vec<WorkExperienceRow>,
        mut extracurricular_activities: Vec<ActivityRow>,
        mut certifications: Vec<CertificationRow>,
        mut projects: Vec<ProjectRow>,
    ) -> Self {
        sort_entries(&mut education);
        sort_entries(&mut work_experience);
        sort_entries(&mut extracurricular_activities);
        sort_entries(&mut certifications);
        sort_entries(&mut projects);
        Self {
            resume,
            education,
            work_experience,
            extracurricular_activities,
            certifications,
            projects,
        }
    }

    /// `Jane Doe` → `Jane_Doe_Resume.pdf`.
    pub fn pdf_filename(&self) -> String {
        let name = self.resume.full_name.trim().replace(' ', "_");
        if name.is_empty() {
            "Resume.pdf".to_string()
        } else {
            format!("{name}_Resume.pdf")
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn resume(full_name: &str, skills: &str) -> ResumeRow {
        let now = Utc::now();
        ResumeRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "My Resume".to_string(),
            full_name: full_name.to_string(),
            email: "jane@example.com".to_string(),
            phone: "+1 555 0100".to_string(),
            address: "1 Main Street, Springfield".to_string(),
            linkedin_url: String::new(),
            github_url: "https://github.com/janedoe".to_string(),
            portfolio_url: String::new(),
            skills: skills.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn education(
        resume_id: Uuid,
        institution: &str,
        degree: &str,
        order: i32,
        start: Option<NaiveDate>,
    ) -> EducationRow {
        EducationRow {
            id: Uuid::new_v4(),
            resume_id,
            institution: institution.to_string(),
            degree: degree.to_string(),
            field_of_study: String::new(),
            start_date: start,
            end_date: None,
            is_current: false,
            grade: String::new(),
            description: String::new(),
            sort_order: order,
        }
    }

    pub fn work(resume_id: Uuid, company: &str, order: i32, start: Option<NaiveDate>) -> WorkExperienceRow {
        WorkExperienceRow {
            id: Uuid::new_v4(),
            resume_id,
            company: company.to_string(),
            position: "Engineer".to_string(),
            location: String::new(),
            start_date: start,
            end_date: None,
            is_current: false,
            description: String::new(),
            sort_order: order,
        }
    }

    pub fn aggregate(resume: ResumeRow, education: Vec<EducationRow>) -> ResumeAggregate {
        ResumeAggregate::new(resume, education, vec![], vec![], vec![], vec![])
    }

    pub fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }
}
