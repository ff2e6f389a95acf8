use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::models::resume::{
    ActivityRow, CertificationRow, EducationRow, ProjectRow, ResumeAggregate, ResumeRow,
    WorkExperienceRow,
};
use crate::models::user::User;
use crate::resumes::validation::{
    ActivityInput, CertificationInput, EducationInput, EntryMeta, ProjectInput, ResumeInput,
    WorkExperienceInput,
};

/// Dashboard listing, most recently edited first.
pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<ResumeRow>> {
    sqlx::query_as::<_, ResumeRow>(
        "SELECT * FROM resumes WHERE user_id = $1 ORDER BY updated_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn find_user(pool: &PgPool, user_id: Uuid) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, username, is_email_verified, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Loads a resume and all its sections. `None` when the resume does not exist
/// or belongs to someone else.
pub async fn load_aggregate(pool: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<ResumeAggregate>> {
    let Some(resume) = sqlx::query_as::<_, ResumeRow>(
        "SELECT * FROM resumes WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let education = fetch_section::<EducationRow>(pool, "education", id).await?;
    let work_experience = fetch_section::<WorkExperienceRow>(pool, "work_experience", id).await?;
    let activities = fetch_section::<ActivityRow>(pool, "extracurricular_activities", id).await?;
    let certifications = fetch_section::<CertificationRow>(pool, "certifications", id).await?;
    let projects = fetch_section::<ProjectRow>(pool, "projects", id).await?;

    Ok(Some(ResumeAggregate::new(
        resume,
        education,
        work_experience,
        activities,
        certifications,
        projects,
    )))
}

async fn fetch_section<T>(pool: &PgPool, table: &str, resume_id: Uuid) -> sqlx::Result<Vec<T>>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    sqlx::query_as::<_, T>(&format!(
        "SELECT * FROM {table} WHERE resume_id = $1 ORDER BY sort_order ASC, start_date DESC NULLS LAST"
    ))
    .bind(resume_id)
    .fetch_all(pool)
    .await
}

/// Inserts the resume row and every submitted section in one transaction.
pub async fn create(pool: &PgPool, user_id: Uuid, input: &ResumeInput) -> sqlx::Result<Uuid> {
    let id = Uuid::new_v4();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO resumes
            (id, user_id, title, full_name, email, phone, address,
             linkedin_url, github_url, portfolio_url, skills)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(input.title.trim())
    .bind(input.full_name.trim())
    .bind(input.email.trim())
    .bind(input.phone.trim())
    .bind(input.address.trim())
    .bind(input.linkedin_url.trim())
    .bind(input.github_url.trim())
    .bind(input.portfolio_url.trim())
    .bind(input.skills.trim())
    .execute(&mut *tx)
    .await?;

    replace_sections(&mut *tx, id, input).await?;
    tx.commit().await?;

    info!("Created resume {id} for user {user_id}");
    Ok(id)
}

/// Updates the resume row and replaces every section collection present in
/// the payload. Returns `false` when the resume is not the caller's.
pub async fn update(pool: &PgPool, user_id: Uuid, id: Uuid, input: &ResumeInput) -> sqlx::Result<bool> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        UPDATE resumes
        SET title = $3, full_name = $4, email = $5, phone = $6, address = $7,
            linkedin_url = $8, github_url = $9, portfolio_url = $10, skills = $11,
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(input.title.trim())
    .bind(input.full_name.trim())
    .bind(input.email.trim())
    .bind(input.phone.trim())
    .bind(input.address.trim())
    .bind(input.linkedin_url.trim())
    .bind(input.github_url.trim())
    .bind(input.portfolio_url.trim())
    .bind(input.skills.trim())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    replace_sections(&mut *tx, id, input).await?;
    tx.commit().await?;

    info!("Updated resume {id}");
    Ok(true)
}

/// Sections are removed by `ON DELETE CASCADE`.
pub async fn delete(pool: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM resumes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

    let deleted = result.rows_affected() > 0;
    if deleted {
        info!("Deleted resume {id}");
    }
    Ok(deleted)
}

async fn replace_sections(conn: &mut PgConnection, resume_id: Uuid, input: &ResumeInput) -> sqlx::Result<()> {
    if let Some(rows) = &input.education {
        replace_section(conn, resume_id, rows).await?;
    }
    if let Some(rows) = &input.work_experience {
        replace_section(conn, resume_id, rows).await?;
    }
    if let Some(rows) = &input.extracurricular_activities {
        replace_section(conn, resume_id, rows).await?;
    }
    if let Some(rows) = &input.certifications {
        replace_section(conn, resume_id, rows).await?;
    }
    if let Some(rows) = &input.projects {
        replace_section(conn, resume_id, rows).await?;
    }
    Ok(())
}

/// Formset write: rows with an id already stored for this resume are updated,
/// the rest inserted under a fresh id, and anything not kept is deleted.
async fn replace_section<T: SectionWrite>(conn: &mut PgConnection, resume_id: Uuid, rows: &[T]) -> sqlx::Result<()> {
    let existing: Vec<Uuid> = sqlx::query_scalar(&format!(
        "SELECT id FROM {} WHERE resume_id = $1",
        T::TABLE
    ))
    .bind(resume_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut kept: Vec<Uuid> = Vec::with_capacity(rows.len());
    for row in rows.iter().filter(|row| !row.meta().delete) {
        let id = row
            .meta()
            .id
            .filter(|id| existing.contains(id))
            .unwrap_or_else(Uuid::new_v4);
        row.upsert(&mut *conn, resume_id, id).await?;
        kept.push(id);
    }

    sqlx::query(&format!(
        "DELETE FROM {} WHERE resume_id = $1 AND id <> ALL($2)",
        T::TABLE
    ))
    .bind(resume_id)
    .bind(&kept[..])
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[async_trait]
trait SectionWrite: Sync {
    const TABLE: &'static str;

    fn meta(&self) -> &EntryMeta;

    async fn upsert(&self, conn: &mut PgConnection, resume_id: Uuid, id: Uuid) -> sqlx::Result<()>;
}

#[async_trait]
impl SectionWrite for EducationInput {
    const TABLE: &'static str = "education";

    fn meta(&self) -> &EntryMeta {
        &self.meta
    }

    async fn upsert(&self, conn: &mut PgConnection, resume_id: Uuid, id: Uuid) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO education
                (id, resume_id, institution, degree, field_of_study, grade,
                 start_date, end_date, is_current, description, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                institution = EXCLUDED.institution, degree = EXCLUDED.degree,
                field_of_study = EXCLUDED.field_of_study, grade = EXCLUDED.grade,
                start_date = EXCLUDED.start_date, end_date = EXCLUDED.end_date,
                is_current = EXCLUDED.is_current, description = EXCLUDED.description,
                sort_order = EXCLUDED.sort_order
            "#,
        )
        .bind(id)
        .bind(resume_id)
        .bind(self.institution.trim())
        .bind(self.degree.trim())
        .bind(self.field_of_study.trim())
        .bind(self.grade.trim())
        .bind(self.meta.start_date)
        .bind(self.meta.end_date)
        .bind(self.meta.is_current)
        .bind(self.meta.description.trim())
        .bind(self.meta.order)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SectionWrite for WorkExperienceInput {
    const TABLE: &'static str = "work_experience";

    fn meta(&self) -> &EntryMeta {
        &self.meta
    }

    async fn upsert(&self, conn: &mut PgConnection, resume_id: Uuid, id: Uuid) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO work_experience
                (id, resume_id, company, position, location,
                 start_date, end_date, is_current, description, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                company = EXCLUDED.company, position = EXCLUDED.position,
                location = EXCLUDED.location,
                start_date = EXCLUDED.start_date, end_date = EXCLUDED.end_date,
                is_current = EXCLUDED.is_current, description = EXCLUDED.description,
                sort_order = EXCLUDED.sort_order
            "#,
        )
        .bind(id)
        .bind(resume_id)
        .bind(self.company.trim())
        .bind(self.position.trim())
        .bind(self.location.trim())
        .bind(self.meta.start_date)
        .bind(self.meta.end_date)
        .bind(self.meta.is_current)
        .bind(self.meta.description.trim())
        .bind(self.meta.order)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SectionWrite for ActivityInput {
    const TABLE: &'static str = "extracurricular_activities";

    fn meta(&self) -> &EntryMeta {
        &self.meta
    }

    async fn upsert(&self, conn: &mut PgConnection, resume_id: Uuid, id: Uuid) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO extracurricular_activities
                (id, resume_id, title, organization,
                 start_date, end_date, is_current, description, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title, organization = EXCLUDED.organization,
                start_date = EXCLUDED.start_date, end_date = EXCLUDED.end_date,
                is_current = EXCLUDED.is_current, description = EXCLUDED.description,
                sort_order = EXCLUDED.sort_order
            "#,
        )
        .bind(id)
        .bind(resume_id)
        .bind(self.title.trim())
        .bind(self.organization.trim())
        .bind(self.meta.start_date)
        .bind(self.meta.end_date)
        .bind(self.meta.is_current)
        .bind(self.meta.description.trim())
        .bind(self.meta.order)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SectionWrite for CertificationInput {
    const TABLE: &'static str = "certifications";

    fn meta(&self) -> &EntryMeta {
        &self.meta
    }

    async fn upsert(&self, conn: &mut PgConnection, resume_id: Uuid, id: Uuid) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO certifications
                (id, resume_id, name, issuer, credential_id, credential_url,
                 start_date, end_date, is_current, description, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name, issuer = EXCLUDED.issuer,
                credential_id = EXCLUDED.credential_id, credential_url = EXCLUDED.credential_url,
                start_date = EXCLUDED.start_date, end_date = EXCLUDED.end_date,
                is_current = EXCLUDED.is_current, description = EXCLUDED.description,
                sort_order = EXCLUDED.sort_order
            "#,
        )
        .bind(id)
        .bind(resume_id)
        .bind(self.name.trim())
        .bind(self.issuer.trim())
        .bind(self.credential_id.trim())
        .bind(self.credential_url.trim())
        .bind(self.meta.start_date)
        .bind(self.meta.end_date)
        .bind(self.meta.is_current)
        .bind(self.meta.description.trim())
        .bind(self.meta.order)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SectionWrite for ProjectInput {
    const TABLE: &'static str = "projects";

    fn meta(&self) -> &EntryMeta {
        &self.meta
    }

    async fn upsert(&self, conn: &mut PgConnection, resume_id: Uuid, id: Uuid) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO projects
                (id, resume_id, name, role, url, technologies,
                 start_date, end_date, is_current, description, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name, role = EXCLUDED.role,
                url = EXCLUDED.url, technologies = EXCLUDED.technologies,
                start_date = EXCLUDED.start_date, end_date = EXCLUDED.end_date,
                is_current = EXCLUDED.is_current, description = EXCLUDED.description,
                sort_order = EXCLUDED.sort_order
            "#,
        )
        .bind(id)
        .bind(resume_id)
        .bind(self.name.trim())
        .bind(self.role.trim())
        .bind(self.url.trim())
        .bind(self.technologies.trim())
        .bind(self.meta.start_date)
        .bind(self.meta.end_date)
        .bind(self.meta.is_current)
        .bind(self.meta.description.trim())
        .bind(self.meta.order)
        .execute(conn)
        .await?;
        Ok(())
    }
}
