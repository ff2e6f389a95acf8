use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::resume::{ResumeAggregate, ResumeRow};
use crate::render::backends::{Engine, RenderOptions};
use crate::render::delivery::pdf_response;
use crate::render::request_base_url;
use crate::render::selector::EngineStatus;
use crate::render::template::{PDF_TEMPLATE, PREVIEW_TEMPLATE};
use crate::resumes::repository;
use crate::resumes::validation::ResumeInput;
use crate::state::AppState;

/// Aggregate plus the derived skills list, as returned by the detail endpoints.
#[derive(Debug, Serialize)]
pub struct ResumeDetail {
    #[serde(flatten)]
    pub aggregate: ResumeAggregate,
    pub skills_list: Vec<String>,
    pub download_filename: String,
}

impl From<ResumeAggregate> for ResumeDetail {
    fn from(aggregate: ResumeAggregate) -> Self {
        Self {
            skills_list: aggregate.resume.skills_list(),
            download_filename: aggregate.pdf_filename(),
            aggregate,
        }
    }
}

async fn load_owned(state: &AppState, user: CurrentUser, id: Uuid) -> Result<ResumeAggregate, AppError> {
    repository::load_aggregate(&state.db, user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

// ─── CRUD ────────────────────────────────────────────────────────────────────

/// GET /api/v1/resumes
pub async fn list_resumes(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ResumeRow>>, AppError> {
    let resumes = repository::list_for_user(&state.db, user.id).await?;
    Ok(Json(resumes))
}

/// POST /api/v1/resumes
pub async fn create_resume(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<ResumeInput>,
) -> Result<(StatusCode, Json<ResumeDetail>), AppError> {
    input.validate_form()?;

    // The gateway vouches for the id, but the account must still exist here.
    if repository::find_user(&state.db, user.id).await?.is_none() {
        return Err(AppError::Unauthorized);
    }

    let id = repository::create(&state.db, user.id, &input).await?;
    let aggregate = load_owned(&state, user, id).await?;
    Ok((StatusCode::CREATED, Json(aggregate.into())))
}

/// GET /api/v1/resumes/:id
pub async fn get_resume(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeDetail>, AppError> {
    let aggregate = load_owned(&state, user, id).await?;
    Ok(Json(aggregate.into()))
}

/// PUT /api/v1/resumes/:id
pub async fn update_resume(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<ResumeInput>,
) -> Result<Json<ResumeDetail>, AppError> {
    input.validate_form()?;

    if !repository::update(&state.db, user.id, id, &input).await? {
        return Err(AppError::NotFound(format!("Resume {id} not found")));
    }
    let aggregate = load_owned(&state, user, id).await?;
    Ok(Json(aggregate.into()))
}

/// DELETE /api/v1/resumes/:id
pub async fn delete_resume(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !repository::delete(&state.db, user.id, id).await? {
        return Err(AppError::NotFound(format!("Resume {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ─── Rendering ───────────────────────────────────────────────────────────────

/// GET /api/v1/resumes/:id/preview
pub async fn preview_resume(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, AppError> {
    let aggregate = load_owned(&state, user, id).await?;
    let html = state.templates.render(PREVIEW_TEMPLATE, &aggregate)?;
    Ok(Html(html))
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    /// Registered template name; defaults to the built-in print template.
    pub template: Option<String>,
}

/// GET /api/v1/resumes/:id/download
///
/// Renders the resume to HTML and runs it through the engine cascade. When
/// every engine fails the response is a plain-text 503, never a broken PDF.
pub async fn download_resume(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Query(params): Query<DownloadParams>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let template = params.template.as_deref().unwrap_or(PDF_TEMPLATE);
    if !state.templates.has_template(template) {
        return Err(AppError::Validation(format!("Unknown template '{template}'")));
    }

    let aggregate = load_owned(&state, user, id).await?;
    let html = state.templates.render(template, &aggregate)?;

    let options = RenderOptions {
        base_url: request_base_url(&headers, &state.config.pdf),
    };
    let result = state.pdf.generate(&html, &options).await;
    if let Ok(pdf) = &result {
        info!(resume_id = %id, engine = %pdf.engine, "Resume exported");
    }

    Ok(pdf_response(result, &aggregate.pdf_filename()))
}

#[derive(Debug, Serialize)]
pub struct EngineReport {
    pub preferred: Option<Engine>,
    pub engines: Vec<EngineStatus>,
}

/// GET /api/v1/render/engines
pub async fn render_engines(State(state): State<AppState>) -> Json<EngineReport> {
    Json(EngineReport {
        preferred: state.pdf.preferred(),
        engines: state.pdf.engine_report(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resume::fixtures;

    #[test]
    fn test_detail_carries_skills_list_and_filename() {
        let resume = fixtures::resume("Jane Doe", "Python, SQL, , Go");
        let detail = ResumeDetail::from(fixtures::aggregate(resume, vec![]));
        assert_eq!(detail.skills_list, vec!["Python", "SQL", "Go"]);
        assert_eq!(detail.download_filename, "Jane_Doe_Resume.pdf");

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["resume"]["full_name"], "Jane Doe");
        assert!(json["education"].as_array().unwrap().is_empty());
        assert_eq!(json["skills_list"][2], "Go");
    }
}
