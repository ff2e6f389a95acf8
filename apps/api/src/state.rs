use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::render::selector::EngineSelector;
use crate::render::template::TemplateRenderer;

/// Shared application state injected into all route handlers via Axum extractors.
/// Everything here is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub templates: Arc<TemplateRenderer>,
    /// PDF engine cascade; backend availability was probed once at startup.
    pub pdf: Arc<EngineSelector>,
}
