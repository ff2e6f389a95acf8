pub mod health;

use axum::{routing::get, Router};
use tower_http::services::ServeDir;
use tracing::info;

use crate::resumes::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let pdf = state.config.pdf.clone();

    let mut router = Router::new()
        .route("/health", get(health::health_handler))
        // Resumes
        .route(
            "/api/v1/resumes",
            get(handlers::list_resumes).post(handlers::create_resume),
        )
        .route(
            "/api/v1/resumes/:id",
            get(handlers::get_resume)
                .put(handlers::update_resume)
                .delete(handlers::delete_resume),
        )
        .route("/api/v1/resumes/:id/preview", get(handlers::preview_resume))
        .route("/api/v1/resumes/:id/download", get(handlers::download_resume))
        // Render
        .route("/api/v1/render/engines", get(handlers::render_engines));

    // Served so network-capable engines (and browsers) can fetch the same
    // assets the resolver maps to disk for the basic engine.
    for (prefix, root) in [(&pdf.static_url, &pdf.static_root), (&pdf.media_url, &pdf.media_root)] {
        if let Some(mount) = mount_point(prefix) {
            info!("Serving {} from {}", mount, root.display());
            router = router.nest_service(&mount, ServeDir::new(root));
        }
    }

    router.with_state(state)
}

/// Only same-origin path prefixes can be mounted; a CDN URL is served elsewhere.
fn mount_point(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim_end_matches('/');
    (trimmed.starts_with('/') && trimmed.len() > 1).then(|| trimmed.to_string())
}
