mod auth;
mod config;
mod db;
mod errors;
mod models;
mod render;
mod resumes;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::render::backends::default_backends;
use crate::render::resolver::ResourceResolver;
use crate::render::selector::EngineSelector;
use crate::render::template::TemplateRenderer;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_filter(&config.rust_log))),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Vitae API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    if config.run_migrations {
        run_migrations(&db).await?;
    }

    // Templates: built-ins plus anything under TEMPLATE_DIR
    let templates = TemplateRenderer::new(config.pdf.template_dir.as_deref())?;

    // PDF engines, probed once; availability is fixed for the process lifetime
    let resolver = ResourceResolver::new(&config.pdf);
    let backends = default_backends(&config.pdf, resolver);
    let pdf = EngineSelector::from_config(backends, &config.pdf);

    // Build app state
    let state = AppState {
        db,
        config: config.clone(),
        templates: Arc::new(templates),
        pdf: Arc::new(pdf),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Fallback filter when `RUST_LOG` is not a valid directive set. Event targets
/// start with the binary crate's name, not the package name.
fn default_log_filter(level: &str) -> String {
    format!("{}={}", env!("CARGO_CRATE_NAME"), level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_targets_this_crate() {
        let crate_root = module_path!().split("::").next().unwrap();
        assert_eq!(default_log_filter("info"), format!("{crate_root}=info"));
    }

    #[test]
    fn test_default_filter_enables_selector_warnings() {
        use tracing::subscriber::with_default;
        use tracing_subscriber::fmt::MakeWriter;
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct Captured(Arc<Mutex<Vec<u8>>>);

        impl std::io::Write for Captured {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        impl<'a> MakeWriter<'a> for Captured {
            type Writer = Captured;
            fn make_writer(&'a self) -> Self::Writer {
                self.clone()
            }
        }

        let captured = Captured::default();
        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new(default_log_filter("warn")))
            .with(tracing_subscriber::fmt::layer().with_writer(captured.clone()).with_ansi(false));

        with_default(subscriber, || {
            let config = crate::config::PdfConfig {
                preferred_engine: Some("chromium".to_string()),
                ..crate::config::PdfConfig::default()
            };
            EngineSelector::from_config(Vec::new(), &config);
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Ignoring PDF_ENGINE"), "{output:?}");
    }
}
