//! PDF generation backends: interchangeable "HTML string → PDF bytes" engines.
//!
//! Each backend decides once, at construction, whether it can run on this
//! host. The engine selector reads that cached answer instead of probing on
//! every request.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::PdfConfig;
use crate::render::resolver::{ResourceNotFoundError, ResourceResolver};

pub mod basic;
pub mod process;
pub mod weasyprint;
pub mod wkhtmltopdf;

pub use basic::BasicBackend;
pub use weasyprint::WeasyprintBackend;
pub use wkhtmltopdf::WkhtmltopdfBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// Headless WebKit via the `wkhtmltopdf` binary. Best CSS fidelity.
    Wkhtmltopdf,
    /// WeasyPrint. Good CSS paged-media support, resolves URLs itself.
    Weasyprint,
    /// In-process text renderer. Always available, plain output.
    Basic,
}

impl Engine {
    /// Highest fidelity first.
    pub const DEFAULT_ORDER: [Engine; 3] = [Engine::Wkhtmltopdf, Engine::Weasyprint, Engine::Basic];

    pub fn name(&self) -> &'static str {
        match self {
            Engine::Wkhtmltopdf => "wkhtmltopdf",
            Engine::Weasyprint => "weasyprint",
            Engine::Basic => "basic",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown PDF engine '{0}' (expected wkhtmltopdf, weasyprint or basic)")]
pub struct UnknownEngine(pub String);

impl FromStr for Engine {
    type Err = UnknownEngine;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wkhtmltopdf" => Ok(Engine::Wkhtmltopdf),
            "weasyprint" => Ok(Engine::Weasyprint),
            "basic" => Ok(Engine::Basic),
            _ => Err(UnknownEngine(s.to_string())),
        }
    }
}

/// Per-request rendering inputs beyond the HTML itself.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Origin used by engines that resolve relative URLs on their own.
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Availability {
    Available,
    Unavailable(String),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    /// A required binary or library is missing. The cascade skips the engine.
    #[error("not available: {0}")]
    Unavailable(String),

    /// The engine ran but produced nothing usable.
    #[error("generation failed: {0}")]
    Generation(String),

    #[error(transparent)]
    ResourceNotFound(#[from] ResourceNotFoundError),

    #[error("timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),
}

/// One PDF engine. Implementations must be substitutable for each other.
#[async_trait]
pub trait PdfBackend: Send + Sync {
    fn engine(&self) -> Engine;

    /// Cached availability, decided when the backend was built.
    fn availability(&self) -> &Availability;

    async fn render(&self, html: &str, options: &RenderOptions) -> Result<Vec<u8>, BackendError>;
}

/// Builds every backend in default order and logs which ones this host can run.
pub fn default_backends(config: &PdfConfig, resolver: ResourceResolver) -> Vec<Arc<dyn PdfBackend>> {
    let backends: Vec<Arc<dyn PdfBackend>> = vec![
        Arc::new(WkhtmltopdfBackend::discover(config)),
        Arc::new(WeasyprintBackend::discover(config)),
        Arc::new(BasicBackend::new(resolver)),
    ];

    for backend in &backends {
        match backend.availability() {
            Availability::Available => info!(engine = %backend.engine(), "PDF engine available"),
            Availability::Unavailable(reason) => {
                warn!(engine = %backend.engine(), "PDF engine unavailable: {reason}")
            }
        }
    }

    backends
}

/// Rejects output that is empty or does not look like a PDF file.
pub(crate) fn ensure_pdf(bytes: Vec<u8>) -> Result<Vec<u8>, BackendError> {
    if bytes.is_empty() {
        return Err(BackendError::Generation("produced empty output".to_string()));
    }
    if !bytes.starts_with(b"%PDF") {
        return Err(BackendError::Generation(
            "output is not a PDF document".to_string(),
        ));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_parses_case_insensitively() {
        assert_eq!(" WkHtmlToPdf ".parse::<Engine>().unwrap(), Engine::Wkhtmltopdf);
        assert_eq!("weasyprint".parse::<Engine>().unwrap(), Engine::Weasyprint);
        assert_eq!("BASIC".parse::<Engine>().unwrap(), Engine::Basic);
        assert!("chrome".parse::<Engine>().is_err());
    }

    #[test]
    fn test_default_order_is_highest_fidelity_first() {
        assert_eq!(
            Engine::DEFAULT_ORDER,
            [Engine::Wkhtmltopdf, Engine::Weasyprint, Engine::Basic]
        );
    }

    #[test]
    fn test_ensure_pdf_rejects_empty_and_non_pdf() {
        assert!(matches!(ensure_pdf(vec![]), Err(BackendError::Generation(_))));
        assert!(matches!(
            ensure_pdf(b"<html>error</html>".to_vec()),
            Err(BackendError::Generation(_))
        ));
        assert!(ensure_pdf(b"%PDF-1.7\n...".to_vec()).is_ok());
    }

    #[test]
    fn test_default_backends_always_include_basic() {
        let config = PdfConfig::default();
        let backends = default_backends(&config, ResourceResolver::new(&config));
        let engines: Vec<_> = backends.iter().map(|b| b.engine()).collect();
        assert_eq!(engines, Engine::DEFAULT_ORDER.to_vec());
        assert!(backends[2].availability().is_available());
    }
}
