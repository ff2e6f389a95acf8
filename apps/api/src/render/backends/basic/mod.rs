//! In-process fallback engine. Needs no external binary, so it is always
//! available; output is plain text styling only.

use async_trait::async_trait;
use tracing::debug;

use super::{ensure_pdf, Availability, BackendError, Engine, PdfBackend, RenderOptions};
use crate::render::resolver::ResourceResolver;

pub mod html;
pub mod layout;
pub mod metrics;
pub mod writer;

use layout::PageGeometry;

pub struct BasicBackend {
    resolver: ResourceResolver,
    geometry: PageGeometry,
    availability: Availability,
}

impl BasicBackend {
    pub fn new(resolver: ResourceResolver) -> Self {
        Self {
            resolver,
            geometry: PageGeometry::A4,
            availability: Availability::Available,
        }
    }
}

/// HTML → blocks → pages → PDF bytes. Any asset reference the resolver
/// cannot map fails the conversion.
fn convert(source: &str, resolver: &ResourceResolver, geometry: &PageGeometry) -> Result<Vec<u8>, BackendError> {
    let parsed = html::parse_document(source, &mut |uri: &str| resolver.resolve(uri));

    for warning in &parsed.status.warnings {
        debug!(engine = "basic", "{warning}");
    }
    if let Some(err) = parsed.status.errors.into_iter().next() {
        return Err(BackendError::ResourceNotFound(err));
    }
    if parsed.blocks.is_empty() {
        return Err(BackendError::Generation(
            "document contains no renderable text".to_string(),
        ));
    }

    let pages = layout::layout(&parsed.blocks, geometry);
    let bytes = writer::write_pdf(&pages, geometry, parsed.title.as_deref())
        .map_err(|e| BackendError::Generation(format!("PDF serialization failed: {e}")))?;
    ensure_pdf(bytes)
}

#[async_trait]
impl PdfBackend for BasicBackend {
    fn engine(&self) -> Engine {
        Engine::Basic
    }

    fn availability(&self) -> &Availability {
        &self.availability
    }

    async fn render(&self, html: &str, _options: &RenderOptions) -> Result<Vec<u8>, BackendError> {
        let html = html.to_string();
        let resolver = self.resolver.clone();
        let geometry = self.geometry;
        tokio::task::spawn_blocking(move || convert(&html, &resolver, &geometry))
            .await
            .map_err(|e| BackendError::Generation(format!("render task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PdfConfig;
    use crate::models::resume::{fixtures, ResumeAggregate};
    use crate::render::template::{TemplateRenderer, PDF_TEMPLATE};

    fn backend_with_media(media_root: &std::path::Path) -> BasicBackend {
        let config = PdfConfig {
            media_root: media_root.to_path_buf(),
            ..PdfConfig::default()
        };
        BasicBackend::new(ResourceResolver::new(&config))
    }

    fn jane_doe_html() -> String {
        let resume = fixtures::resume("Jane Doe", "Python, SQL, Go");
        let education = vec![fixtures::education(
            resume.id,
            "MIT",
            "BSc Computer Science",
            0,
            fixtures::date(2015, 9, 1),
        )];
        let aggregate = fixtures::aggregate(resume, education);
        TemplateRenderer::new(None)
            .unwrap()
            .render(PDF_TEMPLATE, &aggregate)
            .unwrap()
    }

    #[tokio::test]
    async fn test_resume_renders_to_pdf_with_its_text() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_with_media(dir.path());
        let bytes = backend
            .render(&jane_doe_html(), &RenderOptions::default())
            .await
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        let text = pdf_extract::extract_text_from_mem(&bytes).unwrap();
        for expected in ["Jane Doe", "Python", "SQL", "Go", "MIT", "BSc Computer Science"] {
            assert!(text.contains(expected), "missing {expected:?} in {text}");
        }
    }

    #[tokio::test]
    async fn test_escaped_company_name_reads_back_unescaped() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_with_media(dir.path());
        let resume = fixtures::resume("Jane Doe", "Go");
        let work = vec![fixtures::work(resume.id, "AT&T Größe", 0, fixtures::date(2020, 1, 1))];
        let aggregate = ResumeAggregate::new(resume, vec![], work, vec![], vec![], vec![]);
        let html = TemplateRenderer::new(None)
            .unwrap()
            .render(PDF_TEMPLATE, &aggregate)
            .unwrap();
        assert!(html.contains("AT&amp;T"));

        let bytes = backend.render(&html, &RenderOptions::default()).await.unwrap();
        let text = pdf_extract::extract_text_from_mem(&bytes).unwrap();
        assert!(text.contains("AT&T Größe"), "{text}");
        assert!(!text.contains("&amp;"));
    }

    #[tokio::test]
    async fn test_same_html_gives_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_with_media(dir.path());
        let html = jane_doe_html();
        let a = backend.render(&html, &RenderOptions::default()).await.unwrap();
        let b = backend.render(&html, &RenderOptions::default()).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_missing_media_asset_fails_with_resource_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_with_media(dir.path());
        let html = r#"<html><body><img src="/media/missing.png"><p>Jane</p></body></html>"#;
        let err = backend.render(html, &RenderOptions::default()).await.unwrap_err();
        match err {
            BackendError::ResourceNotFound(e) => assert_eq!(e.uri, "/media/missing.png"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_existing_media_asset_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("avatar.png"), [0x89, b'P', b'N', b'G']).unwrap();
        let backend = backend_with_media(dir.path());
        let html = r#"<img src="/media/avatar.png"><p>Jane</p>"#;
        assert!(backend.render(html, &RenderOptions::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_document_without_text_is_a_generation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_with_media(dir.path());
        let err = backend
            .render("<html><head><style>p{}</style></head><body></body></html>", &RenderOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Generation(_)));
    }
}
