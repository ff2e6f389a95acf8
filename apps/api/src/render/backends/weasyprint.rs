use std::path::PathBuf;

use async_trait::async_trait;

use super::process::{locate_binary, run_piped};
use super::{ensure_pdf, Availability, BackendError, Engine, PdfBackend, RenderOptions};
use crate::config::PdfConfig;

const BINARY: &str = "weasyprint";

const WELL_KNOWN_PATHS: &[&str] = &["/usr/local/bin/weasyprint", "/usr/bin/weasyprint"];

/// Pure-rendering backend. WeasyPrint fetches relative references itself,
/// given a base URL, so no resolver is involved.
pub struct WeasyprintBackend {
    binary: Option<PathBuf>,
    availability: Availability,
}

impl WeasyprintBackend {
    pub fn discover(config: &PdfConfig) -> Self {
        let binary = locate_binary(BINARY, config.weasyprint_path.as_deref(), WELL_KNOWN_PATHS);
        Self::with_binary(binary)
    }

    pub fn with_binary(binary: Option<PathBuf>) -> Self {
        let availability = match &binary {
            Some(_) => Availability::Available,
            None => Availability::Unavailable(format!(
                "{BINARY} not found (set WEASYPRINT_PATH or add it to PATH)"
            )),
        };
        Self {
            binary,
            availability,
        }
    }
}

fn command_args(options: &RenderOptions) -> Vec<String> {
    let mut args = vec!["--encoding".to_string(), "utf-8".to_string()];
    if let Some(base_url) = &options.base_url {
        args.push("--base-url".to_string());
        args.push(base_url.clone());
    }
    args.push("-".to_string());
    args.push("-".to_string());
    args
}

#[async_trait]
impl PdfBackend for WeasyprintBackend {
    fn engine(&self) -> Engine {
        Engine::Weasyprint
    }

    fn availability(&self) -> &Availability {
        &self.availability
    }

    async fn render(&self, html: &str, options: &RenderOptions) -> Result<Vec<u8>, BackendError> {
        let Some(binary) = &self.binary else {
            return Err(BackendError::Unavailable(format!("{BINARY} not found")));
        };
        let bytes = run_piped(binary, &command_args(options), html.as_bytes()).await?;
        ensure_pdf(bytes)
    }
}
