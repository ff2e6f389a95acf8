use std::path::PathBuf;

use async_trait::async_trait;

use super::process::{locate_binary, run_piped};
use super::{ensure_pdf, Availability, BackendError, Engine, PdfBackend, RenderOptions};
use crate::config::PdfConfig;

const BINARY: &str = "wkhtmltopdf";

const WELL_KNOWN_PATHS: &[&str] = &[
    r"C:\Program Files\wkhtmltopdf\bin\wkhtmltopdf.exe",
    r"C:\Program Files (x86)\wkhtmltopdf\bin\wkhtmltopdf.exe",
    "/usr/local/bin/wkhtmltopdf",
    "/usr/bin/wkhtmltopdf",
];

/// Browser-engine backend: pipes the HTML through the `wkhtmltopdf` binary.
pub struct WkhtmltopdfBackend {
    binary: Option<PathBuf>,
    availability: Availability,
}

impl WkhtmltopdfBackend {
    /// Looks for the binary once: `WKHTMLTOPDF_PATH`, well-known install
    /// locations, then `PATH`.
    pub fn discover(config: &PdfConfig) -> Self {
        let binary = locate_binary(BINARY, config.wkhtmltopdf_path.as_deref(), WELL_KNOWN_PATHS);
        Self::with_binary(binary)
    }

    pub fn with_binary(binary: Option<PathBuf>) -> Self {
        let availability = match &binary {
            Some(_) => Availability::Available,
            None => Availability::Unavailable(format!(
                "{BINARY} binary not found (set WKHTMLTOPDF_PATH or add it to PATH)"
            )),
        };
        Self {
            binary,
            availability,
        }
    }
}

/// Fixed A4 geometry, no smart shrinking, print media, zoom pinned at 1.0.
/// Reads HTML from stdin and writes the PDF to stdout.
fn command_args() -> Vec<String> {
    [
        "--page-size",
        "A4",
        "--margin-top",
        "0.75in",
        "--margin-right",
        "0.75in",
        "--margin-bottom",
        "0.75in",
        "--margin-left",
        "0.75in",
        "--encoding",
        "UTF-8",
        "--disable-smart-shrinking",
        "--print-media-type",
        "--dpi",
        "96",
        "--zoom",
        "1",
        "--quiet",
        "-",
        "-",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[async_trait]
impl PdfBackend for WkhtmltopdfBackend {
    fn engine(&self) -> Engine {
        Engine::Wkhtmltopdf
    }

    fn availability(&self) -> &Availability {
        &self.availability
    }

    async fn render(&self, html: &str, _options: &RenderOptions) -> Result<Vec<u8>, BackendError> {
        let Some(binary) = &self.binary else {
            return Err(BackendError::Unavailable(format!("{BINARY} binary not found")));
        };
        let bytes = run_piped(binary, &command_args(), html.as_bytes()).await?;
        ensure_pdf(bytes)
    }
}
