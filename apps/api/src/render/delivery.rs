//! Delivery Wrapper: turns a cascade result into an HTTP response.
//!
//! A failed generation is never served with a PDF content type: the operator
//! gets a plain-text explanation instead of a corrupt download.

use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::render::selector::{AllBackendsExhausted, GeneratedPdf};

pub const ENGINE_HEADER: HeaderName = HeaderName::from_static("x-pdf-engine");

const FAILURE_GUIDANCE: &str = "PDF generation is unavailable on this server.\n\
Install wkhtmltopdf (https://wkhtmltopdf.org/downloads.html) and make sure it is on PATH \
or set WKHTMLTOPDF_PATH, or set PDF_ENGINE to a fallback engine (weasyprint or basic).";

pub fn pdf_response(result: Result<GeneratedPdf, AllBackendsExhausted>, filename: &str) -> Response {
    match result {
        Ok(pdf) => success(pdf, filename),
        Err(exhausted) => failure(&exhausted),
    }
}

fn success(pdf: GeneratedPdf, filename: &str) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", sanitize_filename(filename));
    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"Resume.pdf\""));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
            (ENGINE_HEADER, HeaderValue::from_static(pdf.engine.name())),
        ],
        pdf.bytes,
    )
        .into_response()
}

fn failure(exhausted: &AllBackendsExhausted) -> Response {
    let mut body = String::from(FAILURE_GUIDANCE);
    body.push_str("\n\nAttempts:\n");
    if exhausted.attempts.is_empty() {
        body.push_str("- none (no PDF engines are configured)\n");
    }
    for attempt in &exhausted.attempts {
        body.push_str("- ");
        body.push_str(&attempt.to_string());
        body.push('\n');
    }

    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Keeps the name safe inside a quoted `Content-Disposition` parameter.
/// Non-ASCII becomes `_` since header values must be visible ASCII.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' | '/' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "Resume.pdf".to_string()
    } else {
        cleaned.to_string()
    }
}
