//! Resume → HTML → PDF pipeline.
//!
//! `template` renders an aggregate to HTML, `selector` runs that HTML through
//! the `backends` cascade, and `delivery` shapes the HTTP response. The
//! `resolver` maps asset URIs for engines that cannot fetch them over HTTP.

pub mod backends;
pub mod delivery;
pub mod resolver;
pub mod selector;
pub mod template;

use axum::http::{header, HeaderMap};

use crate::config::PdfConfig;

/// Origin handed to engines that resolve relative URLs themselves.
///
/// `PUBLIC_BASE_URL` wins when set; otherwise the origin is rebuilt from the
/// proxy headers or `Host`.
pub fn request_base_url(headers: &HeaderMap, config: &PdfConfig) -> Option<String> {
    if let Some(base) = &config.public_base_url {
        return Some(with_trailing_slash(base));
    }

    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let host = header_str("x-forwarded-host").or_else(|| header_str(header::HOST.as_str()))?;
    let scheme = header_str("x-forwarded-proto").unwrap_or("http");
    Some(format!("{scheme}://{host}/"))
}

fn with_trailing_slash(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}
