use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    /// Apply embedded migrations on startup.
    pub run_migrations: bool,
    pub pdf: PdfConfig,
}

/// Everything the PDF pipeline reads: engine preference, binary overrides,
/// asset prefixes and their filesystem roots.
///
/// Passed explicitly into the resolver, the backends and the engine selector.
#[derive(Debug, Clone)]
pub struct PdfConfig {
    /// Raw `PDF_ENGINE` value. Parsed (and validated) by the engine selector.
    pub preferred_engine: Option<String>,
    pub wkhtmltopdf_path: Option<PathBuf>,
    pub weasyprint_path: Option<PathBuf>,
    /// URL prefix for static assets, always ending in `/`.
    pub static_url: String,
    pub static_root: PathBuf,
    /// URL prefix for user uploads, always ending in `/`.
    pub media_url: String,
    pub media_root: PathBuf,
    /// Upper bound for a single backend attempt.
    pub attempt_timeout: Duration,
    /// Optional directory of `*.hbs` templates registered on top of the built-ins.
    pub template_dir: Option<PathBuf>,
    /// Origin handed to engines that resolve relative URLs themselves.
    /// When unset, the request's Host header is used.
    pub public_base_url: Option<String>,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            preferred_engine: None,
            wkhtmltopdf_path: None,
            weasyprint_path: None,
            static_url: "/static/".to_string(),
            static_root: PathBuf::from("static"),
            media_url: "/media/".to_string(),
            media_root: PathBuf::from("media"),
            attempt_timeout: Duration::from_secs(30),
            template_dir: None,
            public_base_url: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            run_migrations: parse_flag(optional_env("RUN_MIGRATIONS").as_deref(), true),
            pdf: PdfConfig::from_env()?,
        })
    }
}

impl PdfConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = PdfConfig::default();

        let attempt_timeout = match optional_env("PDF_RENDER_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .context("PDF_RENDER_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            None => defaults.attempt_timeout,
        };

        Ok(PdfConfig {
            preferred_engine: optional_env("PDF_ENGINE"),
            wkhtmltopdf_path: optional_env("WKHTMLTOPDF_PATH").map(PathBuf::from),
            weasyprint_path: optional_env("WEASYPRINT_PATH").map(PathBuf::from),
            static_url: optional_env("STATIC_URL")
                .map(|v| normalize_prefix(&v))
                .unwrap_or(defaults.static_url),
            static_root: optional_env("STATIC_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_root),
            media_url: optional_env("MEDIA_URL")
                .map(|v| normalize_prefix(&v))
                .unwrap_or(defaults.media_url),
            media_root: optional_env("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_root),
            attempt_timeout,
            template_dir: optional_env("TEMPLATE_DIR").map(PathBuf::from),
            public_base_url: optional_env("PUBLIC_BASE_URL"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Returns the variable's value, treating an empty string as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// URL prefixes are compared with `starts_with`, so they must end in `/`
/// or `/static` would also match `/staticfiles/...`.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

fn parse_flag(raw: Option<&str>, default: bool) -> bool {
    match raw.map(|v| v.to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix_appends_slash() {
        assert_eq!(normalize_prefix("/static"), "/static/");
        assert_eq!(normalize_prefix("/media/"), "/media/");
        assert_eq!(
            normalize_prefix(" https://cdn.example.com/assets "),
            "https://cdn.example.com/assets/"
        );
    }

    #[test]
    fn test_parse_flag_defaults_on_garbage() {
        assert!(parse_flag(None, true));
        assert!(!parse_flag(Some("off"), true));
        assert!(parse_flag(Some("YES"), false));
        assert!(!parse_flag(Some("maybe"), false));
    }

    #[test]
    fn test_pdf_config_defaults() {
        let config = PdfConfig::default();
        assert_eq!(config.static_url, "/static/");
        assert_eq!(config.media_url, "/media/");
        assert_eq!(config.attempt_timeout, Duration::from_secs(30));
        assert!(config.preferred_engine.is_none());
    }
}
