//! Resource Resolver: maps asset URIs found in rendered HTML to files on disk.
//!
//! Engines without a network stack cannot fetch `/static/...` or `/media/...`
//! from the running server, so the URI is rewritten to the configured root.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::config::PdfConfig;

/// Raised when a URI under a known prefix has no backing file.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("resource '{uri}' could not be resolved; asset URIs must start with {static_prefix} or {media_prefix} and point at an existing file")]
pub struct ResourceNotFoundError {
    pub uri: String,
    pub static_prefix: String,
    pub media_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedResource {
    /// Local file the engine can read directly.
    File(PathBuf),
    /// Anything outside the two prefixes, returned unchanged.
    External(String),
}

#[derive(Debug, Clone)]
pub struct ResourceResolver {
    static_url: String,
    static_root: PathBuf,
    media_url: String,
    media_root: PathBuf,
}

impl ResourceResolver {
    pub fn new(config: &PdfConfig) -> Self {
        Self {
            static_url: config.static_url.clone(),
            static_root: config.static_root.clone(),
            media_url: config.media_url.clone(),
            media_root: config.media_root.clone(),
        }
    }

    /// Media is checked before static: media roots commonly live under the
    /// static tree and use the more specific prefix.
    pub fn resolve(&self, uri: &str) -> Result<ResolvedResource, ResourceNotFoundError> {
        let (root, remainder) = if let Some(rest) = uri.strip_prefix(&self.media_url) {
            (&self.media_root, rest)
        } else if let Some(rest) = uri.strip_prefix(&self.static_url) {
            (&self.static_root, rest)
        } else {
            return Ok(ResolvedResource::External(uri.to_string()));
        };

        let remainder = remainder
            .split(['?', '#'])
            .next()
            .unwrap_or_default();

        match join_within(root, remainder) {
            Some(path) if path.is_file() => Ok(ResolvedResource::File(path)),
            _ => Err(self.not_found(uri)),
        }
    }

    fn not_found(&self, uri: &str) -> ResourceNotFoundError {
        ResourceNotFoundError {
            uri: uri.to_string(),
            static_prefix: self.static_url.clone(),
            media_prefix: self.media_url.clone(),
        }
    }
}

/// Joins `relative` under `root`, refusing anything that would step outside it.
fn join_within(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(path)
}

/// True for URIs carrying a scheme (`https:`, `data:`, `file:` ...) or a
/// protocol-relative `//host` form.
pub fn is_absolute_uri(uri: &str) -> bool {
    if uri.starts_with("//") {
        return true;
    }
    match uri.split_once(':') {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _static_dir: TempDir,
        _media_dir: TempDir,
        resolver: ResourceResolver,
        static_root: PathBuf,
        media_root: PathBuf,
    }

    fn fixture() -> Fixture {
        let static_dir = tempfile::tempdir().unwrap();
        let media_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("y.css"), "body {}").unwrap();
        std::fs::write(media_dir.path().join("x.png"), [0x89, b'P', b'N', b'G']).unwrap();

        let config = PdfConfig {
            static_root: static_dir.path().to_path_buf(),
            media_root: media_dir.path().to_path_buf(),
            ..PdfConfig::default()
        };
        Fixture {
            static_root: static_dir.path().to_path_buf(),
            media_root: media_dir.path().to_path_buf(),
            resolver: ResourceResolver::new(&config),
            _static_dir: static_dir,
            _media_dir: media_dir,
        }
    }

    #[test]
    fn test_media_uri_maps_to_media_root() {
        let f = fixture();
        assert_eq!(
            f.resolver.resolve("/media/x.png").unwrap(),
            ResolvedResource::File(f.media_root.join("x.png"))
        );
    }

    #[test]
    fn test_static_uri_maps_to_static_root() {
        let f = fixture();
        assert_eq!(
            f.resolver.resolve("/static/y.css").unwrap(),
            ResolvedResource::File(f.static_root.join("y.css"))
        );
    }

    #[test]
    fn test_query_string_is_ignored_when_mapping() {
        let f = fixture();
        assert_eq!(
            f.resolver.resolve("/static/y.css?v=3").unwrap(),
            ResolvedResource::File(f.static_root.join("y.css"))
        );
    }

    #[test]
    fn test_absolute_uri_returned_unchanged() {
        let f = fixture();
        let uri = "https://cdn.example.com/logo.png";
        assert_eq!(
            f.resolver.resolve(uri).unwrap(),
            ResolvedResource::External(uri.to_string())
        );
    }

    #[test]
    fn test_missing_file_under_prefix_is_not_found() {
        let f = fixture();
        let err = f.resolver.resolve("/media/missing.png").unwrap_err();
        assert_eq!(err.uri, "/media/missing.png");
        let message = err.to_string();
        assert!(message.contains("/static/") && message.contains("/media/"));
    }

    #[test]
    fn test_parent_segments_cannot_escape_root() {
        let outer = tempfile::tempdir().unwrap();
        let static_root = outer.path().join("static");
        std::fs::create_dir(&static_root).unwrap();
        std::fs::write(outer.path().join("secret.txt"), "x").unwrap();
        // The file is reachable from the root by a plain join.
        assert!(static_root.join("../secret.txt").is_file());

        let config = PdfConfig {
            static_root: static_root.clone(),
            ..PdfConfig::default()
        };
        let resolver = ResourceResolver::new(&config);
        let err = resolver.resolve("/static/../secret.txt").unwrap_err();
        assert_eq!(err.uri, "/static/../secret.txt");
        assert!(resolver.resolve("/static/./../secret.txt").is_err());
    }

    #[test]
    fn test_join_within_rejects_parent_and_root_components() {
        let root = Path::new("/srv/static");
        assert_eq!(join_within(root, "css/./a.css"), Some(root.join("css/a.css")));
        assert_eq!(join_within(root, "../secret.txt"), None);
        assert_eq!(join_within(root, "css/../../secret.txt"), None);
        assert_eq!(join_within(root, "/etc/passwd"), None);
    }

    #[test]
    fn test_is_absolute_uri() {
        assert!(is_absolute_uri("https://example.com/a.png"));
        assert!(is_absolute_uri("data:image/png;base64,AAAA"));
        assert!(is_absolute_uri("//cdn.example.com/a.css"));
        assert!(!is_absolute_uri("/static/a.css"));
        assert!(!is_absolute_uri("img/a.png"));
        assert!(!is_absolute_uri(":oops"));
    }
}
