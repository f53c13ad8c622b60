use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::VersionCheckError;

static BASE_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<base\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Pulls the `href` of the `<base>` element out of the host document's
/// `<head>`. Returns `None` when the document does not declare one.
pub fn find_base_href(document: &str) -> Option<String> {
    let head_end = document
        .to_ascii_lowercase()
        .find("</head>")
        .unwrap_or(document.len());
    let head = &document[..head_end];

    let captures = BASE_TAG_REGEX.captures(head)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|href| href.as_str().to_string())
}

/// Resolves a base href against the host origin and returns its path with the
/// trailing slash removed, so `/` becomes the empty string.
pub fn resolve_base_path(origin: &str, base_href: Option<&str>) -> Result<String, VersionCheckError> {
    let origin = Url::parse(origin)?;
    let resolved = origin.join(base_href.unwrap_or(""))?;
    Ok(resolved.path().trim_end_matches('/').to_string())
}

pub fn discover_base_path(origin: &str, document: &str) -> Result<String, VersionCheckError> {
    let href = find_base_href(document);
    let path = resolve_base_path(origin, href.as_deref())?;
    log::debug!("resolved base path {path:?} from base href {href:?}");
    Ok(path)
}
