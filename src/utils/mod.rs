use std::path::{Component, Path, PathBuf};

use url::Url;

/// Characters stripped from every file and directory name we create.
pub const EXCLUDED_CHARACTERS: &[char] = &['"', ':', '?', '*', '<', '>', '|'];

/// Extension used when the download URL does not carry one.
pub const DEFAULT_VIDEO_EXTENSION: &str = "mp4";

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    let stripped: String = filename
        .chars()
        .filter(|c| !EXCLUDED_CHARACTERS.contains(c))
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip illegal characters from every normal component of `path`.
///
/// The prefix and root (`C:\`, `/`) are kept as-is, so a drive letter's
/// colon survives.
pub fn sanitize_path(path: &Path) -> PathBuf {
    path.components()
        .map(|component| match component {
            Component::Normal(part) => {
                PathBuf::from(sanitize_filename(&part.to_string_lossy()))
            }
            other => PathBuf::from(other.as_os_str()),
        })
        .collect()
}

/// Extension taken from the URL's trailing path segment, `mp4` when absent.
pub fn extension_from_url(url: &str) -> String {
    let segment = Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .unwrap_or_default();

    match segment.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => DEFAULT_VIDEO_EXTENSION.to_string(),
    }
}

/// Best-effort display date.
///
/// Prefers the machine-readable `data-datetime` value (date part before `T`),
/// otherwise takes whatever follows the first hyphen of the human label
/// ("Started - Feb 5, 2019"). Never fails: falls back to the trimmed input.
pub fn display_date(datetime_attr: Option<&str>, label: &str) -> String {
    if let Some(value) = datetime_attr.map(str::trim).filter(|v| !v.is_empty()) {
        return value.split('T').next().unwrap_or(value).to_string();
    }

    let label = label.trim();
    match label.split_once('-') {
        Some((_, rest)) if !rest.trim().is_empty() => rest.trim().to_string(),
        _ => label.to_string(),
    }
}

/// Join `href` against `base`, leaving absolute URLs untouched.
pub fn absolute_url(base: &str, href: &str) -> Option<String> {
    if let Ok(url) = Url::parse(href) {
        return Some(url.to_string());
    }
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(|url| url.to_string())
}

/// Collapse runs of whitespace in scraped text.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
