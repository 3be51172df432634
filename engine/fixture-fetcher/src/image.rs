//! Participant image URL normalization.
//!
//! The renderer drops whatever we give it straight into an `<img src>`, so the
//! output here must always be an absolute https URL. Anything we cannot trust
//! becomes a generated initials avatar.

use crate::raw::RawValue;
use url::Url;

/// Initials avatar service used for the generated placeholder
pub const AVATAR_BASE_URL: &str = "https://ui-avatars.com/api/";

const AVATAR_BACKGROUND: &str = "1e3a8a";
const AVATAR_FOREGROUND: &str = "ffffff";
const AVATAR_SIZE: u32 = 128;

/// Sub-keys checked, in order, when the image reference is an object
pub const IMAGE_OBJECT_KEYS: &[&str] =
    &["url", "src", "href", "large", "medium", "small", "original", "thumbnail"];

/// Shapes an upstream image reference can take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRef<'a> {
    Absent,
    Url(&'a str),
}

impl<'a> From<RawValue<'a>> for ImageRef<'a> {
    fn from(raw: RawValue<'a>) -> Self {
        if let Some(text) = raw.as_text() {
            return ImageRef::Url(text);
        }
        IMAGE_OBJECT_KEYS
            .iter()
            .find_map(|key| raw.get(key).as_text())
            .map(ImageRef::Url)
            .unwrap_or(ImageRef::Absent)
    }
}

/// Deterministic placeholder derived from the participant's name
pub fn placeholder_url(name: &str) -> String {
    let name = name.trim();
    let name = if name.is_empty() { "?" } else { name };
    format!(
        "{AVATAR_BASE_URL}?name={}&background={AVATAR_BACKGROUND}&color={AVATAR_FOREGROUND}\
         &size={AVATAR_SIZE}&bold=true",
        urlencoding::encode(name)
    )
}

/// Turn a raw image reference into a URL the renderer can use without checks
pub fn normalize_image_url(raw: RawValue<'_>, name: &str) -> String {
    match ImageRef::from(raw) {
        ImageRef::Absent => placeholder_url(name),
        ImageRef::Url(url) => upgrade_to_https(url).unwrap_or_else(|| placeholder_url(name)),
    }
}

fn upgrade_to_https(raw: &str) -> Option<String> {
    let candidate = if let Some(rest) = raw.strip_prefix("//") {
        format!("https://{rest}")
    } else if let Some(rest) = strip_prefix_ignore_case(raw, "http://") {
        format!("https://{rest}")
    } else if strip_prefix_ignore_case(raw, "https://").is_some() {
        raw.to_string()
    } else {
        // Root-relative paths and bare file names depend on a host we don't know
        return None;
    };

    let parsed = Url::parse(&candidate).ok()?;
    if parsed.scheme() != "https" || parsed.host_str().map_or(true, str::is_empty) {
        return None;
    }
    Some(parsed.to_string())
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}
