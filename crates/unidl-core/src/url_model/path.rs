//! Title hints extracted from media URLs.

/// Picks a title hint from a media URL.
///
/// Prefers the `v` query parameter (YouTube/Facebook watch links), then the
/// last non-empty path segment with any extension stripped. Returns `None`
/// if the URL cannot be parsed or has no usable segment.
pub fn title_hint_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    if let Some((_, v)) = parsed.query_pairs().find(|(k, v)| k == "v" && !v.is_empty()) {
        return Some(v.into_owned());
    }
    let segment = parsed.path().split('/').filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    let stem = match segment.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => segment,
    };
    Some(stem.to_string())
}
