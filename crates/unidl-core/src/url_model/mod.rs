//! Output filename derivation for downloaded media.
//!
//! Builds a Linux-safe `<title>.<container>` name from the media URL. The
//! simulated engine uses it to name finished downloads.

mod path;
mod sanitize;

pub use path::title_hint_from_url;
pub use sanitize::sanitize_filename_for_linux;

/// Title used when the URL yields nothing usable.
const DEFAULT_TITLE: &str = "media";

/// Derives `<title>.<container>` for a download of `url`.
///
/// The title comes from [`title_hint_from_url`] and is prefixed with the
/// platform name when one is given. Both parts are sanitized.
///
/// # Examples
///
/// - `derive_media_filename("https://youtu.be/abc", Some("YouTube"), "mp4")` → `"YouTube_abc.mp4"`
/// - `derive_media_filename("https://example.com/", None, "webm")` → `"media.webm"`
pub fn derive_media_filename(url: &str, platform: Option<&str>, container: &str) -> String {
    let title = title_hint_from_url(url)
        .map(|t| sanitize_filename_for_linux(&t))
        .filter(|t| !t.is_empty() && t != "." && t != "..")
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let stem = match platform {
        Some(p) if !p.is_empty() => sanitize_filename_for_linux(&format!("{p}_{title}")),
        _ => title,
    };

    let ext = sanitize_filename_for_linux(container.trim_start_matches('.'));
    if ext.is_empty() {
        stem
    } else {
        format!("{stem}.{ext}")
    }
}
