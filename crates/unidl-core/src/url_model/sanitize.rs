//! Filesystem-safe filename sanitization.

/// Longest name we emit, in bytes (Linux NAME_MAX).
const NAME_MAX: usize = 255;

/// Characters that break paths or shells on common filesystems.
fn is_unsafe(c: char) -> bool {
    c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
}

/// Sanitizes a candidate filename for the output directory.
///
/// Unsafe characters and whitespace become `_`, runs of `_` collapse to one,
/// leading/trailing dots and underscores are trimmed, and the result is cut
/// to [`NAME_MAX`] bytes on a char boundary.
pub fn sanitize_filename_for_linux(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if is_unsafe(c) || c.is_whitespace() { '_' } else { c };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut take = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}
