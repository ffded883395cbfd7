//! Source platform detection from a media URL.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Platform a URL belongs to. `Universal` covers everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Platform {
    #[default]
    Universal,
    YouTube,
    Shorts,
    Instagram,
    Threads,
    Facebook,
    TikTok,
}

impl Platform {
    pub const ALL: [Platform; 7] = [
        Platform::Universal,
        Platform::YouTube,
        Platform::Shorts,
        Platform::Instagram,
        Platform::Threads,
        Platform::Facebook,
        Platform::TikTok,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Universal => "Universal",
            Platform::YouTube => "YouTube",
            Platform::Shorts => "Shorts",
            Platform::Instagram => "Instagram",
            Platform::Threads => "Threads",
            Platform::Facebook => "Facebook",
            Platform::TikTok => "TikTok",
        }
    }

    /// Hosts (without `www.`) owned by this platform.
    fn hosts(self) -> &'static [&'static str] {
        match self {
            Platform::YouTube | Platform::Shorts => &["youtube.com", "youtu.be", "m.youtube.com"],
            Platform::Instagram => &["instagram.com"],
            Platform::Threads => &["threads.net"],
            Platform::Facebook => &["facebook.com", "fb.watch"],
            Platform::TikTok => &["tiktok.com", "vm.tiktok.com"],
            Platform::Universal => &[],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown platform: {s}"))
    }
}

/// Parse `url`, accepting scheme-less input like `youtu.be/abc`.
fn parse_lenient(url: &str) -> Option<url::Url> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    url::Url::parse(url)
        .ok()
        .filter(|u| u.has_host())
        .or_else(|| url::Url::parse(&format!("https://{url}")).ok())
}

/// Detects the platform of `url`. Shorts is checked before YouTube since it
/// shares the domain; anything unrecognised is `Universal`.
pub fn detect_platform(url: &str) -> Platform {
    let Some(parsed) = parse_lenient(url) else {
        return Platform::Universal;
    };
    let Some(host) = parsed.host_str() else {
        return Platform::Universal;
    };
    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    // Every platform pattern requires a non-empty path.
    if parsed.path().trim_matches('/').is_empty() {
        return Platform::Universal;
    }

    if host == "youtube.com" && parsed.path().starts_with("/shorts/") {
        return Platform::Shorts;
    }

    Platform::ALL
        .into_iter()
        .filter(|p| *p != Platform::Shorts)
        .find(|p| p.hosts().contains(&host))
        .unwrap_or(Platform::Universal)
}

/// True when `url` parses and carries a `list` query parameter.
pub fn is_playlist(url: &str) -> bool {
    match url::Url::parse(url.trim()) {
        Ok(u) => u.query_pairs().any(|(k, _)| k == "list"),
        Err(_) => false,
    }
}
