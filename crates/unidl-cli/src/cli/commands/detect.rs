//! `unidl detect <url>` – show what a URL would be submitted as.

use anyhow::Result;
use unidl_core::platform::{detect_platform, is_playlist};

pub fn run_detect(url: &str) -> Result<()> {
    let platform = detect_platform(url);
    println!("Platform: {platform}");
    println!("Playlist: {}", if is_playlist(url) { "yes" } else { "no" });
    Ok(())
}
