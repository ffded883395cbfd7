//! `unidl status` – show the most recent jobs.

use anyhow::Result;
use unidl_core::logging;
use unidl_core::store::SqliteJobStore;

pub async fn run_status(store: &SqliteJobStore, limit: u32) -> Result<()> {
    let jobs = store.list_recent(limit).await?;
    if jobs.is_empty() {
        println!("No downloads yet.");
    } else {
        println!("{:<6} {:<22} {:<28} {}", "ID", "STATUS", "FILE", "URL");
        for j in jobs {
            println!(
                "{:<6} {:<22} {:<28} {}",
                j.id,
                j.status.as_str(),
                j.filename.as_deref().unwrap_or("-"),
                j.url
            );
        }
    }
    if let Ok(path) = logging::log_path() {
        println!("Log: {}", path.display());
    }
    Ok(())
}
