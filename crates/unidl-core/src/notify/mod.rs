//! Notification merging: push subscription plus polling fallback.
//!
//! Both sources feed one [`Update`] stream per job. Duplicates are passed
//! through; the orchestrator's transitions are idempotent.

mod merger;
mod update;

pub use merger::{NotificationMerger, DEFAULT_POLL_INTERVAL};
pub use update::{Update, UpdateSource};
