//! Persistent job-status store.
//!
//! One row per submitted job. The external engine writes status, formats and
//! progress; the orchestrator inserts rows and writes the user's selection.
//! Row updates are pushed to subscribers through a [`RowFeed`].

mod feed;
mod sqlite;
mod types;

pub use feed::{RowFeed, Subscription, SubscriptionId};
pub use sqlite::SqliteJobStore;
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;

/// Store contract the orchestrator depends on.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Insert a row in `scanning` state. `Ok(None)` means the store accepted
    /// the write but handed back no id.
    async fn insert(&self, input: &JobInput) -> Result<Option<JobId>>;

    /// Point update; pushes the new row to subscribers of `id`.
    async fn update(&self, id: JobId, patch: &JobPatch) -> Result<()>;

    /// Point read of the full row.
    async fn read_one(&self, id: JobId) -> Result<JobRow>;

    /// Subscribe to row UPDATE events for `id`.
    fn subscribe(&self, id: JobId) -> Result<Subscription>;

    /// Drop a subscription. Unknown or already-removed ids are a no-op.
    fn unsubscribe(&self, id: SubscriptionId);
}
