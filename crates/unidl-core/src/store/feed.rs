//! Row-update feed: the push side of the job store.
//!
//! Each subscriber is registered under a fresh [`SubscriptionId`] with the job
//! id it listens to. Stores call [`RowFeed::publish`] after every row UPDATE;
//! the row is delivered only to subscribers of that job.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::sync::mpsc;

use super::types::{JobId, JobRow};

/// Handle returned by `subscribe`, passed back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Live push subscription for one job. `rows` closes once unsubscribed.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub job_id: JobId,
    pub rows: mpsc::UnboundedReceiver<JobRow>,
}

/// Shared registry of subscription id -> (job id, sender).
#[derive(Default)]
pub struct RowFeed {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<SubscriptionId, (JobId, mpsc::UnboundedSender<JobRow>)>>,
}

impl RowFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for `job_id`.
    pub fn subscribe(&self, job_id: JobId) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, (job_id, tx));
        Subscription {
            id,
            job_id,
            rows: rx,
        }
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// Deliver `row` to every subscriber of `row.id`. Returns the number reached.
    pub fn publish(&self, row: &JobRow) -> usize {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers
            .values()
            .filter(|(job_id, _)| *job_id == row.id)
            .filter(|(_, tx)| tx.send(row.clone()).is_ok())
            .count()
    }

    /// Number of live subscriptions (all jobs).
    pub fn len(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
