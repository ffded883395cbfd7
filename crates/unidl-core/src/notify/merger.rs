//! Dual-source notification merger for one job.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::update::{Update, UpdateSource};
use crate::store::{JobId, JobStore, Subscription, SubscriptionId};

/// Poll period when the config doesn't override it.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Owns the push forwarder, the poll timer and the subscription for one job.
///
/// Dropping the merger tears both sources down.
pub struct NotificationMerger {
    job_id: JobId,
    store: Arc<dyn JobStore>,
    subscription: Option<SubscriptionId>,
    push_task: Option<JoinHandle<()>>,
    poll_task: Option<JoinHandle<()>>,
    closed: bool,
}

impl NotificationMerger {
    /// Subscribe and start polling for `job_id`.
    ///
    /// A failed subscribe is logged and not retried; the poll keeps covering
    /// the job. The first poll fires one `poll_interval` after opening.
    pub fn open(
        store: Arc<dyn JobStore>,
        job_id: JobId,
        poll_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<Update>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let (subscription, push_task) = match store.subscribe(job_id) {
            Ok(sub) => {
                let id = sub.id;
                (Some(id), Some(tokio::spawn(forward_push(sub, tx.clone()))))
            }
            Err(e) => {
                tracing::warn!(job_id, "push subscription failed, relying on poll: {:#}", e);
                (None, None)
            }
        };

        let poll_task = tokio::spawn(run_poll(Arc::clone(&store), job_id, poll_interval, tx));

        tracing::debug!(job_id, ?poll_interval, push = subscription.is_some(), "merger opened");

        let merger = Self {
            job_id,
            store,
            subscription,
            push_task,
            poll_task: Some(poll_task),
            closed: false,
        };
        (merger, rx)
    }

    /// Unsubscribe and stop both tasks. Returns true only on the first call.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        if let Some(id) = self.subscription.take() {
            self.store.unsubscribe(id);
        }
        if let Some(task) = self.push_task.take() {
            task.abort();
        }
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        tracing::debug!(job_id = self.job_id, "merger closed");
        true
    }
}

impl Drop for NotificationMerger {
    fn drop(&mut self) {
        self.close();
    }
}

async fn forward_push(mut sub: Subscription, tx: mpsc::UnboundedSender<Update>) {
    while let Some(row) = sub.rows.recv().await {
        if row.id != sub.job_id {
            continue;
        }
        if tx.send(Update::from_row(&row, UpdateSource::Push)).is_err() {
            break;
        }
    }
    tracing::trace!(job_id = sub.job_id, "push feed ended");
}

async fn run_poll(
    store: Arc<dyn JobStore>,
    job_id: JobId,
    poll_interval: Duration,
    tx: mpsc::UnboundedSender<Update>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately; skip it.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match store.read_one(job_id).await {
            Ok(row) => {
                if tx.send(Update::from_row(&row, UpdateSource::Poll)).is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!(job_id, "poll read failed, retrying next tick: {:#}", e),
        }
    }
}
