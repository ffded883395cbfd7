//! In-memory job store with failure injection and call counters.
//!
//! `emit` plays the engine: it patches the row and pushes it to subscribers.
//! Writes coming from the orchestrator (`update`) are recorded and applied
//! but not pushed, so tests control exactly what the push side delivers.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use unidl_core::store::{
    JobId, JobInput, JobPatch, JobRow, JobStore, RowFeed, Subscription, SubscriptionId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    Ok,
    Fail,
    NoId,
}

pub struct ScriptedStore {
    pub feed: RowFeed,
    rows: Mutex<HashMap<JobId, JobRow>>,
    next_id: AtomicI64,
    insert_mode: Mutex<InsertMode>,
    failing_reads: AtomicUsize,
    fail_updates: AtomicBool,
    fail_subscribe: AtomicBool,
    pub inserts: AtomicUsize,
    pub subscribes: AtomicUsize,
    pub unsubscribes: AtomicUsize,
    pub failed_reads: AtomicUsize,
    pub writes: Mutex<Vec<(JobId, JobPatch)>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self {
            feed: RowFeed::new(),
            rows: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            insert_mode: Mutex::new(InsertMode::Ok),
            failing_reads: AtomicUsize::new(0),
            fail_updates: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
            inserts: AtomicUsize::new(0),
            subscribes: AtomicUsize::new(0),
            unsubscribes: AtomicUsize::new(0),
            failed_reads: AtomicUsize::new(0),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn set_insert_mode(&self, mode: InsertMode) {
        *self.insert_mode.lock().unwrap() = mode;
    }

    /// The next `n` reads return an error.
    pub fn fail_next_reads(&self, n: usize) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Engine-side write: patch the row and push it.
    pub fn emit(&self, id: JobId, patch: JobPatch) -> usize {
        let row = self.patch_row(id, &patch);
        self.feed.publish(&row)
    }

    /// Engine-side write visible only to polling.
    pub fn set_quiet(&self, id: JobId, patch: JobPatch) {
        self.patch_row(id, &patch);
    }

    pub fn row(&self, id: JobId) -> Option<JobRow> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn patch_row(&self, id: JobId, patch: &JobPatch) -> JobRow {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get_mut(&id).expect("row exists");
        row.apply(patch);
        row.clone()
    }
}

#[async_trait]
impl JobStore for ScriptedStore {
    async fn insert(&self, input: &JobInput) -> Result<Option<JobId>> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        match *self.insert_mode.lock().unwrap() {
            InsertMode::Fail => anyhow::bail!("insert rejected"),
            InsertMode::NoId => Ok(None),
            InsertMode::Ok => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                self.rows
                    .lock()
                    .unwrap()
                    .insert(id, JobRow::scanning(id, input));
                Ok(Some(id))
            }
        }
    }

    async fn update(&self, id: JobId, patch: &JobPatch) -> Result<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            anyhow::bail!("write timed out");
        }
        self.writes.lock().unwrap().push((id, patch.clone()));
        self.patch_row(id, patch);
        Ok(())
    }

    async fn read_one(&self, id: JobId) -> Result<JobRow> {
        let pending = self.failing_reads.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_reads.store(pending - 1, Ordering::SeqCst);
            self.failed_reads.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("read failed");
        }
        self.row(id)
            .ok_or_else(|| anyhow::anyhow!("job {} not found", id))
    }

    fn subscribe(&self, id: JobId) -> Result<Subscription> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            anyhow::bail!("realtime channel unavailable");
        }
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        Ok(self.feed.subscribe(id))
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        self.feed.unsubscribe(id);
    }
}
