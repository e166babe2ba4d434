// Background job system for index maintenance. Rebuilds run off the request
// path; queries keep reading the old graph until the rebuilt one is swapped
// in under the write lock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use crate::index::{IndexRecord, ParcelIndex};

/// Background job trait.
pub trait BackgroundJob: Send + 'static {
    fn execute(self: Box<Self>);
}

struct Worker {
    jobs: Arc<Mutex<VecDeque<Box<dyn BackgroundJob>>>>,
    condvar: Arc<Condvar>,
    running: Arc<AtomicBool>,
}

impl Worker {
    fn new() -> Self {
        Self {
            jobs: Arc::new(Mutex::new(VecDeque::new())),
            condvar: Arc::new(Condvar::new()),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    fn submit(&self, job: Box<dyn BackgroundJob>) {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.push_back(job);
        self.condvar.notify_one();
    }

    fn pending(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        self.condvar.notify_all();
    }
}

/// Single-worker job queue for index maintenance.
pub struct BackgroundJobSystem {
    worker: Arc<Worker>,
    processed: Arc<AtomicU64>,
}

impl BackgroundJobSystem {
    pub fn new() -> Self {
        let worker = Arc::new(Worker::new());
        let processed = Arc::new(AtomicU64::new(0));

        let worker_for_thread = worker.clone();
        let processed_for_thread = processed.clone();
        let handle = thread::Builder::new()
            .name("equitx-index-maintenance".to_string())
            .spawn(move || {
                let jobs = worker_for_thread.jobs.clone();
                let condvar = worker_for_thread.condvar.clone();
                let running = worker_for_thread.running.clone();

                loop {
                    let mut guard = jobs.lock().unwrap();
                    while guard.is_empty() && running.load(Ordering::Acquire) {
                        guard = condvar.wait(guard).unwrap();
                    }
                    if !running.load(Ordering::Acquire) && guard.is_empty() {
                        break;
                    }
                    while let Some(job) = guard.pop_front() {
                        drop(guard); // release the queue while the job runs
                        job.execute();
                        processed_for_thread.fetch_add(1, Ordering::Relaxed);
                        guard = jobs.lock().unwrap();
                    }
                }
            })
            .expect("Failed to spawn index maintenance thread");

        // Detached: the worker lives for the process.
        std::mem::forget(handle);

        Self { worker, processed }
    }

    pub fn submit(&self, job: Box<dyn BackgroundJob>) {
        self.worker.submit(job);
    }

    pub fn pending_jobs(&self) -> usize {
        self.worker.pending()
    }

    pub fn jobs_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn shutdown(&self) {
        self.worker.shutdown();
    }
}

impl Default for BackgroundJobSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Rebuilds an index from a fresh batch of entries and swaps it in.
pub struct IndexRebuildJob {
    index: Arc<ParcelIndex>,
    records: Vec<IndexRecord>,
}

impl IndexRebuildJob {
    pub fn new(index: Arc<ParcelIndex>, records: Vec<IndexRecord>) -> Self {
        Self { index, records }
    }
}

impl BackgroundJob for IndexRebuildJob {
    fn execute(self: Box<Self>) {
        if let Err(err) = self.index.rebuild(self.records) {
            // A bad batch must not poison the live index; the old graph
            // stays in place.
            eprintln!("index rebuild failed: {err}");
        }
    }
}

/// Global background job system, initialized on first use.
static BACKGROUND_SYSTEM: std::sync::OnceLock<Arc<BackgroundJobSystem>> = std::sync::OnceLock::new();

pub fn get_background_system() -> Arc<BackgroundJobSystem> {
    BACKGROUND_SYSTEM
        .get_or_init(|| Arc::new(BackgroundJobSystem::new()))
        .clone()
}

/// Submit an index rebuild if none is already in flight.
/// Returns false when a rebuild is already queued or running.
pub fn schedule_rebuild(index: &Arc<ParcelIndex>, records: Vec<IndexRecord>) -> bool {
    if !index.begin_rebuild() {
        return false;
    }
    get_background_system().submit(Box::new(IndexRebuildJob::new(index.clone(), records)));
    true
}
