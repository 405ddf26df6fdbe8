//! Thread pool for background media fetches.
//!
//! Uses work-stealing deques:
//! - New tasks go to the global injector
//! - Idle workers steal from each other
//! - Zero lock contention between workers
//!
//! Stale results are not cancelled here; slides tag requests with their
//! load epoch and drop late completions themselves.

use crossbeam::deque::{Injector, Worker};
use log::trace;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::entities::WorkerPool;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fetch worker pool with work-stealing.
///
/// # Example
/// ```ignore
/// let workers = Workers::new(4)?;
/// workers.execute(move || {
///     let bytes = fetcher.fetch(&url);
///     emitter.emit(LoadCompletedEvent { .. });
/// });
/// ```
pub struct Workers {
    injector: Arc<Injector<Job>>,         // Global queue for external tasks
    handles: Vec<thread::JoinHandle<()>>, // Thread handles for proper shutdown
    shutdown: Arc<AtomicBool>,            // Shutdown signal
}

impl Workers {
    /// Create worker pool with `num_threads` fetch threads (at least one).
    ///
    /// Fetches are I/O bound, so the count is about parallel downloads
    /// rather than cores.
    pub fn new(num_threads: usize) -> io::Result<Self> {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers_local: Vec<Worker<Job>> = Vec::new();
        let mut stealers = Vec::new();
        let mut handles = Vec::new();

        for _ in 0..num_threads {
            let worker: Worker<Job> = Worker::new_fifo();
            stealers.push(worker.stealer());
            workers_local.push(worker);
        }

        for (worker_id, worker) in workers_local.into_iter().enumerate() {
            let injector = Arc::clone(&injector);
            let shutdown = Arc::clone(&shutdown);
            let stealers = stealers.clone();

            let handle = thread::Builder::new()
                .name(format!("slideplay-fetch-{}", worker_id))
                .spawn(move || {
                    trace!("Worker {} started", worker_id);

                    loop {
                        // 1. Own queue
                        if let Some(job) = worker.pop() {
                            job();
                            continue;
                        }

                        // 2. Global injector
                        if let Some(job) = injector.steal().success() {
                            job();
                            continue;
                        }

                        // 3. Steal from other workers
                        let mut found_work = false;
                        for stealer in &stealers {
                            if let Some(job) = stealer.steal().success() {
                                job();
                                found_work = true;
                                break;
                            }
                        }

                        if found_work {
                            continue;
                        }

                        // 4. Check shutdown
                        if shutdown.load(Ordering::Relaxed) {
                            break;
                        }

                        // 5. No work - short sleep to avoid CPU spin
                        thread::sleep(std::time::Duration::from_millis(1));
                    }

                    trace!("Worker {} stopped", worker_id);
                })?;

            handles.push(handle);
        }

        trace!("Workers initialized: {} threads (work-stealing)", num_threads);

        Ok(Self { injector, handles, shutdown })
    }

    /// Execute closure on a worker thread.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.injector.push(Box::new(f));
    }

    pub fn num_threads(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        use std::time::{Duration, Instant};

        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);

        self.shutdown.store(true, Ordering::SeqCst);

        // A stalled HTTP fetch can hold a thread indefinitely; give up after
        // 500ms and let the process take it down.
        let deadline = Instant::now() + Duration::from_millis(500);

        let handles = std::mem::take(&mut self.handles);
        for handle in handles {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, exiting anyway");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }

        trace!("All {} workers stopped gracefully", num_threads);
    }
}

impl WorkerPool for Workers {
    fn execute(&self, f: Box<dyn FnOnce() + Send + 'static>) {
        self.injector.push(f);
    }
}
