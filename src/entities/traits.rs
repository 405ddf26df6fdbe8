//! Abstract traits for dependency inversion.
//!
//! These traits define interfaces that `entities` needs from infrastructure,
//! allowing `core` to depend on `entities` (not vice versa).
//!
//! Implementations live in `core/` module.

use std::sync::Arc;

use super::media::FetchError;

/// Simple cache statistics (subset exposed to UI / status output)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    /// Slides currently holding a buffer
    pub buffered_slides: usize,
    /// Sum of buffered payload sizes
    pub buffered_bytes: usize,
}

impl CacheStatsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

/// Abstract worker pool interface.
///
/// Allows the loader to schedule background fetches without knowing
/// the concrete thread pool implementation.
pub trait WorkerPool: Send + Sync {
    /// Run closure on a worker thread (or later, for deferred test pools).
    fn execute(&self, f: Box<dyn FnOnce() + Send + 'static>);
}

/// Blocking fetch of a media locator (URL or local path) into memory.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError>;
}

/// Sink for asynchronous slide loads.
///
/// `Slide::load` hands requests here; the result comes back later as a
/// `LoadCompletedEvent` tagged with the same `slide` and `epoch`.
pub trait FetchQueue {
    fn request(&self, slide: usize, epoch: u64, locator: &str);
}

/// Blanket impl: Arc<T> implements traits if T does
impl<T: WorkerPool + ?Sized> WorkerPool for Arc<T> {
    fn execute(&self, f: Box<dyn FnOnce() + Send + 'static>) {
        (**self).execute(f)
    }
}

impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(locator)
    }
}
