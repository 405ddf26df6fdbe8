//! Media loader: turns slide load requests into background fetch jobs.
//!
//! `Slide::load` calls [`FetchQueue::request`]; the loader schedules a job on
//! the worker pool that runs the blocking fetch and posts a
//! `LoadCompletedEvent` back to the presentation's queue. Nothing on the
//! control thread ever waits for the network.

use log::{debug, trace};
use std::io::Read;
use std::sync::Arc;

use crate::core::event_bus::EventEmitter;
use crate::core::presentation_events::LoadCompletedEvent;
use crate::entities::{FetchError, FetchQueue, Fetcher, MediaBuffer, WorkerPool};

/// Fetch scheduler bound to one event queue.
#[derive(Clone)]
pub struct MediaLoader {
    pool: Arc<dyn WorkerPool>,
    fetcher: Arc<dyn Fetcher>,
    emitter: EventEmitter,
}

impl MediaLoader {
    pub fn new(pool: Arc<dyn WorkerPool>, fetcher: Arc<dyn Fetcher>, emitter: EventEmitter) -> Self {
        Self { pool, fetcher, emitter }
    }
}

impl FetchQueue for MediaLoader {
    fn request(&self, slide: usize, epoch: u64, locator: &str) {
        let fetcher = Arc::clone(&self.fetcher);
        let emitter = self.emitter.clone();
        let locator = locator.to_string();
        trace!("Queue fetch slide #{} epoch {} <- {}", slide, epoch, locator);

        self.pool.execute(Box::new(move || {
            let outcome = fetcher.fetch(&locator).map(MediaBuffer::from);
            emitter.emit(LoadCompletedEvent { slide, epoch, outcome });
        }));
    }
}

/// Blocking fetcher for `http(s)://` URLs (ureq) and local paths.
#[derive(Debug, Default, Clone)]
pub struct HttpFetcher;

impl HttpFetcher {
    pub fn new() -> Self {
        Self
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            let transport = |message: String| FetchError::Transport { locator: locator.to_string(), message };

            let resp = ureq::get(locator).call().map_err(|e| transport(e.to_string()))?;
            let mut body = resp.into_body();
            let mut bytes = Vec::new();
            // as_reader() has no size cap; clips routinely exceed read_to_vec's default limit
            body.as_reader()
                .read_to_end(&mut bytes)
                .map_err(|e| transport(e.to_string()))?;
            debug!("GET {} -> {} bytes", locator, bytes.len());
            Ok(bytes)
        } else {
            let path = locator.strip_prefix("file://").unwrap_or(locator);
            std::fs::read(path).map_err(|e| FetchError::Io { locator: locator.to_string(), message: e.to_string() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event_bus::{EventBus, downcast_event};
    use crate::core::testing::{ManualPool, MockFetcher};

    #[test]
    fn test_request_posts_completion() {
        let bus = EventBus::new();
        let pool = Arc::new(ManualPool::default());
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.fail("bad.mp4");
        let loader = MediaLoader::new(pool.clone(), fetcher.clone(), bus.emitter());

        loader.request(0, 3, "good.mp4");
        loader.request(1, 0, "bad.mp4");
        // Nothing runs until the pool does
        assert_eq!(bus.queue_len(), 0);
        assert_eq!(pool.pending(), 2);

        pool.run_all();
        let events = bus.poll();
        assert_eq!(events.len(), 2);

        let ok = downcast_event::<LoadCompletedEvent>(&events[0]).expect("load event");
        assert_eq!((ok.slide, ok.epoch), (0, 3));
        assert!(ok.outcome.is_ok());

        let failed = downcast_event::<LoadCompletedEvent>(&events[1]).expect("load event");
        assert!(matches!(failed.outcome, Err(FetchError::Transport { .. })));
        assert_eq!(fetcher.calls("good.mp4"), 1);
    }

    #[test]
    fn test_http_fetcher_reads_local_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"0000ftypisom").expect("write");

        let fetcher = HttpFetcher::new();
        let locator = path.to_string_lossy().into_owned();
        assert_eq!(fetcher.fetch(&locator).expect("read"), b"0000ftypisom");
        assert_eq!(fetcher.fetch(&format!("file://{}", locator)).expect("read").len(), 12);

        let missing = dir.path().join("nope.mp4").to_string_lossy().into_owned();
        assert!(matches!(fetcher.fetch(&missing), Err(FetchError::Io { .. })));
    }
}
