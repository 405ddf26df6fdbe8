//! Test doubles for the engine: deterministic pool, scripted fetcher,
//! recording surface.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::core::surface::{PlaybackSurface, SurfaceError, SurfaceId};
use crate::entities::{FetchError, FetchQueue, Fetcher, PlayableSource, Slide, SlideKind, WorkerPool};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Deck with `slide{i}` names and `slide{i}.mp4` locators
pub fn deck(kinds: &[SlideKind]) -> Vec<Slide> {
    kinds
        .iter()
        .enumerate()
        .map(|(i, kind)| Slide::new(i, format!("slide{}", i), *kind, format!("slide{}.mp4", i)))
        .collect()
}

/// Minimal MP4 header followed by `tag`
pub fn mp4_bytes(tag: &str) -> Vec<u8> {
    let mut bytes = vec![0, 0, 0, 16];
    bytes.extend_from_slice(b"ftypisom");
    bytes.extend_from_slice(tag.as_bytes());
    bytes
}

/// Queue that records requests without fetching
#[derive(Default)]
pub struct RecordingQueue {
    requests: RefCell<Vec<(usize, u64, String)>>,
}

impl RecordingQueue {
    pub fn take(&self) -> Vec<(usize, u64, String)> {
        std::mem::take(&mut *self.requests.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl FetchQueue for RecordingQueue {
    fn request(&self, slide: usize, epoch: u64, locator: &str) {
        self.requests.borrow_mut().push((slide, epoch, locator.to_string()));
    }
}

/// Pool that holds jobs until the test runs them
#[derive(Default)]
pub struct ManualPool {
    jobs: Mutex<Vec<Job>>,
}

impl ManualPool {
    pub fn pending(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn run_all(&self) {
        let jobs = std::mem::take(&mut *self.jobs.lock().unwrap());
        for job in jobs {
            job();
        }
    }

    /// Run the most recently queued job only
    pub fn run_last(&self) {
        let job = self.jobs.lock().unwrap().pop();
        if let Some(job) = job {
            job();
        }
    }
}

impl WorkerPool for ManualPool {
    fn execute(&self, f: Job) {
        self.jobs.lock().unwrap().push(f);
    }
}

/// Fetcher serving MP4-looking payloads, with per-locator failures
#[derive(Default)]
pub struct MockFetcher {
    calls: Mutex<HashMap<String, usize>>,
    failing: Mutex<HashSet<String>>,
    garbage: Mutex<HashSet<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, locator: &str) {
        self.failing.lock().unwrap().insert(locator.to_string());
    }

    pub fn heal(&self, locator: &str) {
        self.failing.lock().unwrap().remove(locator);
    }

    /// Serve bytes that are not an MP4
    pub fn serve_garbage(&self, locator: &str) {
        self.garbage.lock().unwrap().insert(locator.to_string());
    }

    pub fn calls(&self, locator: &str) -> usize {
        self.calls.lock().unwrap().get(locator).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

impl Fetcher for MockFetcher {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
        *self.calls.lock().unwrap().entry(locator.to_string()).or_default() += 1;
        if self.failing.lock().unwrap().contains(locator) {
            return Err(FetchError::Transport { locator: locator.to_string(), message: "connection refused".into() });
        }
        if self.garbage.lock().unwrap().contains(locator) {
            return Ok(b"<html>not found</html>".to_vec());
        }
        Ok(mp4_bytes(locator))
    }
}

/// Surface that records every call; acks are emitted by the test.
#[derive(Debug)]
pub struct RecordingSurface {
    id: SurfaceId,
    pub slide: Option<usize>,
    pub source: Option<PlayableSource>,
    pub visible: bool,
    pub playing: bool,
    pub ticket: Option<u64>,
    pub plays: Vec<u64>,
    pub restarts: Vec<u64>,
    pub pauses: usize,
    pub reject: bool,
}

impl RecordingSurface {
    pub fn new(id: SurfaceId) -> Self {
        Self {
            id,
            slide: None,
            source: None,
            visible: false,
            playing: false,
            ticket: None,
            plays: Vec::new(),
            restarts: Vec::new(),
            pauses: 0,
            reject: false,
        }
    }
}

impl PlaybackSurface for RecordingSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn set_source(&mut self, slide: usize, source: &PlayableSource) -> Result<(), SurfaceError> {
        if self.reject {
            self.slide = None;
            self.source = None;
            return Err(SurfaceError::UnsupportedFormat { slide, reason: "rejected by test".into() });
        }
        self.slide = Some(slide);
        self.source = Some(source.clone());
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn play(&mut self, ticket: u64) {
        self.playing = true;
        self.ticket = Some(ticket);
        self.plays.push(ticket);
    }

    fn pause(&mut self) {
        self.playing = false;
        self.pauses += 1;
    }

    fn restart(&mut self, ticket: u64) {
        self.playing = true;
        self.ticket = Some(ticket);
        self.restarts.push(ticket);
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn position(&self) -> f64 {
        if self.playing { 1.25 } else { 0.0 }
    }
}
