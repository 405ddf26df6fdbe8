//! Slide - one playable clip of the deck
//!
//! A slide is an immutable descriptor (id, name, behavior, locator) plus
//! cache state that only the active `MediaCache` strategy touches:
//! - `buffer`: fetched clip bytes (Windowed strategy only)
//! - `loading` + `epoch`: in-flight fetch tracking
//!
//! # Epochs
//!
//! Every fetch is tagged with the slide's epoch at request time. `unload()`
//! bumps the epoch, so a fetch that resolves after eviction is recognised
//! as stale and dropped instead of silently refilling the buffer.

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::media::{FetchError, MediaBuffer, PlayableSource};
use super::traits::FetchQueue;

/// What happens when a slide's clip reaches its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideKind {
    /// Stop on the last frame, wait for input.
    #[default]
    Normal,
    /// Replay until navigated away.
    Loop,
    /// Advance to the next slide without input.
    Skip,
    /// Replay until a navigation target is pending, then go there.
    CompleteLoop,
}

impl SlideKind {
    pub const ALL: &[SlideKind] = &[
        SlideKind::Normal,
        SlideKind::Loop,
        SlideKind::Skip,
        SlideKind::CompleteLoop,
    ];

    /// Map a manifest token to a kind. Unknown tokens fall back to `Normal`.
    pub fn resolve_behavior(raw: &str) -> SlideKind {
        match raw {
            "normal" => SlideKind::Normal,
            "loop" => SlideKind::Loop,
            "skip" => SlideKind::Skip,
            "complete_loop" => SlideKind::CompleteLoop,
            other => {
                warn!("Unsupported slide type '{}', treating as normal", other);
                SlideKind::Normal
            }
        }
    }

    /// Manifest token for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            SlideKind::Normal => "normal",
            SlideKind::Loop => "loop",
            SlideKind::Skip => "skip",
            SlideKind::CompleteLoop => "complete_loop",
        }
    }
}

impl fmt::Display for SlideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which cache strategy asks for a playable source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheKind {
    /// Always stream from the locator
    Direct,
    /// Serve from the slide's local buffer
    Windowed,
}

/// Result of asking a slide (or cache) to make media available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Already buffered, usable right now
    Ready,
    /// A fetch is in flight; wait for `LoadCompletedEvent`
    Pending,
}

/// What a completed fetch did to the slide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Buffer filled
    Stored,
    /// Transport failure; buffer untouched
    Failed,
    /// Stale epoch or unrequested result; ignored
    Discarded,
}

/// Slide errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideError {
    /// Windowed source requested before `load` finished
    NotLoaded { slide: usize },
}

impl fmt::Display for SlideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlideError::NotLoaded { slide } => write!(f, "Slide #{} is not loaded", slide),
        }
    }
}

impl std::error::Error for SlideError {}

/// Exported checkpoint record.
///
/// `time_stamp` is `-1` when no resume offset was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideCheckpoint {
    pub slide_type: String,
    pub name: String,
    pub slide_id: usize,
    pub video: String,
    pub time_stamp: f64,
}

/// Single slide of the deck
#[derive(Debug, Clone)]
pub struct Slide {
    id: usize,
    name: String,
    kind: SlideKind,
    source_locator: String,
    /// Manifest bookkeeping carried through untouched
    first_animation: Option<u32>,
    after_last_animation: Option<u32>,

    buffer: Option<MediaBuffer>,
    loading: bool,
    epoch: u64,
    resume_timestamp: Option<f64>,
}

impl Slide {
    pub fn new(id: usize, name: impl Into<String>, kind: SlideKind, source_locator: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            source_locator: source_locator.into(),
            first_animation: None,
            after_last_animation: None,
            buffer: None,
            loading: false,
            epoch: 0,
            resume_timestamp: None,
        }
    }

    /// Attach the animation range recorded by the exporter
    pub fn with_animations(mut self, first: Option<u32>, after_last: Option<u32>) -> Self {
        self.first_animation = first;
        self.after_last_animation = after_last;
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SlideKind {
        self.kind
    }

    pub fn source_locator(&self) -> &str {
        &self.source_locator
    }

    pub fn animations(&self) -> (Option<u32>, Option<u32>) {
        (self.first_animation, self.after_last_animation)
    }

    pub fn is_loaded(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Buffered payload size (0 when unloaded)
    pub fn mem(&self) -> usize {
        self.buffer.as_ref().map(|b| b.len()).unwrap_or(0)
    }

    pub fn set_resume_timestamp(&mut self, time_stamp: Option<f64>) {
        self.resume_timestamp = time_stamp;
    }

    /// Request the clip into `buffer`.
    ///
    /// Idempotent: an already-loaded slide reports `Ready` without touching
    /// the network, and a slide with a fetch in flight reports `Pending`
    /// without issuing a second one.
    pub fn load(&mut self, queue: &dyn FetchQueue) -> LoadState {
        if self.buffer.is_some() {
            return LoadState::Ready;
        }
        if self.loading {
            return LoadState::Pending;
        }

        self.loading = true;
        debug!("Loading slide '{}' (epoch {})", self.name, self.epoch);
        queue.request(self.id, self.epoch, &self.source_locator);
        LoadState::Pending
    }

    /// Apply a finished fetch.
    ///
    /// Results from an older epoch (the slide was unloaded meanwhile) are
    /// discarded. A failure clears the in-flight flag so a later `load`
    /// retries from scratch.
    pub fn finish_load(&mut self, epoch: u64, outcome: Result<MediaBuffer, FetchError>) -> LoadOutcome {
        if epoch != self.epoch || !self.loading {
            debug!(
                "Discarding stale load for slide '{}' (epoch {} != {})",
                self.name, epoch, self.epoch
            );
            return LoadOutcome::Discarded;
        }

        self.loading = false;
        match outcome {
            Ok(media) => {
                info!("Slide '{}' successfully loaded ({} bytes)", self.name, media.len());
                self.buffer = Some(media);
                LoadOutcome::Stored
            }
            Err(e) => {
                error!("Slide '{}' failed to load: {}", self.name, e);
                LoadOutcome::Failed
            }
        }
    }

    /// Drop the buffer and orphan any in-flight fetch.
    ///
    /// Returns true if anything was released; a second call is a no-op.
    pub fn unload(&mut self) -> bool {
        if self.buffer.is_none() && !self.loading {
            return false;
        }
        self.buffer = None;
        self.loading = false;
        self.epoch += 1;
        debug!("Unloaded slide '{}'", self.name);
        true
    }

    /// Source reference for a playback surface.
    pub fn playable_source(&self, cache: CacheKind) -> Result<PlayableSource, SlideError> {
        match cache {
            CacheKind::Direct => Ok(PlayableSource::Remote(self.source_locator.clone())),
            CacheKind::Windowed => self
                .buffer
                .as_ref()
                .map(|media| PlayableSource::Buffered { slide: self.id, media: media.clone() })
                .ok_or(SlideError::NotLoaded { slide: self.id }),
        }
    }

    pub fn checkpoint(&self) -> SlideCheckpoint {
        SlideCheckpoint {
            slide_type: self.kind.as_str().to_string(),
            name: self.name.clone(),
            slide_id: self.id,
            video: self.source_locator.clone(),
            time_stamp: self.resume_timestamp.unwrap_or(-1.0),
        }
    }
}
