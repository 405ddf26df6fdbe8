//! Presentation - slide transition state machine.
//!
//! Owns the deck, the cache strategy and both playback surfaces. All state
//! changes happen on the caller's thread, either in the public navigation
//! methods or while draining completions in [`Presentation::process_events`].
//!
//! # Indices
//!
//! `current_slide`, `previous_slide`, `next_slide` are `i32` with `-1` meaning
//! "nothing played yet". `previous_slide` is the last slide whose swap fully
//! completed; while it differs from `current_slide` a settle is in progress.
//!
//! # Settle
//!
//! Making `current_slide` authoritative:
//! 1. `current == previous`: restart the visible surface, no swap.
//! 2. otherwise acquire media (possibly waiting for `LoadCompletedEvent`),
//!    assign it to the hidden surface, show it and `play(ticket)`. On the
//!    matching `PlaybackStartedEvent` the outgoing surface is paused and
//!    hidden, the pair flips and `previous_slide` catches up.
//!
//! Only one settle is in progress at a time. Starting another abandons it,
//! and every completion is checked against the pending settle (slide, surface,
//! ticket) or the visible surface's ticket before it may touch state.

use log::{debug, error, info, trace, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::core::batch::{BatchDownloadTracker, BatchStatus, ProgressObserver};
use crate::core::event_bus::{EventBus, downcast_event};
use crate::core::loader::MediaLoader;
use crate::core::media_cache::MediaCache;
use crate::core::presentation_events::{
    ClipFinishedEvent, DeckFinishedEvent, LoadCompletedEvent, PlaybackStartedEvent, SlideChangedEvent,
    SurfaceFailedEvent,
};
use crate::core::surface::{PlaybackSurface, SurfaceId, SurfacePair};
use crate::entities::{
    CacheKind, CacheStatsSnapshot, Fetcher, LoadOutcome, LoadState, Slide, SlideCheckpoint, SlideKind, Timeline,
    WorkerPool,
};

/// Default slides per batch for `cache_deck`
pub const DEFAULT_CACHE_BATCH_SIZE: usize = 5;

/// Presentation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationError {
    /// Navigation target outside `[0, len)`
    InvalidIndex { index: i32, len: usize },
}

impl fmt::Display for PresentationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresentationError::InvalidIndex { index, len } => {
                write!(f, "Invalid slide index #{} (deck has {} slides)", index, len)
            }
        }
    }
}

impl std::error::Error for PresentationError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleStage {
    /// Media for the slide is still being fetched
    AwaitingSource,
    /// Source assigned and `play` issued; waiting for the start ack
    AwaitingStart,
}

/// The settle in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSettle {
    pub slide: usize,
    pub surface: SurfaceId,
    pub stage: SettleStage,
    pub ticket: u64,
}

/// Point-in-time view for status output
#[derive(Debug, Clone)]
pub struct PresentationStatus {
    pub current: i32,
    pub previous: i32,
    pub next: i32,
    pub len: usize,
    pub current_name: Option<String>,
    pub active_surface: SurfaceId,
    pub pending: Option<PendingSettle>,
    pub finished: bool,
    pub cache_kind: CacheKind,
    pub cache: CacheStatsSnapshot,
    pub timeline: String,
    /// `(finished, total)` of a running batch cache
    pub batch: Option<(usize, usize)>,
}

impl fmt::Display for PresentationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slide {}/{} '{}' [{}] surface {}",
            self.current,
            self.len,
            self.current_name.as_deref().unwrap_or("-"),
            self.timeline,
            self.active_surface
        )?;
        if let Some(p) = &self.pending {
            write!(f, " | settling #{} on {} ({:?})", p.slide, p.surface, p.stage)?;
        }
        if self.next != self.current {
            write!(f, " | next #{}", self.next)?;
        }
        if self.finished {
            write!(f, " | finished")?;
        }
        write!(
            f,
            " | {:?} cache: {} buffered, {:.1} MB, hit {:.0}%",
            self.cache_kind,
            self.cache.buffered_slides,
            self.cache.buffered_bytes as f64 / (1024.0 * 1024.0),
            self.cache.hit_rate() * 100.0
        )?;
        if let Some((done, total)) = self.batch {
            write!(f, " | caching {}/{}", done, total)?;
        }
        Ok(())
    }
}

pub struct Presentation<S: PlaybackSurface> {
    slides: Vec<Slide>,
    cache: Box<dyn MediaCache>,
    loader: MediaLoader,
    surfaces: SurfacePair<S>,
    timeline: Timeline,
    bus: EventBus,

    current_slide: i32,
    previous_slide: i32,
    // Target for a CompleteLoop slide once its clip ends
    next_slide: i32,

    pending: Option<PendingSettle>,
    next_ticket: u64,
    active_ticket: Option<u64>,
    finished: bool,

    cache_batch_size: usize,
    batch: Option<BatchDownloadTracker>,
}

impl<S: PlaybackSurface> Presentation<S> {
    /// Surfaces and fetch workers must post their events to `bus`.
    pub fn new(
        slides: Vec<Slide>,
        cache: Box<dyn MediaCache>,
        pool: Arc<dyn WorkerPool>,
        fetcher: Arc<dyn Fetcher>,
        surfaces: SurfacePair<S>,
        bus: EventBus,
    ) -> Self {
        let loader = MediaLoader::new(pool, fetcher, bus.emitter());
        let timeline = Timeline::new(slides.len());
        debug!("Presentation: {} slides, {:?} cache", slides.len(), cache.kind());
        Self {
            slides,
            cache,
            loader,
            surfaces,
            timeline,
            bus,
            current_slide: -1,
            previous_slide: -1,
            next_slide: 0,
            pending: None,
            next_ticket: 1,
            active_ticket: None,
            finished: false,
            cache_batch_size: DEFAULT_CACHE_BATCH_SIZE,
            batch: None,
        }
    }

    pub fn with_cache_batch_size(mut self, batch_size: usize) -> Self {
        self.cache_batch_size = batch_size.max(1);
        self
    }

    // === Navigation ===

    /// Switch to `target`.
    ///
    /// While a CompleteLoop slide is current and `skip_complete_loop` is
    /// false, only `next_slide` is updated and the switch happens when the
    /// clip ends.
    pub fn play_slide(&mut self, target: i32, skip_complete_loop: bool) -> Result<(), PresentationError> {
        if target < 0 || target as usize >= self.slides.len() {
            error!("Trying to switch to invalid slide index #{}", target);
            return Err(PresentationError::InvalidIndex { index: target, len: self.slides.len() });
        }
        info!("Switching to slide '{}'", self.slides[target as usize].name());

        if !skip_complete_loop && self.current_kind() == Some(SlideKind::CompleteLoop) {
            debug!("Slide #{} is a complete loop, deferring #{}", self.current_slide, target);
            self.next_slide = target;
            return Ok(());
        }

        self.next_slide = target;
        self.current_slide = target;
        self.finished = false;
        self.settle();
        Ok(())
    }

    pub fn play_next_slide(&mut self) -> Result<(), PresentationError> {
        self.play_slide(self.current_slide + 1, false)
    }

    /// Going back always interrupts a complete-loop wait.
    pub fn play_previous_slide(&mut self) -> Result<(), PresentationError> {
        self.play_slide(self.current_slide - 1, true)
    }

    pub fn restart_current_slide(&mut self) -> Result<(), PresentationError> {
        self.play_slide(self.current_slide, true)
    }

    /// Direct pick (timeline click): never deferred.
    pub fn select_slide(&mut self, id: usize) -> Result<(), PresentationError> {
        let target = i32::try_from(id).unwrap_or(i32::MAX);
        self.play_slide(target, true)
    }

    // === Batch caching ===

    /// Fetch the whole deck in batches, reporting to `observer`.
    pub fn cache_deck(&mut self, observer: Box<dyn ProgressObserver>) -> BatchStatus {
        if self.batch.as_ref().is_some_and(|b| !b.is_done()) {
            warn!("Batch caching already running");
            return BatchStatus::InProgress;
        }
        let mut tracker = BatchDownloadTracker::new(self.slides.len(), self.cache_batch_size, observer);
        let status = tracker.start(&mut self.slides, self.cache.as_mut(), &self.loader);
        self.batch = Some(tracker);
        status
    }

    // === Event processing ===

    /// Drain queued completions. Returns the number of events handled.
    pub fn process_events(&mut self) -> usize {
        let events = self.bus.poll();
        let count = events.len();
        for event in events {
            if let Some(e) = downcast_event::<LoadCompletedEvent>(&event) {
                self.on_load_completed(e);
            } else if let Some(e) = downcast_event::<PlaybackStartedEvent>(&event) {
                self.on_playback_started(e);
            } else if let Some(e) = downcast_event::<ClipFinishedEvent>(&event) {
                self.on_clip_finished(e);
            } else if let Some(e) = downcast_event::<SurfaceFailedEvent>(&event) {
                self.on_surface_failed(e);
            } else {
                trace!("Unhandled event: {}", event.type_name());
            }
        }
        count
    }

    /// Advance time-driven surfaces.
    pub fn tick(&mut self, now: Instant) {
        self.surfaces.tick(now);
    }

    // === Settle ===

    fn issue_ticket(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }

    fn settle(&mut self) {
        if self.current_slide < 0 {
            return;
        }
        let current = self.current_slide as usize;

        if let Some(pending) = self.pending.take() {
            self.abandon(pending);
        }

        if self.current_slide == self.previous_slide {
            // An abandoned settle may have moved the window elsewhere
            self.cache.on_settle(&mut self.slides, current, &self.loader);
            let ticket = self.issue_ticket();
            debug!("Restarting slide #{} on surface {}", current, self.surfaces.active_id());
            self.surfaces.active_mut().restart(ticket);
            self.active_ticket = Some(ticket);
            return;
        }

        let surface = self.surfaces.inactive_id();
        let ticket = self.issue_ticket();
        let state = self.cache.acquire(&mut self.slides[current], &self.loader);
        self.cache.on_settle(&mut self.slides, current, &self.loader);

        match state {
            LoadState::Ready => self.attach(current, surface, ticket),
            LoadState::Pending => {
                info!("Waiting for slide '{}' to load", self.slides[current].name());
                self.pending = Some(PendingSettle { slide: current, surface, stage: SettleStage::AwaitingSource, ticket });
            }
        }
    }

    /// Put the slide on the hidden surface and start it.
    fn attach(&mut self, slide: usize, surface: SurfaceId, ticket: u64) {
        let source = match self.cache.source(&self.slides[slide]) {
            Ok(source) => source,
            Err(e) => {
                error!("{}", e);
                self.revert();
                return;
            }
        };

        let target = self.surfaces.get_mut(surface);
        if let Err(e) = target.set_source(slide, &source) {
            error!("{}", e);
            target.set_visible(false);
            self.revert();
            return;
        }

        trace!("Slide #{} -> surface {} ({}), ticket {}", slide, surface, source, ticket);
        target.set_visible(true);
        target.play(ticket);
        self.pending = Some(PendingSettle { slide, surface, stage: SettleStage::AwaitingStart, ticket });
    }

    fn abandon(&mut self, pending: PendingSettle) {
        debug!("Abandoning settle of slide #{}", pending.slide);
        if pending.stage == SettleStage::AwaitingStart {
            let surface = self.surfaces.get_mut(pending.surface);
            surface.pause();
            surface.set_visible(false);
        }
    }

    /// Fall back to the last fully settled slide.
    fn revert(&mut self) {
        self.pending = None;
        self.current_slide = self.previous_slide;
        self.next_slide = self.previous_slide.max(0);
        if self.previous_slide >= 0 {
            warn!("Staying on slide #{}", self.previous_slide);
            self.cache.on_settle(&mut self.slides, self.previous_slide as usize, &self.loader);
        } else {
            warn!("No slide could be shown yet");
        }
    }

    // === Completions ===

    fn on_load_completed(&mut self, e: &LoadCompletedEvent) {
        let Some(slide) = self.slides.get_mut(e.slide) else {
            warn!("Load completed for unknown slide #{}", e.slide);
            return;
        };
        let outcome = self.cache.on_loaded(slide, e.epoch, e.outcome.clone());

        if let Some(pending) = self.pending
            && pending.stage == SettleStage::AwaitingSource
            && pending.slide == e.slide
        {
            match outcome {
                LoadOutcome::Stored => {
                    self.pending = None;
                    self.attach(pending.slide, pending.surface, pending.ticket);
                }
                LoadOutcome::Failed => {
                    error!("Cannot show slide #{}: media unavailable", pending.slide);
                    self.revert();
                }
                // An older request; the current one is still outstanding
                LoadOutcome::Discarded => {}
            }
        }

        if let Some(batch) = self.batch.as_mut()
            && batch.on_completed(e.slide, &mut self.slides, self.cache.as_mut(), &self.loader) == BatchStatus::Finished
        {
            info!("All {} slides cached", self.slides.len());
        }
    }

    fn on_playback_started(&mut self, e: &PlaybackStartedEvent) {
        let Some(pending) = self.pending else {
            trace!("Ignoring start ack for slide #{} (nothing pending)", e.slide);
            return;
        };
        if pending.stage != SettleStage::AwaitingStart
            || pending.ticket != e.ticket
            || pending.surface != e.surface
            || pending.slide != e.slide
            || self.current_slide != pending.slide as i32
        {
            trace!("Ignoring stale start ack for slide #{} ticket {}", e.slide, e.ticket);
            return;
        }

        self.pending = None;
        let outgoing = self.surfaces.active_id();
        {
            // Pause after the new clip runs: no flash, and no end signal from the old one
            let old = self.surfaces.get_mut(outgoing);
            old.pause();
            old.set_visible(false);
        }
        self.surfaces.flip_to(pending.surface);
        self.active_ticket = Some(pending.ticket);

        self.timeline.mark_settled(self.previous_slide, pending.slide);
        self.previous_slide = self.current_slide;

        let name = self.slides[pending.slide].name().to_string();
        info!("Playing slide '{}' on surface {}", name, pending.surface);
        self.bus.emit(SlideChangedEvent { slide: pending.slide, name });
    }

    fn on_clip_finished(&mut self, e: &ClipFinishedEvent) {
        if e.surface != self.surfaces.active_id() || Some(e.ticket) != self.active_ticket {
            trace!("Ignoring stale clip end from surface {} ticket {}", e.surface, e.ticket);
            return;
        }
        if self.previous_slide < 0 || e.slide != self.previous_slide as usize || self.finished {
            return;
        }
        let kind = self.slides[e.slide].kind();

        // The visible clip ended while another slide is still being prepared
        if self.pending.is_some() {
            if matches!(kind, SlideKind::Loop | SlideKind::CompleteLoop) {
                let ticket = self.issue_ticket();
                self.surfaces.active_mut().restart(ticket);
                self.active_ticket = Some(ticket);
            }
            return;
        }

        trace!("Slide #{} ({}) finished", e.slide, kind);
        match kind {
            SlideKind::Normal => {}
            SlideKind::Loop => self.settle(),
            SlideKind::Skip => {
                let target = self.current_slide + 1;
                if target as usize >= self.slides.len() {
                    info!("Reached the end of the deck");
                    self.finished = true;
                    self.bus.emit(DeckFinishedEvent { last: e.slide });
                    return;
                }
                self.current_slide = target;
                self.next_slide = target;
                self.settle();
            }
            SlideKind::CompleteLoop => {
                self.current_slide = self.next_slide;
                self.settle();
            }
        }
    }

    fn on_surface_failed(&mut self, e: &SurfaceFailedEvent) {
        match self.pending {
            Some(pending) if pending.ticket == e.ticket && pending.surface == e.surface => {
                error!("Surface {} failed on slide #{}: {}", e.surface, e.slide, e.reason);
                self.pending = None;
                let surface = self.surfaces.get_mut(e.surface);
                surface.pause();
                surface.set_visible(false);
                self.revert();
            }
            _ if Some(e.ticket) == self.active_ticket && e.surface == self.surfaces.active_id() => {
                error!("Playback of slide #{} failed: {}", e.slide, e.reason);
            }
            _ => trace!("Ignoring stale failure from surface {}", e.surface),
        }
    }

    // === Export ===

    /// Checkpoint of the current slide with the visible surface's position.
    pub fn checkpoint(&mut self) -> Option<SlideCheckpoint> {
        if self.current_slide < 0 {
            return None;
        }
        let current = self.current_slide as usize;
        let position = (self.pending.is_none() && self.previous_slide == self.current_slide)
            .then(|| self.surfaces.active().position());
        let slide = &mut self.slides[current];
        slide.set_resume_timestamp(position);
        Some(slide.checkpoint())
    }

    // === Accessors ===

    pub fn current_slide(&self) -> i32 {
        self.current_slide
    }

    pub fn previous_slide(&self) -> i32 {
        self.previous_slide
    }

    pub fn next_slide(&self) -> i32 {
        self.next_slide
    }

    fn current_kind(&self) -> Option<SlideKind> {
        usize::try_from(self.current_slide).ok().and_then(|i| self.slides.get(i)).map(|s| s.kind())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn pending(&self) -> Option<PendingSettle> {
        self.pending
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn surfaces(&self) -> &SurfacePair<S> {
        &self.surfaces
    }

    pub fn active_surface(&self) -> SurfaceId {
        self.surfaces.active_id()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn cache_kind(&self) -> CacheKind {
        self.cache.kind()
    }

    pub fn status(&self) -> PresentationStatus {
        PresentationStatus {
            current: self.current_slide,
            previous: self.previous_slide,
            next: self.next_slide,
            len: self.slides.len(),
            current_name: usize::try_from(self.current_slide)
                .ok()
                .and_then(|i| self.slides.get(i))
                .map(|s| s.name().to_string()),
            active_surface: self.surfaces.active_id(),
            pending: self.pending,
            finished: self.finished,
            cache_kind: self.cache.kind(),
            cache: self.cache.stats(&self.slides),
            timeline: self.timeline.render(),
            batch: self.batch.as_ref().filter(|b| !b.is_done()).map(|b| (b.finished(), b.total())),
        }
    }
}
