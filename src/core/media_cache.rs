//! Media cache strategies: how a slide's clip reaches a playback surface.
//!
//! - [`DirectCache`]: stateless, every source is the remote locator. No
//!   buffering, higher latency per transition; the robust fallback.
//! - [`WindowedCache`]: keeps a window of slides buffered around the current
//!   one. On every settle at `c` it prefetches `[c, c + auto_load]`, then
//!   evicts everything outside `[c - keep_behind, c + auto_load]`.
//!
//! Prefetch runs before eviction so a slide that is inside the window is
//! never dropped and re-requested within one recompute. All slide
//! operations are idempotent, so repeated settles are cheap.
//!
//! Only the active strategy touches slide buffers; the presentation goes
//! through this trait for every load, unload and source lookup.

use log::{debug, error, trace};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::entities::{
    CacheKind, CacheStatsSnapshot, FetchError, FetchQueue, LoadOutcome, LoadState, MediaBuffer, PlayableSource,
    Slide, SlideError,
};

/// Cache statistics for monitoring performance
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Combine counters with the buffer footprint of `slides`
    pub fn snapshot(&self, slides: &[Slide]) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            buffered_slides: slides.iter().filter(|s| s.is_loaded()).count(),
            buffered_bytes: slides.iter().map(|s| s.mem()).sum(),
        }
    }
}

/// Strategy interface used by the presentation.
pub trait MediaCache: Send {
    fn kind(&self) -> CacheKind;

    /// Make the slide about to be settled playable.
    ///
    /// `Pending` means the transition must wait for the slide's
    /// `LoadCompletedEvent` before a source can be resolved.
    fn acquire(&mut self, slide: &mut Slide, queue: &dyn FetchQueue) -> LoadState;

    /// Source for a surface. Only valid after `acquire` reported ready
    /// (or its load completed).
    fn source(&self, slide: &Slide) -> Result<PlayableSource, SlideError> {
        slide.playable_source(self.kind())
    }

    /// Recompute prefetch/eviction for a new current slide.
    fn on_settle(&mut self, slides: &mut [Slide], current: usize, queue: &dyn FetchQueue);

    /// Eagerly warm one slide (batch caching). `Ready` means nothing to wait for.
    fn prefetch(&mut self, slide: &mut Slide, queue: &dyn FetchQueue) -> LoadState;

    /// Apply a fetch result to the slide it was requested for.
    fn on_loaded(&mut self, slide: &mut Slide, epoch: u64, outcome: Result<MediaBuffer, FetchError>) -> LoadOutcome;

    fn stats(&self, slides: &[Slide]) -> CacheStatsSnapshot;
}

/// Stream every clip straight from its locator.
#[derive(Debug, Default)]
pub struct DirectCache {
    stats: CacheStats,
}

impl DirectCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MediaCache for DirectCache {
    fn kind(&self) -> CacheKind {
        CacheKind::Direct
    }

    fn acquire(&mut self, _slide: &mut Slide, _queue: &dyn FetchQueue) -> LoadState {
        LoadState::Ready
    }

    fn on_settle(&mut self, _slides: &mut [Slide], _current: usize, _queue: &dyn FetchQueue) {}

    /// Issues a plain GET so intermediaries (HTTP caches, proxies) hold the
    /// clip; the bytes themselves are thrown away.
    fn prefetch(&mut self, slide: &mut Slide, queue: &dyn FetchQueue) -> LoadState {
        queue.request(slide.id(), slide.epoch(), slide.source_locator());
        LoadState::Pending
    }

    fn on_loaded(&mut self, slide: &mut Slide, _epoch: u64, outcome: Result<MediaBuffer, FetchError>) -> LoadOutcome {
        match outcome {
            Ok(media) => {
                self.stats.record_hit();
                debug!("Warmed slide '{}' ({} bytes)", slide.name(), media.len());
                LoadOutcome::Discarded
            }
            Err(e) => {
                self.stats.record_miss();
                error!("Slide '{}' failed to be cached: {}", slide.name(), e);
                LoadOutcome::Failed
            }
        }
    }

    fn stats(&self, slides: &[Slide]) -> CacheStatsSnapshot {
        self.stats.snapshot(slides)
    }
}

/// Prefetch-ahead / evict-behind buffering.
#[derive(Debug)]
pub struct WindowedCache {
    auto_load: usize,
    keep_behind: usize,
    stats: CacheStats,
}

impl WindowedCache {
    /// With both bounds 0 only the current slide is buffered.
    pub fn new(auto_load: usize, keep_behind: usize) -> Self {
        Self { auto_load, keep_behind, stats: CacheStats::new() }
    }

    /// Inclusive index window around `current`, clamped to `len`.
    pub fn window(&self, current: usize, len: usize) -> std::ops::RangeInclusive<usize> {
        let lo = current.saturating_sub(self.keep_behind);
        let hi = current.saturating_add(self.auto_load).min(len.saturating_sub(1));
        lo..=hi
    }
}

impl MediaCache for WindowedCache {
    fn kind(&self) -> CacheKind {
        CacheKind::Windowed
    }

    fn acquire(&mut self, slide: &mut Slide, queue: &dyn FetchQueue) -> LoadState {
        let state = slide.load(queue);
        match state {
            LoadState::Ready => self.stats.record_hit(),
            LoadState::Pending => self.stats.record_miss(),
        }
        state
    }

    fn on_settle(&mut self, slides: &mut [Slide], current: usize, queue: &dyn FetchQueue) {
        if slides.is_empty() {
            return;
        }
        let current = current.min(slides.len() - 1);
        let ahead = current.saturating_add(self.auto_load).min(slides.len() - 1);

        // 1. Prefetch [current, current + auto_load]
        for slide in &mut slides[current..=ahead] {
            slide.load(queue);
        }

        // 2. Evict outside [current - keep_behind, current + auto_load]
        let window = self.window(current, slides.len());
        let mut evicted = 0;
        for slide in slides.iter_mut() {
            if !window.contains(&slide.id()) && slide.unload() {
                evicted += 1;
            }
        }
        trace!("Window {:?} around #{}: evicted {}", window, current, evicted);
    }

    fn prefetch(&mut self, slide: &mut Slide, queue: &dyn FetchQueue) -> LoadState {
        slide.load(queue)
    }

    fn on_loaded(&mut self, slide: &mut Slide, epoch: u64, outcome: Result<MediaBuffer, FetchError>) -> LoadOutcome {
        slide.finish_load(epoch, outcome)
    }

    fn stats(&self, slides: &[Slide]) -> CacheStatsSnapshot {
        self.stats.snapshot(slides)
    }
}

/// Pick a strategy from configuration values.
pub fn build_cache(use_fallback: bool, auto_load: usize, keep_behind: usize) -> Box<dyn MediaCache> {
    if use_fallback {
        debug!("Media cache: direct");
        Box::new(DirectCache::new())
    } else {
        debug!("Media cache: windowed (+{} / -{})", auto_load, keep_behind);
        Box::new(WindowedCache::new(auto_load, keep_behind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{RecordingQueue, deck};
    use crate::entities::SlideKind;

    /// Complete every outstanding request with a payload
    fn complete_all(cache: &mut dyn MediaCache, slides: &mut [Slide], queue: &RecordingQueue) {
        for (slide, epoch, _) in queue.take() {
            cache.on_loaded(&mut slides[slide], epoch, Ok(MediaBuffer::new(vec![0; 8])));
        }
    }

    fn loaded(slides: &[Slide]) -> Vec<usize> {
        slides.iter().filter(|s| s.is_loaded()).map(|s| s.id()).collect()
    }

    #[test]
    fn test_direct_is_stateless() {
        let mut slides = deck(&[SlideKind::Normal, SlideKind::Loop]);
        let queue = RecordingQueue::default();
        let mut cache = DirectCache::new();

        assert_eq!(cache.acquire(&mut slides[1], &queue), LoadState::Ready);
        cache.on_settle(&mut slides, 1, &queue);
        assert!(queue.take().is_empty());
        assert_eq!(cache.source(&slides[1]), Ok(PlayableSource::Remote("slide1.mp4".into())));

        // Batch warm-up fetches but never buffers
        assert_eq!(cache.prefetch(&mut slides[0], &queue), LoadState::Pending);
        complete_all(&mut cache, &mut slides, &queue);
        assert!(loaded(&slides).is_empty());
    }

    #[test]
    fn test_window_prefetch_and_evict() {
        let mut slides = deck(&[SlideKind::Normal; 10]);
        let queue = RecordingQueue::default();
        let mut cache = WindowedCache::new(2, 1);

        cache.on_settle(&mut slides, 0, &queue);
        complete_all(&mut cache, &mut slides, &queue);
        assert_eq!(loaded(&slides), vec![0, 1, 2]);

        cache.on_settle(&mut slides, 4, &queue);
        complete_all(&mut cache, &mut slides, &queue);
        assert_eq!(loaded(&slides), vec![4, 5, 6]);

        cache.on_settle(&mut slides, 5, &queue);
        complete_all(&mut cache, &mut slides, &queue);
        assert_eq!(loaded(&slides), vec![4, 5, 6, 7]);

        // Clamped at the end of the deck; 8 was never prefetched
        cache.on_settle(&mut slides, 9, &queue);
        complete_all(&mut cache, &mut slides, &queue);
        assert_eq!(loaded(&slides), vec![9]);

        // Backward jump evicts slides ahead of the window too
        cache.on_settle(&mut slides, 7, &queue);
        complete_all(&mut cache, &mut slides, &queue);
        assert_eq!(loaded(&slides), vec![7, 8, 9]);
        cache.on_settle(&mut slides, 1, &queue);
        complete_all(&mut cache, &mut slides, &queue);
        assert_eq!(loaded(&slides), vec![1, 2, 3]);
    }

    #[test]
    fn test_window_resettle_does_not_refetch() {
        let mut slides = deck(&[SlideKind::Normal; 5]);
        let queue = RecordingQueue::default();
        let mut cache = WindowedCache::new(1, 0);

        cache.on_settle(&mut slides, 2, &queue);
        assert_eq!(queue.len(), 2);
        // Still in flight: settling again joins the pending loads
        cache.on_settle(&mut slides, 2, &queue);
        assert_eq!(queue.len(), 2);

        complete_all(&mut cache, &mut slides, &queue);
        cache.on_settle(&mut slides, 2, &queue);
        assert_eq!(queue.len(), 0);
        assert_eq!(loaded(&slides), vec![2, 3]);
    }

    #[test]
    fn test_evicted_fetch_is_discarded() {
        let mut slides = deck(&[SlideKind::Normal; 6]);
        let queue = RecordingQueue::default();
        let mut cache = WindowedCache::new(1, 0);

        cache.on_settle(&mut slides, 0, &queue);
        let stale = queue.take();
        // Jump away before the fetches land
        cache.on_settle(&mut slides, 4, &queue);
        for (slide, epoch, _) in stale {
            let outcome = cache.on_loaded(&mut slides[slide], epoch, Ok(MediaBuffer::new(vec![1])));
            assert_eq!(outcome, LoadOutcome::Discarded);
        }
        complete_all(&mut cache, &mut slides, &queue);
        assert_eq!(loaded(&slides), vec![4, 5]);
    }

    #[test]
    fn test_acquire_stats() {
        let mut slides = deck(&[SlideKind::Normal; 3]);
        let queue = RecordingQueue::default();
        let mut cache = WindowedCache::new(0, 0);

        assert_eq!(cache.acquire(&mut slides[0], &queue), LoadState::Pending);
        assert_eq!(cache.source(&slides[0]), Err(SlideError::NotLoaded { slide: 0 }));
        complete_all(&mut cache, &mut slides, &queue);
        assert_eq!(cache.acquire(&mut slides[0], &queue), LoadState::Ready);
        assert!(cache.source(&slides[0]).expect("buffered").is_buffered());

        let stats = cache.stats(&slides);
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!((stats.buffered_slides, stats.buffered_bytes), (1, 8));
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_build_cache() {
        assert_eq!(build_cache(true, 5, 2).kind(), CacheKind::Direct);
        assert_eq!(build_cache(false, 5, 2).kind(), CacheKind::Windowed);
    }
}
