//! Batch caching: eagerly fetch the whole deck in fixed-size groups.
//!
//! `cache_batch(offset)` requests `[offset, offset + batch_size)` at once.
//! Every completion bumps `finished` and reports `finished / total`; when the
//! batch is exhausted the next one starts at `finished`. Full batches report
//! their starting value first, a trailing short batch does not. Progress
//! therefore runs `0,1,2 | 2,3,4 | 5` for five slides in batches of two, and
//! the observer is hidden once everything is in.
//!
//! Independent of the windowed cache: a windowed strategy may evict what
//! this just fetched as playback moves on.

use log::{debug, info};
use std::collections::BTreeSet;

use crate::core::media_cache::MediaCache;
use crate::entities::{FetchQueue, LoadState, Slide};

/// Progress sink (terminal bar, status line, test recorder)
pub trait ProgressObserver {
    fn show(&mut self, total: usize);
    fn update(&mut self, finished: usize, total: usize);
    fn hide(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    InProgress,
    /// Reported exactly once, by the call that completed the deck
    Finished,
}

pub struct BatchDownloadTracker {
    batch_size: usize,
    offset: usize,
    finished: usize,
    total: usize,
    awaiting: BTreeSet<usize>,
    observer: Box<dyn ProgressObserver>,
    done: bool,
}

impl BatchDownloadTracker {
    /// `batch_size` below 1 is treated as 1.
    pub fn new(total: usize, batch_size: usize, observer: Box<dyn ProgressObserver>) -> Self {
        Self {
            batch_size: batch_size.max(1),
            offset: 0,
            finished: 0,
            total,
            awaiting: BTreeSet::new(),
            observer,
            done: false,
        }
    }

    pub fn finished(&self) -> usize {
        self.finished
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Fraction in `[0, 1]`
    pub fn progress(&self) -> f64 {
        if self.total == 0 { 1.0 } else { self.finished as f64 / self.total as f64 }
    }

    /// Slide ids of the running batch still outstanding
    pub fn awaiting(&self) -> impl Iterator<Item = usize> + '_ {
        self.awaiting.iter().copied()
    }

    /// Whole deck from the top.
    pub fn start(&mut self, slides: &mut [Slide], cache: &mut dyn MediaCache, queue: &dyn FetchQueue) -> BatchStatus {
        if self.total == 0 {
            self.done = true;
            self.observer.hide();
            return BatchStatus::Finished;
        }
        self.cache_batch(0, slides, cache, queue)
    }

    pub fn cache_batch(
        &mut self,
        offset: usize,
        slides: &mut [Slide],
        cache: &mut dyn MediaCache,
        queue: &dyn FetchQueue,
    ) -> BatchStatus {
        self.offset = offset;
        self.finished = offset;
        let end = (offset + self.batch_size).min(self.total);

        // A trailing short batch carries on from the last completion
        self.observer.show(self.total);
        if offset == 0 || end - offset == self.batch_size {
            self.observer.update(self.finished, self.total);
        }

        debug!("Caching batch [{}, {}) of {}", offset, end, self.total);

        let mut ready = Vec::new();
        for idx in offset..end {
            self.awaiting.insert(idx);
            if cache.prefetch(&mut slides[idx], queue) == LoadState::Ready {
                ready.push(idx);
            }
        }

        // Already-buffered slides complete without waiting for an event
        for idx in ready {
            if self.on_completed(idx, slides, cache, queue) == BatchStatus::Finished {
                return BatchStatus::Finished;
            }
        }
        BatchStatus::InProgress
    }

    /// One slide of the running batch resolved (success or failure).
    ///
    /// Completions for slides outside the running batch are ignored.
    pub fn on_completed(
        &mut self,
        slide: usize,
        slides: &mut [Slide],
        cache: &mut dyn MediaCache,
        queue: &dyn FetchQueue,
    ) -> BatchStatus {
        if self.done || !self.awaiting.remove(&slide) {
            return BatchStatus::InProgress;
        }

        self.finished += 1;
        self.observer.update(self.finished, self.total);

        if self.finished == self.total {
            info!("Caching complete ({} slides)", self.total);
            self.done = true;
            self.observer.hide();
            return BatchStatus::Finished;
        }

        if self.finished == self.offset + self.batch_size {
            debug!("Batch caching complete with offset {}", self.offset);
            return self.cache_batch(self.finished, slides, cache, queue);
        }
        BatchStatus::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::media_cache::{DirectCache, WindowedCache};
    use crate::core::testing::{RecordingQueue, deck};
    use crate::entities::{MediaBuffer, SlideKind};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Show,
        Update(usize),
        Hide,
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Call>>>);

    impl Recorder {
        fn updates(&self) -> Vec<usize> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter_map(|c| if let Call::Update(v) = c { Some(*v) } else { None })
                .collect()
        }

        fn count(&self, call: &Call) -> usize {
            self.0.lock().unwrap().iter().filter(|c| *c == call).count()
        }
    }

    impl ProgressObserver for Recorder {
        fn show(&mut self, _total: usize) {
            self.0.lock().unwrap().push(Call::Show);
        }
        fn update(&mut self, finished: usize, total: usize) {
            assert!(finished <= total);
            self.0.lock().unwrap().push(Call::Update(finished));
        }
        fn hide(&mut self) {
            self.0.lock().unwrap().push(Call::Hide);
        }
    }

    /// Resolve requests one by one, feeding each completion to the tracker
    fn drain(
        tracker: &mut BatchDownloadTracker,
        slides: &mut [Slide],
        cache: &mut dyn MediaCache,
        queue: &RecordingQueue,
    ) -> usize {
        let mut finished_reports = 0;
        loop {
            let requests = queue.take();
            if requests.is_empty() {
                return finished_reports;
            }
            for (slide, epoch, _) in requests {
                cache.on_loaded(&mut slides[slide], epoch, Ok(MediaBuffer::new(vec![0; 4])));
                if tracker.on_completed(slide, slides, cache, queue) == BatchStatus::Finished {
                    finished_reports += 1;
                }
            }
        }
    }

    #[test]
    fn test_five_slides_batches_of_two() {
        let mut slides = deck(&[SlideKind::Normal; 5]);
        let queue = RecordingQueue::default();
        let mut cache = WindowedCache::new(0, 0);
        let recorder = Recorder::default();
        let mut tracker = BatchDownloadTracker::new(5, 2, Box::new(recorder.clone()));

        assert_eq!(tracker.start(&mut slides, &mut cache, &queue), BatchStatus::InProgress);
        // Only the first batch is in flight
        assert_eq!(queue.len(), 2);
        assert_eq!(tracker.awaiting().collect::<Vec<_>>(), vec![0, 1]);

        assert_eq!(drain(&mut tracker, &mut slides, &mut cache, &queue), 1);
        assert_eq!(recorder.updates(), vec![0, 1, 2, 2, 3, 4, 5]);
        assert_eq!(recorder.count(&Call::Hide), 1);
        assert_eq!(recorder.count(&Call::Show), 3);
        assert!(tracker.is_done());
        assert_eq!(tracker.progress(), 1.0);

        // Late duplicates change nothing
        assert_eq!(tracker.on_completed(4, &mut slides, &mut cache, &queue), BatchStatus::InProgress);
        assert_eq!(recorder.updates().len(), 7);
    }

    #[test]
    fn test_buffered_slides_complete_immediately() {
        let mut slides = deck(&[SlideKind::Normal; 3]);
        let queue = RecordingQueue::default();
        let mut cache = WindowedCache::new(0, 0);
        for (i, slide) in slides.iter_mut().enumerate().take(2) {
            slide.load(&queue);
            slide.finish_load(0, Ok(MediaBuffer::new(vec![i as u8])));
        }
        queue.take();

        let recorder = Recorder::default();
        let mut tracker = BatchDownloadTracker::new(3, 2, Box::new(recorder.clone()));
        assert_eq!(tracker.start(&mut slides, &mut cache, &queue), BatchStatus::InProgress);
        // Batch one was warm; batch two went straight out
        assert_eq!(queue.len(), 1);
        assert_eq!(drain(&mut tracker, &mut slides, &mut cache, &queue), 1);
        assert_eq!(recorder.updates(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_all_warm_finishes_in_start() {
        let mut slides = deck(&[SlideKind::Normal; 2]);
        let queue = RecordingQueue::default();
        let mut cache = WindowedCache::new(0, 0);
        for slide in slides.iter_mut() {
            slide.load(&queue);
            slide.finish_load(0, Ok(MediaBuffer::new(vec![0])));
        }
        queue.take();

        let recorder = Recorder::default();
        let mut tracker = BatchDownloadTracker::new(2, 5, Box::new(recorder.clone()));
        assert_eq!(tracker.start(&mut slides, &mut cache, &queue), BatchStatus::Finished);
        assert_eq!(recorder.updates(), vec![0, 1, 2]);
        assert_eq!(recorder.count(&Call::Hide), 1);
    }

    #[test]
    fn test_direct_strategy_counts_warm_requests() {
        let mut slides = deck(&[SlideKind::Normal; 3]);
        let queue = RecordingQueue::default();
        let mut cache = DirectCache::new();
        let recorder = Recorder::default();
        let mut tracker = BatchDownloadTracker::new(3, 10, Box::new(recorder.clone()));

        tracker.start(&mut slides, &mut cache, &queue);
        assert_eq!(queue.len(), 3);
        assert_eq!(drain(&mut tracker, &mut slides, &mut cache, &queue), 1);
        assert_eq!(recorder.updates(), vec![0, 1, 2, 3]);
        assert!(slides.iter().all(|s| !s.is_loaded()));
    }

    #[test]
    fn test_empty_deck() {
        let mut slides = Vec::new();
        let queue = RecordingQueue::default();
        let mut cache = DirectCache::new();
        let recorder = Recorder::default();
        let mut tracker = BatchDownloadTracker::new(0, 0, Box::new(recorder.clone()));

        assert_eq!(tracker.start(&mut slides, &mut cache, &queue), BatchStatus::Finished);
        assert_eq!(recorder.count(&Call::Hide), 1);
    }
}
