//! Headless playback surface for the terminal presenter.
//!
//! Nothing is decoded or drawn: a clip "plays" for a fixed duration measured
//! on the wall clock, then reports its end. Buffered payloads are checked for
//! an MP4 container the way a real decoder would refuse foreign data.

use log::{debug, trace};
use std::time::{Duration, Instant};

use crate::core::event_bus::EventEmitter;
use crate::core::presentation_events::{ClipFinishedEvent, PlaybackStartedEvent, SurfaceFailedEvent};
use crate::core::surface::{PlaybackSurface, SurfaceError, SurfaceId};
use crate::entities::PlayableSource;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Playback {
    Idle,
    Playing { since: Instant, ticket: u64 },
    Paused { at: f64 },
    Ended { ticket: u64 },
}

#[derive(Debug)]
pub struct HeadlessSurface {
    id: SurfaceId,
    emitter: EventEmitter,
    clip: Duration,
    slide: Option<usize>,
    visible: bool,
    playback: Playback,
}

impl HeadlessSurface {
    pub fn new(id: SurfaceId, emitter: EventEmitter, clip: Duration) -> Self {
        Self { id, emitter, clip, slide: None, visible: false, playback: Playback::Idle }
    }

    pub fn slide(&self) -> Option<usize> {
        self.slide
    }
}

impl PlaybackSurface for HeadlessSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn set_source(&mut self, slide: usize, source: &PlayableSource) -> Result<(), SurfaceError> {
        self.playback = Playback::Idle;
        if let PlayableSource::Buffered { media, .. } = source
            && !media.looks_like_mp4()
        {
            self.slide = None;
            return Err(SurfaceError::UnsupportedFormat { slide, reason: "payload is not an MP4 container".into() });
        }
        debug!("Surface {}: slide #{} <- {}", self.id, slide, source);
        self.slide = Some(slide);
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn play(&mut self, ticket: u64) {
        let Some(slide) = self.slide else {
            self.emitter.emit(SurfaceFailedEvent {
                surface: self.id,
                slide: usize::MAX,
                ticket,
                reason: "no source".into(),
            });
            return;
        };
        self.playback = Playback::Playing { since: Instant::now(), ticket };
        self.emitter.emit(PlaybackStartedEvent { surface: self.id, slide, ticket });
    }

    fn pause(&mut self) {
        let at = self.position();
        self.playback = Playback::Paused { at };
    }

    fn restart(&mut self, ticket: u64) {
        if self.slide.is_some() {
            self.playback = Playback::Playing { since: Instant::now(), ticket };
        }
    }

    fn is_playing(&self) -> bool {
        matches!(self.playback, Playback::Playing { .. })
    }

    fn position(&self) -> f64 {
        match self.playback {
            Playback::Idle => 0.0,
            Playback::Playing { since, .. } => since.elapsed().min(self.clip).as_secs_f64(),
            Playback::Paused { at } => at,
            Playback::Ended { .. } => self.clip.as_secs_f64(),
        }
    }

    fn tick(&mut self, now: Instant) {
        if let Playback::Playing { since, ticket } = self.playback
            && now.saturating_duration_since(since) >= self.clip
            && let Some(slide) = self.slide
        {
            trace!("Surface {}: clip of slide #{} ended", self.id, slide);
            // Hold the last frame
            self.playback = Playback::Ended { ticket };
            self.emitter.emit(ClipFinishedEvent { surface: self.id, slide, ticket });
        }
    }
}
