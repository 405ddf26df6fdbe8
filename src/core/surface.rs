//! Double-buffered playback surfaces.
//!
//! Two interchangeable surfaces alternate: the next clip is assigned to the
//! hidden one and started there, and only after it reports that playback
//! began is the outgoing surface paused and hidden. The presentation owns the
//! pair exclusively.
//!
//! Surfaces report asynchronously through events (`PlaybackStartedEvent`,
//! `ClipFinishedEvent`, `SurfaceFailedEvent`) tagged with the ticket passed to
//! `play`/`restart`.

use serde::Serialize;
use std::fmt;
use std::time::Instant;

use crate::entities::PlayableSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SurfaceId {
    A,
    B,
}

impl SurfaceId {
    pub fn other(self) -> SurfaceId {
        match self {
            SurfaceId::A => SurfaceId::B,
            SurfaceId::B => SurfaceId::A,
        }
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceId::A => f.write_str("A"),
            SurfaceId::B => f.write_str("B"),
        }
    }
}

/// Surface errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// Source rejected before playback (codec / container)
    UnsupportedFormat { slide: usize, reason: String },
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceError::UnsupportedFormat { slide, reason } => {
                write!(f, "Unsupported media for slide #{}: {}", slide, reason)
            }
        }
    }
}

impl std::error::Error for SurfaceError {}

/// One video output.
pub trait PlaybackSurface {
    fn id(&self) -> SurfaceId;

    /// Assign a clip. Rejection leaves the surface without a source.
    fn set_source(&mut self, slide: usize, source: &PlayableSource) -> Result<(), SurfaceError>;

    fn set_visible(&mut self, visible: bool);

    fn is_visible(&self) -> bool;

    /// Start playback of the assigned clip; acknowledged by `PlaybackStartedEvent`.
    fn play(&mut self, ticket: u64);

    /// Stop without emitting further events for the current ticket.
    fn pause(&mut self);

    /// Seek to zero and play again under a new ticket.
    fn restart(&mut self, ticket: u64);

    fn is_playing(&self) -> bool;

    /// Playback offset in seconds
    fn position(&self) -> f64;

    /// Advance time-driven surfaces
    fn tick(&mut self, _now: Instant) {}
}

/// The two surfaces plus which one is on screen.
#[derive(Debug)]
pub struct SurfacePair<S> {
    a: S,
    b: S,
    active: SurfaceId,
}

impl<S: PlaybackSurface> SurfacePair<S> {
    /// B counts as active before anything plays, so the first slide lands on A.
    pub fn new(a: S, b: S) -> Self {
        Self { a, b, active: SurfaceId::B }
    }

    pub fn active_id(&self) -> SurfaceId {
        self.active
    }

    pub fn inactive_id(&self) -> SurfaceId {
        self.active.other()
    }

    pub fn get(&self, id: SurfaceId) -> &S {
        match id {
            SurfaceId::A => &self.a,
            SurfaceId::B => &self.b,
        }
    }

    pub fn get_mut(&mut self, id: SurfaceId) -> &mut S {
        match id {
            SurfaceId::A => &mut self.a,
            SurfaceId::B => &mut self.b,
        }
    }

    pub fn active(&self) -> &S {
        self.get(self.active)
    }

    pub fn active_mut(&mut self) -> &mut S {
        self.get_mut(self.active)
    }

    /// Make `id` the visible surface. The caller has already paused and
    /// hidden the outgoing one.
    pub fn flip_to(&mut self, id: SurfaceId) {
        self.active = id;
    }

    pub fn tick(&mut self, now: Instant) {
        self.a.tick(now);
        self.b.tick(now);
    }
}
