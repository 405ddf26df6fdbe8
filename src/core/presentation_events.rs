//! Presentation events.
//!
//! Completions flow from fetch workers and playback surfaces into the
//! presentation's queue; notifications flow out to the shell.
//! `ticket` identifies one `play()` request on a surface so an ack or end
//! signal from an abandoned request can be told apart from a live one.

use crate::core::surface::SurfaceId;
use crate::entities::{FetchError, MediaBuffer};

// === Completions (into the engine) ===

/// A fetch requested via `Slide::load` resolved.
#[derive(Clone, Debug)]
pub struct LoadCompletedEvent {
    pub slide: usize,
    pub epoch: u64,
    pub outcome: Result<MediaBuffer, FetchError>,
}

/// A surface actually started rendering after `play(ticket)`.
#[derive(Clone, Debug)]
pub struct PlaybackStartedEvent {
    pub surface: SurfaceId,
    pub slide: usize,
    pub ticket: u64,
}

/// A surface reached the end of its clip.
#[derive(Clone, Debug)]
pub struct ClipFinishedEvent {
    pub surface: SurfaceId,
    pub slide: usize,
    pub ticket: u64,
}

/// A surface gave up on its source after accepting it (decode error).
#[derive(Clone, Debug)]
pub struct SurfaceFailedEvent {
    pub surface: SurfaceId,
    pub slide: usize,
    pub ticket: u64,
    pub reason: String,
}

// === Notifications (out of the engine) ===

#[derive(Clone, Debug)]
pub struct SlideChangedEvent {
    pub slide: usize,
    pub name: String,
}

/// Auto-advance ran past the last slide.
#[derive(Clone, Debug)]
pub struct DeckFinishedEvent {
    pub last: usize,
}
