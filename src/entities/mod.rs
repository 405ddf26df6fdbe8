//! Entities module - deck data types, independent of playback machinery
//!
//! - `Slide`: one clip plus its cache state
//! - `Manifest`: the exported deck description
//! - `Timeline`: per-slide status markers
//!
//! `traits` holds the interfaces entities need from `core` (fetching,
//! scheduling), so the dependency only points one way.

pub mod manifest;
pub mod media;
pub mod slide;
pub mod timeline;
pub mod traits;

pub use manifest::{Manifest, ManifestError, SlideEntry};
pub use media::{FetchError, MediaBuffer, PlayableSource};
pub use slide::{CacheKind, LoadOutcome, LoadState, Slide, SlideCheckpoint, SlideError, SlideKind};
pub use timeline::{SlideStatus, Timeline};
pub use traits::{CacheStatsSnapshot, FetchQueue, Fetcher, WorkerPool};
