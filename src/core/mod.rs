//! Core engine modules - presentation, caches, events, workers
//!
//! These modules form the playback engine, independent of any frontend.

pub mod batch;
pub mod event_bus;
pub mod loader;
pub mod media_cache;
pub mod presentation;
pub mod presentation_events;
pub mod surface;
pub mod workers;

#[cfg(test)]
pub mod testing;

// Re-exports for convenience
pub use batch::{BatchDownloadTracker, BatchStatus, ProgressObserver};
pub use event_bus::EventBus;
pub use loader::{HttpFetcher, MediaLoader};
pub use media_cache::{CacheStats, DirectCache, MediaCache, WindowedCache};
pub use presentation::Presentation;
pub use surface::{PlaybackSurface, SurfaceId, SurfacePair};
pub use workers::Workers;
