//! slideplay - seamless video-slide presenter library
//!
//! Re-exports all modules for use by the binary target.

// Core engine (presentation, caches, events, workers)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod entities;
pub mod headless;
pub mod paths;
pub mod progress;
pub mod shell;

// Re-export commonly used types from core
pub use core::event_bus::{BoxedEvent, EventBus, EventEmitter, downcast_event};
pub use core::media_cache::{DirectCache, MediaCache, WindowedCache};
pub use core::presentation::{Presentation, PresentationError};
pub use core::surface::{PlaybackSurface, SurfaceId, SurfacePair};

// Re-export entities
pub use entities::{Manifest, PlayableSource, Slide, SlideCheckpoint, SlideKind};
