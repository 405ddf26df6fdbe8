//! Deck settings and application paths.
//!
//! Settings are plain JSON (`slideplay.json` in the config directory, or
//! `--settings FILE`). Missing fields take defaults; CLI flags win over the
//! file.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cli::Args;
use crate::core::media_cache::{MediaCache, build_cache};

pub use crate::paths::{PathConfig, config_file, data_file, ensure_dirs};

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "slideplay.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckSettings {
    /// Slides per batch when caching the whole deck (>= 1)
    pub cache_batch_size: usize,
    /// Windowed cache: slides buffered ahead of the current one
    pub slides_to_auto_load: usize,
    /// Windowed cache: slides kept behind the current one
    pub slides_to_keep: usize,
    /// Direct streaming instead of the windowed cache
    pub use_fallback: bool,
    /// Parallel fetch threads
    pub fetch_workers: usize,
    /// Headless surface clip length in seconds
    pub clip_seconds: f64,
    /// Run batch caching right after the manifest loads
    pub cache_on_start: bool,
}

impl Default for DeckSettings {
    fn default() -> Self {
        Self {
            cache_batch_size: 5,
            slides_to_auto_load: 5,
            slides_to_keep: 2,
            use_fallback: false,
            fetch_workers: 4,
            clip_seconds: 3.0,
            cache_on_start: false,
        }
    }
}

impl DeckSettings {
    /// Read settings; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        Ok(settings.sanitized())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write settings: {}", path.display()))
    }

    /// Clamp values the engine cannot use.
    pub fn sanitized(mut self) -> Self {
        if self.cache_batch_size == 0 {
            warn!("cache_batch_size must be positive, using 1");
            self.cache_batch_size = 1;
        }
        if self.fetch_workers == 0 {
            self.fetch_workers = 1;
        }
        if !(self.clip_seconds.is_finite() && self.clip_seconds > 0.0) {
            warn!("clip_seconds must be positive, using default");
            self.clip_seconds = Self::default().clip_seconds;
        }
        self
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, args: &Args) -> Self {
        if args.fallback {
            self.use_fallback = true;
        }
        if let Some(n) = args.auto_load {
            self.slides_to_auto_load = n;
        }
        if let Some(n) = args.keep {
            self.slides_to_keep = n;
        }
        if let Some(n) = args.batch_size {
            self.cache_batch_size = n;
        }
        if let Some(secs) = args.clip_secs {
            self.clip_seconds = secs;
        }
        if args.cache {
            self.cache_on_start = true;
        }
        self.sanitized()
    }

    /// Cache strategy these settings select
    pub fn media_cache(&self) -> Box<dyn MediaCache> {
        build_cache(self.use_fallback, self.slides_to_auto_load, self.slides_to_keep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::CacheKind;

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{"slides_to_keep": 0, "cache_batch_size": 0}"#).expect("write");

        let settings = DeckSettings::load(&path).expect("load");
        assert_eq!(settings.slides_to_keep, 0);
        assert_eq!(settings.slides_to_auto_load, 5);
        // Clamped
        assert_eq!(settings.cache_batch_size, 1);
    }

    #[test]
    fn test_missing_file_and_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        assert_eq!(DeckSettings::load(&path).expect("defaults"), DeckSettings::default());

        let settings = DeckSettings { use_fallback: true, fetch_workers: 8, ..Default::default() };
        settings.save(&path).expect("save");
        assert_eq!(DeckSettings::load(&path).expect("load"), settings);
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ nope").expect("write");
        assert!(DeckSettings::load(&path).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let args = Args {
            fallback: true,
            keep: Some(7),
            batch_size: Some(0),
            clip_secs: Some(1.5),
            cache: true,
            ..Default::default()
        };
        let settings = DeckSettings::default().with_overrides(&args);
        assert!(settings.use_fallback);
        assert_eq!(settings.slides_to_keep, 7);
        assert_eq!(settings.cache_batch_size, 1);
        assert_eq!(settings.clip_seconds, 1.5);
        assert!(settings.cache_on_start);
        assert_eq!(settings.media_cache().kind(), CacheKind::Direct);
        assert_eq!(DeckSettings::default().media_cache().kind(), CacheKind::Windowed);
    }
}
