//! Deck manifest: the JSON document that lists a presentation's slides.
//!
//! ```json
//! { "slides": [ { "slide_type": "loop", "name": "Intro", "slide_id": 0,
//!                 "video": "slides/0.mp4", "first_animation": 0,
//!                 "after_last_animation": 3 } ] }
//! ```
//!
//! Relative `video` locators are resolved against the manifest's own location,
//! so a deck directory can be served from disk or from a web root unchanged.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::media::FetchError;
use super::slide::{Slide, SlideKind};
use super::traits::Fetcher;

/// One manifest row, exactly as exported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideEntry {
    pub slide_type: String,
    pub name: String,
    pub slide_id: usize,
    pub video: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_animation: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_last_animation: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub slides: Vec<SlideEntry>,
}

/// Manifest loading errors
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestError {
    /// Document could not be fetched
    Fetch(FetchError),
    /// Document is not a valid manifest
    Parse(String),
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::Fetch(e) => write!(f, "Manifest fetch failed: {}", e),
            ManifestError::Parse(msg) => write!(f, "Manifest parse error: {}", msg),
        }
    }
}

impl std::error::Error for ManifestError {}

impl From<FetchError> for ManifestError {
    fn from(e: FetchError) -> Self {
        ManifestError::Fetch(e)
    }
}

impl Manifest {
    pub fn from_json(text: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(text).map_err(|e| ManifestError::Parse(e.to_string()))
    }

    /// Fetch and parse the manifest at `locator` (URL or path).
    pub fn load(locator: &str, fetcher: &dyn Fetcher) -> Result<Self, ManifestError> {
        let bytes = fetcher.fetch(locator)?;
        let text = String::from_utf8(bytes).map_err(|e| ManifestError::Parse(e.to_string()))?;
        let manifest = Self::from_json(&text)?;
        info!("Manifest '{}': {} slides", locator, manifest.slides.len());
        Ok(manifest)
    }

    /// Build the deck. Slide ids are ordinal positions; exported ids that
    /// disagree are logged and overridden.
    pub fn into_slides(self, base: &str) -> Vec<Slide> {
        self.slides
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| {
                if entry.slide_id != idx {
                    warn!(
                        "Slide '{}' declares slide_id {} at position {}, using position",
                        entry.name, entry.slide_id, idx
                    );
                }
                let kind = SlideKind::resolve_behavior(&entry.slide_type);
                let locator = resolve_locator(base, &entry.video);
                debug!("Slide #{} '{}' ({}) -> {}", idx, entry.name, kind, locator);
                Slide::new(idx, entry.name, kind, locator)
                    .with_animations(entry.first_animation, entry.after_last_animation)
            })
            .collect()
    }
}

fn has_scheme(locator: &str) -> bool {
    locator.contains("://")
}

/// Resolve a slide's `video` against the manifest location.
///
/// Absolute URLs and absolute paths pass through; anything else is joined to
/// the manifest's directory (URL or filesystem).
pub fn resolve_locator(base: &str, video: &str) -> String {
    if has_scheme(video) || Path::new(video).is_absolute() {
        return video.to_string();
    }

    if has_scheme(base) {
        return match base.rfind('/') {
            Some(pos) => format!("{}/{}", &base[..pos], video),
            None => video.to_string(),
        };
    }

    match Path::new(base).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(video).to_string_lossy().into_owned(),
        _ => video.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const DECK: &str = r#"{
        "slides": [
            {"slide_type": "normal", "name": "Title", "slide_id": 0, "video": "0.mp4"},
            {"slide_type": "loop", "name": "Spin", "slide_id": 1, "video": "1.mp4",
             "first_animation": 2, "after_last_animation": 5},
            {"slide_type": "wobble", "name": "Odd", "slide_id": 7, "video": "https://cdn/x.mp4"}
        ]
    }"#;

    struct StaticFetcher {
        body: &'static str,
        asked: Mutex<Vec<String>>,
    }

    impl Fetcher for StaticFetcher {
        fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
            self.asked.lock().unwrap().push(locator.to_string());
            Ok(self.body.as_bytes().to_vec())
        }
    }

    #[test]
    fn test_parse_and_build_deck() {
        let manifest = Manifest::from_json(DECK).expect("valid manifest");
        assert_eq!(manifest.slides.len(), 3);
        assert_eq!(manifest.slides[1].first_animation, Some(2));

        let slides = manifest.into_slides("http://host/deck/index.json");
        assert_eq!(slides[0].kind(), SlideKind::Normal);
        assert_eq!(slides[0].source_locator(), "http://host/deck/0.mp4");
        assert_eq!(slides[1].kind(), SlideKind::Loop);
        assert_eq!(slides[1].animations(), (Some(2), Some(5)));

        // Unknown type soft-fails; mismatched id is replaced by position
        assert_eq!(slides[2].kind(), SlideKind::Normal);
        assert_eq!(slides[2].id(), 2);
        assert_eq!(slides[2].source_locator(), "https://cdn/x.mp4");
    }

    #[test]
    fn test_parse_failure() {
        assert!(matches!(Manifest::from_json("{\"slides\": 3}"), Err(ManifestError::Parse(_))));
        assert!(matches!(Manifest::from_json("not json"), Err(ManifestError::Parse(_))));
    }

    #[test]
    fn test_load_through_fetcher() {
        let fetcher = StaticFetcher { body: DECK, asked: Mutex::new(Vec::new()) };
        let manifest = Manifest::load("deck/index.json", &fetcher).expect("load");
        assert_eq!(manifest.slides.len(), 3);
        assert_eq!(fetcher.asked.lock().unwrap().as_slice(), ["deck/index.json"]);
    }

    #[test]
    fn test_resolve_locator() {
        assert_eq!(resolve_locator("https://a/b/c.json", "v/1.mp4"), "https://a/b/v/1.mp4");
        assert_eq!(resolve_locator("https://a/b/c.json", "http://z/1.mp4"), "http://z/1.mp4");
        assert_eq!(resolve_locator("slides.json", "1.mp4"), "1.mp4");
        assert_eq!(
            resolve_locator("deck/slides.json", "1.mp4"),
            Path::new("deck").join("1.mp4").to_string_lossy()
        );
    }
}
