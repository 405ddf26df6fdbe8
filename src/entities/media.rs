//! Media payloads and playable source references.
//!
//! A [`MediaBuffer`] is the fetched clip held in memory (cheap to clone, the
//! bytes live behind an `Arc`). A [`PlayableSource`] is what a playback
//! surface receives: either the remote locator or a handle to a buffer.

use std::fmt;
use std::sync::Arc;

/// Fetched clip bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaBuffer {
    bytes: Arc<[u8]>,
}

impl MediaBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes: bytes.into() }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// ISO-BMFF check: an MP4 file starts with a box whose type is `ftyp`.
    pub fn looks_like_mp4(&self) -> bool {
        self.bytes.len() >= 8 && &self.bytes[4..8] == b"ftyp"
    }
}

impl From<Vec<u8>> for MediaBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

// Payloads can be tens of MB; never dump them into logs.
impl fmt::Debug for MediaBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaBuffer").field("len", &self.len()).finish()
    }
}

/// Source handed to a playback surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayableSource {
    /// Stream straight from the slide's locator (Direct strategy).
    Remote(String),
    /// Play from a locally buffered copy (Windowed strategy).
    Buffered { slide: usize, media: MediaBuffer },
}

impl PlayableSource {
    pub fn is_buffered(&self) -> bool {
        matches!(self, PlayableSource::Buffered { .. })
    }
}

impl fmt::Display for PlayableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayableSource::Remote(url) => write!(f, "{}", url),
            PlayableSource::Buffered { slide, media } => {
                write!(f, "buffer://slide/{} ({} bytes)", slide, media.len())
            }
        }
    }
}

/// Media fetch errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network-level failure (DNS, connect, TLS, HTTP status).
    Transport { locator: String, message: String },
    /// Local file could not be read.
    Io { locator: String, message: String },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport { locator, message } => {
                write!(f, "Transport error for '{}': {}", locator, message)
            }
            FetchError::Io { locator, message } => {
                write!(f, "Cannot read '{}': {}", locator, message)
            }
        }
    }
}

impl std::error::Error for FetchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mp4_signature() {
        let mut mp4 = vec![0, 0, 0, 24];
        mp4.extend_from_slice(b"ftypisom");
        assert!(MediaBuffer::new(mp4).looks_like_mp4());

        assert!(!MediaBuffer::new(b"<html>404</html>".to_vec()).looks_like_mp4());
        assert!(!MediaBuffer::new(vec![1, 2, 3]).looks_like_mp4());
    }

    #[test]
    fn test_buffer_clone_shares_bytes() {
        let a = MediaBuffer::new(vec![7; 1024]);
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(b.len(), 1024);
        assert_eq!(format!("{:?}", b), "MediaBuffer { len: 1024 }");
    }

    #[test]
    fn test_source_display() {
        let remote = PlayableSource::Remote("https://host/1.mp4".into());
        assert_eq!(remote.to_string(), "https://host/1.mp4");
        assert!(!remote.is_buffered());

        let buffered = PlayableSource::Buffered { slide: 3, media: MediaBuffer::new(vec![0; 10]) };
        assert_eq!(buffered.to_string(), "buffer://slide/3 (10 bytes)");
        assert!(buffered.is_buffered());
    }
}
