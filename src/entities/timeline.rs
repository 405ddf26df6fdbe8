//! Timeline status per slide.
//!
//! Rendering is someone else's job; this only tracks the marker each slide
//! would show: untouched, the one on screen, or already shown.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideStatus {
    #[default]
    Unselected,
    Selected,
    Finished,
}

impl SlideStatus {
    /// Single-glyph marker for terminal output
    pub fn glyph(&self) -> char {
        match self {
            SlideStatus::Unselected => 'o',
            SlideStatus::Selected => '@',
            SlideStatus::Finished => 'x',
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    statuses: Vec<SlideStatus>,
}

impl Timeline {
    pub fn new(len: usize) -> Self {
        Self { statuses: vec![SlideStatus::Unselected; len] }
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn status(&self, idx: usize) -> Option<SlideStatus> {
        self.statuses.get(idx).copied()
    }

    pub fn statuses(&self) -> &[SlideStatus] {
        &self.statuses
    }

    /// Record a completed swap from `previous` (-1 = none) to `current`.
    pub fn mark_settled(&mut self, previous: i32, current: usize) {
        if previous >= 0
            && let Some(s) = self.statuses.get_mut(previous as usize)
        {
            *s = SlideStatus::Finished;
        }
        if let Some(s) = self.statuses.get_mut(current) {
            *s = SlideStatus::Selected;
        }
    }

    /// Compact strip like `xx@oo`
    pub fn render(&self) -> String {
        self.statuses.iter().map(|s| s.glyph()).collect()
    }
}
