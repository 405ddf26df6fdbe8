use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::debug;

use crate::core::batch::ProgressObserver;

/// Terminal progress bar for batch caching
#[derive(Debug)]
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        let style = ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} slides ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        bar.set_style(style);
        Self { bar }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for TerminalProgress {
    fn show(&mut self, total: usize) {
        if self.bar.is_hidden() {
            self.bar.set_draw_target(ProgressDrawTarget::stderr());
        }
        self.bar.set_length(total as u64);
        self.bar.set_message("caching");
    }

    fn update(&mut self, finished: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(finished as u64);
    }

    fn hide(&mut self) {
        debug!("Caching progress done at {}", self.bar.position());
        self.bar.finish_and_clear();
    }
}
