//! Interactive terminal shell around a [`Presentation`].
//!
//! A reader thread forwards stdin lines over a channel; the main loop ticks
//! the surfaces and drains engine events at a fixed frame interval, applying
//! commands between frames.

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use log::{debug, info, warn};
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::core::presentation::Presentation;
use crate::core::presentation_events::{ClipFinishedEvent, DeckFinishedEvent, SlideChangedEvent};
use crate::core::surface::PlaybackSurface;
use crate::progress::TerminalProgress;

/// Main loop frame interval
pub const FRAME: Duration = Duration::from_millis(16);

pub const HELP: &str = "\
Commands:
  n, next        next slide
  p, prev        previous slide
  r, restart     restart current slide
  g N, goto N    jump to slide N
  s, status      print status line
  c, cache       cache the whole deck
  h, help        this help
  q, quit        exit";

/// One line of shell input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Next,
    Previous,
    Restart,
    Goto(usize),
    Status,
    Cache,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Empty,
    Unknown(String),
    BadIndex(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Empty => write!(f, "empty command"),
            CommandError::Unknown(cmd) => write!(f, "unknown command '{}' (h for help)", cmd),
            CommandError::BadIndex(arg) => write!(f, "expected slide number, got '{}'", arg),
        }
    }
}

impl std::error::Error for CommandError {}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(word) = parts.next() else {
            return Err(CommandError::Empty);
        };
        let cmd = match word.to_ascii_lowercase().as_str() {
            "n" | "next" => Command::Next,
            "p" | "prev" | "previous" => Command::Previous,
            "r" | "restart" => Command::Restart,
            "s" | "status" => Command::Status,
            "c" | "cache" => Command::Cache,
            "h" | "help" | "?" => Command::Help,
            "q" | "quit" | "exit" => Command::Quit,
            "g" | "goto" => {
                let arg = parts.next().unwrap_or_default();
                let index = arg.parse().map_err(|_| CommandError::BadIndex(arg.to_string()))?;
                Command::Goto(index)
            }
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(cmd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell<S: PlaybackSurface> {
    presentation: Presentation<S>,
    clip_ends: Arc<AtomicUsize>,
}

impl<S: PlaybackSurface> Shell<S> {
    /// Wrap `presentation` and print slide changes as they happen.
    pub fn new(presentation: Presentation<S>) -> Self {
        let bus = presentation.event_bus();
        bus.subscribe::<SlideChangedEvent, _>(|e| println!("> #{} {}", e.slide, e.name));
        bus.subscribe::<DeckFinishedEvent, _>(|e| println!("> end of deck (#{})", e.last));
        let clip_ends = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&clip_ends);
        bus.subscribe::<ClipFinishedEvent, _>(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        Self { presentation, clip_ends }
    }

    pub fn presentation(&self) -> &Presentation<S> {
        &self.presentation
    }

    pub fn into_presentation(self) -> Presentation<S> {
        self.presentation
    }

    pub fn execute(&mut self, cmd: Command) -> Flow {
        debug!("Shell command: {:?}", cmd);
        let result = match cmd {
            Command::Next => self.presentation.play_next_slide(),
            Command::Previous => self.presentation.play_previous_slide(),
            Command::Restart => self.presentation.restart_current_slide(),
            Command::Goto(index) => self.presentation.select_slide(index),
            Command::Status => {
                println!("{}", self.presentation.status());
                Ok(())
            }
            Command::Cache => {
                let status = self.presentation.cache_deck(Box::new(TerminalProgress::new()));
                info!("Batch caching: {:?}", status);
                Ok(())
            }
            Command::Help => {
                println!("{}", HELP);
                Ok(())
            }
            Command::Quit => return Flow::Quit,
        };
        if let Err(e) = result {
            println!("! {}", e);
        }
        Flow::Continue
    }

    /// Parse and run one input line. Bad input is reported, never fatal.
    pub fn execute_line(&mut self, line: &str) -> Flow {
        match line.parse::<Command>() {
            Ok(cmd) => self.execute(cmd),
            Err(CommandError::Empty) => Flow::Continue,
            Err(e) => {
                println!("! {}", e);
                Flow::Continue
            }
        }
    }

    /// One frame: advance surface clocks, then apply completions.
    pub fn step(&mut self, now: Instant) -> usize {
        self.presentation.tick(now);
        self.presentation.process_events()
    }

    /// Run until `quit`. Once the input channel closes the deck keeps
    /// playing until the slide on screen has ended or the deck is finished.
    pub fn run(&mut self, input: &Receiver<String>) {
        loop {
            match input.recv_timeout(FRAME) {
                Ok(line) => {
                    if self.execute_line(&line) == Flow::Quit {
                        break;
                    }
                    // Drain lines that arrived together
                    let mut quit = false;
                    loop {
                        match input.try_recv() {
                            Ok(line) => {
                                if self.execute_line(&line) == Flow::Quit {
                                    quit = true;
                                    break;
                                }
                            }
                            Err(TryRecvError::Empty) => break,
                            Err(TryRecvError::Disconnected) => {
                                self.play_out();
                                return;
                            }
                        }
                    }
                    if quit {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.play_out();
                    return;
                }
            }
            self.step(Instant::now());
        }
        self.step(Instant::now());
    }

    /// Keep stepping without input until nothing more will happen on its own.
    fn play_out(&mut self) {
        info!("Input closed, playing out");
        let mut seen = self.clip_ends.load(Ordering::Relaxed);
        loop {
            self.step(Instant::now());
            let presentation = &self.presentation;
            if presentation.is_finished() {
                break;
            }
            if presentation.pending().is_some() {
                // Only an end on the incoming slide counts
                seen = self.clip_ends.load(Ordering::Relaxed);
            } else if presentation.current_slide() < 0
                || !presentation.surfaces().active().is_playing()
                || self.clip_ends.load(Ordering::Relaxed) != seen
            {
                break;
            }
            std::thread::sleep(FRAME);
        }
    }
}

/// Forward stdin lines to a channel from a background thread.
pub fn spawn_stdin_reader() -> std::io::Result<Receiver<String>> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::Builder::new().name("slideplay-stdin".into()).spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("stdin read failed: {}", e);
                    break;
                }
            }
        }
    })?;
    Ok(rx)
}
