use clap::Parser;
use std::path::PathBuf;

// Build version with backend info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "HTTP:   ureq 3\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Seamless video-slide presenter
#[derive(Parser, Debug, Default)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Deck manifest (local path or http(s) URL)
    #[arg(value_name = "MANIFEST", default_value = "index.json")]
    pub manifest: String,

    /// Stream clips directly instead of buffering a window of slides
    #[arg(long = "fallback")]
    pub fallback: bool,

    /// Slides to prefetch ahead of the current one
    #[arg(long = "auto-load", value_name = "N")]
    pub auto_load: Option<usize>,

    /// Slides to keep buffered behind the current one
    #[arg(long = "keep", value_name = "N")]
    pub keep: Option<usize>,

    /// Slides fetched concurrently by batch caching
    #[arg(long = "batch-size", value_name = "N")]
    pub batch_size: Option<usize>,

    /// Cache the whole deck at startup
    #[arg(long = "cache")]
    pub cache: bool,

    /// Clip length of the headless surfaces, in seconds
    #[arg(long = "clip-secs", value_name = "SECS")]
    pub clip_secs: Option<f64>,

    /// First slide to play (0-based)
    #[arg(long = "start", value_name = "N", default_value_t = 0)]
    pub start: i32,

    /// Write the current slide's checkpoint record here on exit
    #[arg(long = "checkpoint", value_name = "FILE")]
    pub checkpoint: Option<PathBuf>,

    /// Load settings from this file instead of the config directory
    #[arg(long = "settings", value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Enable debug logging to file (default: slideplay.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}
