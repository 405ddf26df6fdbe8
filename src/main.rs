use slideplay::cli::Args;
use slideplay::config::{self, DeckSettings, SETTINGS_FILE};
use slideplay::core::event_bus::EventBus;
use slideplay::core::loader::HttpFetcher;
use slideplay::core::presentation::Presentation;
use slideplay::core::surface::{SurfaceId, SurfacePair};
use slideplay::core::workers::Workers;
use slideplay::entities::Manifest;
use slideplay::headless::HeadlessSurface;
use slideplay::progress::TerminalProgress;
use slideplay::shell::{self, Shell};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn init_logger(args: &Args, path_config: &config::PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| config::data_file("slideplay.log", path_config));

        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .filter_module("ureq", log::LevelFilter::Info)
            .filter_module("rustls", log::LevelFilter::Warn)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Respects RUST_LOG if set
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .filter_module("rustls", log::LevelFilter::Warn)
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

fn write_checkpoint(presentation: &mut Presentation<HeadlessSurface>, path: &Path) -> Result<()> {
    let Some(record) = presentation.checkpoint() else {
        warn!("Nothing played, no checkpoint written");
        return Ok(());
    };
    let json = serde_json::to_string_pretty(&record).context("Failed to serialize checkpoint")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write checkpoint: {}", path.display()))?;
    info!("Checkpoint written to {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = config::PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }

    init_logger(&args, &path_config)?;
    info!("slideplay {} starting...", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", args);

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(|| config::config_file(SETTINGS_FILE, &path_config));
    info!("Settings: {}", settings_path.display());
    let settings = DeckSettings::load(&settings_path)?.with_overrides(&args);
    debug!("Effective settings: {:?}", settings);

    let fetcher = Arc::new(HttpFetcher::new());
    let manifest = Manifest::load(&args.manifest, fetcher.as_ref())
        .with_context(|| format!("Failed to load deck manifest: {}", args.manifest))?;
    let slides = manifest.into_slides(&args.manifest);
    if slides.is_empty() {
        bail!("Deck manifest {} has no slides", args.manifest);
    }
    info!("Deck: {} slides", slides.len());

    let workers = Arc::new(Workers::new(settings.fetch_workers).context("Failed to start fetch workers")?);
    let bus = EventBus::new();
    let clip = Duration::from_secs_f64(settings.clip_seconds);
    let surfaces = SurfacePair::new(
        HeadlessSurface::new(SurfaceId::A, bus.emitter(), clip),
        HeadlessSurface::new(SurfaceId::B, bus.emitter(), clip),
    );
    let mut presentation =
        Presentation::new(slides, settings.media_cache(), workers, fetcher, surfaces, bus)
            .with_cache_batch_size(settings.cache_batch_size);

    if settings.cache_on_start {
        presentation.cache_deck(Box::new(TerminalProgress::new()));
    }

    if let Err(e) = presentation.play_slide(args.start, true) {
        warn!("{}, starting at the first slide", e);
        presentation.play_slide(0, true)?;
    }

    println!("{}", shell::HELP);
    let input = shell::spawn_stdin_reader().context("Failed to start input reader")?;
    let mut shell = Shell::new(presentation);
    shell.run(&input);

    let mut presentation = shell.into_presentation();
    info!("{}", presentation.status());
    if let Some(path) = &args.checkpoint {
        write_checkpoint(&mut presentation, path)?;
    }
    Ok(())
}
