mod app;
mod audio;
mod cli;
mod config;
mod error;
mod sched;
mod scene;
mod viz;

use anyhow::{Context, Result};
use clap::Parser;
use winit::event_loop::EventLoop;

use app::{App, AppOptions, SourceSelect};
use cli::Cli;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect resona.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = std::path::PathBuf::from("resona.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("resona").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("resona").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.width == 1280 { cli.width = cfg.window.width; }
            if cli.height == 720 { cli.height = cfg.window.height; }
            if cli.fft_size == 256 { cli.fft_size = cfg.audio.fft_size; }
            if cli.smoothing == 0.8 { cli.smoothing = cfg.audio.smoothing; }
            if cli.volume == 1.0 { cli.volume = cfg.audio.volume; }
            if cli.strategy == "bars" { cli.strategy = cfg.visual.strategy; }
            if cli.bars == 32 { cli.bars = cfg.visual.bars; }
            if cli.particles == 5000 { cli.particles = cfg.visual.particles; }
            if cli.arms == 5 { cli.arms = cfg.visual.arms; }
            if cli.gain == 5.0 { cli.gain = cfg.visual.gain; }
            if cli.floor == 0.5 { cli.floor = cfg.visual.floor; }
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    let source = if cli.live {
        SourceSelect::Live
    } else {
        let input = cli
            .input
            .as_ref()
            .context("Input audio file is required (or pass --live for the microphone)")?;
        if !input.exists() {
            anyhow::bail!("Input file not found: {}", input.display());
        }
        SourceSelect::File(input.clone())
    };

    if !cli.fft_size.is_power_of_two() || cli.fft_size < audio::analyser::MIN_FFT_SIZE {
        anyhow::bail!(
            "--fft-size must be a power of two >= {}",
            audio::analyser::MIN_FFT_SIZE
        );
    }

    let visual = config::VisualConfig {
        strategy: cli.strategy.clone(),
        bars: cli.bars,
        particles: cli.particles,
        arms: cli.arms,
        gain: cli.gain,
        floor: cli.floor,
    };
    let mapper = viz::build_mapper(&visual).map_err(|e| anyhow::anyhow!(e))?;

    log::info!("resona - real-time audio visualizer");
    match &source {
        SourceSelect::File(path) => log::info!("Input: {}", path.display()),
        SourceSelect::Live => log::info!("Input: live capture"),
    }
    log::info!("Strategy: {}", cli.strategy);
    log::info!(
        "Spectrum: fft={} ({} bins), smoothing={:.2}",
        cli.fft_size,
        cli.fft_size / 2,
        cli.smoothing
    );

    let options = AppOptions {
        source,
        fft_size: cli.fft_size,
        smoothing: cli.smoothing,
        volume: cli.volume,
        width: cli.width,
        height: cli.height,
    };

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(options, mapper);
    event_loop
        .run_app(&mut app)
        .context("Event loop terminated abnormally")?;

    Ok(())
}
