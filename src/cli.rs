use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "resona", about = "Real-time audio-reactive 3D visualizer")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG). Omit together with --live
    /// to visualize the default microphone instead.
    pub input: Option<PathBuf>,

    /// Visualize the live input device instead of a file
    #[arg(long)]
    pub live: bool,

    /// Mapping strategy (bars, particles)
    #[arg(short, long, default_value = "bars")]
    pub strategy: String,

    /// FFT window size (power of two; bin count is half of this)
    #[arg(long, default_value_t = 256)]
    pub fft_size: usize,

    /// Number of bars in the radial ring
    #[arg(long, default_value_t = 32)]
    pub bars: usize,

    /// Particle count for the particle field
    #[arg(long, default_value_t = 5000)]
    pub particles: usize,

    /// Spiral arm count for the particle field
    #[arg(long, default_value_t = 5)]
    pub arms: usize,

    /// Bar scale gain
    #[arg(long, default_value_t = 5.0)]
    pub gain: f32,

    /// Minimum bar scale
    #[arg(long, default_value_t = 0.5)]
    pub floor: f32,

    /// Spectrum smoothing time constant (0.0-1.0)
    #[arg(long, default_value_t = 0.8)]
    pub smoothing: f32,

    /// Initial playback volume (0.0-1.0)
    #[arg(long, default_value_t = 1.0)]
    pub volume: f32,

    /// Window width in pixels
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Window height in pixels
    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Explicit config file path (default: resona.toml, then the user
    /// config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
