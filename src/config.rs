use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub visual: VisualConfig,
}

#[derive(Debug, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisualConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_bars")]
    pub bars: usize,
    #[serde(default = "default_particles")]
    pub particles: usize,
    #[serde(default = "default_arms")]
    pub arms: usize,
    #[serde(default = "default_gain")]
    pub gain: f32,
    #[serde(default = "default_floor")]
    pub floor: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
            volume: default_volume(),
        }
    }
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            bars: default_bars(),
            particles: default_particles(),
            arms: default_arms(),
            gain: default_gain(),
            floor: default_floor(),
        }
    }
}

fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 720 }
fn default_fft_size() -> usize { 256 }
fn default_smoothing() -> f32 { 0.8 }
fn default_volume() -> f32 { 1.0 }
fn default_strategy() -> String { "bars".into() }
fn default_bars() -> usize { 32 }
fn default_particles() -> usize { 5000 }
fn default_arms() -> usize { 5 }
fn default_gain() -> f32 { 5.0 }
fn default_floor() -> f32 { 0.5 }

pub fn load_config(path: &PathBuf) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.visual.bars, 32);
        assert_eq!(config.audio.fft_size, 256);
        assert_eq!(config.visual.strategy, "bars");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [visual]
            strategy = "particles"
            particles = 2000
            "#,
        )
        .unwrap();
        assert_eq!(config.visual.strategy, "particles");
        assert_eq!(config.visual.particles, 2000);
        assert_eq!(config.visual.arms, 5);
        assert_eq!(config.window.width, 1280);
    }
}
