pub mod backdrop;
pub mod bars;
pub mod frame;
pub mod particles;

use crate::config::VisualConfig;
use crate::scene::Scene;
use backdrop::BackdropSignal;
use frame::FrequencyFrame;

/// Per-tick transform from the latest frequency frame into scene
/// mutations. Strategies receive the scene handle explicitly on every
/// call; there is no ambient scene lookup anywhere.
///
/// Contract: an absent or empty frame is a no-op tick (elements hold
/// their last values), and a frame shorter than the element count is
/// addressed modulo its length.
pub trait VisualMapper {
    /// Create this strategy's elements in the scene. Called once, when
    /// the scene becomes available.
    fn mount(&mut self, scene: &mut Scene);

    /// Remove every element this strategy owns.
    fn unmount(&mut self, scene: &mut Scene);

    /// Apply one tick. `now` is wall-clock seconds since app start.
    fn apply(&mut self, frame: Option<&FrequencyFrame>, now: f32, scene: &mut Scene);

    /// Ambient background signal, for strategies that produce one.
    fn backdrop(&self) -> Option<BackdropSignal> {
        None
    }
}

/// The two shipped mapping strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    Bars,
    Particles,
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bars" => Ok(Self::Bars),
            "particles" => Ok(Self::Particles),
            other => Err(format!(
                "unknown strategy '{}' (available: bars, particles)",
                other
            )),
        }
    }
}

pub fn build_mapper(config: &VisualConfig) -> Result<Box<dyn VisualMapper>, String> {
    let strategy: Strategy = config.strategy.parse()?;
    Ok(match strategy {
        Strategy::Bars => Box::new(bars::RadialBars::new(bars::RadialBarsConfig {
            bars: config.bars,
            gain: config.gain,
            floor_scale: config.floor,
            ..Default::default()
        })),
        Strategy::Particles => Box::new(particles::ParticleField::new(
            particles::ParticleFieldConfig {
                count: config.particles,
                arms: config.arms,
                ..Default::default()
            },
        )),
    })
}

/// `hsl(h, s, l)` to linear-ish RGB, hue in degrees.
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [f32; 3] {
    let h = h.rem_euclid(360.0);
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = l - c / 2.0;
    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    [r + m, g + m, b + m]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_hues() {
        let red = hsl_to_rgb(0.0, 1.0, 0.5);
        assert!((red[0] - 1.0).abs() < 1e-5 && red[1].abs() < 1e-5 && red[2].abs() < 1e-5);
        let green = hsl_to_rgb(120.0, 1.0, 0.5);
        assert!(green[1] > 0.99 && green[0] < 1e-5);
        let blue = hsl_to_rgb(240.0, 1.0, 0.5);
        assert!(blue[2] > 0.99 && blue[0] < 1e-5);
    }

    #[test]
    fn strategy_parsing() {
        assert_eq!("bars".parse::<Strategy>().unwrap(), Strategy::Bars);
        assert_eq!(
            "particles".parse::<Strategy>().unwrap(),
            Strategy::Particles
        );
        assert!("ocean".parse::<Strategy>().is_err());
    }
}
