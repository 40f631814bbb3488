use super::frame::FrequencyFrame;

/// Mean intensity below which the backdrop stays dark.
pub const VISIBILITY_THRESHOLD: f32 = 0.6;
/// Quantization steps above the threshold.
pub const LEVEL_STEPS: u8 = 15;

/// Ambient background signal derived from the whole frame. Emitted by the
/// particle mapper as an output port; the scene decides how to present it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BackdropSignal {
    /// Quantized level in `0..=LEVEL_STEPS`.
    pub level: u8,
    /// Interpolated intensity in [0, 1].
    pub intensity: f32,
}

impl BackdropSignal {
    pub fn from_frame(frame: &FrequencyFrame) -> Self {
        let level = quantized_level(frame.mean_intensity());
        Self {
            level,
            intensity: level as f32 / LEVEL_STEPS as f32,
        }
    }
}

/// Quantize a mean intensity: invisible at or below the threshold, then
/// the remaining [0.6, 1.0] span stretched across the level steps.
pub fn quantized_level(mean_intensity: f32) -> u8 {
    if mean_intensity <= VISIBILITY_THRESHOLD {
        return 0;
    }
    let scaled = (mean_intensity - VISIBILITY_THRESHOLD) * 2.5 * LEVEL_STEPS as f32;
    (scaled.floor() as u32).min(LEVEL_STEPS as u32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_at_point_eight_is_seven() {
        assert_eq!(quantized_level(0.8), 7);
    }

    #[test]
    fn threshold_and_below_are_dark() {
        assert_eq!(quantized_level(0.0), 0);
        assert_eq!(quantized_level(0.59), 0);
        assert_eq!(quantized_level(VISIBILITY_THRESHOLD), 0);
    }

    #[test]
    fn full_scale_saturates_the_level_range() {
        assert_eq!(quantized_level(1.0), 15);
        assert_eq!(quantized_level(2.0), 15);
    }

    #[test]
    fn signal_from_loud_frame() {
        // All bins at 204 -> mean intensity 0.8 -> level 7.
        let frame = FrequencyFrame::new(vec![204; 32]);
        let signal = BackdropSignal::from_frame(&frame);
        assert_eq!(signal.level, 7);
        assert!((signal.intensity - 7.0 / 15.0).abs() < 1e-6);
    }
}
