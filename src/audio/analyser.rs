use std::collections::VecDeque;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::viz::frame::FrequencyFrame;

/// Decibel range mapped onto the byte magnitude scale. Magnitudes at or
/// below the floor become 0, at or above the ceiling become 255.
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;
const MAGNITUDE_EPSILON: f32 = 1.0e-10;

pub const MIN_FFT_SIZE: usize = 32;

/// Rolling-window frequency analyser.
///
/// Holds the most recent `fft_size` mono samples, and on demand produces a
/// frame of `fft_size / 2` byte magnitudes: Hann window, forward FFT,
/// per-bin magnitude, temporal smoothing across successive frames, then a
/// dB-range mapping into [0, 255]. A frame is only produced when new
/// samples arrived since the previous one, so a silent or paused source
/// yields no frames at all rather than a stream of zeros.
pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    ring: VecDeque<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    smoothing: f32,
    fresh_samples: usize,
}

impl SpectrumAnalyser {
    /// `fft_size` must be a power of two no smaller than [`MIN_FFT_SIZE`];
    /// `smoothing` is the EMA time constant in [0, 1).
    pub fn new(fft_size: usize, smoothing: f32) -> Self {
        assert!(
            fft_size.is_power_of_two() && fft_size >= MIN_FFT_SIZE,
            "fft size must be a power of two >= {}",
            MIN_FFT_SIZE
        );
        let mut planner = FftPlanner::<f32>::new();
        Self {
            fft: planner.plan_fft_forward(fft_size),
            fft_size,
            window: hann_window(fft_size),
            ring: VecDeque::with_capacity(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            smoothing: smoothing.clamp(0.0, 0.9999),
            fresh_samples: 0,
        }
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn push_samples(&mut self, samples: &[f32]) {
        for &s in samples {
            if self.ring.len() == self.fft_size {
                self.ring.pop_front();
            }
            self.ring.push_back(s);
        }
        self.fresh_samples = self.fresh_samples.saturating_add(samples.len());
    }

    /// Analyze the current window. Returns `None` when nothing new has
    /// sounded since the last frame.
    pub fn frame(&mut self) -> Option<FrequencyFrame> {
        if self.fresh_samples == 0 {
            return None;
        }
        self.fresh_samples = 0;

        // Zero-pad the front while the window is still filling up.
        let pad = self.fft_size - self.ring.len();
        for slot in self.scratch.iter_mut().take(pad) {
            *slot = Complex::new(0.0, 0.0);
        }
        for (i, &s) in self.ring.iter().enumerate() {
            self.scratch[pad + i] = Complex::new(s * self.window[pad + i], 0.0);
        }

        self.fft.process(&mut self.scratch);

        let half = self.fft_size / 2;
        let norm = 1.0 / self.fft_size as f32;
        let mut bins = Vec::with_capacity(half);
        for (i, c) in self.scratch[..half].iter().enumerate() {
            let magnitude = c.norm() * norm;
            let smoothed =
                self.smoothing * self.smoothed[i] + (1.0 - self.smoothing) * magnitude;
            self.smoothed[i] = smoothed;
            bins.push(byte_magnitude(smoothed));
        }

        Some(FrequencyFrame::new(bins))
    }

    /// Forget all buffered signal and smoothing history.
    pub fn reset(&mut self) {
        self.ring.clear();
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
        self.fresh_samples = 0;
    }
}

/// Map a linear magnitude onto the byte scale through the configured
/// decibel range.
fn byte_magnitude(magnitude: f32) -> u8 {
    let db = 20.0 * magnitude.max(MAGNITUDE_EPSILON).log10();
    let scaled = (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS) * 255.0;
    scaled.clamp(0.0, 255.0) as u8
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_maps_to_zero_bytes() {
        let mut analyser = SpectrumAnalyser::new(64, 0.0);
        analyser.push_samples(&vec![0.0; 64]);
        let frame = analyser.frame().expect("fresh samples produce a frame");
        assert_eq!(frame.len(), 32);
        assert!(frame.bins().iter().all(|&b| b == 0));
    }

    #[test]
    fn no_new_samples_no_frame() {
        let mut analyser = SpectrumAnalyser::new(64, 0.0);
        analyser.push_samples(&vec![0.1; 64]);
        assert!(analyser.frame().is_some());
        assert!(analyser.frame().is_none());
        analyser.push_samples(&[0.1]);
        assert!(analyser.frame().is_some());
    }

    #[test]
    fn tone_energy_lands_in_its_bin() {
        let size = 256;
        let mut analyser = SpectrumAnalyser::new(size, 0.0);
        // Pure cosine at bin 8: 8 full cycles across the window.
        let samples: Vec<f32> = (0..size)
            .map(|i| (2.0 * std::f32::consts::PI * 8.0 * i as f32 / size as f32).cos())
            .collect();
        analyser.push_samples(&samples);
        let frame = analyser.frame().unwrap();
        let peak = frame.get(8);
        assert!(peak > frame.get(40));
        assert!(peak > frame.get(100));
        assert!(peak > 0);
    }

    #[test]
    fn byte_magnitude_covers_the_db_range() {
        // -100 dB -> 0, -30 dB -> 255, midpoint -65 dB -> half scale.
        assert_eq!(byte_magnitude(1.0e-5), 0);
        assert_eq!(byte_magnitude(10.0f32.powf(-30.0 / 20.0)), 255);
        let mid = byte_magnitude(10.0f32.powf(-65.0 / 20.0));
        assert!((126..=128).contains(&mid), "midpoint was {}", mid);
        // Above the ceiling clamps instead of wrapping.
        assert_eq!(byte_magnitude(1.0), 255);
    }
}
