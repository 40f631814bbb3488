use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::analyser::SpectrumAnalyser;
use super::decode::Track;
use crate::error::VizError;
use crate::sched::CancelToken;
use crate::viz::frame::FrequencyFrame;

/// Upper bound on buffered live samples between ticks. Anything older is
/// dropped; the analyser only ever needs the most recent window.
const LIVE_QUEUE_LIMIT: usize = 1 << 15;

enum SourceMode {
    /// Analyse the decoded buffer at the playback cursor. Time is
    /// externally controlled, so seeks just move the window.
    File {
        track: Arc<Track>,
        cursor: Arc<AtomicUsize>,
        last_pos: usize,
    },
    /// Analyse a live capture stream. Monotonic, non-seekable.
    Live {
        queue: Arc<Mutex<VecDeque<f32>>>,
        _stream: cpal::Stream,
    },
}

/// Produces at most one [`FrequencyFrame`] per host animation tick from
/// whichever source is active. The tick is driven by the host scheduler;
/// the owned cancel token guarantees a stopped sampler never produces
/// another frame, even if a stale tick fires.
pub struct SpectrumSampler {
    analyser: SpectrumAnalyser,
    mode: Option<SourceMode>,
    token: CancelToken,
    scratch: Vec<f32>,
}

impl SpectrumSampler {
    pub fn new(fft_size: usize, smoothing: f32) -> Self {
        Self {
            analyser: SpectrumAnalyser::new(fft_size, smoothing),
            mode: None,
            token: CancelToken::new(),
            scratch: Vec::new(),
        }
    }

    pub fn bin_count(&self) -> usize {
        self.analyser.bin_count()
    }

    /// Attach to a decoded track. `cursor` is the playback clock's live
    /// sample position; analysis follows whatever is currently sounding.
    pub fn start_file(&mut self, track: Arc<Track>, cursor: Arc<AtomicUsize>) {
        self.stop();
        let last_pos = cursor.load(Ordering::Relaxed);
        self.mode = Some(SourceMode::File {
            track,
            cursor,
            last_pos,
        });
        self.token = CancelToken::new();
        self.analyser.reset();
    }

    /// Open the default capture device and start analysing it. A refused
    /// or missing microphone surfaces as `PermissionDenied`; the caller
    /// logs it and the sampler simply produces no frames.
    pub fn start_live(&mut self) -> Result<(), VizError> {
        self.stop();

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| VizError::PermissionDenied("no capture device".into()))?;
        let config = device
            .default_input_config()
            .map_err(|e| VizError::PermissionDenied(e.to_string()))?;

        let channels = config.channels() as usize;
        let queue: Arc<Mutex<VecDeque<f32>>> = Arc::new(Mutex::new(VecDeque::new()));
        let producer = queue.clone();

        let stream = device
            .build_input_stream(
                &config.into(),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let Ok(mut queue) = producer.lock() else {
                        return;
                    };
                    for frame in data.chunks(channels.max(1)) {
                        let mono: f32 = frame.iter().sum::<f32>() / frame.len() as f32;
                        queue.push_back(mono);
                    }
                    while queue.len() > LIVE_QUEUE_LIMIT {
                        queue.pop_front();
                    }
                },
                |err| log::warn!("capture stream error: {}", err),
                None,
            )
            .map_err(|e| VizError::PermissionDenied(e.to_string()))?;

        stream
            .play()
            .map_err(|e| VizError::PermissionDenied(e.to_string()))?;

        log::info!("live input started");
        self.mode = Some(SourceMode::Live {
            queue,
            _stream: stream,
        });
        self.token = CancelToken::new();
        self.analyser.reset();
        Ok(())
    }

    /// Cancel the tick registration and release the source. Idempotent;
    /// required on every teardown path so no orphaned tick can touch a
    /// torn-down source.
    pub fn stop(&mut self) {
        self.token.cancel();
        self.mode = None;
    }

    /// One cooperative tick: pull whatever sounded since the last tick
    /// into the analyser and emit a frame if there was anything new.
    pub fn tick(&mut self) -> Option<FrequencyFrame> {
        if self.token.is_cancelled() {
            return None;
        }

        match self.mode.as_mut()? {
            SourceMode::File {
                track,
                cursor,
                last_pos,
            } => {
                let pos = cursor.load(Ordering::Relaxed).min(track.samples.len());
                if pos < *last_pos {
                    // Seek backwards: re-prime with the window ending at
                    // the new position.
                    let window = self.analyser.bin_count() * 2;
                    let start = pos.saturating_sub(window);
                    self.analyser.reset();
                    self.analyser.push_samples(&track.samples[start..pos]);
                } else if pos > *last_pos {
                    self.analyser.push_samples(&track.samples[*last_pos..pos]);
                }
                *last_pos = pos;
            }
            SourceMode::Live { queue, .. } => {
                self.scratch.clear();
                if let Ok(mut queue) = queue.lock() {
                    self.scratch.extend(queue.drain(..));
                }
                self.analyser.push_samples(&self.scratch);
            }
        }

        self.analyser.frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy_track(seconds: f32) -> Arc<Track> {
        let sample_rate = 8000u32;
        let samples: Vec<f32> = (0..(seconds * sample_rate as f32) as usize)
            .map(|i| (i as f32 * 0.37).sin() * 0.5)
            .collect();
        Arc::new(Track {
            samples,
            sample_rate,
            name: "noise".into(),
        })
    }

    #[test]
    fn advancing_cursor_produces_frames() {
        let mut sampler = SpectrumSampler::new(64, 0.0);
        let track = noisy_track(1.0);
        let cursor = Arc::new(AtomicUsize::new(0));
        sampler.start_file(track, cursor.clone());

        cursor.store(512, Ordering::Relaxed);
        let frame = sampler.tick().expect("new audio yields a frame");
        assert_eq!(frame.len(), 32);
    }

    #[test]
    fn stalled_cursor_yields_no_frame() {
        let mut sampler = SpectrumSampler::new(64, 0.0);
        let track = noisy_track(1.0);
        let cursor = Arc::new(AtomicUsize::new(0));
        sampler.start_file(track, cursor.clone());

        cursor.store(512, Ordering::Relaxed);
        assert!(sampler.tick().is_some());
        // Paused playback: cursor unchanged, so the tick is a no-op.
        assert!(sampler.tick().is_none());
    }

    #[test]
    fn seek_backwards_reprimes_instead_of_panicking() {
        let mut sampler = SpectrumSampler::new(64, 0.0);
        let track = noisy_track(1.0);
        let cursor = Arc::new(AtomicUsize::new(0));
        sampler.start_file(track, cursor.clone());

        cursor.store(4000, Ordering::Relaxed);
        assert!(sampler.tick().is_some());
        cursor.store(100, Ordering::Relaxed);
        assert!(sampler.tick().is_some());
    }

    #[test]
    fn cursor_beyond_track_end_is_clamped() {
        let mut sampler = SpectrumSampler::new(64, 0.0);
        let track = noisy_track(0.1);
        let len = track.samples.len();
        let cursor = Arc::new(AtomicUsize::new(0));
        sampler.start_file(track, cursor.clone());

        cursor.store(len + 5000, Ordering::Relaxed);
        assert!(sampler.tick().is_some());
    }

    #[test]
    fn stopped_sampler_never_ticks_again() {
        let mut sampler = SpectrumSampler::new(64, 0.0);
        let track = noisy_track(1.0);
        let cursor = Arc::new(AtomicUsize::new(0));
        sampler.start_file(track, cursor.clone());
        sampler.stop();

        cursor.store(512, Ordering::Relaxed);
        assert!(sampler.tick().is_none());
    }

    #[test]
    fn tick_without_a_source_is_a_no_op() {
        let mut sampler = SpectrumSampler::new(64, 0.0);
        assert!(sampler.tick().is_none());
    }
}
