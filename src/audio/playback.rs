use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::decode::{decode_track, Track};
use crate::error::VizError;

/// Output gain shared with the audio callback. Changes apply to the next
/// rendered block, so volume moves take effect immediately without
/// rebuilding the stream.
#[derive(Clone, Debug)]
pub struct Gain(Arc<AtomicU32>);

impl Gain {
    pub fn new(value: f32) -> Self {
        Self(Arc::new(AtomicU32::new(value.clamp(0.0, 1.0).to_bits())))
    }

    pub fn set(&self, value: f32) {
        self.0.store(value.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Transport state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    Idle,
    Loaded,
    Playing,
    Paused,
}

/// Snapshot of the clock for display surfaces.
#[derive(Clone, Debug, Default)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_time: f32,
    pub duration: f32,
    pub volume: f32,
    pub file_name: String,
}

/// Where decoded samples go when playing. Output streams are single-use:
/// `start` always builds a fresh one, and `stop` releases whatever is
/// active. The seam exists so the transport logic is testable without an
/// audio device.
pub trait SampleSink {
    fn start(
        &mut self,
        track: Arc<Track>,
        cursor: Arc<AtomicUsize>,
        gain: Gain,
    ) -> Result<(), VizError>;

    fn stop(&mut self);
}

/// Real sink: a cpal output stream that walks the decoded buffer from the
/// shared cursor, applying the shared gain per frame. Dropping the stream
/// disconnects it.
#[derive(Default)]
pub struct CpalSink {
    stream: Option<cpal::Stream>,
}

impl SampleSink for CpalSink {
    fn start(
        &mut self,
        track: Arc<Track>,
        cursor: Arc<AtomicUsize>,
        gain: Gain,
    ) -> Result<(), VizError> {
        self.stop();

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| VizError::Backend("no output device available".into()))?;
        let config = device
            .default_output_config()
            .map_err(|e| VizError::Backend(e.to_string()))?;

        let channels = config.channels() as usize;
        let device_rate = config.sample_rate().0 as f64;
        // Nearest-sample stepping bridges a device rate that differs from
        // the track rate.
        let step = track.sample_rate as f64 / device_rate;
        let mut pos = cursor.load(Ordering::Relaxed) as f64;

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let volume = gain.get();
                    for frame in data.chunks_mut(channels) {
                        let idx = pos as usize;
                        let sample = track.samples.get(idx).copied().unwrap_or(0.0) * volume;
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                        if idx < track.samples.len() {
                            pos += step;
                        }
                    }
                    cursor.store(
                        (pos as usize).min(track.samples.len()),
                        Ordering::Relaxed,
                    );
                },
                |err| log::warn!("playback stream error: {}", err),
                None,
            )
            .map_err(|e| VizError::Backend(e.to_string()))?;

        stream
            .play()
            .map_err(|e| VizError::Backend(e.to_string()))?;

        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        self.stream.take();
    }
}

/// Owns decode, seek, play, pause and volume for one file-backed source.
///
/// At most one output stream is active at a time: every transition that
/// could start a new one releases the previous stream first.
pub struct PlaybackClock {
    sink: Box<dyn SampleSink>,
    track: Option<Arc<Track>>,
    cursor: Arc<AtomicUsize>,
    gain: Gain,
    transport: Transport,
    elapsed: f32,
}

impl PlaybackClock {
    pub fn new(volume: f32) -> Self {
        Self::with_sink(Box::new(CpalSink::default()), volume)
    }

    pub fn with_sink(sink: Box<dyn SampleSink>, volume: f32) -> Self {
        Self {
            sink,
            track: None,
            cursor: Arc::new(AtomicUsize::new(0)),
            gain: Gain::new(volume),
            transport: Transport::Idle,
            elapsed: 0.0,
        }
    }

    /// Decode a new source. Any prior playback is fully stopped first; on
    /// decode failure the clock stays in `Idle` with no track loaded.
    pub fn load_path(&mut self, path: &Path) -> Result<(), VizError> {
        self.stop();
        self.track = None;
        let track = decode_track(path)?;
        self.load_track(track);
        Ok(())
    }

    /// Install an already-decoded track (also the test entry point).
    pub fn load_track(&mut self, track: Track) {
        self.stop();
        self.track = Some(Arc::new(track));
        self.cursor.store(0, Ordering::Relaxed);
        self.elapsed = 0.0;
        self.transport = Transport::Loaded;
    }

    /// Start (or restart) playback at `at` seconds. The previous output
    /// stream, if any, is torn down and a fresh one built: stream objects
    /// cannot be restarted once stopped.
    pub fn play(&mut self, at: f32) -> Result<(), VizError> {
        let Some(track) = self.track.clone() else {
            log::warn!("play requested with no source loaded");
            return Ok(());
        };

        self.sink.stop();

        let at = at.clamp(0.0, track.duration());
        let start_sample =
            ((at * track.sample_rate as f32) as usize).min(track.samples.len());
        self.cursor.store(start_sample, Ordering::Relaxed);
        self.elapsed = at;

        self.sink
            .start(track, self.cursor.clone(), self.gain.clone())?;
        self.transport = Transport::Playing;
        Ok(())
    }

    /// Stop the active stream, retaining the elapsed position for resume.
    pub fn pause(&mut self) {
        if self.transport == Transport::Playing {
            self.elapsed = self.cursor_seconds();
            self.sink.stop();
            self.transport = Transport::Paused;
        }
    }

    /// Full stop: release the stream and rewind. Safe to call when already
    /// stopped.
    pub fn stop(&mut self) {
        self.sink.stop();
        self.cursor.store(0, Ordering::Relaxed);
        self.elapsed = 0.0;
        self.transport = Transport::Idle;
    }

    pub fn toggle(&mut self) -> Result<(), VizError> {
        match self.transport {
            Transport::Playing => {
                self.pause();
                Ok(())
            }
            Transport::Paused => self.play(self.elapsed),
            Transport::Loaded | Transport::Idle => self.play(0.0),
        }
    }

    /// Seek restarts playback at the target position, mirroring play().
    pub fn seek(&mut self, to: f32) -> Result<(), VizError> {
        if self.track.is_none() {
            return Ok(());
        }
        self.play(to)
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.gain.set(volume);
    }

    pub fn volume(&self) -> f32 {
        self.gain.get()
    }

    /// Per-tick time update: refresh elapsed from the shared cursor and
    /// detect end-of-track, clamping to the duration and leaving the
    /// transport stopped.
    pub fn update(&mut self) {
        if self.transport != Transport::Playing {
            return;
        }
        let duration = self.duration();
        self.elapsed = self.cursor_seconds();
        if self.elapsed >= duration {
            self.elapsed = duration;
            self.sink.stop();
            self.transport = Transport::Idle;
        }
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn duration(&self) -> f32 {
        self.track.as_ref().map_or(0.0, |t| t.duration())
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Handle for the spectrum sampler: the decoded buffer plus the live
    /// playback cursor marking what is currently sounding.
    pub fn tap(&self) -> Option<(Arc<Track>, Arc<AtomicUsize>)> {
        self.track
            .as_ref()
            .map(|t| (t.clone(), self.cursor.clone()))
    }

    pub fn snapshot(&self) -> PlaybackState {
        PlaybackState {
            is_playing: self.transport == Transport::Playing,
            current_time: self.elapsed,
            duration: self.duration(),
            volume: self.gain.get(),
            file_name: self
                .track
                .as_ref()
                .map_or(String::new(), |t| t.name.clone()),
        }
    }

    fn cursor_seconds(&self) -> f32 {
        let Some(track) = self.track.as_ref() else {
            return 0.0;
        };
        self.cursor.load(Ordering::Relaxed) as f32 / track.sample_rate as f32
    }
}
