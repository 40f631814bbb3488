use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::audio::playback::{PlaybackClock, Transport};
use crate::audio::sampler::SpectrumSampler;
use crate::error::VizError;
use crate::scene::gpu::GpuContext;
use crate::scene::renderer::SceneRenderer;
use crate::scene::Scene;
use crate::viz::frame::FrameSlot;
use crate::viz::VisualMapper;

const SEEK_STEP_SECONDS: f32 = 5.0;
const VOLUME_STEP: f32 = 0.05;
const TITLE_REFRESH_SECONDS: f32 = 0.25;

/// Which audio source drives the spectrum.
pub enum SourceSelect {
    File(PathBuf),
    Live,
}

pub struct AppOptions {
    pub source: SourceSelect,
    pub fft_size: usize,
    pub smoothing: f32,
    pub volume: f32,
    pub width: u32,
    pub height: u32,
}

/// Application shell: owns the window, the scene host, and the pipeline
/// components, and drives them from the host's frame callback. Each
/// redraw is one cooperative tick; teardown paths cancel the sampler
/// before anything else is dropped.
pub struct App {
    options: AppOptions,
    window: Option<Arc<Window>>,
    gpu: Option<GpuContext>,
    renderer: Option<SceneRenderer>,
    scene: Option<Scene>,
    mapper: Box<dyn VisualMapper>,
    mounted: bool,
    playback: PlaybackClock,
    sampler: SpectrumSampler,
    slot: FrameSlot,
    start: Instant,
    last_title_refresh: f32,
}

impl App {
    pub fn new(options: AppOptions, mapper: Box<dyn VisualMapper>) -> Self {
        let playback = PlaybackClock::new(options.volume);
        let sampler = SpectrumSampler::new(options.fft_size, options.smoothing);
        Self {
            options,
            window: None,
            gpu: None,
            renderer: None,
            scene: None,
            mapper,
            mounted: false,
            playback,
            sampler,
            slot: FrameSlot::new(),
            start: Instant::now(),
            last_title_refresh: -1.0,
        }
    }

    /// Connect the configured source. Acquisition failures are logged and
    /// swallowed here: the visualization keeps running with no frames.
    fn start_source(&mut self) {
        match &self.options.source {
            SourceSelect::Live => {
                if let Err(err) = self.sampler.start_live() {
                    log::error!("{}", err);
                }
            }
            SourceSelect::File(path) => {
                let path = path.clone();
                if let Err(err) = self.playback.load_path(&path) {
                    log::error!("{}", err);
                    return;
                }
                if let Err(err) = self.playback.play(0.0) {
                    log::warn!("playback unavailable, rendering silently: {}", err);
                }
                if let Some((track, cursor)) = self.playback.tap() {
                    self.sampler.start_file(track, cursor);
                }
            }
        }
    }

    fn teardown(&mut self) {
        self.sampler.stop();
        self.playback.stop();
        if let Some(scene) = self.scene.as_mut() {
            if self.mounted {
                self.mapper.unmount(scene);
                self.mounted = false;
            }
        }
        self.slot.clear();
    }

    fn handle_key(&mut self, code: KeyCode, event_loop: &ActiveEventLoop) {
        let result: Result<(), VizError> = match code {
            KeyCode::Escape => {
                self.teardown();
                event_loop.exit();
                Ok(())
            }
            KeyCode::Space => self.playback.toggle(),
            KeyCode::ArrowRight => {
                let target = (self.playback.elapsed() + SEEK_STEP_SECONDS)
                    .min(self.playback.duration());
                self.playback.seek(target)
            }
            KeyCode::ArrowLeft => {
                let target = (self.playback.elapsed() - SEEK_STEP_SECONDS).max(0.0);
                self.playback.seek(target)
            }
            KeyCode::ArrowUp => {
                self.playback
                    .set_volume(self.playback.volume() + VOLUME_STEP);
                Ok(())
            }
            KeyCode::ArrowDown => {
                self.playback
                    .set_volume(self.playback.volume() - VOLUME_STEP);
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            log::warn!("transport command failed: {}", err);
        }
    }

    /// One cooperative tick: clock update, spectrum sample, visual
    /// mutation, render. Runs to completion; the next tick is scheduled by
    /// the host via `about_to_wait`.
    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let now = self.start.elapsed().as_secs_f32();

        self.playback.update();

        if let Some(frame) = self.sampler.tick() {
            self.slot.publish(frame);
        }

        {
            // Scene not ready yet: defer every mutation, never fail.
            let Some(scene) = self.scene.as_mut() else {
                log::debug!("{}", VizError::SceneUnavailable);
                return;
            };

            if !self.mounted {
                self.mapper.mount(scene);
                self.mounted = true;
                log::info!("visualization mounted ({} objects)", scene.len());
            }

            self.mapper.apply(self.slot.latest(), now, scene);
            if let Some(signal) = self.mapper.backdrop() {
                scene.set_backdrop_intensity(signal.intensity);
            }
        }

        if now - self.last_title_refresh > TITLE_REFRESH_SECONDS {
            self.refresh_title();
            self.last_title_refresh = now;
        }

        let (Some(gpu), Some(renderer), Some(scene)) = (
            self.gpu.as_ref(),
            self.renderer.as_mut(),
            self.scene.as_ref(),
        ) else {
            return;
        };
        match renderer.render(gpu, scene, now) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                gpu.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("GPU out of memory, shutting down");
                self.teardown();
                event_loop.exit();
            }
            Err(err) => log::warn!("surface error: {:?}", err),
        }
    }

    fn refresh_title(&self) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        let state = self.playback.snapshot();
        let title = match &self.options.source {
            SourceSelect::Live => "resona — live input".to_string(),
            SourceSelect::File(_) => {
                let marker = if state.is_playing {
                    "▶"
                } else if self.playback.transport() == Transport::Paused {
                    "⏸"
                } else {
                    "■"
                };
                format!(
                    "resona — {} {} {:.0}s / {:.0}s — vol {:.0}%",
                    marker,
                    state.file_name,
                    state.current_time,
                    state.duration,
                    state.volume * 100.0
                )
            }
        };
        window.set_title(&title);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title("resona")
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.options.width,
                self.options.height,
            ));

        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("failed to create window: {}", err);
                event_loop.exit();
                return;
            }
        };

        let gpu = match GpuContext::new(window.clone()) {
            Ok(gpu) => gpu,
            Err(err) => {
                log::error!("failed to initialize GPU: {:#}", err);
                event_loop.exit();
                return;
            }
        };
        let renderer = match SceneRenderer::new(&gpu) {
            Ok(renderer) => renderer,
            Err(err) => {
                log::error!("failed to build pipelines: {:#}", err);
                event_loop.exit();
                return;
            }
        };

        self.window = Some(window);
        self.gpu = Some(gpu);
        self.renderer = Some(renderer);
        self.scene = Some(Scene::new());

        self.start_source();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.teardown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(size.width, size.height);
                }
                if let (Some(gpu), Some(renderer)) =
                    (self.gpu.as_ref(), self.renderer.as_mut())
                {
                    renderer.resize(gpu);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(code),
                        ..
                    },
                ..
            } => self.handle_key(code, event_loop),
            WindowEvent::RedrawRequested => {
                self.frame(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        // Self-perpetuating tick: each frame schedules the next.
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
