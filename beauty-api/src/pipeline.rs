//! Beauty pipeline
//!
//! Composition root. Gates each frame on lifecycle, mirror, facing and
//! processing path, then renders it synchronously on the render thread and
//! swaps the engine's output texture into the frame.

use crate::classifier::{classify, SkipReason};
use crate::config::{BeautyConfig, CameraConfig, CaptureMode, ProcessingMode, RenderMode};
use crate::error::{BeautyError, ErrorCode};
use crate::host::{FrameObserver, SurfaceHandle, VideoHost};
use crate::mirror::{MirrorFlags, MirrorResolver};
use crate::state::ProcessingStateMachine;
use crate::stats::StatsAggregator;
use beauty_render::{
    planar_rotation, texture_render_transform, with_context, BeautyPreset, ContextFactory,
    DispatcherConfig, DispatcherStats, EffectEngineHandle, Job, RenderDispatcher, RenderInput,
};
use beauty_video::{Buffer, BufferKind, CameraFacing, Conversion, FormatConverter, Frame, Rotation};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Instant;

/// Runtime parameter selecting the [`ProcessingMode`]
pub const PARAM_BEAUTY_MODE: &str = "beauty_mode";

const RENDER_THREAD_NAME: &str = "beauty-render";

/// Result of processing one frame
#[derive(Debug)]
pub enum Outcome {
    /// Frame now carries this texture
    Rendered(u32),
    /// Frame left untouched, try again next frame
    Skipped(SkipReason),
    /// Beautification is off, frame passes through
    Disabled,
    Error(BeautyError),
}

impl Outcome {
    pub fn code(&self) -> ErrorCode {
        match self {
            Outcome::Rendered(_) => ErrorCode::Ok,
            Outcome::Skipped(_) => ErrorCode::FrameSkipped,
            Outcome::Disabled => ErrorCode::ProcessingDisabled,
            Outcome::Error(e) => e.code(),
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, Outcome::Rendered(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameSource {
    Capture,
    External,
}

/// Pipeline counters
#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub frames_rendered: u64,
    pub frames_skipped: u64,
    pub render: Option<DispatcherStats>,
}

pub struct BeautyPipeline {
    weak_self: Weak<BeautyPipeline>,
    engine: EffectEngineHandle,
    host: Arc<dyn VideoHost>,
    factory: Arc<dyn ContextFactory>,
    dispatcher: OnceLock<RenderDispatcher>,

    state: Mutex<ProcessingStateMachine>,
    mirror: Mutex<MirrorResolver>,
    camera: RwLock<CameraConfig>,
    processing_mode: RwLock<ProcessingMode>,
    render_mode: RwLock<RenderMode>,

    converter: Arc<Mutex<FormatConverter>>,
    stats: Mutex<Option<StatsAggregator>>,
    released: Arc<AtomicBool>,

    frames_rendered: AtomicU64,
    frames_skipped: AtomicU64,
}

impl BeautyPipeline {
    pub fn new(
        engine: EffectEngineHandle,
        host: Arc<dyn VideoHost>,
        factory: Arc<dyn ContextFactory>,
    ) -> Arc<Self> {
        let layout = engine.lock().planar_layout();
        Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            engine,
            host,
            factory,
            dispatcher: OnceLock::new(),
            state: Mutex::new(ProcessingStateMachine::new()),
            mirror: Mutex::new(MirrorResolver::default()),
            camera: RwLock::new(CameraConfig::default()),
            processing_mode: RwLock::new(ProcessingMode::Auto),
            render_mode: RwLock::new(RenderMode::Hidden),
            converter: Arc::new(Mutex::new(FormatConverter::new(layout))),
            stats: Mutex::new(None),
            released: Arc::new(AtomicBool::new(false)),
            frames_rendered: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
        })
    }

    /// Set the pipeline up. The render thread is not started here.
    pub fn initialize(&self, config: BeautyConfig) -> Result<(), BeautyError> {
        log::info!("initialize >> {:?}", config);

        let initial_mirror = {
            let mut state = self.state.lock();
            if let Err(e) = state.initialize(config.capture_mode, config.initially_enabled, config.skip_policy) {
                log::error!("initialize >> rejected: {}", e);
                return Err(e);
            }

            *self.camera.write() = config.camera;
            *self.processing_mode.write() = config.processing_mode;
            *self.render_mode.write() = config.render_mode;

            let _ = self.dispatcher.set(RenderDispatcher::new(
                DispatcherConfig {
                    thread_name: RENDER_THREAD_NAME.to_string(),
                    core: config.render_thread_core,
                    pending_capacity: config.pending_queue_capacity,
                },
                self.factory.clone(),
            ));

            if config.stats_enabled {
                *self.stats.lock() = Some(StatsAggregator::new(config.stats_window, config.stats_callback));
            }

            let flags = MirrorFlags::resolve_for(&config.camera, state.facing());
            *self.mirror.lock() = MirrorResolver::new(flags);
            flags
        };

        // apply the starting display flag now so the first frame is not a resync
        self.host
            .set_local_render_mode(config.render_mode, initial_mirror.render);

        if config.capture_mode == CaptureMode::Managed {
            let observer: Weak<dyn FrameObserver> = self.weak_self.clone();
            self.host.register_frame_observer(observer);
        }
        Ok(())
    }

    pub fn enable(&self, enabled: bool) -> Result<(), BeautyError> {
        let changed = self.state.lock().enable(enabled)?;
        if changed {
            log::info!("enable >> {}", enabled);
            if !enabled {
                if let Some(stats) = self.stats.lock().as_mut() {
                    stats.reset();
                }
            }
        }
        Ok(())
    }

    /// Replace both cameras' mirror settings. Picked up on the next frame.
    pub fn set_camera_config(&self, camera: CameraConfig) -> Result<(), BeautyError> {
        self.state.lock().check_usable()?;
        log::info!("set_camera_config >> {:?}", camera);
        *self.camera.write() = camera;
        Ok(())
    }

    pub fn camera_config(&self) -> CameraConfig {
        *self.camera.read()
    }

    /// Apply a preset on the render thread.
    ///
    /// Waits for the engine's answer when the render thread runs; otherwise
    /// the preset is queued until it starts and this returns `Ok` before the
    /// engine has seen it. A queued preset the engine rejects is only logged.
    pub fn set_beauty_preset(&self, preset_id: u32) -> Result<(), BeautyError> {
        let dispatcher = self.usable_dispatcher()?;
        let preset = BeautyPreset::from_id(preset_id).ok_or(BeautyError::UnsupportedPreset(preset_id))?;
        let engine = self.engine.clone();

        if dispatcher.is_started() {
            dispatcher.run_now(move || engine.lock().apply_preset(preset))??;
        } else {
            dispatcher.schedule(move || {
                if let Err(e) = engine.lock().apply_preset(preset) {
                    log::error!("set_beauty_preset >> deferred {:?} failed: {}", preset, e);
                }
            })?;
        }
        log::info!("set_beauty_preset >> {:?}", preset);
        Ok(())
    }

    pub fn set_parameter(&self, key: &str, value: &str) -> Result<(), BeautyError> {
        self.state.lock().check_usable()?;
        match key {
            PARAM_BEAUTY_MODE => {
                let mode = value
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .and_then(ProcessingMode::from_id)
                    .ok_or_else(|| BeautyError::InvalidParameter {
                        key: key.to_string(),
                        value: value.to_string(),
                    })?;
                log::info!("set_parameter >> {} = {:?}", key, mode);
                *self.processing_mode.write() = mode;
                Ok(())
            }
            _ => {
                log::warn!("set_parameter >> unknown key '{}'", key);
                Err(BeautyError::UnknownParameter(key.to_string()))
            }
        }
    }

    pub fn processing_mode(&self) -> ProcessingMode {
        *self.processing_mode.read()
    }

    /// Bind the local preview to a native view
    pub fn attach_preview(&self, surface: SurfaceHandle, render_mode: RenderMode) -> Result<(), BeautyError> {
        self.state.lock().check_usable()?;
        if !surface.is_renderable() {
            log::error!("attach_preview >> unsupported surface {:?}", surface);
            return Err(BeautyError::InvalidSurfaceType);
        }
        *self.render_mode.write() = render_mode;
        let mirror = self.mirror.lock().applied().render;
        self.host.setup_local_video(surface, render_mode, mirror);
        Ok(())
    }

    /// Entry point for frames fed by the application in custom capture mode
    pub fn on_external_frame(&self, frame: &mut Frame) -> ErrorCode {
        self.process_from(frame, FrameSource::External).code()
    }

    /// Process one frame delivered by host capture
    pub fn process(&self, frame: &mut Frame) -> Outcome {
        self.process_from(frame, FrameSource::Capture)
    }

    /// Run `f` on the render thread, queued until that thread exists
    pub fn run_on_process_thread<F>(&self, f: F) -> Result<(), BeautyError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.usable_dispatcher()?.schedule(f)?;
        Ok(())
    }

    /// Tear everything down.
    ///
    /// In-flight render work finishes first, then the engine drops its
    /// context resources, then the graphics context is disposed.
    pub fn release(&self) -> Result<(), BeautyError> {
        let capture_mode = {
            let mut state = self.state.lock();
            if let Err(e) = state.release() {
                log::error!("release >> {}", e);
                return Err(e);
            }
            state.capture_mode()
        };
        self.released.store(true, Ordering::Release);
        log::info!("release");

        if capture_mode == CaptureMode::Managed {
            self.host.unregister_frame_observer();
        }

        if let Some(dispatcher) = self.dispatcher.get() {
            let engine = self.engine.clone();
            let teardown: Job = Box::new(move || engine.lock().release_context());
            if let Err(e) = dispatcher.release(Some(teardown)) {
                log::warn!("release >> render thread: {}", e);
            }
        }

        self.converter.lock().reset();
        if let Some(stats) = self.stats.lock().as_mut() {
            stats.reset();
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().is_enabled()
    }

    /// Whether the host mirrors captured frames itself
    pub fn mirror_applied(&self) -> bool {
        let state = self.state.lock();
        let flags = MirrorFlags::resolve_for(&self.camera.read(), state.facing());
        flags.capture && !state.is_enabled()
    }

    /// Facing of the last frame seen
    pub fn is_front_camera(&self) -> bool {
        self.state.lock().facing().is_front()
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            render: self.dispatcher.get().map(RenderDispatcher::stats),
        }
    }

    fn usable_dispatcher(&self) -> Result<&RenderDispatcher, BeautyError> {
        self.state.lock().check_usable()?;
        self.dispatcher.get().ok_or(BeautyError::NotInitialized)
    }

    fn process_from(&self, frame: &mut Frame, source: FrameSource) -> Outcome {
        let outcome = self.gate_and_render(frame, source);
        match &outcome {
            Outcome::Rendered(_) => {
                self.frames_rendered.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Skipped(_) => {
                self.frames_skipped.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Disabled | Outcome::Error(_) => {}
        }
        outcome
    }

    fn gate_and_render(&self, frame: &mut Frame, source: FrameSource) -> Outcome {
        if self.released.load(Ordering::Acquire) {
            return Outcome::Error(BeautyError::Released);
        }

        let (kind, mirror) = {
            let mut state = self.state.lock();
            if let Err(e) = state.check_usable() {
                return Outcome::Error(e);
            }
            if source == FrameSource::External && state.capture_mode() != CaptureMode::Custom {
                return Outcome::Error(BeautyError::NotInCustomCaptureMode);
            }
            if !state.is_enabled() {
                // keep facing and display mirror current for the host
                state.record_facing(frame.facing);
                let camera = *self.camera.read();
                let change = self.mirror.lock().reconcile(&camera, state.facing());
                drop(state);

                if let Some(change) = change {
                    let render_mode = *self.render_mode.read();
                    self.host.set_local_render_mode(render_mode, change.current.render);
                }
                return Outcome::Disabled;
            }

            let camera = *self.camera.read();
            let change = self.mirror.lock().reconcile(&camera, state.facing());
            if let Some(change) = change {
                state.arm_mirror_resync();
                state.consume_skip();
                drop(state);

                log::info!("mirror changed {:?} -> {:?}", change.previous, change.current);
                let render_mode = *self.render_mode.read();
                self.host.set_local_render_mode(render_mode, change.current.render);
                return Outcome::Skipped(SkipReason::MirrorResync);
            }

            let mode = *self.processing_mode.read();
            let kind = match classify(&frame.buffer, mode) {
                Ok(kind) => kind,
                Err(reason) => return Outcome::Skipped(reason),
            };

            let previous_facing = state.facing();
            let previous_kind = state.kind();
            let facing_changed = state.observe_facing(frame.facing);
            let kind_changed = state.observe_kind(kind);
            let blocked = state.consume_skip();

            if facing_changed {
                log::info!("camera facing {:?} -> {:?}, dropping frame", previous_facing, frame.facing);
                return Outcome::Skipped(SkipReason::FacingChanged);
            }
            if kind_changed {
                log::warn!("processing path {:?} -> {:?}, dropping frame", previous_kind, kind);
                return Outcome::Skipped(SkipReason::KindTransition);
            }
            if blocked {
                return Outcome::Skipped(SkipReason::SkipWindow);
            }

            (kind, self.mirror.lock().applied().capture)
        };

        let Some(dispatcher) = self.dispatcher.get() else {
            return Outcome::Error(BeautyError::NotInitialized);
        };

        let job = RenderJob {
            buffer: frame.buffer.clone(),
            rotation: frame.rotation,
            facing: frame.facing,
            output_size: (frame.rotated_width(), frame.rotated_height()),
            kind,
            mirror,
            engine: self.engine.clone(),
            converter: self.converter.clone(),
            released: self.released.clone(),
        };

        let started = Instant::now();
        let result = dispatcher.run_now(move || job.run());
        let cost = started.elapsed();

        match result {
            Ok(RenderResult::Rendered(texture_id)) => {
                frame.replace_with_texture(texture_id);
                self.record_cost(cost);
                Outcome::Rendered(texture_id)
            }
            Ok(RenderResult::Skipped(reason)) => {
                if reason == SkipReason::InvalidTexture {
                    log::warn!("engine returned no texture, passing frame through");
                    self.record_cost(cost);
                }
                Outcome::Skipped(reason)
            }
            Ok(RenderResult::Released) => Outcome::Error(BeautyError::Released),
            Err(_) if self.released.load(Ordering::Acquire) => Outcome::Error(BeautyError::Released),
            Err(e) => {
                log::error!("render failed: {}", e);
                Outcome::Error(e.into())
            }
        }
    }

    fn record_cost(&self, cost: std::time::Duration) {
        if let Some(stats) = self.stats.lock().as_mut() {
            stats.record(cost);
        }
    }
}

impl FrameObserver for BeautyPipeline {
    fn on_capture_frame(&self, frame: &mut Frame) -> bool {
        self.process(frame).is_rendered()
    }

    fn mirror_applied(&self) -> bool {
        BeautyPipeline::mirror_applied(self)
    }
}

impl Drop for BeautyPipeline {
    fn drop(&mut self) {
        let initialized = self.state.lock().check_usable().is_ok();
        if initialized {
            let _ = self.release();
        }
    }
}

enum RenderResult {
    Rendered(u32),
    Skipped(SkipReason),
    Released,
}

/// Everything the render thread needs for one frame
struct RenderJob {
    buffer: Buffer,
    rotation: Rotation,
    facing: CameraFacing,
    output_size: (u32, u32),
    kind: BufferKind,
    mirror: bool,
    engine: EffectEngineHandle,
    converter: Arc<Mutex<FormatConverter>>,
    released: Arc<AtomicBool>,
}

impl RenderJob {
    fn run(self) -> RenderResult {
        // release may have landed while this job was queued
        if self.released.load(Ordering::Acquire) {
            return RenderResult::Released;
        }

        let texture = if self.kind == BufferKind::PlanarPixels {
            self.render_planar()
        } else {
            self.render_texture()
        };

        match texture {
            Ok(Some(id)) if id > 0 => {
                // output is sampled by another thread's context
                if let Err(e) = with_context(|context| context.finish()) {
                    log::warn!("could not finish output texture: {}", e);
                }
                RenderResult::Rendered(id)
            }
            Ok(_) => RenderResult::Skipped(SkipReason::InvalidTexture),
            Err(reason) => RenderResult::Skipped(reason),
        }
    }

    fn render_texture(&self) -> Result<Option<u32>, SkipReason> {
        let Buffer::Texture(texture) = &self.buffer else {
            return Err(SkipReason::UnsupportedBuffer);
        };
        let (width, height) = self.output_size;
        let input = RenderInput::Texture {
            texture_id: texture.texture_id,
            texture_type: texture.texture_type,
            width,
            height,
            transform: texture_render_transform(texture.transform, self.rotation, self.mirror),
            mirror: self.mirror,
            facing: self.facing,
        };
        Ok(self.engine.lock().render(&input))
    }

    fn render_planar(&self) -> Result<Option<u32>, SkipReason> {
        let downloaded;
        let planar = match &self.buffer {
            Buffer::I420(planar) => planar,
            Buffer::Texture(texture) => {
                downloaded = with_context(|context| context.download_i420(texture))
                    .ok()
                    .flatten()
                    .ok_or(SkipReason::UnsupportedBuffer)?;
                &downloaded
            }
        };

        let mut converter = self.converter.lock();
        match converter.convert(planar) {
            Ok(Conversion::Ready) => {}
            Ok(Conversion::Resized { bytes }) => {
                log::info!("scratch buffer resized to {} bytes, dropping frame", bytes);
                return Err(SkipReason::ScratchResize);
            }
            Err(e) => {
                log::warn!("planar conversion failed: {}", e);
                return Err(SkipReason::UnsupportedBuffer);
            }
        }

        let input = RenderInput::SemiPlanar {
            data: converter.output(),
            layout: converter.layout(),
            width: planar.width,
            height: planar.height,
            rotation: planar_rotation(self.rotation, self.mirror),
            mirror: self.mirror,
            facing: self.facing,
        };
        Ok(self.engine.lock().render(&input))
    }
}
