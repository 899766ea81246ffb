//! Test doubles: a recording engine, a sentinel graphics context and a
//! recording host, all writing into one shared event log.

use crate::config::RenderMode;
use crate::host::{FrameObserver, SurfaceHandle, VideoHost};
use beauty_render::{
    engine_handle, has_current_context, BeautyPreset, ContextFactory, EffectEngine,
    EffectEngineHandle, EngineError, GraphicsContext, RenderError, RenderInput,
};
use beauty_video::{Frame, I420Buffer, SemiPlanarLayout, TextureBuffer};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

pub type EventLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderRecord {
    pub planar: bool,
    pub width: u32,
    pub height: u32,
    pub mirror: bool,
    pub with_context: bool,
}

#[derive(Default)]
pub struct EngineLog {
    pub renders: Vec<RenderRecord>,
    pub presets: Vec<BeautyPreset>,
    pub context_releases: usize,
    /// Texture returned by the next renders; `None` simulates engine failure
    pub output: Option<u32>,
    pub supports_default_preset: bool,
    /// Number of upcoming renders that panic inside the engine
    pub panicking_renders: usize,
}

pub struct RecordingEngine {
    log: Arc<Mutex<EngineLog>>,
    events: EventLog,
}

impl EffectEngine for RecordingEngine {
    fn render(&mut self, input: &RenderInput<'_>) -> Option<u32> {
        {
            let mut log = self.log.lock();
            if log.panicking_renders > 0 {
                log.panicking_renders -= 1;
                drop(log);
                panic!("vendor engine crashed");
            }
        }
        let record = match input {
            RenderInput::Texture { width, height, mirror, .. } => RenderRecord {
                planar: false,
                width: *width,
                height: *height,
                mirror: *mirror,
                with_context: has_current_context(),
            },
            RenderInput::SemiPlanar { data, width, height, mirror, .. } => {
                assert_eq!(data.len(), (*width as usize * *height as usize * 3).div_ceil(2));
                RenderRecord {
                    planar: true,
                    width: *width,
                    height: *height,
                    mirror: *mirror,
                    with_context: has_current_context(),
                }
            }
        };
        self.events.lock().push("render".to_string());
        let mut log = self.log.lock();
        log.renders.push(record);
        log.output
    }

    fn release_context(&mut self) {
        self.events.lock().push("engine_release".to_string());
        self.log.lock().context_releases += 1;
    }

    fn apply_preset(&mut self, preset: BeautyPreset) -> Result<(), EngineError> {
        let mut log = self.log.lock();
        if preset == BeautyPreset::Default && !log.supports_default_preset {
            return Err(EngineError::UnsupportedPreset(preset));
        }
        self.events.lock().push(format!("preset:{:?}", preset));
        log.presets.push(preset);
        Ok(())
    }

    fn planar_layout(&self) -> SemiPlanarLayout {
        SemiPlanarLayout::Nv21
    }
}

/// Counts context lifecycle calls and flags any use after dispose
#[derive(Default)]
pub struct ContextProbe {
    pub created: AtomicUsize,
    pub disposed: AtomicUsize,
    pub used_after_dispose: AtomicUsize,
    pub downloads: AtomicUsize,
    /// Number of upcoming `create` calls that fail
    pub fail_creations: AtomicUsize,
}

impl ContextProbe {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

struct SentinelContext {
    probe: Arc<ContextProbe>,
    events: EventLog,
    disposed: bool,
}

impl SentinelContext {
    fn touch(&self) {
        if self.disposed {
            self.probe.used_after_dispose.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl GraphicsContext for SentinelContext {
    fn finish(&mut self) {
        self.touch();
    }

    fn download_i420(&mut self, texture: &TextureBuffer) -> Option<I420Buffer> {
        self.touch();
        self.probe.downloads.fetch_add(1, Ordering::SeqCst);
        Some(I420Buffer::filled(texture.width, texture.height, 16, 128, 128))
    }

    fn dispose(&mut self) {
        self.touch();
        self.disposed = true;
        self.events.lock().push("dispose".to_string());
        self.probe.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

fn sentinel_factory(probe: Arc<ContextProbe>, events: EventLog) -> Arc<dyn ContextFactory> {
    Arc::new(move || -> Result<Box<dyn GraphicsContext>, RenderError> {
        let failing = probe
            .fail_creations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RenderError::ContextCreation("no display".to_string()));
        }
        probe.created.fetch_add(1, Ordering::SeqCst);
        events.lock().push("create".to_string());
        Ok(Box::new(SentinelContext {
            probe: probe.clone(),
            events: events.clone(),
            disposed: false,
        }))
    })
}

#[derive(Default)]
pub struct HostLog {
    pub render_mode_calls: Vec<(RenderMode, bool)>,
    pub previews: Vec<(SurfaceHandle, RenderMode, bool)>,
    pub registrations: usize,
    pub unregistrations: usize,
}

#[derive(Default)]
pub struct RecordingHost {
    pub log: Mutex<HostLog>,
    observer: Mutex<Option<Weak<dyn FrameObserver>>>,
}

impl RecordingHost {
    /// Deliver a captured frame the way host capture would
    pub fn deliver(&self, frame: &mut Frame) -> Option<bool> {
        let observer = self.observer.lock().as_ref()?.upgrade()?;
        Some(observer.on_capture_frame(frame))
    }

    pub fn has_observer(&self) -> bool {
        self.observer.lock().is_some()
    }
}

impl VideoHost for RecordingHost {
    fn register_frame_observer(&self, observer: Weak<dyn FrameObserver>) {
        self.log.lock().registrations += 1;
        *self.observer.lock() = Some(observer);
    }

    fn unregister_frame_observer(&self) {
        self.log.lock().unregistrations += 1;
        *self.observer.lock() = None;
    }

    fn setup_local_video(&self, surface: SurfaceHandle, render_mode: RenderMode, mirror: bool) {
        self.log.lock().previews.push((surface, render_mode, mirror));
    }

    fn set_local_render_mode(&self, render_mode: RenderMode, mirror: bool) {
        self.log.lock().render_mode_calls.push((render_mode, mirror));
    }
}

/// Shared handles to every double behind one pipeline
pub struct Doubles {
    pub engine: EffectEngineHandle,
    pub engine_log: Arc<Mutex<EngineLog>>,
    pub probe: Arc<ContextProbe>,
    pub factory: Arc<dyn ContextFactory>,
    pub host: Arc<RecordingHost>,
    pub events: EventLog,
}

impl Doubles {
    pub fn new() -> Self {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let engine_log = Arc::new(Mutex::new(EngineLog {
            output: Some(42),
            ..EngineLog::default()
        }));
        let engine = engine_handle(RecordingEngine {
            log: engine_log.clone(),
            events: events.clone(),
        });
        let probe = Arc::new(ContextProbe::default());
        let factory = sentinel_factory(probe.clone(), events.clone());
        Self {
            engine,
            engine_log,
            probe,
            factory,
            host: Arc::new(RecordingHost::default()),
            events,
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}
