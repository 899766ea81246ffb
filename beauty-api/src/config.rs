//! Pipeline configuration

use crate::classifier::SkipPolicy;
use crate::stats::BeautyStats;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Where frames come from
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// Host capture delivers frames through the registered observer
    #[default]
    Managed = 0,
    /// Application feeds frames itself through `on_external_frame`
    Custom = 1,
}

/// Which processing path frames take
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Follow each frame's buffer type
    #[default]
    Auto = 0,
    /// Texture path only; planar frames are skipped
    ForceTexture = 1,
    /// Planar path only; textures are read back first
    ForcePlanar = 2,
}

impl ProcessingMode {
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(ProcessingMode::Auto),
            1 => Some(ProcessingMode::ForceTexture),
            2 => Some(ProcessingMode::ForcePlanar),
            _ => None,
        }
    }
}

/// Mirror setting for one camera
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorMode {
    None = 0,
    LocalAndRemote = 1,
    LocalOnly = 2,
    RemoteOnly = 3,
}

/// Per-camera mirror settings.
///
/// Replaced as a whole value on update, never field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraConfig {
    pub front_mirror: MirrorMode,
    pub back_mirror: MirrorMode,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            front_mirror: MirrorMode::LocalAndRemote,
            back_mirror: MirrorMode::None,
        }
    }
}

/// Local preview scaling
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Hidden = 1,
    Fit = 2,
    Adaptive = 3,
}

/// Receives one stats record per window
pub type StatsCallback = Arc<dyn Fn(BeautyStats) + Send + Sync>;

/// Beauty pipeline configuration
#[derive(Clone)]
pub struct BeautyConfig {
    pub capture_mode: CaptureMode,
    pub initially_enabled: bool,
    pub camera: CameraConfig,
    pub processing_mode: ProcessingMode,
    pub render_mode: RenderMode,
    pub skip_policy: SkipPolicy,

    pub stats_enabled: bool,
    pub stats_window: Duration,
    pub stats_callback: Option<StatsCallback>,

    /// Pin the render thread to this CPU core
    pub render_thread_core: Option<usize>,
    /// Tasks that may wait for the render thread before it exists
    pub pending_queue_capacity: usize,
}

impl Default for BeautyConfig {
    fn default() -> Self {
        Self {
            capture_mode: CaptureMode::Managed,
            initially_enabled: false,
            camera: CameraConfig::default(),
            processing_mode: ProcessingMode::Auto,
            render_mode: RenderMode::Hidden,
            skip_policy: SkipPolicy::default(),
            stats_enabled: false,
            stats_window: Duration::from_secs(1),
            stats_callback: None,
            render_thread_core: None,
            pending_queue_capacity: 64,
        }
    }
}

impl fmt::Debug for BeautyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeautyConfig")
            .field("capture_mode", &self.capture_mode)
            .field("initially_enabled", &self.initially_enabled)
            .field("camera", &self.camera)
            .field("processing_mode", &self.processing_mode)
            .field("render_mode", &self.render_mode)
            .field("stats_enabled", &self.stats_enabled)
            .field("stats_window", &self.stats_window)
            .field("render_thread_core", &self.render_thread_core)
            .finish()
    }
}
