//! Effect engine capability
//!
//! Each vendor SDK (FaceUnity, SenseTime, Cosmos) sits behind one adapter
//! implementing [`EffectEngine`]. The pipeline never sees vendor types.

use beauty_video::{CameraFacing, Rotation, SemiPlanarLayout, TextureType};
use glam::Mat4;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

/// Built-in beauty presets
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeautyPreset {
    /// Caller tunes every parameter itself
    Custom = 0,
    /// Vendor-recommended parameter set
    Default = 1,
}

impl BeautyPreset {
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(BeautyPreset::Custom),
            1 => Some(BeautyPreset::Default),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("preset {0:?} is not supported by this engine")]
    UnsupportedPreset(BeautyPreset),

    #[error("engine failure: {0}")]
    Failed(String),
}

/// One frame's worth of input for the effect engine
#[derive(Debug, Clone, Copy)]
pub enum RenderInput<'a> {
    /// GPU texture, already transformed upright by `transform`
    Texture {
        texture_id: u32,
        texture_type: TextureType,
        width: u32,
        height: u32,
        transform: Mat4,
        mirror: bool,
        facing: CameraFacing,
    },
    /// Semi-planar CPU image in the engine's preferred chroma order
    SemiPlanar {
        data: &'a [u8],
        layout: SemiPlanarLayout,
        width: u32,
        height: u32,
        rotation: Rotation,
        mirror: bool,
        facing: CameraFacing,
    },
}

impl RenderInput<'_> {
    pub fn mirror(&self) -> bool {
        match self {
            RenderInput::Texture { mirror, .. } | RenderInput::SemiPlanar { mirror, .. } => *mirror,
        }
    }

    pub fn facing(&self) -> CameraFacing {
        match self {
            RenderInput::Texture { facing, .. } | RenderInput::SemiPlanar { facing, .. } => *facing,
        }
    }
}

/// Opaque beauty-effect engine.
///
/// All methods are called on the render thread with the graphics context
/// current.
pub trait EffectEngine: Send {
    /// Render one frame and return the output texture.
    ///
    /// `None` (or a zero id) means the engine produced nothing for this frame.
    fn render(&mut self, input: &RenderInput<'_>) -> Option<u32>;

    /// Release engine resources tied to the graphics context
    fn release_context(&mut self);

    fn apply_preset(&mut self, preset: BeautyPreset) -> Result<(), EngineError>;

    /// Chroma order the engine expects for CPU input
    fn planar_layout(&self) -> SemiPlanarLayout {
        SemiPlanarLayout::Nv21
    }
}

/// Caller-owned engine handle shared with the render thread
pub type EffectEngineHandle = Arc<Mutex<dyn EffectEngine>>;

/// Wrap an engine into a shareable handle
pub fn engine_handle<E: EffectEngine + 'static>(engine: E) -> EffectEngineHandle {
    Arc::new(Mutex::new(engine))
}
