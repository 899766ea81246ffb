//! Beauty API - real-time beautification pipeline
//!
//! Host-facing surface: lifecycle, configuration and the per-frame entry
//! point that routes captured frames through the effect engine.
//!
//! Key points:
//! - Frames are gated on lifecycle, mirror, facing and processing path
//! - Transitions drop a bounded number of frames instead of showing artifacts
//! - Rendering is synchronous on one lazily started render thread
//! - Every failure maps to a small integer error code

pub mod classifier;
pub mod config;
pub mod error;
pub mod host;
pub mod mirror;
pub mod pipeline;
pub mod state;
pub mod stats;

#[cfg(test)]
mod test_support;

pub use classifier::*;
pub use config::*;
pub use error::*;
pub use host::*;
pub use mirror::*;
pub use pipeline::*;
pub use state::*;
pub use stats::*;

pub use beauty_render::{BeautyPreset, ContextFactory, EffectEngine, EffectEngineHandle, GraphicsContext, RenderInput};
pub use beauty_video::{Buffer, BufferKind, CameraFacing, Frame, I420Buffer, Rotation, TextureBuffer, TextureType};
