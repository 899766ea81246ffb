//! Frame classification and transition windows

use crate::config::ProcessingMode;
use beauty_video::{Buffer, BufferKind};

/// Why a frame was passed through without beautification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Inside a skip window armed by an earlier transition
    SkipWindow,
    /// Display mirror flag was just updated
    MirrorResync,
    /// Camera facing flipped on this frame
    FacingChanged,
    /// Processing path changed on this frame
    KindTransition,
    /// Scratch buffer was resized and holds no data yet
    ScratchResize,
    /// Engine returned no usable texture
    InvalidTexture,
    /// Buffer cannot go down the selected processing path
    UnsupportedBuffer,
}

/// Frames dropped after each kind of transition, counting the frame that
/// triggers it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipPolicy {
    pub first_frame: u32,
    pub texture_to_texture: u32,
    pub planar_to_texture: u32,
    pub texture_to_planar: u32,
    pub facing_flip: u32,
    pub warm_up: u32,
    pub mirror_resync: u32,
}

impl Default for SkipPolicy {
    fn default() -> Self {
        Self {
            first_frame: 1,
            texture_to_texture: 1,
            planar_to_texture: 2,
            texture_to_planar: 5,
            facing_flip: 1,
            warm_up: 2,
            mirror_resync: 2,
        }
    }
}

impl SkipPolicy {
    /// Window for switching the processing path from `from` to `to`
    pub fn transition_window(&self, from: Option<BufferKind>, to: BufferKind) -> u32 {
        match from {
            None => self.first_frame,
            Some(from) if from == to => 0,
            Some(from) => match (from.is_texture(), to.is_texture()) {
                (true, true) => self.texture_to_texture,
                (false, true) => self.planar_to_texture,
                (true, false) => self.texture_to_planar,
                (false, false) => 0,
            },
        }
    }
}

/// Processing path a buffer takes under `mode`.
///
/// `ForcePlanar` sends textures through a readback, so every frame takes the
/// planar path. `ForceTexture` has no way to upload planar frames.
pub fn classify(buffer: &Buffer, mode: ProcessingMode) -> Result<BufferKind, SkipReason> {
    let kind = buffer.kind();
    match mode {
        ProcessingMode::Auto => Ok(kind),
        ProcessingMode::ForcePlanar => Ok(BufferKind::PlanarPixels),
        ProcessingMode::ForceTexture if kind.is_texture() => Ok(kind),
        ProcessingMode::ForceTexture => Err(SkipReason::UnsupportedBuffer),
    }
}
