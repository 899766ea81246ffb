//! Host collaborator interface
//!
//! The host owns capture, preview widgets and transport. The pipeline only
//! talks to it through [`VideoHost`], and the host delivers frames back
//! through [`FrameObserver`].

use crate::config::RenderMode;
use beauty_video::Frame;
use std::sync::Weak;

/// Native view handed to `attach_preview`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceHandle {
    TextureView(u64),
    SurfaceView(u64),
    /// Any other widget; rejected
    Other(u64),
}

impl SurfaceHandle {
    pub fn is_renderable(&self) -> bool {
        matches!(self, SurfaceHandle::TextureView(_) | SurfaceHandle::SurfaceView(_))
    }
}

/// Per-frame callback registered with the host's capture pipeline
pub trait FrameObserver: Send + Sync {
    /// Process one captured frame in place.
    ///
    /// Returns true when the frame's buffer was replaced.
    fn on_capture_frame(&self, frame: &mut Frame) -> bool;

    /// Whether the host should mirror frames itself before delivery
    fn mirror_applied(&self) -> bool;
}

/// Frame-delivery and display side of the host
pub trait VideoHost: Send + Sync {
    fn register_frame_observer(&self, observer: Weak<dyn FrameObserver>);

    fn unregister_frame_observer(&self);

    fn setup_local_video(&self, surface: SurfaceHandle, render_mode: RenderMode, mirror: bool);

    /// Update the local display mirror flag
    fn set_local_render_mode(&self, render_mode: RenderMode, mirror: bool);
}
