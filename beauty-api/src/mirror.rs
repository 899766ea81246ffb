//! Mirror resolution
//!
//! Maps the user's per-camera [`MirrorMode`] to the two flags the pipeline
//! works with: whether captured pixels get mirrored before the engine sees
//! them, and whether the local display mirrors the result.

use crate::config::{CameraConfig, MirrorMode};
use beauty_video::CameraFacing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MirrorFlags {
    pub capture: bool,
    pub render: bool,
}

impl MirrorFlags {
    pub fn resolve(mode: MirrorMode) -> Self {
        let (capture, render) = match mode {
            MirrorMode::LocalAndRemote => (true, false),
            MirrorMode::LocalOnly => (false, true),
            MirrorMode::RemoteOnly => (true, true),
            MirrorMode::None => (false, false),
        };
        Self { capture, render }
    }

    pub fn resolve_for(camera: &CameraConfig, facing: CameraFacing) -> Self {
        match facing {
            CameraFacing::Front => Self::resolve(camera.front_mirror),
            CameraFacing::Back => Self::resolve(camera.back_mirror),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorChange {
    pub previous: MirrorFlags,
    pub current: MirrorFlags,
}

impl MirrorChange {
    pub fn render_changed(&self) -> bool {
        self.previous.render != self.current.render
    }
}

/// Tracks the last applied mirror flags
#[derive(Debug, Default)]
pub struct MirrorResolver {
    applied: MirrorFlags,
}

impl MirrorResolver {
    pub fn new(initial: MirrorFlags) -> Self {
        Self { applied: initial }
    }

    pub fn applied(&self) -> MirrorFlags {
        self.applied
    }

    /// Recompute the flags and remember them when they moved.
    ///
    /// Returns the change so the caller can push the render flag to the
    /// display and drop the frame.
    pub fn reconcile(&mut self, camera: &CameraConfig, facing: CameraFacing) -> Option<MirrorChange> {
        let current = MirrorFlags::resolve_for(camera, facing);
        if current == self.applied {
            return None;
        }
        let change = MirrorChange {
            previous: self.applied,
            current,
        };
        self.applied = current;
        Some(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: [MirrorMode; 4] = [
        MirrorMode::None,
        MirrorMode::LocalAndRemote,
        MirrorMode::LocalOnly,
        MirrorMode::RemoteOnly,
    ];

    #[test]
    fn test_mirror_table() {
        let expected = |mode| match mode {
            MirrorMode::LocalAndRemote => (true, false),
            MirrorMode::LocalOnly => (false, true),
            MirrorMode::RemoteOnly => (true, true),
            MirrorMode::None => (false, false),
        };

        for mode in MODES {
            for facing in [CameraFacing::Front, CameraFacing::Back] {
                // same mode on both cameras so facing cannot matter
                let camera = CameraConfig {
                    front_mirror: mode,
                    back_mirror: mode,
                };
                let flags = MirrorFlags::resolve_for(&camera, facing);
                assert_eq!((flags.capture, flags.render), expected(mode), "{:?} {:?}", mode, facing);
            }
        }
    }

    #[test]
    fn test_every_combination_reachable_once() {
        let mut seen: Vec<(bool, bool)> = MODES
            .iter()
            .map(|&m| {
                let f = MirrorFlags::resolve(m);
                (f.capture, f.render)
            })
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_facing_selects_camera_setting() {
        let camera = CameraConfig {
            front_mirror: MirrorMode::LocalOnly,
            back_mirror: MirrorMode::RemoteOnly,
        };
        assert_eq!(
            MirrorFlags::resolve_for(&camera, CameraFacing::Front),
            MirrorFlags { capture: false, render: true }
        );
        assert_eq!(
            MirrorFlags::resolve_for(&camera, CameraFacing::Back),
            MirrorFlags { capture: true, render: true }
        );
    }

    #[test]
    fn test_reconcile_reports_only_changes() {
        let camera = CameraConfig::default();
        let mut resolver = MirrorResolver::new(MirrorFlags::resolve_for(&camera, CameraFacing::Front));
        assert!(resolver.reconcile(&camera, CameraFacing::Front).is_none());

        let updated = CameraConfig {
            front_mirror: MirrorMode::LocalOnly,
            ..camera
        };
        let change = resolver.reconcile(&updated, CameraFacing::Front).unwrap();
        assert!(change.render_changed());
        assert_eq!(change.current, resolver.applied());
        assert!(resolver.reconcile(&updated, CameraFacing::Front).is_none());
    }
}
