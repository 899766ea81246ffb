//! Pipeline lifecycle and skip bookkeeping
//!
//! `Uninitialized -> Active <-> Disabled -> Released`. Two skip counters gate
//! rendering:
//!
//! - resync: warm-up and mirror resync, merged by max
//! - transition: replaced on a processing path change, merged on a facing flip
//!
//! Both tick down once per frame that reaches the transition checks.

use crate::classifier::SkipPolicy;
use crate::config::CaptureMode;
use crate::error::BeautyError;
use beauty_video::{BufferKind, CameraFacing};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Active,
    Disabled,
    Released,
}

#[derive(Debug)]
pub struct ProcessingStateMachine {
    lifecycle: Lifecycle,
    capture_mode: CaptureMode,
    policy: SkipPolicy,
    facing: CameraFacing,
    kind: Option<BufferKind>,
    resync_skip: u32,
    transition_skip: u32,
}

impl Default for ProcessingStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStateMachine {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized,
            capture_mode: CaptureMode::Managed,
            policy: SkipPolicy::default(),
            facing: CameraFacing::Front,
            kind: None,
            resync_skip: 0,
            transition_skip: 0,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn capture_mode(&self) -> CaptureMode {
        self.capture_mode
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    pub fn kind(&self) -> Option<BufferKind> {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    /// Frames still blocked by either counter
    pub fn pending_skips(&self) -> u32 {
        self.resync_skip.max(self.transition_skip)
    }

    pub fn initialize(
        &mut self,
        capture_mode: CaptureMode,
        enabled: bool,
        policy: SkipPolicy,
    ) -> Result<(), BeautyError> {
        match self.lifecycle {
            Lifecycle::Uninitialized => {}
            Lifecycle::Released => return Err(BeautyError::Released),
            _ => return Err(BeautyError::AlreadyInitialized),
        }
        self.capture_mode = capture_mode;
        self.policy = policy;
        self.lifecycle = Lifecycle::Disabled;
        if enabled {
            self.activate();
        }
        Ok(())
    }

    /// Toggle processing. Returns whether the state changed.
    pub fn enable(&mut self, enabled: bool) -> Result<bool, BeautyError> {
        self.check_usable()?;
        if self.is_enabled() == enabled {
            return Ok(false);
        }
        if enabled {
            self.activate();
        } else {
            self.lifecycle = Lifecycle::Disabled;
        }
        Ok(true)
    }

    fn activate(&mut self) {
        self.lifecycle = Lifecycle::Active;
        if self.capture_mode == CaptureMode::Custom {
            self.arm_resync(self.policy.warm_up);
        }
    }

    /// Enter the terminal state. Fails before `initialize` and on repeat.
    pub fn release(&mut self) -> Result<(), BeautyError> {
        self.check_usable()?;
        self.lifecycle = Lifecycle::Released;
        self.resync_skip = 0;
        self.transition_skip = 0;
        Ok(())
    }

    pub fn check_usable(&self) -> Result<(), BeautyError> {
        match self.lifecycle {
            Lifecycle::Uninitialized => Err(BeautyError::NotInitialized),
            Lifecycle::Released => Err(BeautyError::Released),
            Lifecycle::Active | Lifecycle::Disabled => Ok(()),
        }
    }

    /// Track facing while disabled; arms nothing
    pub fn record_facing(&mut self, facing: CameraFacing) {
        self.facing = facing;
    }

    /// Record the frame's facing. A flip arms the facing window.
    pub fn observe_facing(&mut self, facing: CameraFacing) -> bool {
        if facing == self.facing {
            return false;
        }
        self.facing = facing;
        self.transition_skip = self.transition_skip.max(self.policy.facing_flip);
        true
    }

    /// Record the frame's processing path. A change replaces the transition
    /// window with the one for this switch.
    pub fn observe_kind(&mut self, kind: BufferKind) -> bool {
        if self.kind == Some(kind) {
            return false;
        }
        self.transition_skip = self.policy.transition_window(self.kind, kind);
        self.kind = Some(kind);
        true
    }

    pub fn arm_resync(&mut self, frames: u32) {
        self.resync_skip = self.resync_skip.max(frames);
    }

    pub fn arm_mirror_resync(&mut self) {
        self.arm_resync(self.policy.mirror_resync);
    }

    /// Tick both counters for this frame. True when the frame must be dropped.
    pub fn consume_skip(&mut self) -> bool {
        let blocked = self.resync_skip > 0 || self.transition_skip > 0;
        self.resync_skip = self.resync_skip.saturating_sub(1);
        self.transition_skip = self.transition_skip.saturating_sub(1);
        blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initialized(mode: CaptureMode, enabled: bool) -> ProcessingStateMachine {
        let mut state = ProcessingStateMachine::new();
        state.initialize(mode, enabled, SkipPolicy::default()).unwrap();
        state
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut state = ProcessingStateMachine::new();
        assert!(matches!(state.enable(true), Err(BeautyError::NotInitialized)));

        state.initialize(CaptureMode::Managed, false, SkipPolicy::default()).unwrap();
        assert_eq!(state.lifecycle(), Lifecycle::Disabled);
        assert!(matches!(
            state.initialize(CaptureMode::Managed, false, SkipPolicy::default()),
            Err(BeautyError::AlreadyInitialized)
        ));

        assert!(state.enable(true).unwrap());
        assert_eq!(state.lifecycle(), Lifecycle::Active);

        state.release().unwrap();
        assert!(matches!(state.release(), Err(BeautyError::Released)));
        assert!(matches!(state.enable(false), Err(BeautyError::Released)));
        assert!(matches!(
            state.initialize(CaptureMode::Managed, true, SkipPolicy::default()),
            Err(BeautyError::Released)
        ));
    }

    #[test]
    fn test_release_requires_initialize() {
        let mut state = ProcessingStateMachine::new();
        assert!(matches!(state.release(), Err(BeautyError::NotInitialized)));
        assert_eq!(state.lifecycle(), Lifecycle::Uninitialized);

        state.initialize(CaptureMode::Managed, false, SkipPolicy::default()).unwrap();
        state.release().unwrap();
    }

    #[test]
    fn test_record_facing_arms_nothing() {
        let mut state = initialized(CaptureMode::Managed, false);
        state.record_facing(CameraFacing::Back);
        assert_eq!(state.facing(), CameraFacing::Back);
        assert_eq!(state.pending_skips(), 0);
    }

    #[test]
    fn test_enable_is_idempotent() {
        let mut state = initialized(CaptureMode::Custom, false);

        assert!(state.enable(true).unwrap());
        assert_eq!(state.pending_skips(), 2);
        state.consume_skip();

        // same value again: no change, no re-arm
        assert!(!state.enable(true).unwrap());
        assert_eq!(state.pending_skips(), 1);

        assert!(state.enable(false).unwrap());
        assert!(!state.enable(false).unwrap());
    }

    #[test]
    fn test_warm_up_only_in_custom_mode() {
        let mut managed = initialized(CaptureMode::Managed, false);
        managed.enable(true).unwrap();
        assert_eq!(managed.pending_skips(), 0);

        let custom = initialized(CaptureMode::Custom, true);
        assert_eq!(custom.pending_skips(), 2);
    }

    #[test]
    fn test_kind_change_replaces_window() {
        let mut state = initialized(CaptureMode::Managed, true);

        assert!(state.observe_kind(BufferKind::PlainTexture));
        assert!(state.consume_skip());
        assert!(state.observe_kind(BufferKind::PlanarPixels));
        assert_eq!(state.pending_skips(), 5);
        assert!(state.observe_kind(BufferKind::PlainTexture));
        assert_eq!(state.pending_skips(), 2);
        assert!(!state.observe_kind(BufferKind::PlainTexture));
    }

    #[test]
    fn test_facing_flip_merges() {
        let mut state = initialized(CaptureMode::Managed, true);
        state.observe_kind(BufferKind::PlanarPixels);
        state.observe_kind(BufferKind::PlainTexture);
        state.observe_kind(BufferKind::PlanarPixels);
        assert_eq!(state.pending_skips(), 5);

        assert!(state.observe_facing(CameraFacing::Back));
        assert_eq!(state.pending_skips(), 5);
        assert!(!state.observe_facing(CameraFacing::Back));
    }

    #[test]
    fn test_consume_counts_down_both() {
        let mut state = initialized(CaptureMode::Managed, true);
        state.arm_mirror_resync();
        state.observe_kind(BufferKind::PlainTexture);

        assert!(state.consume_skip());
        assert!(state.consume_skip());
        assert!(!state.consume_skip());
    }
}
