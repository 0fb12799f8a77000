//! Frame-to-frame progressive state.

use crate::config::PhotonSettings;
use crate::frame::{FrameContext, FrameState, ResetCause};

use super::jitter::{jitter_offset, JITTER_SEQUENCE_LENGTH};
use super::radius::RadiusState;

/// Decides accumulation resets, advances the SPPM radii and the TAA jitter.
///
/// Call [`advance`](Self::advance) exactly once per frame. The controller
/// holds no other shared state; everything a frame needs is in the returned
/// [`FrameContext`].
#[derive(Debug, Clone)]
pub struct ProgressiveStateController {
    next_frame: u64,
    accumulated_frames: u32,
    jitter_index: u32,
    radius: RadiusState,
}

impl ProgressiveStateController {
    pub fn new(settings: &PhotonSettings) -> Self {
        Self::with_radius(RadiusState::from_settings(settings))
    }

    pub fn with_radius(radius: RadiusState) -> Self {
        Self {
            next_frame: 0,
            accumulated_frames: 0,
            // First advance wraps this to 0.
            jitter_index: JITTER_SEQUENCE_LENGTH - 1,
            radius,
        }
    }

    /// Produce the context for the next frame.
    pub fn advance(&mut self, causes: ResetCause, time: f32) -> FrameContext {
        let frame_index = self.next_frame;
        let mut causes = causes;
        if frame_index == 0 {
            causes |= ResetCause::FIRST_FRAME;
        }
        let reset = !causes.is_empty();

        if reset {
            self.accumulated_frames = 0;
            self.radius = self.radius.reset();
            if causes.intersects(ResetCause::CAMERA_MOVED | ResetCause::SCENE_RELOADING) {
                tracing::debug!(frame_index, ?causes, "history reset");
            }
        } else {
            let n = self.accumulated_frames;
            self.radius = self.radius.decayed(n);
            self.accumulated_frames = n.saturating_add(1);
        }

        self.jitter_index = (self.jitter_index + 1) % JITTER_SEQUENCE_LENGTH;
        self.next_frame += 1;

        FrameContext {
            state: FrameState {
                frame_index,
                accumulated_frames: self.accumulated_frames,
                reset_history: reset,
                reset_causes: causes,
                jitter_index: self.jitter_index,
            },
            radius: self.radius,
            jitter: jitter_offset(self.jitter_index),
            time,
        }
    }

    /// Index the next call to `advance` will produce.
    pub fn next_frame_index(&self) -> u64 {
        self.next_frame
    }

    pub fn radius(&self) -> &RadiusState {
        &self.radius
    }

    pub fn accumulated_frames(&self) -> u32 {
        self.accumulated_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> ProgressiveStateController {
        ProgressiveStateController::new(&PhotonSettings::default())
    }

    #[test]
    fn test_first_frame_resets() {
        let mut c = controller();
        let ctx = c.advance(ResetCause::empty(), 0.0);
        assert_eq!(ctx.state.frame_index, 0);
        assert!(ctx.state.reset_history);
        assert!(ctx.state.reset_causes.contains(ResetCause::FIRST_FRAME));
        assert_eq!(ctx.state.accumulated_frames, 0);
        assert_eq!(ctx.radius.global_radius, ctx.radius.start_global);

        let ctx = c.advance(ResetCause::empty(), 0.0);
        assert!(!ctx.state.reset_history);
        assert_eq!(ctx.state.accumulated_frames, 1);
    }

    #[test]
    fn test_forced_and_reload_reset() {
        for cause in [ResetCause::FORCED, ResetCause::SCENE_RELOADING, ResetCause::CAMERA_MOVED] {
            let mut c = controller();
            for _ in 0..5 {
                c.advance(ResetCause::empty(), 0.0);
            }
            assert_eq!(c.accumulated_frames(), 4);
            let ctx = c.advance(cause, 0.0);
            assert!(ctx.state.reset_history);
            assert_eq!(ctx.state.accumulated_frames, 0);
            assert_eq!(ctx.radius, ctx.radius.reset());
        }
    }

    #[test]
    fn test_jitter_period_eight_distinct() {
        let mut c = controller();
        let offsets: Vec<_> = (0..16).map(|_| c.advance(ResetCause::empty(), 0.0).jitter).collect();
        for i in 0..8 {
            assert_eq!(offsets[i], offsets[i + 8]);
            for j in 0..i {
                assert_ne!(offsets[i], offsets[j], "jitter {i} repeats {j}");
            }
        }
    }

    #[test]
    fn test_jitter_index_wraps() {
        let mut c = controller();
        let idx: Vec<u32> = (0..10).map(|_| c.advance(ResetCause::empty(), 0.0).state.jitter_index).collect();
        assert_eq!(idx, vec![0, 1, 2, 3, 4, 5, 6, 7, 0, 1]);
    }
}
