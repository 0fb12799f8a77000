//! Frame orchestration.
//!
//! [`ProgressiveRenderer`] owns the four per-frame components and records
//! one ordered [`CommandStream`] per frame:
//!
//! 1. progressive state (reset decision, radii, jitter)
//! 2. primary visibility
//! 3. photon density estimate
//! 4. temporal denoise chain
//! 5. capture copy, when export is enabled
//!
//! [`run`](ProgressiveRenderer::run) drives a whole batch from a
//! [`RenderConfig`] and drains the export workers at the end.

use glam::Mat4;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::capture::{AsyncCaptureExport, CaptureStats};
use crate::config::{RenderConfig, RendererSettings};
use crate::denoise::TemporalDenoiseChain;
use crate::frame::{FrameContext, ResetCause};
use crate::photon::{PhotonDensityEstimator, PhotonFrameStats};
use crate::primary::PrimaryPass;
use crate::progressive::{ProgressiveStateController, RadiusState};
use crate::scene::{CameraFrame, CameraSource, SceneView};
use crate::stream::{CommandStream, ResourceId, Stage};
use crate::util::{ColorImage, Result};

/// Camera position threshold for a reset.
const POS_EPS: f32 = 1e-5;
/// View-projection element threshold for a reset.
const VP_EPS: f32 = 1e-6;

/// Detects camera moves between consecutive frames.
#[derive(Debug, Clone, Default)]
pub struct CameraTracker {
    last_pos: Option<[f32; 3]>,
    last_view_proj: Option<Mat4>,
}

impl CameraTracker {
    /// Record `camera`. Returns the position and matrix deltas when it moved.
    ///
    /// The first camera seen is never a move.
    pub fn update(&mut self, camera: &CameraFrame) -> Option<(f32, f32)> {
        let pos = camera.position.to_array();
        let vp = camera.view_proj();
        let pos_delta = self.last_pos.map_or(0.0, |prev| {
            prev.iter().zip(pos.iter()).map(|(a, b)| (a - b).abs()).fold(0.0f32, f32::max)
        });
        let vp_delta = self.last_view_proj.map_or(0.0, |prev| {
            prev.to_cols_array()
                .iter()
                .zip(vp.to_cols_array().iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f32, f32::max)
        });
        self.last_pos = Some(pos);
        self.last_view_proj = Some(vp);

        (pos_delta > POS_EPS || vp_delta > VP_EPS).then_some((pos_delta, vp_delta))
    }
}

/// What happened in one frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_index: u64,
    pub reset_causes: ResetCause,
    pub accumulated_frames: u32,
    pub radius: RadiusState,
    pub photon: PhotonFrameStats,
    /// Sum of recorded kernel times.
    pub kernel_time: Duration,
    pub wall_time: Duration,
}

/// Totals of a batch run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub frames: u64,
    pub resets: u64,
    pub stopped_early: bool,
    pub elapsed: Duration,
    pub capture: Option<CaptureStats>,
}

/// Progressive path-tracing core for one output resolution.
pub struct ProgressiveRenderer {
    config: RenderConfig,
    controller: ProgressiveStateController,
    primary: PrimaryPass,
    estimator: PhotonDensityEstimator,
    chain: TemporalDenoiseChain,
    capture: Option<AsyncCaptureExport>,
    camera: CameraTracker,
    pending: ResetCause,
    stop: Arc<AtomicBool>,
    last_stream: Option<CommandStream>,
}

impl ProgressiveRenderer {
    /// Validate settings and create every component.
    ///
    /// Fails if settings are invalid or capture export cannot start.
    pub fn new(settings: RendererSettings) -> Result<Self> {
        if let Err(e) = settings.validate() {
            tracing::error!(error = %e, "invalid renderer settings");
            return Err(e);
        }
        let RendererSettings { render, photon, denoise, capture } = settings;
        let capture = if capture.enabled {
            Some(AsyncCaptureExport::new(capture, render.width, render.height)?)
        } else {
            None
        };

        Ok(Self {
            controller: ProgressiveStateController::new(&photon),
            primary: PrimaryPass::new(photon.seed),
            estimator: PhotonDensityEstimator::new(photon),
            chain: TemporalDenoiseChain::new(denoise, render.width, render.height),
            capture,
            camera: CameraTracker::default(),
            pending: ResetCause::empty(),
            stop: Arc::new(AtomicBool::new(false)),
            last_stream: None,
            config: render,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn controller(&self) -> &ProgressiveStateController {
        &self.controller
    }

    /// Flag that ends [`run`](Self::run) before the next frame when set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Reset history on the next frame (forced reset or scene reload).
    pub fn request_reset(&mut self, cause: ResetCause) {
        self.pending |= cause;
    }

    /// Command stream of the most recent frame.
    pub fn last_stream(&self) -> Option<&CommandStream> {
        self.last_stream.as_ref()
    }

    /// Render one frame and queue it for capture.
    pub fn render_frame<S: SceneView + ?Sized>(
        &mut self,
        scene: &S,
        camera: &CameraFrame,
        time: f32,
    ) -> Result<(Arc<ColorImage>, FrameReport)> {
        let wall = Instant::now();
        let frame_index = self.controller.next_frame_index();
        let _span = tracing::info_span!("frame", frame_index).entered();

        let mut causes = std::mem::take(&mut self.pending);
        if let Some((pos_delta, vp_delta)) = self.camera.update(camera) {
            tracing::warn!("camera moved, pos_delta={pos_delta:.2e}, vp_delta={vp_delta:.2e}, resetting history");
            causes |= ResetCause::CAMERA_MOVED;
        }
        let ctx = self.controller.advance(causes, time);
        if ctx.reset_history() {
            self.primary.reset_motion();
        }

        let (width, height) = (self.config.width, self.config.height);
        let mut stream = CommandStream::begin(frame_index);
        let primary = &mut self.primary;
        let frame = stream.dispatch(
            Stage::PrimaryVisibility,
            &[],
            &[ResourceId::RawRadiance, ResourceId::GBuffer, ResourceId::Visibility],
            || primary.trace(scene, camera, &ctx, width, height),
        );
        let photons = self.estimator.render(scene, &frame.visibility, &ctx, &mut stream);
        let image = self
            .chain
            .process(&frame.radiance, &photons.indirect, &frame.gbuffer, &ctx, &mut stream)?;

        if let Some(capture) = &self.capture {
            let slot = capture.slot_index(frame_index);
            let captured = stream.dispatch(
                Stage::CaptureCopy,
                &[ResourceId::FinalColor(ctx.state.curr_slot())],
                &[ResourceId::Readback(slot)],
                || capture.capture(&image, frame_index),
            );
            // Export problems drop the frame, never the render.
            if let Err(e) = captured {
                tracing::error!(frame_index, error = %e, "frame not captured");
            }
        }

        let report = self.report(&ctx, photons.stats, &stream, wall.elapsed());
        tracing::debug!(
            frame_index,
            accumulated = report.accumulated_frames,
            reset = ctx.reset_history(),
            kernel_ms = report.kernel_time.as_secs_f64() * 1e3,
            "frame done"
        );
        if let Ok(budget) = Duration::try_from_secs_f32(1.0 / self.config.target_fps) {
            if report.wall_time > budget {
                tracing::trace!(frame_index, ?budget, wall = ?report.wall_time, "frame over budget");
            }
        }
        self.last_stream = Some(stream);
        Ok((image, report))
    }

    fn report(&self, ctx: &FrameContext, photon: PhotonFrameStats, stream: &CommandStream, wall: Duration) -> FrameReport {
        FrameReport {
            frame_index: ctx.frame_index(),
            reset_causes: ctx.state.reset_causes,
            accumulated_frames: ctx.state.accumulated_frames,
            radius: ctx.radius,
            photon,
            kernel_time: stream.total_time(),
            wall_time: wall,
        }
    }

    /// Render the whole batch described by the config, then drain capture.
    pub fn run<S, C>(&mut self, scene: &S, cameras: &C) -> Result<RunSummary>
    where
        S: SceneView + ?Sized,
        C: CameraSource + ?Sized,
    {
        let total = self.config.total_frames();
        tracing::info!(
            frames = total,
            width = self.config.width,
            height = self.config.height,
            fps = self.config.target_fps,
            "render run started"
        );
        let start = Instant::now();
        let mut summary = RunSummary::default();

        for _ in 0..total {
            if self.stop.load(Ordering::Acquire) {
                tracing::info!(frames = summary.frames, "stop requested");
                summary.stopped_early = true;
                break;
            }
            let frame_index = self.controller.next_frame_index();
            let time = self.config.frame_time(frame_index);
            let camera = cameras.camera(frame_index, time);
            let (_, report) = self.render_frame(scene, &camera, time)?;
            summary.frames += 1;
            if !report.reset_causes.is_empty() {
                summary.resets += 1;
            }
        }

        summary.capture = self.finish();
        summary.elapsed = start.elapsed();
        tracing::info!(
            frames = summary.frames,
            resets = summary.resets,
            secs = summary.elapsed.as_secs_f64(),
            "render run finished"
        );
        Ok(summary)
    }

    /// Wait for in-flight exports. Returns capture totals when export is on.
    pub fn finish(&mut self) -> Option<CaptureStats> {
        self.capture.as_mut().map(AsyncCaptureExport::shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::demo::{BoxScene, ShotCamera};
    use glam::Vec3;

    fn settings() -> RendererSettings {
        let mut s = RendererSettings::default();
        s.render.width = 16;
        s.render.height = 12;
        s.photon.global_photons = 500;
        s.photon.caustic_photons = 500;
        s.capture.enabled = false;
        s
    }

    #[test]
    fn test_camera_tracker_detects_moves() {
        let mut tracker = CameraTracker::default();
        let a = CameraFrame::look_at(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, 0.7, 1.0, 0.1, 10.0);
        let b = CameraFrame::look_at(Vec3::new(0.1, 0.0, 3.0), Vec3::ZERO, 0.7, 1.0, 0.1, 10.0);
        assert!(tracker.update(&a).is_none());
        assert!(tracker.update(&a).is_none());
        assert!(tracker.update(&b).is_some());
        assert!(tracker.update(&b).is_none());
    }

    #[test]
    fn test_frame_stream_covers_all_stages() {
        let mut renderer = ProgressiveRenderer::new(settings()).unwrap();
        let scene = BoxScene::default();
        let camera = ShotCamera::front(16.0 / 12.0).camera(0, 0.0);
        let (image, report) = renderer.render_frame(&scene, &camera, 0.0).unwrap();
        assert_eq!(image.dimensions(), (16, 12));
        assert!(report.reset_causes.contains(ResetCause::FIRST_FRAME));

        let stages: Vec<_> = renderer.last_stream().unwrap().stages().collect();
        assert_eq!(stages.first(), Some(&Stage::PrimaryVisibility));
        assert_eq!(stages.last(), Some(&Stage::TaaResolve));
        assert!(stages.contains(&Stage::PhotonCollect));
    }

    #[test]
    fn test_requested_reset_applies_once() {
        let mut renderer = ProgressiveRenderer::new(settings()).unwrap();
        let scene = BoxScene::default();
        let camera = ShotCamera::front(1.0).camera(0, 0.0);
        renderer.render_frame(&scene, &camera, 0.0).unwrap();
        renderer.render_frame(&scene, &camera, 0.0).unwrap();
        renderer.request_reset(ResetCause::SCENE_RELOADING);
        let (_, r) = renderer.render_frame(&scene, &camera, 0.0).unwrap();
        assert_eq!(r.reset_causes, ResetCause::SCENE_RELOADING);
        assert_eq!(r.accumulated_frames, 0);
        let (_, r) = renderer.render_frame(&scene, &camera, 0.0).unwrap();
        assert!(r.reset_causes.is_empty());
        assert_eq!(r.accumulated_frames, 1);
    }

    #[test]
    fn test_stop_flag_ends_run() {
        let mut renderer = ProgressiveRenderer::new(settings()).unwrap();
        renderer.stop_handle().store(true, Ordering::Release);
        let summary = renderer.run(&BoxScene::default(), &ShotCamera::front(1.0)).unwrap();
        assert!(summary.stopped_early);
        assert_eq!(summary.frames, 0);
        assert!(summary.capture.is_none());
    }

    #[test]
    fn test_capture_failure_does_not_stop_render() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings();
        s.capture.enabled = true;
        s.capture.output_dir = dir.path().to_path_buf();
        let mut renderer = ProgressiveRenderer::new(s).unwrap();
        let scene = BoxScene::default();
        let camera = ShotCamera::front(1.0).camera(0, 0.0);

        renderer.render_frame(&scene, &camera, 0.0).unwrap();
        let stats = renderer.finish().unwrap();
        assert_eq!(stats.written, 1);

        // Export is shut down now; frames still render and stay uncounted.
        let (_, report) = renderer.render_frame(&scene, &camera, 0.0).unwrap();
        assert_eq!(report.accumulated_frames, 1);
        assert_eq!(renderer.finish().unwrap().submitted, 1);
    }

    #[test]
    fn test_tiny_frame_rate_renders() {
        let mut s = settings();
        s.render.target_fps = f32::MIN_POSITIVE;
        let mut renderer = ProgressiveRenderer::new(s).unwrap();
        let camera = ShotCamera::front(1.0).camera(0, 0.0);
        renderer.render_frame(&BoxScene::default(), &camera, 0.0).unwrap();
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut s = settings();
        s.render.width = 0;
        assert!(ProgressiveRenderer::new(s).is_err());
    }
}
