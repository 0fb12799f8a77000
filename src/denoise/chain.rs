//! The fixed denoise stage sequence and its history resources.

use glam::Vec3;
use std::sync::Arc;

use crate::config::DenoiseSettings;
use crate::frame::{FrameContext, HistorySlotPair};
use crate::stream::{CommandStream, ResourceId, Stage};
use crate::util::{ColorImage, Image, Result};

use super::blur::{blur_pass, BlurAxis, BlurRadius, EdgeStopping};
use super::gbuffer::GBuffer;
use super::taa::taa_resolve;
use super::temporal::{temporal_accumulation, temporal_stabilization};
use super::tonemap::tonemap;

/// Tonemap, pre-blur, temporal accumulation, spatial blur, post-blur,
/// temporal stabilization, TAA resolve.
///
/// Owns the three history streams. Each reprojection stage writes only the
/// current slot of its stream and reads the previous one, so a single call to
/// [`process`](Self::process) per frame keeps one writer per history image.
/// History images are shared `Arc`s: capture can hold a finished frame while
/// the chain keeps going, and a slot still referenced elsewhere is copied
/// before it is overwritten.
#[derive(Debug)]
pub struct TemporalDenoiseChain {
    settings: DenoiseSettings,
    width: u32,
    height: u32,
    tonemapped: ColorImage,
    scratch: ColorImage,
    pre_blurred: ColorImage,
    denoised: ColorImage,
    accumulation: HistorySlotPair<Arc<ColorImage>>,
    stabilization: HistorySlotPair<Arc<ColorImage>>,
    final_color: HistorySlotPair<Arc<ColorImage>>,
}

impl TemporalDenoiseChain {
    pub fn new(settings: DenoiseSettings, width: u32, height: u32) -> Self {
        let image = || ColorImage::new(width, height);
        Self {
            settings,
            width,
            height,
            tonemapped: image(),
            scratch: image(),
            pre_blurred: image(),
            denoised: image(),
            accumulation: HistorySlotPair::from_fn(|| Arc::new(image())),
            stabilization: HistorySlotPair::from_fn(|| Arc::new(image())),
            final_color: HistorySlotPair::from_fn(|| Arc::new(image())),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn settings(&self) -> &DenoiseSettings {
        &self.settings
    }

    /// Run every stage for one frame and return the final color.
    pub fn process(
        &mut self,
        raw: &Image<Vec3>,
        indirect: &Image<Vec3>,
        gbuffer: &GBuffer,
        ctx: &FrameContext,
        stream: &mut CommandStream,
    ) -> Result<Arc<ColorImage>> {
        let dims = self.dimensions();
        raw.expect_dimensions(dims)?;
        indirect.expect_dimensions(dims)?;
        gbuffer.expect_dimensions(dims)?;

        let epoch = ctx.frame_index();
        let reset = ctx.reset_history();
        let (curr, prev) = (ctx.state.curr_slot(), ctx.state.prev_slot());
        let s = &self.settings;
        let edges = EdgeStopping::from_settings(s);

        let tonemapped = &mut self.tonemapped;
        stream.dispatch(
            Stage::Tonemap,
            &[ResourceId::RawRadiance, ResourceId::Indirect],
            &[ResourceId::Tonemapped],
            || tonemap(raw, indirect, s.exposure, tonemapped),
        );

        separable_blur(
            stream,
            (Stage::PreBlurH, Stage::PreBlurV),
            (ResourceId::Tonemapped, ResourceId::Denoised),
            &self.tonemapped,
            &mut self.scratch,
            &mut self.pre_blurred,
            gbuffer,
            BlurRadius::Fixed(s.pre_blur_radius),
            &edges,
        );

        let (acc_curr, acc_prev) = self.accumulation.split(epoch);
        let pre_blurred = &self.pre_blurred;
        stream.dispatch(
            Stage::TemporalAccumulation,
            &[ResourceId::Denoised, ResourceId::Accumulation(prev), ResourceId::GBuffer],
            &[ResourceId::Accumulation(curr)],
            || {
                temporal_accumulation(
                    pre_blurred,
                    acc_prev,
                    &gbuffer.velocity,
                    reset,
                    s.max_history,
                    Arc::make_mut(acc_curr),
                )
            },
        );

        separable_blur(
            stream,
            (Stage::SpatialBlurH, Stage::SpatialBlurV),
            (ResourceId::Accumulation(curr), ResourceId::Denoised),
            self.accumulation.current(epoch),
            &mut self.scratch,
            &mut self.denoised,
            gbuffer,
            BlurRadius::HistoryScaled(s.spatial_blur_radius),
            &edges,
        );

        // Post-blur reads and writes the denoised image through the scratch plane.
        let post_input = self.denoised.clone();
        separable_blur(
            stream,
            (Stage::PostBlurH, Stage::PostBlurV),
            (ResourceId::Denoised, ResourceId::Denoised),
            &post_input,
            &mut self.scratch,
            &mut self.denoised,
            gbuffer,
            BlurRadius::Fixed(s.post_blur_radius),
            &edges,
        );

        let (stab_curr, stab_prev) = self.stabilization.split(epoch);
        let denoised = &self.denoised;
        stream.dispatch(
            Stage::TemporalStabilization,
            &[ResourceId::Denoised, ResourceId::Stabilization(prev), ResourceId::GBuffer],
            &[ResourceId::Stabilization(curr)],
            || {
                temporal_stabilization(
                    denoised,
                    stab_prev,
                    &gbuffer.velocity,
                    reset,
                    s.stabilization_weight,
                    Arc::make_mut(stab_curr),
                )
            },
        );

        let stabilized = self.stabilization.current(epoch);
        let (final_curr, final_prev) = self.final_color.split(epoch);
        stream.dispatch(
            Stage::TaaResolve,
            &[ResourceId::Stabilization(curr), ResourceId::FinalColor(prev), ResourceId::GBuffer],
            &[ResourceId::FinalColor(curr)],
            || {
                taa_resolve(
                    stabilized,
                    final_prev,
                    &gbuffer.velocity,
                    reset,
                    s.taa_history_weight,
                    Arc::make_mut(final_curr),
                )
            },
        );

        Ok(Arc::clone(self.final_color.current(epoch)))
    }

    /// Input of the last temporal accumulation (the pre-blurred frame).
    pub fn accumulation_input(&self) -> &ColorImage {
        &self.pre_blurred
    }

    pub fn accumulation(&self) -> &HistorySlotPair<Arc<ColorImage>> {
        &self.accumulation
    }

    pub fn stabilization(&self) -> &HistorySlotPair<Arc<ColorImage>> {
        &self.stabilization
    }

    pub fn final_color(&self) -> &HistorySlotPair<Arc<ColorImage>> {
        &self.final_color
    }
}

/// Horizontal then vertical pass, recorded as two dispatches.
#[allow(clippy::too_many_arguments)]
fn separable_blur(
    stream: &mut CommandStream,
    (stage_h, stage_v): (Stage, Stage),
    (source, target): (ResourceId, ResourceId),
    input: &ColorImage,
    scratch: &mut ColorImage,
    out: &mut ColorImage,
    gbuffer: &GBuffer,
    radius: BlurRadius,
    edges: &EdgeStopping,
) {
    stream.dispatch(stage_h, &[source, ResourceId::GBuffer], &[ResourceId::BlurScratch], || {
        blur_pass(input, gbuffer, BlurAxis::Horizontal, radius, edges, scratch)
    });
    let scratch = &*scratch;
    stream.dispatch(stage_v, &[ResourceId::BlurScratch, ResourceId::GBuffer], &[target], || {
        blur_pass(scratch, gbuffer, BlurAxis::Vertical, radius, edges, out)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhotonSettings;
    use crate::frame::ResetCause;
    use crate::progressive::ProgressiveStateController;

    const W: u32 = 12;
    const H: u32 = 8;

    fn gbuffer() -> GBuffer {
        let mut g = GBuffer::new(W, H);
        g.depth.fill(3.0);
        g.normal.fill(Vec3::Z);
        g.roughness.fill(1.0);
        g.hit_distance.fill(1.0);
        g
    }

    fn noisy(frame: u64) -> Image<Vec3> {
        let mut img = Image::new(W, H);
        img.par_fill_with(|x, y| {
            let h = ((x * 7 + y * 13) as u64 + frame * 31) % 17;
            Vec3::splat(h as f32 / 8.0)
        });
        img
    }

    #[test]
    fn test_stage_order_and_single_writer() {
        let mut chain = TemporalDenoiseChain::new(DenoiseSettings::default(), W, H);
        let mut ctl = ProgressiveStateController::new(&PhotonSettings::default());
        let g = gbuffer();
        for _ in 0..3 {
            let ctx = ctl.advance(ResetCause::empty(), 0.0);
            let mut stream = CommandStream::begin(ctx.frame_index());
            chain
                .process(&noisy(ctx.frame_index()), &Image::new(W, H), &g, &ctx, &mut stream)
                .unwrap();
            assert_eq!(
                stream.stages().collect::<Vec<_>>(),
                vec![
                    Stage::Tonemap,
                    Stage::PreBlurH,
                    Stage::PreBlurV,
                    Stage::TemporalAccumulation,
                    Stage::SpatialBlurH,
                    Stage::SpatialBlurV,
                    Stage::PostBlurH,
                    Stage::PostBlurV,
                    Stage::TemporalStabilization,
                    Stage::TaaResolve,
                ]
            );
            assert!(stream.history_single_writer());
            let curr = ctx.state.curr_slot();
            assert_eq!(stream.writers_of(ResourceId::Accumulation(curr)).count(), 1);
            assert_eq!(stream.writers_of(ResourceId::Accumulation(1 - curr)).count(), 0);
        }
    }

    #[test]
    fn test_forced_reset_accumulation_equals_input() {
        let mut chain = TemporalDenoiseChain::new(DenoiseSettings::default(), W, H);
        let mut ctl = ProgressiveStateController::new(&PhotonSettings::default());
        let g = gbuffer();
        for _ in 0..5 {
            let ctx = ctl.advance(ResetCause::FORCED, 0.0);
            let mut stream = CommandStream::begin(ctx.frame_index());
            chain
                .process(&noisy(ctx.frame_index()), &Image::new(W, H), &g, &ctx, &mut stream)
                .unwrap();
            let acc = chain.accumulation().current(ctx.frame_index());
            assert_eq!(**acc, *chain.accumulation_input());
        }
    }

    #[test]
    fn test_reset_without_blur_outputs_tonemapped_frame() {
        let settings = DenoiseSettings {
            pre_blur_radius: 0,
            spatial_blur_radius: 0,
            post_blur_radius: 0,
            ..Default::default()
        };
        let mut chain = TemporalDenoiseChain::new(settings, W, H);
        let mut ctl = ProgressiveStateController::new(&PhotonSettings::default());
        let g = gbuffer();
        for _ in 0..4 {
            let ctx = ctl.advance(ResetCause::CAMERA_MOVED, 0.0);
            let raw = noisy(ctx.frame_index());
            let mut stream = CommandStream::begin(ctx.frame_index());
            let out = chain.process(&raw, &Image::new(W, H), &g, &ctx, &mut stream).unwrap();

            let mut expected = ColorImage::new(W, H);
            tonemap(&raw, &Image::new(W, H), 1.0, &mut expected);
            assert_eq!(*out, expected);
        }
    }

    #[test]
    fn test_history_reduces_variance() {
        let mut chain = TemporalDenoiseChain::new(DenoiseSettings::default(), W, H);
        let mut ctl = ProgressiveStateController::new(&PhotonSettings::default());
        let g = gbuffer();
        let mut last = None;
        for _ in 0..16 {
            let ctx = ctl.advance(ResetCause::empty(), 0.0);
            let mut stream = CommandStream::begin(ctx.frame_index());
            last = Some(chain.process(&noisy(ctx.frame_index()), &Image::new(W, H), &g, &ctx, &mut stream).unwrap());
        }
        let out = last.unwrap();
        let mean = out.pixels().iter().map(|p| p.x).sum::<f32>() / (W * H) as f32;
        let var = out.pixels().iter().map(|p| (p.x - mean).powi(2)).sum::<f32>() / (W * H) as f32;
        assert!(var < 0.01, "variance {var}");
        assert!(out.pixels().iter().all(|p| (0.0..=1.0).contains(&p.x)));
    }

    #[test]
    fn test_held_output_is_not_overwritten() {
        let mut chain = TemporalDenoiseChain::new(DenoiseSettings::default(), W, H);
        let mut ctl = ProgressiveStateController::new(&PhotonSettings::default());
        let g = gbuffer();
        let ctx = ctl.advance(ResetCause::empty(), 0.0);
        let first = chain
            .process(&noisy(0), &Image::new(W, H), &g, &ctx, &mut CommandStream::begin(0))
            .unwrap();
        let snapshot = (*first).clone();
        for _ in 0..3 {
            let ctx = ctl.advance(ResetCause::empty(), 0.0);
            let mut stream = CommandStream::begin(ctx.frame_index());
            chain
                .process(&Image::filled(W, H, Vec3::ONE), &Image::new(W, H), &g, &ctx, &mut stream)
                .unwrap();
        }
        assert_eq!(*first, snapshot);
        assert_ne!(**chain.final_color().slot(0), snapshot);
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let mut chain = TemporalDenoiseChain::new(DenoiseSettings::default(), W, H);
        let mut ctl = ProgressiveStateController::new(&PhotonSettings::default());
        let ctx = ctl.advance(ResetCause::empty(), 0.0);
        let err = chain.process(&Image::new(4, 4), &Image::new(W, H), &gbuffer(), &ctx, &mut CommandStream::begin(0));
        assert!(err.is_err());
    }
}
