//! Denoise chain driven by the real primary and photon passes.

use std::sync::Arc;

use photon_refine::photon::PhotonDensityEstimator;
use photon_refine::prelude::*;
use photon_refine::primary::PrimaryPass;
use photon_refine::scene::demo::{BoxScene, ShotCamera};

const W: u32 = 16;
const H: u32 = 12;

struct Pipeline {
    controller: ProgressiveStateController,
    primary: PrimaryPass,
    estimator: PhotonDensityEstimator,
    chain: TemporalDenoiseChain,
}

impl Pipeline {
    fn new() -> Self {
        let photon = PhotonSettings { global_photons: 300, caustic_photons: 300, ..Default::default() };
        Self {
            controller: ProgressiveStateController::new(&photon),
            primary: PrimaryPass::new(photon.seed),
            estimator: PhotonDensityEstimator::new(photon),
            chain: TemporalDenoiseChain::new(DenoiseSettings::default(), W, H),
        }
    }

    fn frame(&mut self, scene: &BoxScene, camera: &CameraFrame, causes: ResetCause) -> (FrameContext, Arc<ColorImage>) {
        let ctx = self.controller.advance(causes, 0.0);
        let mut stream = CommandStream::begin(ctx.frame_index());
        let primary = self.primary.trace(scene, camera, &ctx, W, H);
        let photons = self.estimator.render(scene, &primary.visibility, &ctx, &mut stream);
        let out = self
            .chain
            .process(&primary.radiance, &photons.indirect, &primary.gbuffer, &ctx, &mut stream)
            .unwrap();
        assert!(stream.history_single_writer());
        (ctx, out)
    }
}

#[test]
fn test_reset_frames_pass_input_through_accumulation() {
    let scene = BoxScene::default();
    let camera = ShotCamera::front(W as f32 / H as f32).camera(0, 0.0);
    let mut p = Pipeline::new();

    for i in 0..8 {
        let causes = if i % 3 == 2 { ResetCause::FORCED } else { ResetCause::empty() };
        let (ctx, _) = p.frame(&scene, &camera, causes);
        if ctx.reset_history() {
            let acc = p.chain.accumulation().current(ctx.frame_index());
            assert_eq!(**acc, *p.chain.accumulation_input(), "frame {}", ctx.frame_index());
        }
    }
}

#[test]
fn test_output_is_finite_and_non_negative() {
    let scene = BoxScene::default();
    let camera = ShotCamera::front(W as f32 / H as f32).camera(0, 0.0);
    let mut p = Pipeline::new();
    for _ in 0..4 {
        let (_, out) = p.frame(&scene, &camera, ResetCause::empty());
        assert_eq!(out.dimensions(), (W, H));
        for px in out.pixels() {
            assert!(px.truncate().is_finite());
            assert!(px.truncate().min_element() >= 0.0);
        }
    }
}

#[test]
fn test_unlit_scene_renders_black() {
    let scene = BoxScene::unlit();
    let camera = ShotCamera::front(W as f32 / H as f32).camera(0, 0.0);
    let mut p = Pipeline::new();
    for _ in 0..3 {
        let (_, out) = p.frame(&scene, &camera, ResetCause::empty());
        assert!(out.pixels().iter().all(|px| px.truncate().max_element() < 1e-6));
    }
}
