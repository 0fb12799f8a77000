//! Per-frame SPPM pass: cull, generate, index build, collect, radius update.

use glam::Vec3;

use crate::config::PhotonSettings;
use crate::frame::FrameContext;
use crate::primary::VisibilityBuffer;
use crate::progressive::RadiusState;
use crate::scene::SceneView;
use crate::stream::{CommandStream, ResourceId, Stage};
use crate::util::Image;

use super::collect::collect;
use super::cull::cull;
use super::generate::{trace_photons, PhotonStream};
use super::index::PhotonIndex;
use super::record::PhotonClass;

/// Counters reported after each frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhotonFrameStats {
    pub work_items: usize,
    pub active_tiles: u32,
    pub global_photons: usize,
    pub caustic_photons: usize,
    pub global_radius: f32,
    pub caustic_radius: f32,
    /// Radii the controller will use next frame if it does not reset.
    pub next_radius: Option<RadiusState>,
}

/// Result of one estimator frame.
#[derive(Debug, Clone)]
pub struct PhotonFrameOutput {
    /// Indirect radiance per pixel (zero where nothing was gathered).
    pub indirect: Image<Vec3>,
    pub global: PhotonIndex,
    pub caustic: PhotonIndex,
    pub stats: PhotonFrameStats,
}

/// Stochastic progressive photon mapping over the visible surfaces.
#[derive(Debug, Clone)]
pub struct PhotonDensityEstimator {
    settings: PhotonSettings,
}

impl PhotonDensityEstimator {
    pub fn new(settings: PhotonSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PhotonSettings {
        &self.settings
    }

    /// Run the five estimator stages for one frame.
    ///
    /// Degenerate frames (estimator disabled, no lights, nothing visible) give
    /// a black indirect image.
    pub fn render<S: SceneView + ?Sized>(
        &self,
        scene: &S,
        visibility: &VisibilityBuffer,
        ctx: &FrameContext,
        stream: &mut CommandStream,
    ) -> PhotonFrameOutput {
        let (width, height) = visibility.dimensions();
        let radius = ctx.radius;
        if !self.settings.enabled {
            return PhotonFrameOutput {
                indirect: Image::new(width, height),
                global: PhotonIndex::empty(PhotonClass::Global, radius.global_radius),
                caustic: PhotonIndex::empty(PhotonClass::Caustic, radius.caustic_radius),
                stats: PhotonFrameStats::default(),
            };
        }
        let s = &self.settings;

        let work = stream.dispatch(Stage::PhotonCull, &[ResourceId::Visibility], &[ResourceId::WorkList], || {
            cull(visibility, s.tile_size)
        });

        let stream_params = |class, count, radius| PhotonStream {
            class,
            count,
            max_depth: s.max_depth,
            seed: s.seed,
            frame: ctx.frame_index(),
            radius,
        };
        let (global_buf, caustic_buf) = stream.dispatch(
            Stage::PhotonGenerate,
            &[ResourceId::Radius],
            &[ResourceId::GlobalPhotons, ResourceId::CausticPhotons],
            || {
                rayon::join(
                    || trace_photons(scene, &stream_params(PhotonClass::Global, s.global_photons, radius.global_radius)),
                    || {
                        trace_photons(
                            scene,
                            &stream_params(PhotonClass::Caustic, s.caustic_photons, radius.caustic_radius),
                        )
                    },
                )
            },
        );

        let (global, caustic) = stream.dispatch(
            Stage::PhotonIndexBuild,
            &[ResourceId::GlobalPhotons, ResourceId::CausticPhotons],
            &[ResourceId::GlobalIndex, ResourceId::CausticIndex],
            || {
                (
                    PhotonIndex::build(&global_buf, radius.global_radius),
                    PhotonIndex::build(&caustic_buf, radius.caustic_radius),
                )
            },
        );

        let indirect = stream.dispatch(
            Stage::PhotonCollect,
            &[ResourceId::WorkList, ResourceId::GlobalIndex, ResourceId::CausticIndex, ResourceId::Radius],
            &[ResourceId::Indirect],
            || collect(&work, &global, &caustic, width, height),
        );

        let next_radius = stream.dispatch(Stage::PhotonUpdateRadius, &[ResourceId::Radius], &[ResourceId::Radius], || {
            radius.decayed(ctx.state.accumulated_frames)
        });

        let stats = PhotonFrameStats {
            work_items: work.len(),
            active_tiles: work.active_tiles,
            global_photons: global.len(),
            caustic_photons: caustic.len(),
            global_radius: radius.global_radius,
            caustic_radius: radius.caustic_radius,
            next_radius: Some(next_radius),
        };
        tracing::debug!(
            frame = ctx.frame_index(),
            work_items = stats.work_items,
            global = stats.global_photons,
            caustic = stats.caustic_photons,
            r_global = radius.global_radius,
            r_caustic = radius.caustic_radius,
            "photon pass"
        );

        PhotonFrameOutput { indirect, global, caustic, stats }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ResetCause;
    use crate::primary::PrimaryPass;
    use crate::progressive::ProgressiveStateController;
    use crate::scene::demo::{BoxScene, ShotCamera};
    use crate::scene::CameraSource;

    fn settings() -> PhotonSettings {
        PhotonSettings { global_photons: 5000, caustic_photons: 5000, ..Default::default() }
    }

    #[test]
    fn test_stage_order_and_output() {
        let scene = BoxScene::default();
        let camera = ShotCamera::front(1.0).camera(0, 0.0);
        let mut ctl = ProgressiveStateController::new(&settings());
        let ctx = ctl.advance(ResetCause::empty(), 0.0);
        let primary = PrimaryPass::new(3).trace(&scene, &camera, &ctx, 24, 24);

        let mut stream = CommandStream::begin(ctx.frame_index());
        let out = PhotonDensityEstimator::new(settings()).render(&scene, &primary.visibility, &ctx, &mut stream);

        assert_eq!(
            stream.stages().collect::<Vec<_>>(),
            vec![
                Stage::PhotonCull,
                Stage::PhotonGenerate,
                Stage::PhotonIndexBuild,
                Stage::PhotonCollect,
                Stage::PhotonUpdateRadius,
            ]
        );
        assert!(out.stats.work_items > 0);
        assert!(out.stats.global_photons > 0);
        assert!(out.indirect.pixels().iter().any(|c| c.max_element() > 0.0));
        assert!(out.indirect.pixels().iter().all(|c| c.is_finite() && c.min_element() >= 0.0));

        let next = out.stats.next_radius.unwrap();
        assert!(next.global_radius < ctx.radius.global_radius);
    }

    #[test]
    fn test_no_lights_gives_black() {
        let scene = BoxScene::unlit();
        let camera = ShotCamera::front(1.0).camera(0, 0.0);
        let mut ctl = ProgressiveStateController::new(&settings());
        let ctx = ctl.advance(ResetCause::empty(), 0.0);
        let primary = PrimaryPass::new(3).trace(&scene, &camera, &ctx, 16, 16);

        let mut stream = CommandStream::begin(0);
        let out = PhotonDensityEstimator::new(settings()).render(&scene, &primary.visibility, &ctx, &mut stream);
        assert!(out.global.is_empty() && out.caustic.is_empty());
        assert!(out.indirect.pixels().iter().all(|c| *c == Vec3::ZERO));
    }

    #[test]
    fn test_disabled_records_nothing() {
        let scene = BoxScene::default();
        let mut ctl = ProgressiveStateController::new(&settings());
        let ctx = ctl.advance(ResetCause::empty(), 0.0);
        let vis: VisibilityBuffer = Image::new(8, 8);
        let mut stream = CommandStream::begin(0);
        let est = PhotonDensityEstimator::new(PhotonSettings { enabled: false, ..settings() });
        let out = est.render(&scene, &vis, &ctx, &mut stream);
        assert!(stream.dispatches().is_empty());
        assert_eq!(out.indirect.dimensions(), (8, 8));
    }
}
