//! Primary visibility pass.
//!
//! Traces one jittered camera ray per pixel, follows specular chains to the
//! first diffuse surface and produces the three inputs of the per-frame
//! pipeline: raw radiance (emission plus one-sample direct light), the
//! G-buffer, and the visibility buffer that photon culling scans.

use glam::{Mat4, Vec2, Vec3};
use rand::Rng;
use rayon::prelude::*;
use std::f32::consts::PI;

use crate::denoise::GBuffer;
use crate::frame::FrameContext;
use crate::progressive::jitter::apply_jitter;
use crate::sampling::{scatter_specular, stream_rng};
use crate::scene::{CameraFrame, Light, Ray, SceneView};
use crate::util::Image;

/// Longest specular chain followed before giving up on a pixel.
const MAX_SPECULAR_CHAIN: u32 = 6;

/// Offset applied to secondary ray origins.
const RAY_OFFSET: f32 = 1e-3;

const PRIMARY_STREAM: u64 = 0;

/// First diffuse surface seen through a pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilitySample {
    pub position: Vec3,
    /// Normal facing the incoming camera path.
    pub normal: Vec3,
    pub albedo: Vec3,
    /// Product of specular tints between camera and this point.
    pub throughput: Vec3,
    pub roughness: f32,
}

pub type VisibilityBuffer = Image<Option<VisibilitySample>>;

/// Everything the primary pass writes for one frame.
#[derive(Debug, Clone)]
pub struct PrimaryOutput {
    pub radiance: Image<Vec3>,
    pub gbuffer: GBuffer,
    pub visibility: VisibilityBuffer,
}

#[derive(Default, Clone, Copy)]
struct PixelResult {
    radiance: Vec3,
    depth: f32,
    normal: Vec3,
    roughness: f32,
    velocity: Vec2,
    hit_distance: f32,
    visibility: Option<VisibilitySample>,
}

/// Camera-ray pass. Keeps the previous view-projection for motion vectors.
#[derive(Debug, Clone)]
pub struct PrimaryPass {
    seed: u64,
    prev_view_proj: Option<Mat4>,
}

impl PrimaryPass {
    pub fn new(seed: u64) -> Self {
        Self { seed, prev_view_proj: None }
    }

    /// Forget the previous camera; the next frame gets zero motion.
    pub fn reset_motion(&mut self) {
        self.prev_view_proj = None;
    }

    #[tracing::instrument(skip_all, fields(frame = ctx.frame_index(), width = width, height = height))]
    pub fn trace<S: SceneView + ?Sized>(
        &mut self,
        scene: &S,
        camera: &CameraFrame,
        ctx: &FrameContext,
        width: u32,
        height: u32,
    ) -> PrimaryOutput {
        let inv_view_proj = (apply_jitter(camera.proj, ctx.jitter, width, height) * camera.view).inverse();
        // Motion vectors compare unjittered projections, so jitter never reads as motion.
        let view_proj = camera.view_proj();
        let prev_view_proj = self.prev_view_proj;
        let frame = ctx.frame_index();
        let seed = self.seed;
        let (w, h) = (width as f32, height as f32);

        let results: Vec<PixelResult> = (0..width as u64 * height as u64)
            .into_par_iter()
            .map(|i| {
                let x = (i % width as u64) as f32;
                let y = (i / width as u64) as f32;
                let ndc = Vec3::new((x + 0.5) / w * 2.0 - 1.0, 1.0 - (y + 0.5) / h * 2.0, 1.0);
                let far_point = inv_view_proj.project_point3(ndc);
                let ray = Ray::new(camera.position, far_point - camera.position);

                let mut rng = stream_rng(seed, frame, PRIMARY_STREAM, i);
                let mut px = trace_pixel(scene, ray, &mut rng);

                let world = if px.depth > 0.0 { ray.at(px.depth) } else { far_point };
                if let Some(prev) = prev_view_proj {
                    let to_pixel = |clip: Vec3| Vec2::new((clip.x + 1.0) * 0.5 * w, (1.0 - clip.y) * 0.5 * h);
                    px.velocity = to_pixel(view_proj.project_point3(world)) - to_pixel(prev.project_point3(world));
                }
                px
            })
            .collect();

        self.prev_view_proj = Some(view_proj);

        let mut out = PrimaryOutput {
            radiance: Image::new(width, height),
            gbuffer: GBuffer::new(width, height),
            visibility: Image::new(width, height),
        };
        for (i, px) in results.into_iter().enumerate() {
            out.radiance.pixels_mut()[i] = px.radiance;
            out.gbuffer.depth.pixels_mut()[i] = px.depth;
            out.gbuffer.normal.pixels_mut()[i] = px.normal;
            out.gbuffer.roughness.pixels_mut()[i] = px.roughness;
            out.gbuffer.velocity.pixels_mut()[i] = px.velocity;
            out.gbuffer.hit_distance.pixels_mut()[i] = px.hit_distance;
            out.visibility.pixels_mut()[i] = px.visibility;
        }
        out
    }
}

fn trace_pixel<S: SceneView + ?Sized>(scene: &S, mut ray: Ray, rng: &mut impl Rng) -> PixelResult {
    let mut px = PixelResult { roughness: 1.0, ..Default::default() };
    let mut throughput = Vec3::ONE;

    for bounce in 0..MAX_SPECULAR_CHAIN {
        let Some(hit) = scene.intersect(&ray, f32::INFINITY) else {
            break;
        };
        let facing = if hit.normal.dot(ray.dir) < 0.0 { hit.normal } else { -hit.normal };
        if bounce == 0 {
            px.depth = hit.t;
            px.normal = facing;
            px.roughness = hit.material.roughness;
        } else if bounce == 1 {
            px.hit_distance = hit.t;
        }
        px.radiance += throughput * hit.material.emission;

        if let Some((dir, tint)) = scatter_specular(&hit.material, ray.dir, hit.normal, rng.gen()) {
            throughput *= tint;
            ray = Ray::new(hit.position + dir * RAY_OFFSET, dir);
            continue;
        }

        let albedo = hit.material.albedo;
        let (irradiance, light_distance) = direct_irradiance(scene, hit.position, facing, rng);
        px.radiance += throughput * albedo / PI * irradiance;
        if bounce == 0 {
            px.hit_distance = light_distance;
        }
        px.visibility = Some(VisibilitySample {
            position: hit.position,
            normal: facing,
            albedo,
            throughput,
            roughness: hit.material.roughness,
        });
        break;
    }
    px
}

/// One-sample irradiance from every light, with the mean light distance.
fn direct_irradiance<S: SceneView + ?Sized>(scene: &S, p: Vec3, n: Vec3, rng: &mut impl Rng) -> (Vec3, f32) {
    let lights = scene.lights();
    if lights.is_empty() {
        return (Vec3::ZERO, 0.0);
    }
    let origin = p + n * RAY_OFFSET;
    let mut irradiance = Vec3::ZERO;
    let mut distance_sum = 0.0;

    for light in lights {
        match *light {
            Light::Point { position, power } => {
                let to = position - origin;
                let d = to.length();
                distance_sum += d;
                let cos_s = n.dot(to / d);
                if cos_s <= 0.0 || scene.occluded(&Ray::new(origin, to), d - RAY_OFFSET) {
                    continue;
                }
                irradiance += power / (4.0 * PI * d * d) * cos_s;
            }
            Light::Quad { corner, edge_u, edge_v, .. } => {
                let q = corner + edge_u * rng.gen::<f32>() + edge_v * rng.gen::<f32>();
                let cross = edge_u.cross(edge_v);
                let area = cross.length();
                let nl = cross / area;
                let to = q - origin;
                let d = to.length();
                distance_sum += d;
                let wi = to / d;
                let cos_s = n.dot(wi);
                let cos_l = -nl.dot(wi);
                if cos_s <= 0.0 || cos_l <= 0.0 || scene.occluded(&Ray::new(origin, wi), d * (1.0 - RAY_OFFSET)) {
                    continue;
                }
                irradiance += light.radiance() * cos_s * cos_l * area / (d * d);
            }
        }
    }
    (irradiance, distance_sum / lights.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhotonSettings;
    use crate::frame::ResetCause;
    use crate::progressive::ProgressiveStateController;
    use crate::scene::demo::{BoxScene, ShotCamera};
    use crate::scene::CameraSource;

    #[test]
    fn test_primary_fills_gbuffer_and_visibility() {
        let scene = BoxScene::default();
        let camera = ShotCamera::front(1.0).camera(0, 0.0);
        let mut ctl = ProgressiveStateController::new(&PhotonSettings::default());
        let ctx = ctl.advance(ResetCause::empty(), 0.0);
        let out = PrimaryPass::new(1).trace(&scene, &camera, &ctx, 16, 16);

        // Center pixel looks at the back wall through the box.
        let depth = out.gbuffer.depth.get(8, 8);
        assert!(depth > 3.0 && depth < 5.0, "depth {depth}");
        assert!(out.visibility.get(8, 8).is_some());
        assert!(out.radiance.pixels().iter().any(|c| c.max_element() > 0.0));
        // First frame has no motion history.
        assert!(out.gbuffer.velocity.pixels().iter().all(|v| *v == Vec2::ZERO));
    }

    #[test]
    fn test_static_camera_has_no_motion() {
        let scene = BoxScene::default();
        let camera = ShotCamera::front(1.0).camera(0, 0.0);
        let mut ctl = ProgressiveStateController::new(&PhotonSettings::default());
        let mut pass = PrimaryPass::new(1);
        let ctx = ctl.advance(ResetCause::empty(), 0.0);
        pass.trace(&scene, &camera, &ctx, 16, 16);
        let ctx = ctl.advance(ResetCause::empty(), 0.0);
        let out = pass.trace(&scene, &camera, &ctx, 16, 16);
        assert_ne!(ctx.jitter, Vec2::ZERO);
        for v in out.gbuffer.velocity.pixels() {
            assert!(v.length() < 1e-2, "velocity {v}");
        }
    }

    #[test]
    fn test_camera_pan_shows_as_motion() {
        let scene = BoxScene::default();
        let a = CameraFrame::look_at(Vec3::new(0.0, 0.0, 3.4), Vec3::ZERO, 0.7, 1.0, 0.05, 50.0);
        let b = CameraFrame::look_at(Vec3::new(0.2, 0.0, 3.4), Vec3::new(0.2, 0.0, 0.0), 0.7, 1.0, 0.05, 50.0);
        let mut ctl = ProgressiveStateController::new(&PhotonSettings::default());
        let mut pass = PrimaryPass::new(1);
        pass.trace(&scene, &a, &ctl.advance(ResetCause::empty(), 0.0), 16, 16);
        let out = pass.trace(&scene, &b, &ctl.advance(ResetCause::empty(), 0.0), 16, 16);
        // Camera moved right, so the back wall moves left on screen.
        let v = out.gbuffer.velocity.get(8, 8);
        assert!(v.x < -0.1, "velocity {v}");
        assert!(v.y.abs() < 1e-2, "velocity {v}");
    }

    #[test]
    fn test_unlit_scene_is_black() {
        let scene = BoxScene::unlit();
        let camera = ShotCamera::front(1.0).camera(0, 0.0);
        let mut ctl = ProgressiveStateController::new(&PhotonSettings::default());
        let ctx = ctl.advance(ResetCause::empty(), 0.0);
        let out = PrimaryPass::new(1).trace(&scene, &camera, &ctx, 8, 8);
        assert!(out.radiance.pixels().iter().all(|c| *c == Vec3::ZERO));
    }
}
