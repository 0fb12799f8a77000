//! Photon emission and tracing.

use glam::Vec3;
use rand::Rng;
use rayon::prelude::*;

use crate::sampling::{cosine_hemisphere, scatter_specular, stream_rng, uniform_sphere};
use crate::scene::{Light, Ray, SceneView};
use crate::util::luminance;

use super::record::{PhotonBuffer, PhotonClass, PhotonRecord};

const RAY_OFFSET: f32 = 1e-3;

/// Upper bound on the Russian roulette survival probability.
const MAX_SURVIVAL: f32 = 0.95;

/// Per-frame parameters of one photon stream.
#[derive(Debug, Clone, Copy)]
pub struct PhotonStream {
    pub class: PhotonClass,
    /// Paths emitted this frame.
    pub count: u32,
    pub max_depth: u32,
    pub seed: u64,
    pub frame: u64,
    /// Gather radius of the class, used for the photon bounds.
    pub radius: f32,
}

/// Light selection proportional to emitted luminance.
struct LightPicker {
    cdf: Vec<f32>,
    total: f32,
    /// Last light with positive weight; catches `u * total` rounding up to `total`.
    last_emitting: usize,
}

impl LightPicker {
    fn new(lights: &[Light]) -> Option<Self> {
        let mut cdf = Vec::with_capacity(lights.len());
        let mut total = 0.0;
        let mut last_emitting = 0;
        for (i, light) in lights.iter().enumerate() {
            let weight = luminance(light.power()).max(0.0);
            if weight > 0.0 {
                last_emitting = i;
            }
            total += weight;
            cdf.push(total);
        }
        (total > 0.0).then_some(Self { cdf, total, last_emitting })
    }

    /// Light index and its selection probability.
    fn pick(&self, u: f32) -> (usize, f32) {
        let target = u * self.total;
        // First entry above the target always has positive weight.
        let idx = match self.cdf.partition_point(|&c| c <= target) {
            i if i < self.cdf.len() => i,
            _ => self.last_emitting,
        };
        let prev = if idx == 0 { 0.0 } else { self.cdf[idx - 1] };
        (idx, (self.cdf[idx] - prev) / self.total)
    }
}

/// Trace one class of photons from every light in the scene.
///
/// No lights, or lights with no power, give an empty buffer.
#[tracing::instrument(skip_all, fields(class = ?params.class, count = params.count))]
pub fn trace_photons<S: SceneView + ?Sized>(scene: &S, params: &PhotonStream) -> PhotonBuffer {
    let lights = scene.lights();
    let Some(picker) = LightPicker::new(lights) else {
        return PhotonBuffer::empty(params.class);
    };
    if params.count == 0 {
        return PhotonBuffer::empty(params.class);
    }

    let photons: Vec<PhotonRecord> = (0..params.count)
        .into_par_iter()
        .flat_map_iter(|i| {
            let mut rng = stream_rng(params.seed, params.frame, params.class.stream(), i as u64);
            let (light_idx, pdf) = picker.pick(rng.gen());
            trace_path(scene, &lights[light_idx], pdf, params, &mut rng)
        })
        .collect();

    tracing::trace!(stored = photons.len(), "photons traced");
    PhotonBuffer { class: params.class, photons, emitted: params.count }
}

/// Sample an emission ray from `light`: origin and direction.
fn emit(light: &Light, rng: &mut impl Rng) -> (Vec3, Vec3) {
    match *light {
        Light::Point { position, .. } => (position, uniform_sphere(rng.gen(), rng.gen())),
        Light::Quad { corner, edge_u, edge_v, .. } => {
            let origin = corner + edge_u * rng.gen::<f32>() + edge_v * rng.gen::<f32>();
            let n = edge_u.cross(edge_v).normalize();
            (origin + n * RAY_OFFSET, cosine_hemisphere(n, rng.gen(), rng.gen()))
        }
    }
}

fn trace_path<S: SceneView + ?Sized>(
    scene: &S,
    light: &Light,
    pick_pdf: f32,
    params: &PhotonStream,
    rng: &mut impl Rng,
) -> Vec<PhotonRecord> {
    let mut stored = Vec::new();
    let (origin, dir) = emit(light, rng);
    let mut ray = Ray::new(origin, dir);
    let mut flux = light.power() / (pick_pdf * params.count as f32);
    let mut specular_bounces = 0u32;
    let mut diffuse_bounces = 0u32;

    for _ in 0..params.max_depth {
        let Some(hit) = scene.intersect(&ray, f32::INFINITY) else {
            break;
        };

        if let Some((next, tint)) = scatter_specular(&hit.material, ray.dir, hit.normal, rng.gen()) {
            flux *= tint;
            specular_bounces += 1;
            ray = Ray::new(hit.position + next * RAY_OFFSET, next);
            continue;
        }

        let facing = if hit.normal.dot(ray.dir) < 0.0 { hit.normal } else { -hit.normal };
        let photon = || PhotonRecord::new(hit.position, params.radius, flux, -ray.dir, facing);
        match params.class {
            PhotonClass::Caustic => {
                // L S+ D: store at the first diffuse surface, then stop.
                if specular_bounces > 0 {
                    stored.push(photon());
                }
                break;
            }
            PhotonClass::Global => {
                if diffuse_bounces > 0 {
                    stored.push(photon());
                }
            }
        }

        let albedo = hit.material.albedo;
        let survive = albedo.max_element().min(MAX_SURVIVAL);
        if survive <= 0.0 || rng.gen::<f32>() >= survive {
            break;
        }
        flux *= albedo / survive;
        diffuse_bounces += 1;
        let next = cosine_hemisphere(facing, rng.gen(), rng.gen());
        ray = Ray::new(hit.position + facing * RAY_OFFSET, next);
    }
    stored
}
