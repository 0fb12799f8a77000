//! Sampling and scattering helpers shared by the primary pass and photon tracing.

use glam::Vec3;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::f32::consts::PI;

use crate::scene::{MaterialKind, SurfaceMaterial};

/// Deterministic RNG for one stream element.
///
/// Frames, streams and elements never share a sequence as long as their
/// `(seed, frame, stream, index)` tuples differ.
pub fn stream_rng(seed: u64, frame: u64, stream: u64, index: u64) -> SmallRng {
    let mut h = seed ^ 0x9e37_79b9_7f4a_7c15;
    for v in [frame, stream, index] {
        h = (h ^ v).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        h ^= h >> 31;
    }
    SmallRng::seed_from_u64(h)
}

/// Cosine-weighted direction around `n`.
pub fn cosine_hemisphere(n: Vec3, u1: f32, u2: f32) -> Vec3 {
    let r = u1.sqrt();
    let phi = 2.0 * PI * u2;
    let (t, b) = n.any_orthonormal_pair();
    let z = (1.0 - u1).max(0.0).sqrt();
    (t * (r * phi.cos()) + b * (r * phi.sin()) + n * z).normalize()
}

/// Uniform direction on the unit sphere.
pub fn uniform_sphere(u1: f32, u2: f32) -> Vec3 {
    let z = 1.0 - 2.0 * u1;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * u2;
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

#[inline]
pub fn reflect(d: Vec3, n: Vec3) -> Vec3 {
    d - 2.0 * d.dot(n) * n
}

/// Refract `d` through a surface with normal `n` facing the incident side.
pub fn refract(d: Vec3, n: Vec3, eta: f32) -> Option<Vec3> {
    let cos_i = -d.dot(n);
    let k = 1.0 - eta * eta * (1.0 - cos_i * cos_i);
    if k < 0.0 {
        return None;
    }
    Some((eta * d + (eta * cos_i - k.sqrt()) * n).normalize())
}

/// Schlick Fresnel reflectance.
#[inline]
pub fn schlick(cos_i: f32, eta_i: f32, eta_t: f32) -> f32 {
    let r0 = ((eta_i - eta_t) / (eta_i + eta_t)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cos_i.clamp(0.0, 1.0)).powi(5)
}

/// Continue a path through a specular surface.
///
/// `normal` is the surface's front normal; `u` picks between reflection and
/// refraction on glass. Returns the new direction and throughput multiplier,
/// or `None` for diffuse materials.
pub fn scatter_specular(material: &SurfaceMaterial, dir: Vec3, normal: Vec3, u: f32) -> Option<(Vec3, Vec3)> {
    match material.kind {
        MaterialKind::Diffuse => None,
        MaterialKind::Mirror => {
            let n = if dir.dot(normal) < 0.0 { normal } else { -normal };
            Some((reflect(dir, n), material.albedo))
        }
        MaterialKind::Glass { ior } => {
            let entering = dir.dot(normal) < 0.0;
            let (n, eta_i, eta_t) = if entering { (normal, 1.0, ior) } else { (-normal, ior, 1.0) };
            let cos_i = -dir.dot(n);
            let fresnel = schlick(cos_i, eta_i, eta_t);
            match refract(dir, n, eta_i / eta_t) {
                Some(t) if u >= fresnel => Some((t, material.albedo)),
                _ => Some((reflect(dir, n), material.albedo)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_cosine_hemisphere_above_surface() {
        let mut rng = stream_rng(1, 0, 0, 0);
        let n = Vec3::new(0.3, 0.9, -0.1).normalize();
        for _ in 0..256 {
            let d = cosine_hemisphere(n, rng.gen(), rng.gen());
            assert!(d.dot(n) >= -1e-5);
            assert!((d.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_refract_straight_through() {
        let t = refract(Vec3::NEG_Y, Vec3::Y, 1.0 / 1.5).unwrap();
        assert!((t - Vec3::NEG_Y).length() < 1e-6);
    }

    #[test]
    fn test_total_internal_reflection() {
        let d = Vec3::new(0.9, -0.1, 0.0).normalize();
        assert!(refract(d, Vec3::Y, 1.5).is_none());
    }

    #[test]
    fn test_stream_rng_distinct() {
        let a: u64 = stream_rng(7, 1, 0, 5).gen();
        let b: u64 = stream_rng(7, 2, 0, 5).gen();
        let c: u64 = stream_rng(7, 1, 0, 5).gen();
        assert_ne!(a, b);
        assert_eq!(a, c);
    }
}
