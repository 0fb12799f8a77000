//! Density estimation at work-list shading points.

use glam::Vec3;
use rayon::prelude::*;
use std::f32::consts::PI;

use crate::util::Image;

use super::cull::WorkList;
use super::index::PhotonIndex;

/// Photons on surfaces turned further than this from the query normal are
/// ignored (cosine of the angle).
const NORMAL_AGREEMENT: f32 = 0.7;

/// Flux-over-area estimate of one class at `p`.
///
/// Returns the summed irradiance-like term `sum(flux) / (pi r^2)`; an empty
/// neighbourhood yields zero.
pub fn gather(index: &PhotonIndex, p: Vec3, n: Vec3) -> Vec3 {
    if index.is_empty() || index.radius <= 0.0 {
        return Vec3::ZERO;
    }
    let mut flux = Vec3::ZERO;
    index.for_each_near(p, |photon| {
        if photon.normal.dot(n) > NORMAL_AGREEMENT && photon.incoming.dot(n) > 0.0 {
            flux += photon.flux;
        }
    });
    flux / (PI * index.radius * index.radius)
}

/// Indirect radiance for every work item; pixels without work stay black.
pub fn collect(work: &WorkList, global: &PhotonIndex, caustic: &PhotonIndex, width: u32, height: u32) -> Image<Vec3> {
    let mut out = Image::new(width, height);
    let radiance: Vec<(u32, Vec3)> = work
        .items
        .par_iter()
        .map(|item| {
            let s = &item.sample;
            let density = gather(global, s.position, s.normal) + gather(caustic, s.position, s.normal);
            (item.pixel, s.throughput * s.albedo / PI * density)
        })
        .collect();

    let pixels = out.pixels_mut();
    for (pixel, value) in radiance {
        pixels[pixel as usize] = value;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photon::cull::WorkItem;
    use crate::photon::record::{PhotonBuffer, PhotonClass, PhotonRecord};
    use crate::primary::VisibilitySample;

    fn index(class: PhotonClass, photons: Vec<PhotonRecord>, radius: f32) -> PhotonIndex {
        let emitted = photons.len() as u32;
        PhotonIndex::build(&PhotonBuffer { class, photons, emitted }, radius)
    }

    #[test]
    fn test_gather_sums_nearby_flux() {
        let r = 0.1;
        let near = PhotonRecord::new(Vec3::new(0.05, 0.0, 0.0), r, Vec3::ONE, Vec3::Y, Vec3::Y);
        let far = PhotonRecord::new(Vec3::new(0.5, 0.0, 0.0), r, Vec3::ONE, Vec3::Y, Vec3::Y);
        let back = PhotonRecord::new(Vec3::ZERO, r, Vec3::ONE, Vec3::NEG_Y, Vec3::NEG_Y);
        let idx = index(PhotonClass::Global, vec![near, far, back], r);

        let e = gather(&idx, Vec3::ZERO, Vec3::Y);
        let expected = 1.0 / (PI * r * r);
        assert!((e.x - expected).abs() < 1e-3 * expected);
    }

    #[test]
    fn test_empty_indices_contribute_zero() {
        let sample = VisibilitySample {
            position: Vec3::ZERO,
            normal: Vec3::Y,
            albedo: Vec3::ONE,
            throughput: Vec3::ONE,
            roughness: 1.0,
        };
        let work = WorkList { items: vec![WorkItem { pixel: 3, sample }], ..Default::default() };
        let g = PhotonIndex::empty(PhotonClass::Global, 0.1);
        let c = PhotonIndex::empty(PhotonClass::Caustic, 0.1);
        let out = collect(&work, &g, &c, 4, 4);
        assert!(out.pixels().iter().all(|v| *v == Vec3::ZERO));
    }
}
