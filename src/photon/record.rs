//! Photon records and their GPU layout.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::bvh::Aabb;

/// Which estimator a photon feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhotonClass {
    /// Light that reached a diffuse surface after at least one diffuse bounce.
    Global,
    /// Light that reached a diffuse surface through specular bounces only.
    Caustic,
}

impl PhotonClass {
    /// RNG stream id of this class.
    pub(crate) fn stream(self) -> u64 {
        match self {
            PhotonClass::Global => 1,
            PhotonClass::Caustic => 2,
        }
    }
}

/// A photon deposited on a diffuse surface this frame.
///
/// The bounding volume is a cube of the class gather radius around the hit
/// point, so a point query against the index finds every photon whose gather
/// sphere might cover the query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotonRecord {
    pub bounds: Aabb,
    pub flux: Vec3,
    /// Unit direction towards where the photon came from.
    pub incoming: Vec3,
    pub normal: Vec3,
}

impl PhotonRecord {
    pub fn new(position: Vec3, radius: f32, flux: Vec3, incoming: Vec3, normal: Vec3) -> Self {
        Self {
            bounds: Aabb::around(position, radius),
            flux,
            incoming,
            normal,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::from(self.bounds.centroid())
    }

    pub fn to_gpu(&self) -> GpuPhoton {
        GpuPhoton {
            aabb_min: self.bounds.min,
            _pad0: 0,
            aabb_max: self.bounds.max,
            _pad1: 0,
            flux: self.flux.to_array(),
            _pad2: 0,
            incoming: self.incoming.to_array(),
            _pad3: 0,
            normal: self.normal.to_array(),
            _pad4: 0,
        }
    }
}

/// Photon for GPU storage (80 bytes, vec3 fields padded to 16).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GpuPhoton {
    pub aabb_min: [f32; 3],
    pub _pad0: u32,
    pub aabb_max: [f32; 3],
    pub _pad1: u32,
    pub flux: [f32; 3],
    pub _pad2: u32,
    pub incoming: [f32; 3],
    pub _pad3: u32,
    pub normal: [f32; 3],
    pub _pad4: u32,
}

/// All photons of one class traced in one frame.
#[derive(Debug, Clone)]
pub struct PhotonBuffer {
    pub class: PhotonClass,
    pub photons: Vec<PhotonRecord>,
    /// Paths started for this class (the flux normalization count).
    pub emitted: u32,
}

impl PhotonBuffer {
    pub fn empty(class: PhotonClass) -> Self {
        Self { class, photons: Vec::new(), emitted: 0 }
    }
}
