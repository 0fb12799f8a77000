//! Per-frame spatial index over one photon class.

use glam::Vec3;
use smallvec::SmallVec;

use super::build::build_bvh;
use super::bvh::BvhNode;
use super::record::{GpuPhoton, PhotonBuffer, PhotonClass, PhotonRecord};

/// BVH plus photons reordered into leaf order.
#[derive(Debug, Clone)]
pub struct PhotonIndex {
    pub class: PhotonClass,
    pub nodes: Vec<BvhNode>,
    /// Photons in BVH leaf order.
    pub photons: Vec<PhotonRecord>,
    pub radius: f32,
}

impl PhotonIndex {
    /// Build a fresh index. Reorders photons by BVH leaf order for locality.
    pub fn build(buffer: &PhotonBuffer, radius: f32) -> Self {
        let bounds: Vec<_> = buffer.photons.iter().map(|p| p.bounds).collect();
        let bvh = build_bvh(&bounds);
        let photons = bvh.prim_indices.iter().map(|&i| buffer.photons[i]).collect();
        Self { class: buffer.class, nodes: bvh.nodes, photons, radius }
    }

    pub fn empty(class: PhotonClass, radius: f32) -> Self {
        Self { class, nodes: Vec::new(), photons: Vec::new(), radius }
    }

    pub fn is_empty(&self) -> bool {
        self.photons.is_empty()
    }

    pub fn len(&self) -> usize {
        self.photons.len()
    }

    /// Visit every photon within `radius` of `p`.
    pub fn for_each_near(&self, p: Vec3, mut f: impl FnMut(&PhotonRecord)) {
        if self.nodes.is_empty() {
            return;
        }
        let r2 = self.radius * self.radius;
        let mut stack: SmallVec<[u32; 64]> = SmallVec::new();
        stack.push(0);
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx as usize];
            if !node.bounds().contains(p) {
                continue;
            }
            if node.is_leaf() {
                let first = node.left_or_first as usize;
                for photon in &self.photons[first..first + node.count as usize] {
                    if photon.position().distance_squared(p) <= r2 {
                        f(photon);
                    }
                }
            } else {
                stack.push(node.left_or_first + 1);
                stack.push(node.left_or_first);
            }
        }
    }

    /// BVH nodes as bytes.
    pub fn nodes_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }

    /// Photons in GPU layout.
    pub fn gpu_photons(&self) -> Vec<GpuPhoton> {
        self.photons.iter().map(PhotonRecord::to_gpu).collect()
    }
}
