//! Bounding volumes and flat BVH nodes for the photon index.
//!
//! Flat array layout shared with GPU traversal:
//! - 32-byte nodes
//! - leaves reference a contiguous range of the reordered photon array

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: [f32::INFINITY; 3],
        max: [f32::NEG_INFINITY; 3],
    };

    /// Cube of half-extent `radius` around `center`.
    #[inline]
    pub fn around(center: Vec3, radius: f32) -> Self {
        Self {
            min: (center - Vec3::splat(radius)).to_array(),
            max: (center + Vec3::splat(radius)).to_array(),
        }
    }

    /// Grow to include a point.
    #[inline]
    pub fn grow_point(&mut self, p: [f32; 3]) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    /// Grow to include another AABB.
    #[inline]
    pub fn grow(&mut self, other: &Aabb) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(other.min[i]);
            self.max[i] = self.max[i].max(other.max[i]);
        }
    }

    /// Surface area (for SAH cost).
    #[inline]
    pub fn area(&self) -> f32 {
        let dx = self.max[0] - self.min[0];
        let dy = self.max[1] - self.min[1];
        let dz = self.max[2] - self.min[2];
        2.0 * (dx * dy + dy * dz + dz * dx)
    }

    #[inline]
    pub fn centroid(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Inclusive point containment.
    #[inline]
    pub fn contains(&self, p: Vec3) -> bool {
        let p = p.to_array();
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }
}

/// GPU-friendly BVH node (32 bytes).
///
/// Internal node: left_or_first = left child index (right = left + 1), count = 0
/// Leaf node: left_or_first = first photon index, count > 0
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    pub aabb_min: [f32; 3],
    pub left_or_first: u32,
    pub aabb_max: [f32; 3],
    pub count: u32,
}

impl BvhNode {
    #[inline]
    pub fn leaf(bounds: &Aabb, first: u32, count: u32) -> Self {
        Self { aabb_min: bounds.min, left_or_first: first, aabb_max: bounds.max, count }
    }

    #[inline]
    pub fn internal(bounds: &Aabb, left: u32) -> Self {
        Self { aabb_min: bounds.min, left_or_first: left, aabb_max: bounds.max, count: 0 }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.count > 0
    }

    #[inline]
    pub fn bounds(&self) -> Aabb {
        Aabb { min: self.aabb_min, max: self.aabb_max }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_around_contains_center_and_edges() {
        let b = Aabb::around(Vec3::new(1.0, 2.0, 3.0), 0.5);
        assert!(b.contains(Vec3::new(1.0, 2.0, 3.0)));
        assert!(b.contains(Vec3::new(1.5, 2.5, 2.5)));
        assert!(!b.contains(Vec3::new(1.51, 2.0, 3.0)));
        assert_eq!(b.centroid(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_node_size_matches_gpu_layout() {
        assert_eq!(std::mem::size_of::<BvhNode>(), 32);
    }
}
