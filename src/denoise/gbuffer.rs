//! Geometry planes consumed by the denoise chain.

use glam::{Vec2, Vec3};

use crate::util::{Image, Result};

/// Per-pixel surface attributes from the primary pass.
///
/// `depth == 0` marks a background pixel.
#[derive(Debug, Clone)]
pub struct GBuffer {
    /// Distance from the camera to the primary hit.
    pub depth: Image<f32>,
    pub normal: Image<Vec3>,
    pub roughness: Image<f32>,
    /// Current pixel position minus previous-frame pixel position.
    pub velocity: Image<Vec2>,
    /// Length of the secondary ray leaving the primary hit.
    pub hit_distance: Image<f32>,
}

impl GBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            depth: Image::new(width, height),
            normal: Image::new(width, height),
            roughness: Image::new(width, height),
            velocity: Image::new(width, height),
            hit_distance: Image::new(width, height),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.depth.dimensions()
    }

    /// Check that all planes share the given dimensions.
    pub fn expect_dimensions(&self, dims: (u32, u32)) -> Result<()> {
        self.depth.expect_dimensions(dims)?;
        self.normal.expect_dimensions(dims)?;
        self.roughness.expect_dimensions(dims)?;
        self.velocity.expect_dimensions(dims)?;
        self.hit_distance.expect_dimensions(dims)
    }
}
