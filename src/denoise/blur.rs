//! Separable edge-aware blur.
//!
//! One pass filters along a single axis; a blur stage runs a horizontal pass
//! into a scratch image and a vertical pass back out. Neighbour weights are
//! a Gaussian in pixel distance times edge-stopping terms for depth, normal,
//! roughness and hit distance, so samples across geometric edges drop out.
//! The center pixel always has weight 1, so the result is never undefined.
//! Alpha (history length) is carried from the center pixel unfiltered.

use glam::Vec4;

use crate::config::DenoiseSettings;
use crate::util::ColorImage;

use super::gbuffer::GBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurAxis {
    Horizontal,
    Vertical,
}

/// Kernel half-width policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlurRadius {
    Fixed(u32),
    /// Base radius shrunk by `1 / sqrt(1 + history_length)`.
    HistoryScaled(u32),
}

impl BlurRadius {
    #[inline]
    fn at(self, center: Vec4) -> u32 {
        match self {
            BlurRadius::Fixed(r) => r,
            BlurRadius::HistoryScaled(r) => {
                let scaled = r as f32 / (1.0 + center.w.max(0.0)).sqrt();
                (scaled.round() as u32).max(u32::from(r > 0))
            }
        }
    }
}

/// Geometry similarity weights.
#[derive(Debug, Clone, Copy)]
pub struct EdgeStopping {
    pub depth_sigma: f32,
    pub normal_power: f32,
    pub roughness_sigma: f32,
    pub hit_distance_sigma: f32,
}

impl EdgeStopping {
    pub fn from_settings(s: &DenoiseSettings) -> Self {
        Self {
            depth_sigma: s.depth_sigma,
            normal_power: s.normal_power,
            roughness_sigma: s.roughness_sigma,
            hit_distance_sigma: s.hit_distance_sigma,
        }
    }

    /// Similarity of texel `j` to center texel `i`, in [0, 1].
    pub fn weight(&self, g: &GBuffer, i: usize, j: usize) -> f32 {
        let zc = g.depth.pixels()[i];
        let zs = g.depth.pixels()[j];
        // Background only blends with background.
        if (zc <= 0.0) != (zs <= 0.0) {
            return 0.0;
        }
        if zc <= 0.0 {
            return 1.0;
        }

        let w_depth = (-(zc - zs).abs() / (self.depth_sigma * zc).max(1e-6)).exp();
        let w_normal = g.normal.pixels()[i].dot(g.normal.pixels()[j]).max(0.0).powf(self.normal_power);
        let rc = g.roughness.pixels()[i];
        let rs = g.roughness.pixels()[j];
        let w_rough = (-(rc - rs).abs() / self.roughness_sigma.max(1e-6)).exp();
        let hc = g.hit_distance.pixels()[i];
        let hs = g.hit_distance.pixels()[j];
        let w_hit = (-(hc - hs).abs() / (self.hit_distance_sigma * hc.max(hs)).max(1e-6)).exp();

        (w_depth * w_normal * w_rough * w_hit).clamp(0.0, 1.0)
    }
}

/// One 1-D pass from `input` into `out`.
pub fn blur_pass(
    input: &ColorImage,
    gbuffer: &GBuffer,
    axis: BlurAxis,
    radius: BlurRadius,
    edges: &EdgeStopping,
    out: &mut ColorImage,
) {
    let (w, h) = input.dimensions();
    out.par_fill_with(|x, y| {
        let i = input.index(x, y);
        let center = input.pixels()[i];
        let r = radius.at(center) as i32;
        if r == 0 {
            return center;
        }
        let sigma = (r as f32 * 0.5).max(0.5);
        let inv_two_sigma2 = 1.0 / (2.0 * sigma * sigma);

        let mut sum = center.truncate();
        let mut total = 1.0f32;
        for k in (-r..=r).filter(|&k| k != 0) {
            let (sx, sy) = match axis {
                BlurAxis::Horizontal => (x as i32 + k, y as i32),
                BlurAxis::Vertical => (x as i32, y as i32 + k),
            };
            if sx < 0 || sy < 0 || sx >= w as i32 || sy >= h as i32 {
                continue;
            }
            let j = input.index(sx as u32, sy as u32);
            let wgt = (-(k * k) as f32 * inv_two_sigma2).exp() * edges.weight(gbuffer, i, j);
            if wgt > 0.0 {
                sum += input.pixels()[j].truncate() * wgt;
                total += wgt;
            }
        }
        (sum / total).extend(center.w)
    });
}
