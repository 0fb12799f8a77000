//! Reprojection-blend stages: temporal accumulation and stabilization.
//!
//! Every blend goes through [`history_weight`]: a reset frame gets weight
//! exactly 0 and the stage copies its input through untouched.

use glam::{Vec2, Vec4};

use crate::util::{luminance, ColorImage, Image};

/// Effective weight of the history term.
#[inline]
pub fn history_weight(reset_history: bool, weight: f32) -> f32 {
    if reset_history || weight.is_nan() {
        0.0
    } else {
        weight.clamp(0.0, 1.0)
    }
}

/// Previous-frame value for texel `(x, y)` following its motion vector.
#[inline]
pub fn reproject(history: &ColorImage, velocity: &Image<Vec2>, x: u32, y: u32) -> Option<Vec4> {
    let pos = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - velocity.get(x, y);
    history.sample_bilinear(pos)
}

/// Blend `current` toward `history` by `w`; returns `current` bit-exact at `w == 0`.
#[inline]
pub fn blend(current: Vec4, history: Vec4, w: f32) -> Vec4 {
    if w == 0.0 {
        current
    } else {
        current.lerp(history, w)
    }
}

/// Running average with per-pixel history length stored in alpha.
///
/// The history length grows by one per frame up to `max_history`; the
/// history weight is `L / (L + 1)`. Disoccluded pixels restart at zero.
pub fn temporal_accumulation(
    input: &ColorImage,
    history: &ColorImage,
    velocity: &Image<Vec2>,
    reset_history: bool,
    max_history: f32,
    out: &mut ColorImage,
) {
    out.par_fill_with(|x, y| {
        let current = input.get(x, y);
        if reset_history {
            return current;
        }
        let Some(prev) = reproject(history, velocity, x, y) else {
            return current;
        };
        let len = (prev.w + 1.0).min(max_history);
        let w = history_weight(false, len / (len + 1.0));
        blend(current, prev, w).truncate().extend(len)
    });
}

/// Fixed-weight blend with an anti-lag falloff on luminance change.
pub fn temporal_stabilization(
    input: &ColorImage,
    history: &ColorImage,
    velocity: &Image<Vec2>,
    reset_history: bool,
    weight: f32,
    out: &mut ColorImage,
) {
    out.par_fill_with(|x, y| {
        let current = input.get(x, y);
        if reset_history {
            return current;
        }
        let Some(prev) = reproject(history, velocity, x, y) else {
            return current;
        };
        let lc = luminance(current.truncate());
        let lp = luminance(prev.truncate());
        let change = (lc - lp).abs() / (lc + lp + 1e-4);
        let w = history_weight(false, weight * (1.0 - change));
        blend(current, prev, w).truncate().extend(current.w)
    });
}
