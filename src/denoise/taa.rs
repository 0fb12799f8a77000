//! Temporal antialiasing resolve with neighbourhood clamping.

use glam::{Vec2, Vec4};

use crate::util::{ColorImage, Image};

use super::temporal::{blend, history_weight, reproject};

/// Min and max of the 3x3 neighbourhood around `(x, y)`, edge-clamped.
pub fn neighborhood_bounds(image: &ColorImage, x: u32, y: u32) -> (Vec4, Vec4) {
    let mut lo = Vec4::splat(f32::INFINITY);
    let mut hi = Vec4::splat(f32::NEG_INFINITY);
    for dy in -1..=1 {
        for dx in -1..=1 {
            let c = image.get_clamped(x as i32 + dx, y as i32 + dy);
            lo = lo.min(c);
            hi = hi.max(c);
        }
    }
    (lo, hi)
}

/// Blend the jittered current frame with clamped, reprojected history.
pub fn taa_resolve(
    input: &ColorImage,
    history: &ColorImage,
    velocity: &Image<Vec2>,
    reset_history: bool,
    weight: f32,
    out: &mut ColorImage,
) {
    let w = history_weight(reset_history, weight);
    out.par_fill_with(|x, y| {
        let current = input.get(x, y);
        if w == 0.0 {
            return current;
        }
        let Some(prev) = reproject(history, velocity, x, y) else {
            return current;
        };
        let (lo, hi) = neighborhood_bounds(input, x, y);
        let clamped = prev.clamp(lo, hi);
        blend(current, clamped, w).truncate().extend(current.w)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_outlier_clamped() {
        let input = ColorImage::filled(3, 3, Vec4::new(0.2, 0.2, 0.2, 0.0));
        let history = ColorImage::filled(3, 3, Vec4::new(1.0, 1.0, 1.0, 0.0));
        let mut out = ColorImage::new(3, 3);
        taa_resolve(&input, &history, &Image::new(3, 3), false, 0.9, &mut out);
        // History is clamped into the flat neighbourhood, so no ghost remains.
        assert!((out.get(1, 1).x - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_history_inside_range_blends() {
        let mut input = ColorImage::new(3, 1);
        input.par_fill_with(|x, _| Vec4::splat(x as f32 * 0.5));
        let history = ColorImage::filled(3, 1, Vec4::splat(0.25));
        let mut out = ColorImage::new(3, 1);
        taa_resolve(&input, &history, &Image::new(3, 1), false, 0.5, &mut out);
        // Pixel 1 is 0.5, neighbourhood [0, 1]; history 0.25 survives clamping.
        assert!((out.get(1, 0).x - 0.375).abs() < 1e-6);
    }

    #[test]
    fn test_reset_is_pass_through() {
        let mut input = ColorImage::new(4, 2);
        input.par_fill_with(|x, y| Vec4::new(x as f32, y as f32, 0.5, 3.0));
        let history = ColorImage::filled(4, 2, Vec4::ONE);
        let mut out = ColorImage::new(4, 2);
        taa_resolve(&input, &history, &Image::new(4, 2), true, 0.9, &mut out);
        assert_eq!(out, input);
    }
}
