//! Color helpers.

use glam::{Vec3, Vec4};

/// Rec. 709 luminance.
#[inline]
pub fn luminance(c: Vec3) -> f32 {
    c.dot(Vec3::new(0.2126, 0.7152, 0.0722))
}

/// Linear -> sRGB transfer function for a single channel in [0, 1].
#[inline]
pub fn srgb_encode(v: f32) -> f32 {
    let v = v.clamp(0.0, 1.0);
    if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

/// Quantize a display-referred linear color to sRGB RGBA8 (alpha forced opaque).
#[inline]
pub fn to_rgba8(c: Vec4) -> [u8; 4] {
    let q = |v: f32| (srgb_encode(v) * 255.0 + 0.5) as u8;
    [q(c.x), q(c.y), q(c.z), 255]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srgb_endpoints() {
        assert_eq!(to_rgba8(Vec4::ZERO), [0, 0, 0, 255]);
        assert_eq!(to_rgba8(Vec4::ONE), [255, 255, 255, 255]);
        assert_eq!(to_rgba8(Vec4::splat(7.0)), [255, 255, 255, 255]);
    }

    #[test]
    fn test_luminance_white() {
        assert!((luminance(Vec3::ONE) - 1.0).abs() < 1e-6);
    }
}
