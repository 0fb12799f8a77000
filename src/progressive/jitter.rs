//! Sub-pixel jitter sequence for temporal antialiasing.
//!
//! Offsets come from the Larcher-Pillichshammer (0,2)-sequence with a per-axis
//! scramble seed. The sequence repeats every [`JITTER_SEQUENCE_LENGTH`] frames.

use glam::{Mat4, Vec2, Vec4};

/// Number of distinct jitter positions before the sequence repeats.
pub const JITTER_SEQUENCE_LENGTH: u32 = 8;

/// Larcher-Pillichshammer radical inverse of `i`, XOR-scrambled with `seed`.
///
/// Returns a value in [0, 1).
#[inline]
pub fn larcher_pillichshammer(mut i: u32, seed: u32) -> f32 {
    let mut r = seed;
    let mut v = 1u32 << 31;
    while i != 0 {
        if i & 1 != 0 {
            r ^= v;
        }
        i >>= 1;
        v |= v >> 1;
    }
    (r as f64 / 4_294_967_296.0) as f32
}

/// Jitter offset in pixels for a sequence index, each axis in [-0.5, 0.5).
#[inline]
pub fn jitter_offset(jitter_index: u32) -> Vec2 {
    let i = jitter_index % JITTER_SEQUENCE_LENGTH + 1;
    Vec2::new(
        larcher_pillichshammer(i, 2) - 0.5,
        larcher_pillichshammer(i, 3) - 0.5,
    )
}

/// Shift a projection matrix by a sub-pixel offset.
pub fn apply_jitter(proj: Mat4, jitter: Vec2, width: u32, height: u32) -> Mat4 {
    // Pixel offset -> NDC offset (NDC spans 2 units per image axis).
    let offset_x = 2.0 * jitter.x / width as f32;
    let offset_y = 2.0 * jitter.y / height as f32;

    let jitter_matrix = Mat4::from_cols(
        Vec4::new(1.0, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 1.0, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(offset_x, offset_y, 0.0, 1.0),
    );

    jitter_matrix * proj
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lp_first_values() {
        let expect = [0.5, 0.75, 0.25, 0.875, 0.375, 0.125, 0.625, 0.9375];
        for (i, e) in expect.iter().enumerate() {
            assert!((larcher_pillichshammer(i as u32 + 1, 0) - e).abs() < 1e-6);
        }
    }

    #[test]
    fn test_offsets_in_range() {
        for i in 0..JITTER_SEQUENCE_LENGTH {
            let o = jitter_offset(i);
            assert!(o.x >= -0.5 && o.x < 0.5);
            assert!(o.y >= -0.5 && o.y < 0.5);
        }
    }

    #[test]
    fn test_apply_jitter_shifts_clip_xy() {
        let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 10.0);
        let jittered = apply_jitter(proj, Vec2::new(0.5, 0.0), 100, 100);
        let p = glam::Vec3::new(0.0, 0.0, -1.0);
        let a = proj.project_point3(p);
        let b = jittered.project_point3(p);
        assert!(((b.x - a.x) - 0.01).abs() < 1e-5);
        assert!((b.y - a.y).abs() < 1e-6);
    }
}
