//! Exposure and Reinhard tone mapping of the combined frame radiance.

use glam::Vec3;
use rayon::prelude::*;

use crate::util::{ColorImage, Image};

/// Map HDR radiance to display range. Output alpha is 0 (no history yet).
pub fn tonemap(raw: &Image<Vec3>, indirect: &Image<Vec3>, exposure: f32, out: &mut ColorImage) {
    out.pixels_mut()
        .par_iter_mut()
        .zip(raw.pixels().par_iter().zip(indirect.pixels().par_iter()))
        .for_each(|(dst, (r, i))| {
            let c = ((*r + *i) * exposure).max(Vec3::ZERO);
            let mapped = c / (Vec3::ONE + c);
            *dst = mapped.extend(0.0);
        });
}
