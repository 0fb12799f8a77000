//! CPU image planes.
//!
//! Every stage resource (radiance, G-buffer planes, history slots) is an
//! [`Image`]: a row-major buffer of `width * height` texels.

use glam::{Vec2, Vec4};
use rayon::prelude::*;

use super::error::{Error, Result};

/// Row-major 2D image of `T` texels.
#[derive(Debug, Clone, PartialEq)]
pub struct Image<T> {
    width: u32,
    height: u32,
    data: Vec<T>,
}

/// RGBA float color plane. Alpha carries per-stage auxiliary data.
pub type ColorImage = Image<Vec4>;

impl<T: Copy + Default + Send + Sync> Image<T> {
    /// Create an image filled with `T::default()`.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, T::default())
    }

    /// Create an image filled with `value`.
    pub fn filled(width: u32, height: u32, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Wrap existing texels. Fails if the length does not match.
    pub fn from_vec(width: u32, height: u32, data: Vec<T>) -> Result<Self> {
        if data.len() != width as usize * height as usize {
            return Err(Error::other(format!(
                "image data has {} texels, expected {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self { width, height, data })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn pixels(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> T {
        self.data[self.index(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: T) {
        let i = self.index(x, y);
        self.data[i] = value;
    }

    /// Fetch with coordinates clamped to the image edge.
    #[inline]
    pub fn get_clamped(&self, x: i32, y: i32) -> T {
        let x = x.clamp(0, self.width as i32 - 1) as u32;
        let y = y.clamp(0, self.height as i32 - 1) as u32;
        self.get(x, y)
    }

    /// Reset every texel to `value`.
    pub fn fill(&mut self, value: T) {
        self.data.par_iter_mut().for_each(|t| *t = value);
    }

    /// Check that this image matches the expected dimensions.
    pub fn expect_dimensions(&self, expected: (u32, u32)) -> Result<()> {
        if self.dimensions() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: self.dimensions(),
            });
        }
        Ok(())
    }

    /// Run `f(x, y)` for every texel in parallel (one rayon task per row)
    /// and store the result.
    pub fn par_fill_with<F>(&mut self, f: F)
    where
        F: Fn(u32, u32) -> T + Sync,
    {
        let width = self.width as usize;
        if width == 0 {
            return;
        }
        self.data
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, texel) in row.iter_mut().enumerate() {
                    *texel = f(x as u32, y as u32);
                }
            });
    }
}

impl ColorImage {
    /// Bilinear fetch at a continuous pixel position (texel centers at +0.5).
    ///
    /// Returns `None` when the position falls outside the image, which the
    /// reprojection stages treat as a disocclusion.
    pub fn sample_bilinear(&self, pos: Vec2) -> Option<Vec4> {
        let (w, h) = (self.width as f32, self.height as f32);
        if !(pos.x >= 0.0 && pos.y >= 0.0 && pos.x < w && pos.y < h) {
            return None;
        }
        let p = pos - Vec2::splat(0.5);
        let x0 = p.x.floor();
        let y0 = p.y.floor();
        let fx = p.x - x0;
        let fy = p.y - y0;
        let (x0, y0) = (x0 as i32, y0 as i32);

        let a = self.get_clamped(x0, y0);
        let b = self.get_clamped(x0 + 1, y0);
        let c = self.get_clamped(x0, y0 + 1);
        let d = self.get_clamped(x0 + 1, y0 + 1);
        Some(a.lerp(b, fx).lerp(c.lerp(d, fx), fy))
    }
}
