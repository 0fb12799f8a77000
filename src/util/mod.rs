//! Utility types shared by every stage.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`Image`] - CPU image planes used as stage resources
//! - Color helpers (luminance, sRGB encoding)

mod color;
mod error;
mod image;

pub use color::*;
pub use error::*;
pub use image::*;
