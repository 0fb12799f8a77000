//! Render configuration and tunable stage settings.
//!
//! [`RenderConfig`] is the record the caller supplies for a batch run.
//! [`RendererSettings`] groups the per-component knobs and can be loaded
//! from a JSON file; missing fields fall back to defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::util::{Error, Result};

/// Caller-supplied batch parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub target_fps: f32,
    pub total_render_seconds: f32,
    /// Length of the camera animation loop in seconds.
    pub animation_seconds: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            target_fps: 24.0,
            total_render_seconds: 2.0,
            animation_seconds: 2.0,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::config(format!(
                "resolution must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.target_fps.is_normal() && self.target_fps > 0.0) {
            return Err(Error::config(format!("target_fps must be > 0, got {}", self.target_fps)));
        }
        if !(self.total_render_seconds >= 0.0) {
            return Err(Error::config("total_render_seconds must be >= 0"));
        }
        if !(self.animation_seconds > 0.0) {
            return Err(Error::config("animation_seconds must be > 0"));
        }
        Ok(())
    }

    /// Number of frames in the batch.
    pub fn total_frames(&self) -> u64 {
        (self.target_fps * self.total_render_seconds).ceil().max(0.0) as u64
    }

    /// Animation time for a frame, wrapped to the animation loop.
    pub fn frame_time(&self, frame_index: u64) -> f32 {
        (frame_index as f32 / self.target_fps) % self.animation_seconds
    }
}

/// Photon estimator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotonSettings {
    pub enabled: bool,
    /// Photons emitted per frame for the global class.
    pub global_photons: u32,
    /// Photons emitted per frame for the caustic class.
    pub caustic_photons: u32,
    pub max_depth: u32,
    pub alpha_global: f32,
    pub alpha_caustic: f32,
    pub start_global_radius: f32,
    pub start_caustic_radius: f32,
    pub min_radius: f32,
    /// Cull tile edge in pixels.
    pub tile_size: u32,
    /// Seed mixed into every photon stream.
    pub seed: u64,
}

impl Default for PhotonSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            global_photons: 20_000,
            caustic_photons: 20_000,
            max_depth: 8,
            alpha_global: 0.7,
            alpha_caustic: 0.7,
            start_global_radius: 0.05,
            start_caustic_radius: 0.02,
            min_radius: 1e-4,
            tile_size: 8,
            seed: 0x5eed,
        }
    }
}

/// Denoise chain settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseSettings {
    pub exposure: f32,
    pub pre_blur_radius: u32,
    pub spatial_blur_radius: u32,
    pub post_blur_radius: u32,
    /// Cap on the per-pixel history length in temporal accumulation.
    pub max_history: f32,
    pub stabilization_weight: f32,
    pub taa_history_weight: f32,
    pub depth_sigma: f32,
    pub normal_power: f32,
    pub roughness_sigma: f32,
    pub hit_distance_sigma: f32,
}

impl Default for DenoiseSettings {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            pre_blur_radius: 2,
            spatial_blur_radius: 4,
            post_blur_radius: 1,
            max_history: 32.0,
            stabilization_weight: 0.85,
            taa_history_weight: 0.9,
            depth_sigma: 0.05,
            normal_power: 32.0,
            roughness_sigma: 0.25,
            hit_distance_sigma: 0.5,
        }
    }
}

/// Capture/export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub enabled: bool,
    pub output_dir: PathBuf,
    pub file_prefix: String,
    /// Zero-padding width of the frame number in file names.
    pub index_digits: usize,
    /// Readback ring length.
    pub ring_size: usize,
    pub workers: usize,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: PathBuf::from("frames"),
            file_prefix: "output".to_string(),
            index_digits: 3,
            ring_size: 3,
            workers: 2,
        }
    }
}

/// All tunables for one renderer instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub render: RenderConfig,
    pub photon: PhotonSettings,
    pub denoise: DenoiseSettings,
    pub capture: CaptureSettings,
}

impl RendererSettings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.render.validate()?;

        let p = &self.photon;
        for (name, alpha) in [("alpha_global", p.alpha_global), ("alpha_caustic", p.alpha_caustic)] {
            if !(alpha > 0.0 && alpha < 1.0) {
                return Err(Error::config(format!("{name} must be in (0, 1), got {alpha}")));
            }
        }
        if !(p.min_radius > 0.0) {
            return Err(Error::config("min_radius must be > 0"));
        }
        if p.start_global_radius < p.min_radius || p.start_caustic_radius < p.min_radius {
            return Err(Error::config("start radii must be >= min_radius"));
        }
        if p.tile_size == 0 {
            return Err(Error::config("tile_size must be > 0"));
        }

        let d = &self.denoise;
        for (name, w) in [
            ("stabilization_weight", d.stabilization_weight),
            ("taa_history_weight", d.taa_history_weight),
        ] {
            if !(0.0..=1.0).contains(&w) {
                return Err(Error::config(format!("{name} must be in [0, 1], got {w}")));
            }
        }
        if !(d.max_history >= 1.0) {
            return Err(Error::config("max_history must be >= 1"));
        }

        let c = &self.capture;
        if c.ring_size == 0 || c.workers == 0 {
            return Err(Error::config("capture ring_size and workers must be > 0"));
        }
        Ok(())
    }
}
