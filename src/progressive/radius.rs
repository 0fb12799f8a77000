//! Progressive photon-mapping gather radius.

use crate::config::PhotonSettings;

/// One step of the SPPM radius schedule.
///
/// `n` is the number of frames accumulated before this step. The result is
/// clamped to `min_radius`.
#[inline]
pub fn decay_radius(radius: f32, n: u32, alpha: f32, min_radius: f32) -> f32 {
    let n = n as f64;
    let scale = ((n + alpha as f64) / (n + 1.0)).sqrt();
    ((radius as f64 * scale) as f32).max(min_radius)
}

/// Gather radii for both photon classes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusState {
    pub global_radius: f32,
    pub caustic_radius: f32,
    pub alpha_global: f32,
    pub alpha_caustic: f32,
    pub start_global: f32,
    pub start_caustic: f32,
    pub min_radius: f32,
}

impl RadiusState {
    pub fn from_settings(s: &PhotonSettings) -> Self {
        Self {
            global_radius: s.start_global_radius.max(s.min_radius),
            caustic_radius: s.start_caustic_radius.max(s.min_radius),
            alpha_global: s.alpha_global,
            alpha_caustic: s.alpha_caustic,
            start_global: s.start_global_radius.max(s.min_radius),
            start_caustic: s.start_caustic_radius.max(s.min_radius),
            min_radius: s.min_radius,
        }
    }

    /// Radii restored to their start values.
    pub fn reset(&self) -> Self {
        Self {
            global_radius: self.start_global,
            caustic_radius: self.start_caustic,
            ..*self
        }
    }

    /// Radii after one decay step with `n` previously accumulated frames.
    pub fn decayed(&self, n: u32) -> Self {
        Self {
            global_radius: decay_radius(self.global_radius, n, self.alpha_global, self.min_radius),
            caustic_radius: decay_radius(self.caustic_radius, n, self.alpha_caustic, self.min_radius),
            ..*self
        }
    }
}
