//! Read-only collaborator interfaces.
//!
//! The core never owns scene data. Per frame it reads lights and issues ray
//! queries through [`SceneView`], and reads camera matrices through
//! [`CameraSource`]. Asset loading and acceleration-structure upkeep live
//! behind these traits.

pub mod demo;

use glam::{Mat4, Vec3};

/// Ray with normalized direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    #[inline]
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir: dir.normalize() }
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }
}

/// Scattering behaviour of a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialKind {
    Diffuse,
    Mirror,
    Glass { ior: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMaterial {
    pub kind: MaterialKind,
    pub albedo: Vec3,
    pub roughness: f32,
    /// Emitted radiance (area lights seen directly).
    pub emission: Vec3,
}

impl SurfaceMaterial {
    pub const fn diffuse(albedo: Vec3) -> Self {
        Self { kind: MaterialKind::Diffuse, albedo, roughness: 1.0, emission: Vec3::ZERO }
    }

    pub const fn mirror(tint: Vec3) -> Self {
        Self { kind: MaterialKind::Mirror, albedo: tint, roughness: 0.0, emission: Vec3::ZERO }
    }

    pub const fn glass(ior: f32) -> Self {
        Self { kind: MaterialKind::Glass { ior }, albedo: Vec3::ONE, roughness: 0.0, emission: Vec3::ZERO }
    }

    #[inline]
    pub fn is_specular(&self) -> bool {
        !matches!(self.kind, MaterialKind::Diffuse)
    }
}

/// Closest-hit record.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceHit {
    pub t: f32,
    pub position: Vec3,
    /// Geometric normal on the surface's front side.
    pub normal: Vec3,
    pub material: SurfaceMaterial,
}

/// Light emitters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    /// Isotropic point light emitting `power` watts.
    Point { position: Vec3, power: Vec3 },
    /// One-sided parallelogram emitting along `edge_u x edge_v`.
    Quad { corner: Vec3, edge_u: Vec3, edge_v: Vec3, power: Vec3 },
}

impl Light {
    pub fn power(&self) -> Vec3 {
        match *self {
            Light::Point { power, .. } | Light::Quad { power, .. } => power,
        }
    }

    /// Emitted radiance of a quad light (zero for point lights).
    pub fn radiance(&self) -> Vec3 {
        match *self {
            Light::Point { .. } => Vec3::ZERO,
            Light::Quad { edge_u, edge_v, power, .. } => {
                let area = edge_u.cross(edge_v).length();
                if area > 0.0 {
                    power / (area * std::f32::consts::PI)
                } else {
                    Vec3::ZERO
                }
            }
        }
    }
}

/// Scene as seen by the core: lights and a closest-hit query.
pub trait SceneView: Sync {
    fn lights(&self) -> &[Light];

    /// Closest hit with `t` in `(epsilon, t_max)`.
    fn intersect(&self, ray: &Ray, t_max: f32) -> Option<SurfaceHit>;

    /// Any hit before `t_max`.
    fn occluded(&self, ray: &Ray, t_max: f32) -> bool {
        self.intersect(ray, t_max).is_some()
    }
}

/// Camera values for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    pub view: Mat4,
    pub proj: Mat4,
    pub position: Vec3,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraFrame {
    pub fn look_at(eye: Vec3, target: Vec3, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, Vec3::Y),
            proj: Mat4::perspective_rh(fov_y, aspect, near, far),
            position: eye,
            fov_y,
            near,
            far,
        }
    }

    #[inline]
    pub fn view_proj(&self) -> Mat4 {
        self.proj * self.view
    }
}

/// Supplies the camera for each frame of a run.
pub trait CameraSource {
    fn camera(&self, frame_index: u64, time: f32) -> CameraFrame;
}
