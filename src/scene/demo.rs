//! Built-in analytic scene for headless runs and tests.
//!
//! An open-front box with colored side walls, a mirror sphere, a glass sphere
//! and a ceiling area light. Intersections are closed-form, no acceleration
//! structure needed.

use glam::Vec3;

use super::{CameraFrame, CameraSource, Light, Ray, SceneView, SurfaceHit, SurfaceMaterial};

const EPS: f32 = 1e-4;

#[derive(Debug, Clone)]
struct Wall {
    axis: usize,
    offset: f32,
    /// Front-facing normal (points into the box).
    normal: Vec3,
    material: SurfaceMaterial,
}

#[derive(Debug, Clone)]
struct Sphere {
    center: Vec3,
    radius: f32,
    material: SurfaceMaterial,
}

/// Open-front box scene spanning `[-1, 1]^3`.
#[derive(Debug, Clone)]
pub struct BoxScene {
    walls: Vec<Wall>,
    spheres: Vec<Sphere>,
    lights: Vec<Light>,
}

impl Default for BoxScene {
    fn default() -> Self {
        Self::new(Vec3::splat(40.0))
    }
}

impl BoxScene {
    /// Box with a ceiling quad light of the given power.
    pub fn new(light_power: Vec3) -> Self {
        let white = SurfaceMaterial::diffuse(Vec3::splat(0.75));
        let walls = vec![
            Wall { axis: 1, offset: -1.0, normal: Vec3::Y, material: white },
            Wall { axis: 1, offset: 1.0, normal: Vec3::NEG_Y, material: white },
            Wall { axis: 2, offset: -1.0, normal: Vec3::Z, material: white },
            Wall {
                axis: 0,
                offset: -1.0,
                normal: Vec3::X,
                material: SurfaceMaterial::diffuse(Vec3::new(0.63, 0.065, 0.05)),
            },
            Wall {
                axis: 0,
                offset: 1.0,
                normal: Vec3::NEG_X,
                material: SurfaceMaterial::diffuse(Vec3::new(0.14, 0.45, 0.091)),
            },
        ];
        let spheres = vec![
            Sphere {
                center: Vec3::new(-0.45, -0.6, -0.35),
                radius: 0.4,
                material: SurfaceMaterial::mirror(Vec3::splat(0.95)),
            },
            Sphere {
                center: Vec3::new(0.45, -0.6, 0.3),
                radius: 0.4,
                material: SurfaceMaterial::glass(1.5),
            },
        ];
        let lights = if light_power.max_element() > 0.0 {
            vec![Light::Quad {
                corner: Vec3::new(-0.25, 0.999, -0.25),
                edge_u: Vec3::new(0.5, 0.0, 0.0),
                edge_v: Vec3::new(0.0, 0.0, 0.5),
                power: light_power,
            }]
        } else {
            Vec::new()
        };
        Self { walls, spheres, lights }
    }

    /// Same geometry with no emitters.
    pub fn unlit() -> Self {
        Self::new(Vec3::ZERO)
    }

    fn hit_wall(wall: &Wall, ray: &Ray, t_max: f32) -> Option<SurfaceHit> {
        let d = ray.dir[wall.axis];
        if d.abs() < 1e-8 {
            return None;
        }
        let t = (wall.offset - ray.origin[wall.axis]) / d;
        if t <= EPS || t >= t_max {
            return None;
        }
        let p = ray.at(t);
        for axis in 0..3 {
            if axis != wall.axis && p[axis].abs() > 1.0 + EPS {
                return None;
            }
        }
        Some(SurfaceHit { t, position: p, normal: wall.normal, material: wall.material })
    }

    fn hit_sphere(s: &Sphere, ray: &Ray, t_max: f32) -> Option<SurfaceHit> {
        let oc = ray.origin - s.center;
        let b = oc.dot(ray.dir);
        let c = oc.length_squared() - s.radius * s.radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sq = disc.sqrt();
        let t = [-b - sq, -b + sq].into_iter().find(|&t| t > EPS && t < t_max)?;
        let p = ray.at(t);
        Some(SurfaceHit { t, position: p, normal: (p - s.center) / s.radius, material: s.material })
    }

    fn hit_light(light: &Light, ray: &Ray, t_max: f32) -> Option<SurfaceHit> {
        let Light::Quad { corner, edge_u, edge_v, .. } = *light else {
            return None;
        };
        let n = edge_u.cross(edge_v);
        let denom = n.dot(ray.dir);
        if denom.abs() < 1e-8 {
            return None;
        }
        let t = (corner - ray.origin).dot(n) / denom;
        if t <= EPS || t >= t_max {
            return None;
        }
        let p = ray.at(t) - corner;
        let u = p.dot(edge_u) / edge_u.length_squared();
        let v = p.dot(edge_v) / edge_v.length_squared();
        if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
            return None;
        }
        let mut material = SurfaceMaterial::diffuse(Vec3::ZERO);
        if denom < 0.0 {
            material.emission = light.radiance();
        }
        Some(SurfaceHit { t, position: ray.at(t), normal: n.normalize(), material })
    }
}

impl SceneView for BoxScene {
    fn lights(&self) -> &[Light] {
        &self.lights
    }

    fn intersect(&self, ray: &Ray, t_max: f32) -> Option<SurfaceHit> {
        let mut best: Option<SurfaceHit> = None;
        let mut closest = t_max;
        for w in &self.walls {
            if let Some(hit) = Self::hit_wall(w, ray, closest) {
                closest = hit.t;
                best = Some(hit);
            }
        }
        for s in &self.spheres {
            if let Some(hit) = Self::hit_sphere(s, ray, closest) {
                closest = hit.t;
                best = Some(hit);
            }
        }
        for l in &self.lights {
            if let Some(hit) = Self::hit_light(l, ray, closest) {
                closest = hit.t;
                best = Some(hit);
            }
        }
        best
    }
}

/// One fixed camera placement starting at `start` seconds.
#[derive(Debug, Clone, Copy)]
pub struct Shot {
    pub start: f32,
    pub eye: Vec3,
    pub target: Vec3,
}

/// Camera that holds a pose per shot and cuts between shots.
#[derive(Debug, Clone)]
pub struct ShotCamera {
    pub shots: Vec<Shot>,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl ShotCamera {
    /// Single shot looking into the box.
    pub fn front(aspect: f32) -> Self {
        Self {
            shots: vec![Shot { start: 0.0, eye: Vec3::new(0.0, 0.0, 3.4), target: Vec3::ZERO }],
            fov_y: 40f32.to_radians(),
            aspect,
            near: 0.05,
            far: 50.0,
        }
    }

    /// Add a cut to a new pose at `start` seconds.
    pub fn with_cut(mut self, start: f32, eye: Vec3, target: Vec3) -> Self {
        self.shots.push(Shot { start, eye, target });
        self.shots.sort_by(|a, b| a.start.total_cmp(&b.start));
        self
    }
}

impl CameraSource for ShotCamera {
    fn camera(&self, _frame_index: u64, time: f32) -> CameraFrame {
        let shot = self
            .shots
            .iter()
            .rev()
            .find(|s| s.start <= time)
            .or(self.shots.first())
            .copied()
            .unwrap_or(Shot { start: 0.0, eye: Vec3::new(0.0, 0.0, 3.4), target: Vec3::ZERO });
        CameraFrame::look_at(shot.eye, shot.target, self.fov_y, self.aspect, self.near, self.far)
    }
}
