use std::sync::{mpsc, Arc};

use image::{Rgba, RgbaImage};
use log::debug;
use nalgebra::{Point2, Point3, Vector3};
use threadpool::ThreadPool;

use super::aabb::Aabb;
use super::shadow_map::ShadowMap;
use super::soft_raster::{world_triangles, WorldTriangle};
use crate::camera::Camera;
use crate::config::LightingParams;
use crate::error::GiError;
use crate::gi::cone_trace::{shade_surface, LightInputs, SurfacePoint};
use crate::gi::material::MaterialSample;
use crate::gi::volume::Volume;
use crate::gi::voxelizer::SceneObject;
use crate::utils;

const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Flattened world-space copy of the scene, safe to share between workers.
pub struct PreviewScene {
    triangles: Vec<(WorldTriangle, MaterialSample)>,
    bounds: Aabb,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub t: f32,
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
    pub tangent: Vector3<f32>,
    pub material: MaterialSample,
}

impl PreviewScene {
    pub fn gather(objects: &[&dyn SceneObject]) -> PreviewScene {
        let mut triangles = vec![];
        let mut bounds = Aabb::Empty;
        for object in objects {
            let material = *object.material();
            for tri in world_triangles(*object) {
                bounds = Aabb::union(&bounds, &Aabb::from_points(&tri.positions));
                triangles.push((tri, material));
            }
        }
        PreviewScene { triangles, bounds }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Nearest hit along the ray. The returned normal faces the ray origin.
    pub fn intersect(&self, origin: &Point3<f32>, dir: &Vector3<f32>) -> Option<RayHit> {
        self.bounds.ray_intersection(origin, dir)?;
        let mut best: Option<(f32, [f32; 3], usize)> = None;
        for (i, (tri, _)) in self.triangles.iter().enumerate() {
            if let Some((t, bary)) = intersect_triangle(origin, dir, &tri.positions) {
                if best.map_or(true, |(bt, _, _)| t < bt) {
                    best = Some((t, bary, i));
                }
            }
        }
        let (t, bary, i) = best?;
        let (tri, material) = &self.triangles[i];
        let mut normal = tri.normal_at(bary);
        if normal.dot(dir) > 0.0 {
            normal = -normal;
        }
        let [a, b, _] = tri.positions;
        Some(RayHit {
            t,
            position: origin + dir * t,
            normal,
            tangent: (b - a).normalize(),
            material: *material,
        })
    }
}

// Moller-Trumbore, returns the distance and barycentric weights of the hit
fn intersect_triangle(
    origin: &Point3<f32>,
    dir: &Vector3<f32>,
    [a, b, c]: &[Point3<f32>; 3],
) -> Option<(f32, [f32; 3])> {
    let e1 = b - a;
    let e2 = c - a;
    let p = dir.cross(&e2);
    let det = e1.dot(&p);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv = 1.0 / det;
    let s = origin - a;
    let u = s.dot(&p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(&e1);
    let v = dir.dot(&q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(&q) * inv;
    if t <= 1e-4 {
        return None;
    }
    Some((t, [1.0 - u - v, u, v]))
}

/// Everything a preview worker reads. Built once per frame and shared.
pub struct PreviewInputs {
    pub scene: PreviewScene,
    pub volume: Volume,
    pub lighting: LightingParams,
    // unit vector toward the light
    pub light_direction: Option<Vector3<f32>>,
    pub shadow_map: Option<ShadowMap>,
}

impl PreviewInputs {
    pub fn shade_ray(&self, origin: &Point3<f32>, dir: &Vector3<f32>) -> Rgba<u8> {
        let Some(hit) = self.scene.intersect(origin, dir) else {
            return BACKGROUND;
        };
        let surface = SurfacePoint {
            position: hit.position,
            normal: hit.normal,
            tangent: Some(hit.tangent),
            view_dir: -dir,
            bump_slope: None,
            material: hit.material,
        };
        let light = LightInputs {
            direction: self.light_direction,
            visibility: self.shadow_map.as_ref().map(|m| m.visibility(&hit.position)),
        };
        let shaded = shade_surface(&self.volume, &self.lighting, &surface, &light);
        utils::to_rgba8(&shaded.radiance, 1.0)
    }
}

/// Renders a `width x height` view through `camera` on `pool`.
pub fn render_preview(
    pool: &ThreadPool,
    inputs: Arc<PreviewInputs>,
    camera: &dyn Camera,
    width: u32,
    height: u32,
) -> Result<RgbaImage, GiError> {
    let eye = camera.eye();
    let aspect = width as f32 / height as f32;
    // the camera stays on this thread, workers only get the rays
    let rays: Arc<Vec<Vector3<f32>>> = Arc::new(
        (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| {
                let uv = utils::screen_to_uv(
                    Point2::new(x as f32 + 0.5, y as f32 + 0.5),
                    [width, height],
                );
                camera.ray_direction(uv, aspect)
            })
            .collect(),
    );

    let (tx, rx) = mpsc::channel();
    for row in 0..height {
        let tx = tx.clone();
        let inputs = inputs.clone();
        let rays = rays.clone();
        pool.execute(move || {
            let start = (row * width) as usize;
            let pixels: Vec<Rgba<u8>> = rays[start..start + width as usize]
                .iter()
                .map(|dir| inputs.shade_ray(&eye, dir))
                .collect();
            let _ = tx.send((row, pixels));
        });
    }
    drop(tx);

    let mut image = RgbaImage::from_pixel(width, height, BACKGROUND);
    let mut rows = 0;
    for (row, pixels) in rx.iter() {
        for (x, pixel) in pixels.into_iter().enumerate() {
            image.put_pixel(x as u32, row, pixel);
        }
        rows += 1;
    }
    if rows != height {
        return Err(GiError::Worker(format!(
            "{} of {} preview rows missing",
            height - rows,
            height
        )));
    }
    debug!(
        "preview {}x{}: {} triangles",
        width,
        height,
        inputs.scene.triangle_count()
    );
    Ok(image)
}
