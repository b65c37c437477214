use log::trace;
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

use crate::error::GiError;
use crate::gi::axis::{Axis, OrthoFrustum};
use crate::gi::volume::{AxisCapture, VoxelGrid, Rgba8};
use crate::gi::voxelizer::{DrawEncoder, SceneObject, SceneParams, SliceRasterizer};
use crate::render_system::vertex::Vertex3D;
use crate::utils::unorm8;

/// Orthographic view volume mapped onto a `width x height` pixel grid.
#[derive(Clone, Debug, PartialEq)]
pub struct OrthoView {
    pub view: Matrix4<f32>,
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    // depths are positive distances in front of the eye
    pub near: f32,
    pub far: f32,
    pub width: u32,
    pub height: u32,
}

impl OrthoView {
    pub fn from_frustum(frustum: &OrthoFrustum) -> OrthoView {
        let [width, height] = frustum.extent();
        OrthoView {
            view: frustum.view(),
            left: frustum.left,
            right: frustum.right,
            bottom: frustum.bottom,
            top: frustum.top,
            near: frustum.near,
            far: frustum.far,
            width,
            height,
        }
    }

    /// A square view of half-width `half_extent` looking from `eye` at `target`.
    pub fn looking_at(
        eye: &Point3<f32>,
        target: &Point3<f32>,
        up: &Vector3<f32>,
        half_extent: f32,
        far: f32,
        size: u32,
    ) -> OrthoView {
        OrthoView {
            view: Matrix4::look_at_rh(eye, target, up),
            left: -half_extent,
            right: half_extent,
            bottom: -half_extent,
            top: half_extent,
            near: 0.0,
            far,
            width: size,
            height: size,
        }
    }

    /// World point to `(column, row, depth)` in continuous pixel units.
    pub fn project(&self, p: &Point3<f32>) -> Point3<f32> {
        let v = self.view.transform_point(p);
        Point3::new(
            (v.x - self.left) / (self.right - self.left) * self.width as f32,
            (self.top - v.y) / (self.top - self.bottom) * self.height as f32,
            -v.z,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fragment {
    pub col: u32,
    pub row: u32,
    pub depth: f32,
    pub barycentric: [f32; 3],
}

// evaluated from the same endpoint whichever way round the edge is walked,
// so triangles sharing an edge leave no gap along it
fn edge(a: &Point3<f32>, b: &Point3<f32>, px: f32, py: f32) -> f32 {
    if (a.x, a.y) > (b.x, b.y) {
        return -edge(b, a, px, py);
    }
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

/// Emits every pixel whose center lies inside the triangle (edges included)
/// and whose depth falls in `[near, far)`. Edge-on triangles produce nothing.
pub fn rasterize_triangle(view: &OrthoView, tri: [Point3<f32>; 3], mut emit: impl FnMut(Fragment)) {
    let [a, b, c] = tri.map(|p| view.project(&p));
    let area = edge(&a, &b, c.x, c.y);
    if area.abs() < 1e-6 {
        return;
    }

    let min_x = a.x.min(b.x).min(c.x);
    let max_x = a.x.max(b.x).max(c.x);
    let min_y = a.y.min(b.y).min(c.y);
    let max_y = a.y.max(b.y).max(c.y);
    let col_start = ((min_x - 0.5).ceil() as i64).max(0);
    let col_end = ((max_x - 0.5).floor() as i64).min(view.width as i64 - 1);
    let row_start = ((min_y - 0.5).ceil() as i64).max(0);
    let row_end = ((max_y - 0.5).floor() as i64).min(view.height as i64 - 1);

    for row in row_start..=row_end {
        for col in col_start..=col_end {
            let px = col as f32 + 0.5;
            let py = row as f32 + 0.5;
            let w0 = edge(&b, &c, px, py) / area;
            let w1 = edge(&c, &a, px, py) / area;
            let w2 = edge(&a, &b, px, py) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            // relative to `a` so a constant-depth triangle stays exactly constant
            let depth = a.z + w1 * (b.z - a.z) + w2 * (c.z - a.z);
            if depth < view.near || depth >= view.far {
                continue;
            }
            emit(Fragment {
                col: col as u32,
                row: row as u32,
                depth,
                barycentric: [w0, w1, w2],
            });
        }
    }
}

/// Collects the triangles an object issues for one pass.
#[derive(Default)]
pub struct TriangleCollector {
    pub vertices: Vec<Vertex3D>,
}

impl DrawEncoder for TriangleCollector {
    fn draw_triangles(&mut self, vertices: &[Vertex3D]) {
        self.vertices.extend_from_slice(vertices);
    }
}

/// A triangle in world space with world-space vertex normals.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldTriangle {
    pub positions: [Point3<f32>; 3],
    pub normals: [Vector3<f32>; 3],
}

impl WorldTriangle {
    pub fn normal_at(&self, [w0, w1, w2]: [f32; 3]) -> Vector3<f32> {
        let n = self.normals[0] * w0 + self.normals[1] * w1 + self.normals[2] * w2;
        n.try_normalize(1e-12).unwrap_or_else(|| self.face_normal())
    }

    pub fn face_normal(&self) -> Vector3<f32> {
        let [a, b, c] = self.positions;
        (b - a).cross(&(c - a)).try_normalize(1e-12).unwrap_or_else(Vector3::z)
    }
}

/// Runs the object's draw and moves the result into world space.
pub fn world_triangles(object: &dyn SceneObject) -> Vec<WorldTriangle> {
    let mut collector = TriangleCollector::default();
    object.issue_draw(&mut collector);
    let transform = object.transform();
    let normal_matrix: Matrix3<f32> = object.normal_matrix();
    collector
        .vertices
        .chunks_exact(3)
        .map(|tri| WorldTriangle {
            positions: [0, 1, 2].map(|i| transform.transform_point(&tri[i].position.into())),
            normals: [0, 1, 2].map(|i| normal_matrix * Vector3::from(tri[i].normal)),
        })
        .collect()
}

fn blend_additive(dst: &mut Rgba8, src: [f32; 4]) {
    for c in 0..4 {
        dst[c] = dst[c].saturating_add(unorm8(src[c]));
    }
}

/// Software slice backend: each slice is rasterized on the CPU straight into
/// the capture, with additive blending, a LESS depth test and no culling.
#[derive(Default)]
pub struct SoftwareVoxelizer {
    capture: Option<AxisCapture>,
    depth: Vec<f32>,
}

impl SoftwareVoxelizer {
    pub fn new() -> SoftwareVoxelizer {
        SoftwareVoxelizer::default()
    }
}

impl SliceRasterizer for SoftwareVoxelizer {
    fn begin_axis(&mut self, grid: &VoxelGrid, axis: Axis) -> Result<(), GiError> {
        let n = grid.resolution() as usize;
        self.capture = Some(AxisCapture::new(axis, grid.resolution()));
        self.depth = vec![f32::INFINITY; n * n];
        Ok(())
    }

    fn render_slice(
        &mut self,
        frustum: &OrthoFrustum,
        objects: &[&dyn SceneObject],
        params: &SceneParams,
    ) -> Result<(), GiError> {
        let incomplete = |reason: &str| GiError::RenderTargetIncomplete {
            axis: frustum.axis,
            slice: frustum.slice,
            reason: reason.to_string(),
        };
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| incomplete("no capture target bound"))?;
        if capture.resolution() != frustum.resolution || frustum.slice >= capture.resolution() {
            return Err(incomplete("slice does not fit the bound capture target"));
        }

        let view = OrthoView::from_frustum(frustum);
        let width = view.width as usize;
        self.depth.fill(f32::INFINITY);
        let layer = capture.slice_mut(frustum.slice);
        let mut fragments = 0usize;

        for object in objects {
            let material = object.material();
            for tri in world_triangles(*object) {
                rasterize_triangle(&view, tri.positions, |f| {
                    let idx = f.col as usize + f.row as usize * width;
                    if f.depth >= self.depth[idx] {
                        return;
                    }
                    self.depth[idx] = f.depth;
                    let lambert = params.lambert(&tri.normal_at(f.barycentric));
                    blend_additive(&mut layer[idx], material.voxel_radiance(lambert));
                    fragments += 1;
                });
            }
        }

        trace!(
            "slice {} of axis {:?}: {} fragments",
            frustum.slice,
            frustum.axis,
            fragments
        );
        Ok(())
    }

    fn finish_axis(&mut self) -> Result<AxisCapture, GiError> {
        self.capture.take().ok_or_else(|| GiError::InvalidParameter {
            name: "axis",
            reason: "finish_axis called before begin_axis".to_string(),
        })
    }
}
