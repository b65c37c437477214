use nalgebra::{Isometry3, Matrix4, Point3, Vector3};

use crate::gi::axis::non_degenerate_up;
use crate::gi::material::MaterialSample;
use crate::gi::voxelizer::{DrawEncoder, SceneObject};
use crate::render_system::aabb::Aabb;
use crate::render_system::vertex::Vertex3D as Vertex;

/// A triangle list with a placement and a material.
#[derive(Clone, Debug)]
pub struct MeshObject {
    pub vertices: Vec<Vertex>,
    pub transform: Matrix4<f32>,
    pub material: MaterialSample,
}

impl MeshObject {
    pub fn new(vertices: Vec<Vertex>, transform: Matrix4<f32>, material: MaterialSample) -> MeshObject {
        MeshObject {
            vertices,
            transform,
            material,
        }
    }

    /// World-space bounds of the placed mesh.
    pub fn aabb(&self) -> Aabb {
        let points: Vec<Point3<f32>> = self
            .vertices
            .iter()
            .map(|v| self.transform.transform_point(&v.position.into()))
            .collect();
        Aabb::from_points(&points)
    }
}

impl SceneObject for MeshObject {
    fn transform(&self) -> Matrix4<f32> {
        self.transform
    }

    fn material(&self) -> &MaterialSample {
        &self.material
    }

    fn issue_draw(&self, encoder: &mut dyn DrawEncoder) {
        encoder.draw_triangles(&self.vertices);
    }
}

// two triangles spanning center +- u +- v, facing along u x v
fn face(center: Point3<f32>, u: Vector3<f32>, v: Vector3<f32>) -> [Vertex; 6] {
    let n: [f32; 3] = u.cross(&v).normalize().into();
    let corner = |su: f32, sv: f32, uv: [f32; 2]| {
        Vertex::new((center + u * su + v * sv).into(), n, uv)
    };
    let a = corner(-1.0, -1.0, [0.0, 1.0]);
    let b = corner(1.0, -1.0, [1.0, 1.0]);
    let c = corner(1.0, 1.0, [1.0, 0.0]);
    let d = corner(-1.0, 1.0, [0.0, 0.0]);
    [a, b, c, a, c, d]
}

/// Square in the XY plane centered at the origin, facing +Z.
pub fn quad(half_size: f32) -> Vec<Vertex> {
    face(
        Point3::origin(),
        Vector3::new(half_size, 0.0, 0.0),
        Vector3::new(0.0, half_size, 0.0),
    )
    .to_vec()
}

/// Box with outward-facing normals.
pub fn cuboid(loc: Point3<f32>, dims: Vector3<f32>) -> Vec<Vertex> {
    let h = dims * 0.5;
    let x = Vector3::new(h.x, 0.0, 0.0);
    let y = Vector3::new(0.0, h.y, 0.0);
    let z = Vector3::new(0.0, 0.0, h.z);
    [
        face(loc + y, z, x),  // upper
        face(loc - y, x, z),  // lower
        face(loc + z, x, y),  // front
        face(loc - z, y, x),  // back
        face(loc - x, z, y),  // left
        face(loc + x, y, z),  // right
    ]
    .concat()
}

pub fn unitcube() -> Vec<Vertex> {
    cuboid(Point3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0))
}

/// Placement that moves the +Z facing `quad` to `center`, facing `normal`.
pub fn facing(center: Point3<f32>, normal: Vector3<f32>) -> Matrix4<f32> {
    let up = non_degenerate_up(&normal);
    Isometry3::face_towards(&center, &(center + normal), &up).to_homogeneous()
}

/// Closed room filling most of the cube `[-scale, scale]^3`: white floor,
/// ceiling and back wall, a red and a green side wall, an emissive ceiling
/// panel and two boxes.
pub fn demo_room(scale: f32) -> Vec<MeshObject> {
    let r = scale * 0.8;
    let white = MaterialSample {
        specular: Vector3::new(0.2, 0.2, 0.2),
        ..MaterialSample::diffuse([0.75, 0.75, 0.75])
    };
    let wall = |center: [f32; 3], normal: [f32; 3], material: MaterialSample| {
        MeshObject::new(
            quad(r),
            facing(center.into(), normal.into()),
            material,
        )
    };
    vec![
        wall([0.0, -r, 0.0], [0.0, 1.0, 0.0], white),
        wall([0.0, r, 0.0], [0.0, -1.0, 0.0], white),
        wall([0.0, 0.0, -r], [0.0, 0.0, 1.0], white),
        wall([-r, 0.0, 0.0], [1.0, 0.0, 0.0], MaterialSample::diffuse([0.75, 0.1, 0.1])),
        wall([r, 0.0, 0.0], [-1.0, 0.0, 0.0], MaterialSample::diffuse([0.1, 0.75, 0.1])),
        MeshObject::new(
            quad(r * 0.25),
            facing(Point3::new(0.0, r * 0.98, 0.0), -Vector3::y()),
            MaterialSample::emissive([1.0, 0.95, 0.8]),
        ),
        MeshObject::new(
            cuboid(
                Point3::new(-r * 0.4, -r * 0.6, -r * 0.3),
                Vector3::new(r * 0.5, r * 0.8, r * 0.5),
            ),
            Matrix4::identity(),
            white,
        ),
        MeshObject::new(
            cuboid(
                Point3::new(r * 0.4, -r * 0.8, r * 0.2),
                Vector3::new(r * 0.5, r * 0.4, r * 0.5),
            ),
            Matrix4::identity(),
            MaterialSample {
                specular: Vector3::new(0.6, 0.6, 0.6),
                specular_exponent: 64.0,
                ..MaterialSample::diffuse([0.3, 0.3, 0.8])
            },
        ),
    ]
}
