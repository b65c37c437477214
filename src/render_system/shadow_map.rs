use log::debug;
use nalgebra::{Point3, Vector3};

use super::soft_raster::{rasterize_triangle, world_triangles, OrthoView};
use crate::error::GiError;
use crate::gi::axis::non_degenerate_up;
use crate::gi::voxelizer::SceneObject;

/// Depth of the nearest surface seen from a directional light, covering the
/// whole scene cube.
pub struct ShadowMap {
    view: OrthoView,
    light_direction: Vector3<f32>,
    depth: Vec<f32>,
    bias: f32,
}

impl ShadowMap {
    /// `light_direction` points toward the light.
    pub fn render(
        objects: &[&dyn SceneObject],
        light_direction: &Vector3<f32>,
        scene_scale: f32,
        size: u32,
    ) -> Result<ShadowMap, GiError> {
        if size == 0 {
            return Err(GiError::InvalidParameter {
                name: "shadow map size",
                reason: "must be at least one texel".to_string(),
            });
        }
        let light_direction = light_direction
            .try_normalize(1e-12)
            .ok_or_else(|| GiError::InvalidParameter {
                name: "light direction",
                reason: "zero vector".to_string(),
            })?;

        // bounding sphere of the scene cube
        let radius = scene_scale * 3f32.sqrt();
        let eye = Point3::from(light_direction * radius);
        let view = OrthoView::looking_at(
            &eye,
            &Point3::origin(),
            &non_degenerate_up(&-light_direction),
            radius,
            2.0 * radius,
            size,
        );
        let width = size as usize;
        let mut depth = vec![f32::INFINITY; width * width];
        let mut triangles = 0;
        for object in objects {
            for tri in world_triangles(*object) {
                rasterize_triangle(&view, tri.positions, |f| {
                    let idx = f.col as usize + f.row as usize * width;
                    depth[idx] = depth[idx].min(f.depth);
                });
                triangles += 1;
            }
        }
        debug!("shadow map {size}x{size}: {triangles} triangles");

        Ok(ShadowMap {
            view,
            light_direction,
            depth,
            // two texels keeps lit surfaces from shadowing themselves
            bias: 4.0 * radius / size as f32,
        })
    }

    pub fn light_direction(&self) -> Vector3<f32> {
        self.light_direction
    }

    fn lit(&self, col: i64, row: i64, depth: f32) -> f32 {
        let size = self.view.width as i64;
        if col < 0 || row < 0 || col >= size || row >= size {
            return 1.0;
        }
        if depth - self.bias <= self.depth[(col + row * size) as usize] {
            1.0
        } else {
            0.0
        }
    }

    /// Fraction of a 3x3 texel neighbourhood that sees the light at `p`.
    /// Points the map does not cover count as lit.
    pub fn visibility(&self, p: &Point3<f32>) -> f32 {
        let s = self.view.project(p);
        let col = s.x.floor() as i64;
        let row = s.y.floor() as i64;
        let mut sum = 0.0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                sum += self.lit(col + dx, row + dy, s.z);
            }
        }
        sum / 9.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gi::material::MaterialSample;
    use crate::object::{cuboid, facing, quad, MeshObject};
    use nalgebra::Matrix4;
    use pretty_assertions::assert_eq;

    fn scene() -> (MeshObject, MeshObject) {
        let floor = MeshObject::new(
            quad(10.0),
            facing(Point3::new(0.0, -5.0, 0.0), Vector3::y()),
            MaterialSample::default(),
        );
        let blocker = MeshObject::new(
            cuboid(Point3::new(0.0, 0.0, 0.0), Vector3::new(4.0, 1.0, 4.0)),
            Matrix4::identity(),
            MaterialSample::default(),
        );
        (floor, blocker)
    }

    #[test]
    fn blocker_casts_a_shadow_straight_down() {
        let (floor, blocker) = scene();
        let objects: [&dyn SceneObject; 2] = [&floor, &blocker];
        let map = ShadowMap::render(&objects, &Vector3::y(), 10.0, 128).unwrap();
        assert_eq!(map.visibility(&Point3::new(0.0, -5.0, 0.0)), 0.0);
        assert_eq!(map.visibility(&Point3::new(7.0, -5.0, 7.0)), 1.0);
        // the top of the blocker is lit
        assert_eq!(map.visibility(&Point3::new(0.0, 0.5, 0.0)), 1.0);
    }

    #[test]
    fn empty_scene_is_fully_lit() {
        let map = ShadowMap::render(&[], &Vector3::new(1.0, 1.0, 0.0), 10.0, 16).unwrap();
        assert_eq!(map.visibility(&Point3::new(3.0, -2.0, 1.0)), 1.0);
        assert_eq!(map.visibility(&Point3::new(300.0, 0.0, 0.0)), 1.0);
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert!(ShadowMap::render(&[], &Vector3::zeros(), 10.0, 16).is_err());
        assert!(ShadowMap::render(&[], &Vector3::y(), 10.0, 0).is_err());
    }
}
