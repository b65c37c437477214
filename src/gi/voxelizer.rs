use log::{debug, warn};
use nalgebra::{Matrix3, Matrix4, Vector3};

use super::axis::{Axis, OrthoFrustum};
use super::material::MaterialSample;
use super::volume::{AxisCapture, VoxelGrid};
use crate::error::GiError;
use crate::render_system::vertex::Vertex3D;

/// Receives the geometry of one object for the pass currently being recorded.
pub trait DrawEncoder {
    /// Draws a triangle list given in object space.
    fn draw_triangles(&mut self, vertices: &[Vertex3D]);
}

/// One drawable thing supplied by the geometry source.
pub trait SceneObject {
    fn transform(&self) -> Matrix4<f32>;

    fn normal_matrix(&self) -> Matrix3<f32> {
        let linear: Matrix3<f32> = self.transform().fixed_view::<3, 3>(0, 0).into_owned();
        linear
            .try_inverse()
            .map(|inverse| inverse.transpose())
            .unwrap_or(linear)
    }

    fn material(&self) -> &MaterialSample;

    fn issue_draw(&self, encoder: &mut dyn DrawEncoder);
}

/// Scene-wide parameters pushed to every rasterization pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SceneParams {
    // unit vector pointing toward the light, None when there is no light
    pub light_direction: Option<Vector3<f32>>,
}

impl SceneParams {
    pub fn with_light(direction: Vector3<f32>) -> SceneParams {
        SceneParams {
            light_direction: Some(direction.normalize()),
        }
    }

    /// Clamped cosine between `normal` and the light. A scene without light is fully lit.
    pub fn lambert(&self, normal: &Vector3<f32>) -> f32 {
        match self.light_direction {
            Some(l) => normal.normalize().dot(&l).max(0.0),
            None => 1.0,
        }
    }
}

/// A backend able to render slabs into the layers of a capture target.
pub trait SliceRasterizer {
    /// Binds a fresh, zeroed capture target for `axis`.
    fn begin_axis(&mut self, grid: &VoxelGrid, axis: Axis) -> Result<(), GiError>;

    /// Renders every object into layer `frustum.slice` with additive blending,
    /// depth testing and no culling.
    fn render_slice(
        &mut self,
        frustum: &OrthoFrustum,
        objects: &[&dyn SceneObject],
        params: &SceneParams,
    ) -> Result<(), GiError>;

    /// Waits for outstanding work and hands over the finished capture.
    fn finish_axis(&mut self) -> Result<AxisCapture, GiError>;
}

pub struct Voxelizer<R> {
    grid: VoxelGrid,
    rasterizer: R,
}

impl<R: SliceRasterizer> Voxelizer<R> {
    pub fn new(grid: VoxelGrid, rasterizer: R) -> Voxelizer<R> {
        Voxelizer { grid, rasterizer }
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    pub fn rasterizer(&self) -> &R {
        &self.rasterizer
    }

    /// Runs the `N` slab passes along `axis`. A slice whose render target is
    /// incomplete is logged and left empty; any other failure aborts.
    pub fn voxelize(
        &mut self,
        objects: &[&dyn SceneObject],
        params: &SceneParams,
        axis: Axis,
    ) -> Result<AxisCapture, GiError> {
        self.rasterizer.begin_axis(&self.grid, axis)?;

        let mut skipped = 0;
        for slice in 0..self.grid.resolution() {
            let frustum = OrthoFrustum::for_slice(&self.grid, axis, slice);
            match self.rasterizer.render_slice(&frustum, objects, params) {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    warn!("skipping voxel slice: {e}");
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            "voxelized axis {:?}: {} slices, {} skipped, {} objects",
            axis,
            self.grid.resolution(),
            skipped,
            objects.len()
        );

        self.rasterizer.finish_axis()
    }
}
