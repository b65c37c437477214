pub mod axis;
pub mod cone_trace;
pub mod debug_view;
pub mod material;
pub mod merge;
pub mod mipchain;
pub mod volume;
pub mod voxelizer;

use log::info;
use std::time::Instant;

use crate::config::{GiConfig, LightingParams};
use crate::error::GiError;
use axis::Axis;
use cone_trace::{LightInputs, ShadedSurface, SurfacePoint};
use volume::{Volume, VolumeStore, VoxelGrid};
use voxelizer::{SceneObject, SceneParams, SliceRasterizer, Voxelizer};

/// Voxel cone tracing global illumination.
///
/// Owns the voxel resources and sequences one voxelization event: the three
/// axis captures, then the merge and mip generation. Shading reads the volume
/// left behind by the last completed event.
pub struct GiSystem<R> {
    lighting: LightingParams,
    store: VolumeStore,
    voxelizer: Voxelizer<R>,
}

impl<R: SliceRasterizer> GiSystem<R> {
    pub fn new(config: &GiConfig, rasterizer: R) -> Result<GiSystem<R>, GiError> {
        config.validate()?;
        let grid = VoxelGrid::new(config.resolution, config.scene_scale)?;
        info!(
            "voxel grid {}^3 over +-{} ({} mip levels)",
            grid.resolution(),
            grid.scene_scale(),
            grid.mip_count()
        );
        Ok(GiSystem {
            lighting: config.lighting,
            store: VolumeStore::new(grid),
            voxelizer: Voxelizer::new(grid, rasterizer),
        })
    }

    /// Re-voxelizes the whole scene. Every axis finishes before the merge, and
    /// the merge finishes (mips included) before the volume is handed out.
    pub fn voxelize_scene(
        &mut self,
        objects: &[&dyn SceneObject],
        params: &SceneParams,
    ) -> Result<&Volume, GiError> {
        let start = Instant::now();
        for axis in Axis::ALL {
            let capture = self.voxelizer.voxelize(objects, params, axis)?;
            self.store.set_capture(capture);
        }
        let (captures, volume) = self.store.split_for_merge();
        merge::merge_into(captures, volume)?;
        info!(
            "voxelized {} objects in {:.1} ms",
            objects.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(self.store.volume())
    }

    pub fn grid(&self) -> &VoxelGrid {
        self.store.grid()
    }

    pub fn volume(&self) -> &Volume {
        self.store.volume()
    }

    pub fn store(&self) -> &VolumeStore {
        &self.store
    }

    pub fn rasterizer(&self) -> &R {
        self.voxelizer.rasterizer()
    }

    pub fn lighting(&self) -> &LightingParams {
        &self.lighting
    }

    /// Lighting parameters only affect shading, the volume stays valid.
    pub fn lighting_mut(&mut self) -> &mut LightingParams {
        &mut self.lighting
    }

    pub fn shade(&self, surface: &SurfacePoint, light: &LightInputs) -> ShadedSurface {
        cone_trace::shade_surface(self.store.volume(), &self.lighting, surface, light)
    }
}
