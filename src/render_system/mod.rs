pub mod aabb;
pub mod gpu_voxelizer;
pub mod preview;
pub mod shadow_map;
pub mod soft_raster;
pub mod vertex;
pub mod voxelize_shader;
