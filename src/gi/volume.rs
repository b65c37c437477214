use nalgebra::{Point3, Vector4};

use super::axis::Axis;
use super::mipchain;
use crate::error::GiError;

pub type Rgba8 = [u8; 4];

pub const EMPTY: Rgba8 = [0; 4];

/// Resolution and world bounds of the grid. The grid covers the cube
/// `[-scene_scale, scene_scale]^3` and never moves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoxelGrid {
    resolution: u32,
    scene_scale: f32,
}

impl VoxelGrid {
    pub fn new(resolution: u32, scene_scale: f32) -> Result<VoxelGrid, GiError> {
        if resolution == 0 || !resolution.is_power_of_two() {
            return Err(GiError::InvalidResolution(resolution));
        }
        if !(scene_scale.is_finite() && scene_scale > 0.0) {
            return Err(GiError::InvalidSceneScale(scene_scale));
        }
        Ok(VoxelGrid {
            resolution,
            scene_scale,
        })
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn scene_scale(&self) -> f32 {
        self.scene_scale
    }

    /// Edge length of one voxel in world units.
    pub fn cell_size(&self) -> f32 {
        2.0 * self.scene_scale / self.resolution as f32
    }

    /// Unit of the cone march: base step and self-occlusion offset.
    pub fn voxel_size(&self) -> f32 {
        self.cell_size()
    }

    pub fn texel_count(&self) -> usize {
        let n = self.resolution as usize;
        n * n * n
    }

    pub fn mip_count(&self) -> usize {
        self.resolution.trailing_zeros() as usize + 1
    }

    pub fn index(&self, [x, y, z]: [u32; 3]) -> usize {
        let n = self.resolution as usize;
        x as usize + y as usize * n + z as usize * n * n
    }

    /// Voxel containing `p`, or `None` outside the scene cube. Cells are `[lo, hi)`.
    ///
    /// Slab captures use `[near, far)` in view depth from the positive face, so a surface
    /// lying exactly on a cell boundary is stored one cell lower on the capture axis than
    /// this returns.
    pub fn world_to_voxel(&self, p: &Point3<f32>) -> Option<[u32; 3]> {
        let cell = self.cell_size();
        let mut out = [0; 3];
        for i in 0..3 {
            let v = ((p[i] + self.scene_scale) / cell).floor();
            if !(v >= 0.0 && v < self.resolution as f32) {
                return None;
            }
            out[i] = v as u32;
        }
        Some(out)
    }

    pub fn voxel_center(&self, voxel: [u32; 3]) -> Point3<f32> {
        let cell = self.cell_size();
        Point3::new(
            -self.scene_scale + (voxel[0] as f32 + 0.5) * cell,
            -self.scene_scale + (voxel[1] as f32 + 0.5) * cell,
            -self.scene_scale + (voxel[2] as f32 + 0.5) * cell,
        )
    }

    /// Position in normalized texture coordinates, [0, 1] inside the cube.
    pub fn to_uvw(&self, p: &Point3<f32>) -> Point3<f32> {
        (p.coords.add_scalar(self.scene_scale) / (2.0 * self.scene_scale)).into()
    }
}

/// The `N` orthographic slices captured along one axis.
#[derive(Clone, Debug, PartialEq)]
pub struct AxisCapture {
    axis: Axis,
    resolution: u32,
    texels: Vec<Rgba8>,
}

impl AxisCapture {
    pub fn new(axis: Axis, resolution: u32) -> AxisCapture {
        let n = resolution as usize;
        AxisCapture {
            axis,
            resolution,
            texels: vec![EMPTY; n * n * n],
        }
    }

    /// Wraps texels read back from a render target. The length is checked at merge time.
    pub fn from_texels(axis: Axis, resolution: u32, texels: Vec<Rgba8>) -> AxisCapture {
        AxisCapture {
            axis,
            resolution,
            texels,
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn texels(&self) -> &[Rgba8] {
        &self.texels
    }

    pub fn index(&self, slice: u32, row: u32, col: u32) -> usize {
        let n = self.resolution as usize;
        col as usize + row as usize * n + slice as usize * n * n
    }

    pub fn get(&self, slice: u32, row: u32, col: u32) -> Rgba8 {
        self.texels[self.index(slice, row, col)]
    }

    pub fn set(&mut self, slice: u32, row: u32, col: u32, value: Rgba8) {
        let idx = self.index(slice, row, col);
        self.texels[idx] = value;
    }

    pub fn slice_mut(&mut self, slice: u32) -> &mut [Rgba8] {
        let n = self.resolution as usize;
        let start = slice as usize * n * n;
        &mut self.texels[start..start + n * n]
    }

    pub fn clear(&mut self) {
        self.texels.fill(EMPTY);
    }
}

/// One level of the mip chain.
#[derive(Clone, Debug, PartialEq)]
pub struct MipLevel {
    pub resolution: u32,
    pub texels: Vec<Rgba8>,
}

impl MipLevel {
    pub fn new(resolution: u32) -> MipLevel {
        let n = resolution as usize;
        MipLevel {
            resolution,
            texels: vec![EMPTY; n * n * n],
        }
    }

    pub fn get(&self, x: u32, y: u32, z: u32) -> Rgba8 {
        let n = self.resolution as usize;
        self.texels[x as usize + y as usize * n + z as usize * n * n]
    }

    fn fetch(&self, x: u32, y: u32, z: u32) -> Vector4<f32> {
        let [r, g, b, a] = self.get(x, y, z);
        Vector4::new(r as f32, g as f32, b as f32, a as f32) / 255.0
    }

    // trilinear filter with clamp-to-edge, `uvw` must already be inside [0, 1]
    fn sample_trilinear(&self, uvw: &Point3<f32>) -> Vector4<f32> {
        let last = (self.resolution - 1) as f32;
        let mut lo = [0u32; 3];
        let mut hi = [0u32; 3];
        let mut frac = [0.0f32; 3];
        for i in 0..3 {
            let t = (uvw[i] * self.resolution as f32 - 0.5).clamp(0.0, last);
            let f = t.floor();
            lo[i] = f as u32;
            hi[i] = (f + 1.0).min(last) as u32;
            frac[i] = t - f;
        }
        let mut acc = Vector4::zeros();
        for corner in 0..8u32 {
            let pick = |axis: usize| corner & (1 << axis) != 0;
            let mut weight = 1.0;
            let mut coord = [0u32; 3];
            for axis in 0..3 {
                if pick(axis) {
                    weight *= frac[axis];
                    coord[axis] = hi[axis];
                } else {
                    weight *= 1.0 - frac[axis];
                    coord[axis] = lo[axis];
                }
            }
            if weight > 0.0 {
                acc += self.fetch(coord[0], coord[1], coord[2]) * weight;
            }
        }
        acc
    }
}

/// The merged, mipmapped 3D texture sampled by the cone tracer.
#[derive(Clone, Debug, PartialEq)]
pub struct Volume {
    grid: VoxelGrid,
    levels: Vec<MipLevel>,
}

impl Volume {
    pub fn new(grid: VoxelGrid) -> Volume {
        let levels = (0..grid.mip_count())
            .map(|level| MipLevel::new(grid.resolution() >> level))
            .collect();
        Volume { grid, levels }
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    pub fn mip_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, level: usize) -> &MipLevel {
        &self.levels[level]
    }

    pub fn levels(&self) -> &[MipLevel] {
        &self.levels
    }

    pub fn get(&self, voxel: [u32; 3]) -> Rgba8 {
        self.levels[0].texels[self.grid.index(voxel)]
    }

    pub fn base_mut(&mut self) -> &mut [Rgba8] {
        &mut self.levels[0].texels
    }

    pub fn clear(&mut self) {
        for level in self.levels.iter_mut() {
            level.texels.fill(EMPTY);
        }
    }

    /// Rebuilds levels 1.. from level 0.
    pub fn generate_mips(&mut self) {
        mipchain::generate_mip_chain(&mut self.levels);
    }

    /// Premultiplied color and opacity at `p` (world space), filtered
    /// trilinearly and blended linearly between the two nearest levels.
    /// `lod` is clamped to the available range; outside the cube the volume is empty.
    pub fn sample(&self, p: &Point3<f32>, lod: f32) -> Vector4<f32> {
        let uvw = self.grid.to_uvw(p);
        if uvw.coords.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Vector4::zeros();
        }
        let max_lod = (self.levels.len() - 1) as f32;
        let lod = if lod.is_finite() {
            lod.clamp(0.0, max_lod)
        } else {
            0.0
        };
        let lower = lod.floor();
        let t = lod - lower;
        let lower = lower as usize;
        let a = self.levels[lower].sample_trilinear(&uvw);
        if t <= 0.0 || lower + 1 >= self.levels.len() {
            return a;
        }
        let b = self.levels[lower + 1].sample_trilinear(&uvw);
        a.lerp(&b, t)
    }
}

/// Owns every voxel resource of the GI subsystem: the three capture targets
/// and the volume. Stages borrow what they need from here.
#[derive(Clone, Debug)]
pub struct VolumeStore {
    grid: VoxelGrid,
    captures: [AxisCapture; 3],
    volume: Volume,
}

impl VolumeStore {
    pub fn new(grid: VoxelGrid) -> VolumeStore {
        let n = grid.resolution();
        VolumeStore {
            grid,
            captures: Axis::ALL.map(|axis| AxisCapture::new(axis, n)),
            volume: Volume::new(grid),
        }
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    pub fn capture(&self, axis: Axis) -> &AxisCapture {
        &self.captures[axis.index()]
    }

    pub fn set_capture(&mut self, capture: AxisCapture) {
        let idx = capture.axis().index();
        self.captures[idx] = capture;
    }

    pub fn captures(&self) -> [&AxisCapture; 3] {
        [&self.captures[0], &self.captures[1], &self.captures[2]]
    }

    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    /// Captures for reading and the volume for writing, borrowed together for the merge.
    pub fn split_for_merge(&mut self) -> ([&AxisCapture; 3], &mut Volume) {
        let [x, y, z] = &self.captures;
        ([x, y, z], &mut self.volume)
    }
}
