use nalgebra::{Matrix4, Point3, Vector3};

use super::volume::VoxelGrid;
use crate::camera::vk_clip_correction;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// A world axis together with a direction along it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignedAxis {
    pub component: usize,
    pub positive: bool,
}

impl SignedAxis {
    const fn pos(component: usize) -> SignedAxis {
        SignedAxis {
            component,
            positive: true,
        }
    }

    const fn neg(component: usize) -> SignedAxis {
        SignedAxis {
            component,
            positive: false,
        }
    }

    pub fn to_vector(self) -> Vector3<f32> {
        let mut v = Vector3::zeros();
        v[self.component] = if self.positive { 1.0 } else { -1.0 };
        v
    }
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Direction from the scene center toward the capture camera.
    pub fn backward(self) -> SignedAxis {
        SignedAxis::pos(self.index())
    }

    /// Camera up vector. Looking down Y the usual +Y up would be parallel to the
    /// view direction, so that capture uses -Z instead.
    pub fn up(self) -> SignedAxis {
        match self {
            Axis::X => SignedAxis::pos(1),
            Axis::Y => SignedAxis::neg(2),
            Axis::Z => SignedAxis::pos(1),
        }
    }

    /// Image-space +column direction, i.e. `up x backward` as `look_at_rh` builds it.
    pub fn right(self) -> SignedAxis {
        match self {
            Axis::X => SignedAxis::neg(2),
            Axis::Y => SignedAxis::pos(0),
            Axis::Z => SignedAxis::pos(0),
        }
    }
}

/// Maps texel `(row, col)` of capture slice `slice` taken along `axis` to the
/// volume coordinate `(x, y, z)` it records.
///
/// Along the camera's right vector the texel sits at logical index `col`, along
/// its up vector at `n - 1 - row` (rows grow downward) and toward the eye at
/// `n - 1 - slice` (slices grow away from the eye). A world component that the
/// camera basis points down the negative axis is mirrored.
pub fn remap(axis: Axis, resolution: u32, slice: u32, row: u32, col: u32) -> [u32; 3] {
    let last = resolution - 1;
    let mut out = [0; 3];
    for (basis, logical) in [
        (axis.right(), col),
        (axis.up(), last - row),
        (axis.backward(), last - slice),
    ] {
        out[basis.component] = if basis.positive {
            logical
        } else {
            last - logical
        };
    }
    out
}

/// Picks an up vector that is never parallel to `view_dir`.
pub fn non_degenerate_up(view_dir: &Vector3<f32>) -> Vector3<f32> {
    let dir = view_dir.normalize();
    if dir.y.abs() > 0.99 {
        Vector3::new(0.0, 0.0, -1.0)
    } else {
        Vector3::new(0.0, 1.0, 0.0)
    }
}

/// Orthographic camera carving exactly one voxel-thick slab out of the scene cube.
///
/// The eye sits on the positive face. Slice `i` keeps depths `[i * cell, (i + 1) * cell)`,
/// so a surface exactly on a boundary goes to the cell on its negative side.
#[derive(Clone, Debug, PartialEq)]
pub struct OrthoFrustum {
    pub axis: Axis,
    pub slice: u32,
    pub resolution: u32,
    pub eye: Point3<f32>,
    pub up: Vector3<f32>,
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

impl OrthoFrustum {
    pub fn for_slice(grid: &VoxelGrid, axis: Axis, slice: u32) -> OrthoFrustum {
        let scale = grid.scene_scale();
        let cell = grid.cell_size();
        OrthoFrustum {
            axis,
            slice,
            resolution: grid.resolution(),
            eye: Point3::from(axis.backward().to_vector() * scale),
            up: axis.up().to_vector(),
            left: -scale,
            right: scale,
            bottom: -scale,
            top: scale,
            near: slice as f32 * cell,
            far: (slice + 1) as f32 * cell,
        }
    }

    pub fn view(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.eye, &Point3::origin(), &self.up)
    }

    /// Projection into Vulkan clip space: depth in [0, 1], row 0 at the top.
    pub fn projection(&self) -> Matrix4<f32> {
        vk_clip_correction()
            * Matrix4::new_orthographic(
                self.left,
                self.right,
                self.bottom,
                self.top,
                self.near,
                self.far,
            )
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection() * self.view()
    }

    pub fn extent(&self) -> [u32; 2] {
        [self.resolution, self.resolution]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[test]
    fn remap_matches_hand_derived_tables() {
        let n = 8;
        let (s, r, c) = (1, 2, 3);
        assert_eq!(remap(Axis::X, n, s, r, c), [n - 1 - s, n - 1 - r, n - 1 - c]);
        assert_eq!(remap(Axis::Y, n, s, r, c), [c, n - 1 - s, r]);
        assert_eq!(remap(Axis::Z, n, s, r, c), [c, n - 1 - r, n - 1 - s]);
    }

    #[test]
    fn remap_is_a_bijection_for_every_axis() {
        let n = 4;
        for axis in Axis::ALL {
            let mut seen = HashSet::new();
            for slice in 0..n {
                for row in 0..n {
                    for col in 0..n {
                        let v = remap(axis, n, slice, row, col);
                        assert!(v.iter().all(|&c| c < n));
                        assert!(seen.insert(v), "{axis:?} maps two texels to {v:?}");
                    }
                }
            }
            assert_eq!(seen.len(), (n * n * n) as usize);
        }
    }

    #[test]
    fn right_vector_agrees_with_look_at() {
        let grid = VoxelGrid::new(8, 10.0).unwrap();
        for axis in Axis::ALL {
            let frustum = OrthoFrustum::for_slice(&grid, axis, 0);
            let view = frustum.view();
            let right = view.transform_vector(&axis.right().to_vector());
            let up = view.transform_vector(&axis.up().to_vector());
            let back = view.transform_vector(&axis.backward().to_vector());
            assert!((right - Vector3::x()).norm() < 1e-6, "{axis:?} right {right:?}");
            assert!((up - Vector3::y()).norm() < 1e-6, "{axis:?} up {up:?}");
            assert!((back - Vector3::z()).norm() < 1e-6, "{axis:?} back {back:?}");
        }
    }

    // Projects the center of every voxel through the slice cameras and checks
    // that remap sends the texel it lands on back to the same voxel.
    #[test]
    fn remap_inverts_the_capture_camera() {
        let n = 8;
        let grid = VoxelGrid::new(n, 4.0).unwrap();
        let cell = grid.cell_size();
        for axis in Axis::ALL {
            for x in 0..n {
                for y in 0..n {
                    for z in 0..n {
                        let center = grid.voxel_center([x, y, z]);
                        let reference = OrthoFrustum::for_slice(&grid, axis, 0);
                        let p = reference.view().transform_point(&center);
                        let depth = -p.z;
                        let slice = (depth / cell).floor() as u32;
                        let frustum = OrthoFrustum::for_slice(&grid, axis, slice);
                        assert!(depth >= frustum.near && depth < frustum.far);

                        let clip = frustum.view_projection().transform_point(&center);
                        let col = ((clip.x + 1.0) * 0.5 * n as f32).floor() as u32;
                        let row = ((clip.y + 1.0) * 0.5 * n as f32).floor() as u32;
                        assert!(clip.z >= 0.0 && clip.z <= 1.0);
                        assert_eq!(remap(axis, n, slice, row, col), [x, y, z], "{axis:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn slices_partition_the_cube_from_the_positive_face() {
        let grid = VoxelGrid::new(4, 2.0).unwrap();
        let first = OrthoFrustum::for_slice(&grid, Axis::Z, 0);
        let last = OrthoFrustum::for_slice(&grid, Axis::Z, 3);
        assert_eq!(first.near, 0.0);
        assert_eq!(first.far, 1.0);
        assert_eq!(last.far, 4.0);
        assert_eq!(first.eye, Point3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn up_is_never_parallel_to_view() {
        for dir in [Vector3::y(), -Vector3::y(), Vector3::x(), Vector3::new(0.3, 0.9, 0.1)] {
            let up = non_degenerate_up(&dir);
            assert!(up.cross(&dir.normalize()).norm() > 0.1);
        }
    }
}
