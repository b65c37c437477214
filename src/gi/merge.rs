use log::debug;

use super::axis::{remap, Axis};
use super::volume::{AxisCapture, Volume, VoxelGrid, EMPTY};
use crate::error::GiError;

/// Merges into a freshly allocated volume, mips included.
pub fn merge(grid: &VoxelGrid, captures: [&AxisCapture; 3]) -> Result<Volume, GiError> {
    let mut volume = Volume::new(*grid);
    merge_into(captures, &mut volume)?;
    Ok(volume)
}

/// Overwrites `volume` with the merge of `captures` and regenerates its mip chain.
/// Nothing from a previous merge survives. Captures apply in X, Y, Z order and only
/// non-zero channels overwrite, so an edge-on axis cannot erase another axis.
pub fn merge_into(captures: [&AxisCapture; 3], volume: &mut Volume) -> Result<(), GiError> {
    let grid = *volume.grid();
    let n = grid.resolution();
    let expected = grid.texel_count();

    let mut ordered: [Option<&AxisCapture>; 3] = [None; 3];
    for capture in captures {
        if capture.texels().len() != expected || capture.resolution() != n {
            return Err(GiError::CaptureSizeMismatch {
                axis: capture.axis(),
                expected,
                actual: capture.texels().len(),
            });
        }
        let slot = &mut ordered[capture.axis().index()];
        if slot.is_some() {
            return Err(GiError::InvalidParameter {
                name: "captures",
                reason: format!("axis {:?} captured twice", capture.axis()),
            });
        }
        *slot = Some(capture);
    }

    volume.clear();
    let base = volume.base_mut();
    let mut written = 0usize;
    for (axis, capture) in Axis::ALL.into_iter().zip(ordered) {
        // every slot is filled: three distinct axes were checked above
        let Some(capture) = capture else { continue };
        for slice in 0..n {
            for row in 0..n {
                for col in 0..n {
                    let src = capture.get(slice, row, col);
                    if src == EMPTY {
                        continue;
                    }
                    let dst = &mut base[grid.index(remap(axis, n, slice, row, col))];
                    for c in 0..4 {
                        if src[c] != 0 {
                            dst[c] = src[c];
                        }
                    }
                    written += 1;
                }
            }
        }
    }

    volume.generate_mips();
    debug!("merged {written} non-empty capture texels into {n}^3 volume");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gi::volume::Rgba8;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    // inverse of the capture cameras, written out per axis
    fn texel_for(axis: Axis, n: u32, [x, y, z]: [u32; 3]) -> (u32, u32, u32) {
        let last = n - 1;
        match axis {
            Axis::X => (last - x, last - y, last - z),
            Axis::Y => (last - y, z, x),
            Axis::Z => (last - z, last - y, x),
        }
    }

    fn random_capture(rng: &mut StdRng, axis: Axis, n: u32) -> AxisCapture {
        let mut capture = AxisCapture::new(axis, n);
        for slice in 0..n {
            for row in 0..n {
                for col in 0..n {
                    // mostly empty, sometimes with zero channels
                    if rng.gen_bool(0.3) {
                        let texel: Rgba8 = [0; 4].map(|_| {
                            if rng.gen_bool(0.5) {
                                0
                            } else {
                                rng.gen_range(1..=255)
                            }
                        });
                        capture.set(slice, row, col, texel);
                    }
                }
            }
        }
        capture
    }

    #[test]
    fn every_voxel_follows_the_overwrite_rule() {
        let n = 8;
        let grid = VoxelGrid::new(n, 10.0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let captures = Axis::ALL.map(|axis| random_capture(&mut rng, axis, n));
        let volume = merge(&grid, [&captures[0], &captures[1], &captures[2]]).unwrap();

        for x in 0..n {
            for y in 0..n {
                for z in 0..n {
                    let mut expected = [0u8; 4];
                    for capture in &captures {
                        let (s, r, c) = texel_for(capture.axis(), n, [x, y, z]);
                        let texel = capture.get(s, r, c);
                        for ch in 0..4 {
                            if texel[ch] != 0 {
                                expected[ch] = texel[ch];
                            }
                        }
                    }
                    assert_eq!(volume.get([x, y, z]), expected, "voxel {x},{y},{z}");
                }
            }
        }
    }

    #[test]
    fn later_zero_channels_do_not_erase_earlier_axes() {
        let n = 4;
        let grid = VoxelGrid::new(n, 1.0).unwrap();
        let voxel = [1, 2, 3];
        let mut x = AxisCapture::new(Axis::X, n);
        let mut y = AxisCapture::new(Axis::Y, n);
        let z = AxisCapture::new(Axis::Z, n);
        let (s, r, c) = texel_for(Axis::X, n, voxel);
        x.set(s, r, c, [10, 20, 30, 40]);
        let (s, r, c) = texel_for(Axis::Y, n, voxel);
        y.set(s, r, c, [0, 0, 99, 0]);

        let volume = merge(&grid, [&x, &y, &z]).unwrap();
        assert_eq!(volume.get(voxel), [10, 20, 99, 40]);
    }

    #[test]
    fn merging_twice_gives_the_same_volume() {
        let n = 8;
        let grid = VoxelGrid::new(n, 1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let captures = Axis::ALL.map(|axis| random_capture(&mut rng, axis, n));
        let refs = [&captures[0], &captures[1], &captures[2]];

        let mut volume = Volume::new(grid);
        merge_into(refs, &mut volume).unwrap();
        let first = volume.clone();
        merge_into(refs, &mut volume).unwrap();
        assert_eq!(volume, first);
    }

    #[test]
    fn argument_order_does_not_matter() {
        let n = 4;
        let grid = VoxelGrid::new(n, 1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let captures = Axis::ALL.map(|axis| random_capture(&mut rng, axis, n));
        let a = merge(&grid, [&captures[0], &captures[1], &captures[2]]).unwrap();
        let b = merge(&grid, [&captures[2], &captures[0], &captures[1]]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_captures_give_an_empty_volume() {
        let n = 8;
        let grid = VoxelGrid::new(n, 1.0).unwrap();
        let captures = Axis::ALL.map(|axis| AxisCapture::new(axis, n));
        let volume = merge(&grid, [&captures[0], &captures[1], &captures[2]]).unwrap();
        for level in volume.levels() {
            assert!(level.texels.iter().all(|t| *t == EMPTY));
        }
    }

    #[test]
    fn size_mismatch_is_fatal() {
        let grid = VoxelGrid::new(8, 1.0).unwrap();
        let x = AxisCapture::new(Axis::X, 8);
        let y = AxisCapture::new(Axis::Y, 4);
        let z = AxisCapture::new(Axis::Z, 8);
        let err = merge(&grid, [&x, &y, &z]).unwrap_err();
        match err {
            GiError::CaptureSizeMismatch {
                axis,
                expected,
                actual,
            } => {
                assert_eq!(axis, Axis::Y);
                assert_eq!(expected, 512);
                assert_eq!(actual, 64);
            }
            other => panic!("unexpected error {other:?}"),
        }

        let truncated = AxisCapture::from_texels(Axis::Z, 8, vec![EMPTY; 100]);
        assert!(matches!(
            merge(&grid, [&truncated, &x, &x]),
            Err(GiError::CaptureSizeMismatch { .. })
        ));
    }

    #[test]
    fn duplicate_axis_is_rejected() {
        let grid = VoxelGrid::new(4, 1.0).unwrap();
        let x = AxisCapture::new(Axis::X, 4);
        let z = AxisCapture::new(Axis::Z, 4);
        assert!(matches!(
            merge(&grid, [&x, &x, &z]),
            Err(GiError::InvalidParameter { .. })
        ));
    }
}
