use super::volume::{MipLevel, Rgba8};

/// Rebuilds `levels[1..]` from `levels[0]` with a box filter over the eight children.
///
/// `levels` must hold one entry per power of two from the base resolution down to 1.
pub fn generate_mip_chain(levels: &mut [MipLevel]) {
    for level in 1..levels.len() {
        let (finer, coarser) = levels.split_at_mut(level);
        downsample(&finer[level - 1], &mut coarser[0]);
    }
}

fn downsample(prev: &MipLevel, next: &mut MipLevel) {
    let prev_n = prev.resolution as usize;
    let next_n = next.resolution as usize;
    debug_assert_eq!(prev_n, next_n * 2);

    let idx = |x: usize, y: usize, z: usize| x + y * prev_n + z * prev_n * prev_n;

    for z in 0..next_n {
        for y in 0..next_n {
            for x in 0..next_n {
                let mut sum = [0u32; 4];
                for (dx, dy, dz) in CHILDREN {
                    let child = prev.texels[idx(2 * x + dx, 2 * y + dy, 2 * z + dz)];
                    for c in 0..4 {
                        sum[c] += child[c] as u32;
                    }
                }
                next.texels[x + y * next_n + z * next_n * next_n] = average(sum);
            }
        }
    }
}

const CHILDREN: [(usize, usize, usize); 8] = [
    (0, 0, 0),
    (1, 0, 0),
    (0, 1, 0),
    (1, 1, 0),
    (0, 0, 1),
    (1, 0, 1),
    (0, 1, 1),
    (1, 1, 1),
];

// rounded mean of eight children
fn average(sum: [u32; 4]) -> Rgba8 {
    sum.map(|s| ((s + 4) / 8) as u8)
}
