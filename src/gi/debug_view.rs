use image::RgbaImage;
use nalgebra::{Point2, Point3, Vector3, Vector4};

use super::volume::Volume;
use crate::camera::Camera;
use crate::render_system::aabb::Aabb;
use crate::utils;

/// World-space entry and exit of one pixel's ray through the proxy cube.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProxyHit {
    pub entry: Point3<f32>,
    pub exit: Point3<f32>,
}

/// Per-pixel position output, row major. `None` where the ray misses the cube.
pub fn position_pass(
    camera: &dyn Camera,
    proxy: &Aabb,
    width: u32,
    height: u32,
) -> Vec<Option<ProxyHit>> {
    let eye = camera.eye();
    let aspect = width as f32 / height as f32;
    let mut out = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let uv = utils::screen_to_uv(
                Point2::new(x as f32 + 0.5, y as f32 + 0.5),
                [width, height],
            );
            let dir = camera.ray_direction(uv, aspect);
            out.push(proxy.ray_intersection(&eye, &dir).map(|(t0, t1)| ProxyHit {
                entry: eye + dir * t0,
                exit: eye + dir * t1,
            }));
        }
    }
    out
}

/// Composites level `mip` of `volume` between the two points of `hit`.
pub fn march_volume(volume: &Volume, hit: &ProxyHit, mip: f32) -> Vector4<f32> {
    let span = hit.exit - hit.entry;
    let length = span.norm();
    if length <= 0.0 {
        return Vector4::zeros();
    }
    let dir: Vector3<f32> = span / length;
    let max_lod = (volume.mip_count() - 1) as f32;
    let mip = if mip.is_finite() { mip.clamp(0.0, max_lod) } else { 0.0 };
    // half a voxel of the chosen level per step
    let step = volume.grid().cell_size() * mip.exp2() * 0.5;

    let mut acc = Vector4::zeros();
    let mut t = step * 0.5;
    while t < length && acc.w < 1.0 {
        let s = volume.sample(&(hit.entry + dir * t), mip);
        acc += s * (1.0 - acc.w);
        t += step;
    }
    acc
}

/// Renders the debug image. Pixels whose ray misses the proxy cube stay transparent.
pub fn render_debug_view(
    volume: &Volume,
    camera: &dyn Camera,
    width: u32,
    height: u32,
    mip: f32,
) -> RgbaImage {
    let proxy = Aabb::cube(volume.grid().scene_scale());
    let hits = position_pass(camera, &proxy, width, height);
    let mut image = RgbaImage::new(width, height);
    for (i, hit) in hits.iter().enumerate() {
        let Some(hit) = hit else { continue };
        let c = march_volume(volume, hit, mip);
        let x = i as u32 % width;
        let y = i as u32 / width;
        image.put_pixel(x, y, utils::to_rgba8(&c.xyz(), 1.0));
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::OrbitCamera;
    use crate::gi::volume::VoxelGrid;
    use pretty_assertions::assert_eq;

    fn volume_filled_with(texel: [u8; 4]) -> Volume {
        let mut volume = Volume::new(VoxelGrid::new(8, 4.0).unwrap());
        volume.base_mut().fill(texel);
        volume.generate_mips();
        volume
    }

    #[test]
    fn position_pass_hits_the_cube_in_the_middle_only() {
        let camera = OrbitCamera::new(20.0, 0.0, 0.0);
        let hits = position_pass(&camera, &Aabb::cube(4.0), 9, 9);
        let center = hits[4 * 9 + 4].unwrap();
        assert!((center.entry.x - 4.0).abs() < 1e-3);
        assert!((center.exit.x + 4.0).abs() < 1e-3);
        // the 60 degree view is wider than the cube at this distance
        assert_eq!(hits[0], None);
    }

    #[test]
    fn empty_volume_renders_black() {
        let volume = Volume::new(VoxelGrid::new(8, 4.0).unwrap());
        let camera = OrbitCamera::new(20.0, 0.3, 0.5);
        let image = render_debug_view(&volume, &camera, 16, 16, 0.0);
        let center = image.get_pixel(8, 8);
        assert_eq!(center.0, [0, 0, 0, 255]);
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn solid_volume_shows_its_color_at_every_mip() {
        let volume = volume_filled_with([255, 0, 0, 255]);
        let camera = OrbitCamera::new(20.0, 0.3, 0.5);
        for mip in [0.0, 1.0, 3.0, 10.0] {
            let image = render_debug_view(&volume, &camera, 16, 16, mip);
            assert_eq!(image.get_pixel(8, 8).0, [255, 0, 0, 255], "mip {mip}");
        }
    }

    #[test]
    fn degenerate_hit_is_empty() {
        let volume = volume_filled_with([255, 255, 255, 255]);
        let p = Point3::new(1.0, 1.0, 1.0);
        let hit = ProxyHit { entry: p, exit: p };
        assert_eq!(march_volume(&volume, &hit, 0.0), Vector4::zeros());
    }
}
