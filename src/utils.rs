use image::Rgba;
use nalgebra::{Point2, Vector3};

/// Pixel coordinates to [-1, 1], with -1 at the top left.
pub fn screen_to_uv(e: Point2<f32>, extent: [u32; 2]) -> Point2<f32> {
    let x = e[0] / extent[0] as f32;
    let y = e[1] / extent[1] as f32;
    Point2::new(2.0 * x - 1.0, 2.0 * y - 1.0)
}

// linear color in [0, 1] to 8 bit, no tone mapping
pub fn to_rgba8(color: &Vector3<f32>, alpha: f32) -> Rgba<u8> {
    Rgba([unorm8(color.x), unorm8(color.y), unorm8(color.z), unorm8(alpha)])
}

/// Float color in [0, 1] to the nearest 8 bit value, saturating.
pub fn unorm8(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uv_covers_the_screen() {
        assert_eq!(screen_to_uv(Point2::new(0.0, 0.0), [4, 2]), Point2::new(-1.0, -1.0));
        assert_eq!(screen_to_uv(Point2::new(4.0, 2.0), [4, 2]), Point2::new(1.0, 1.0));
    }

    #[test]
    fn colors_saturate() {
        assert_eq!(to_rgba8(&Vector3::new(2.0, -1.0, 0.5), 1.0).0, [255, 0, 128, 255]);
        assert_eq!(unorm8(0.2), 51);
    }
}
