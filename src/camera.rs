use nalgebra::{Matrix4, Point2, Point3, Vector3};

#[inline]
pub fn deg2rad(deg: f32) -> f32 {
    deg * std::f32::consts::PI / 180.0
}

// vectors giving the current perception of the camera
#[derive(Clone, Debug)]
pub struct DirVecs {
    // points from the eye into the scene
    pub front: Vector3<f32>,
    pub right: Vector3<f32>,
    pub up: Vector3<f32>,
}

impl DirVecs {
    fn new(worldup: Vector3<f32>, pitch: f32, yaw: f32) -> DirVecs {
        let front = Vector3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize();
        // get other vectors
        let right = front.cross(&worldup).normalize();
        let up = right.cross(&front).normalize();
        // return values
        DirVecs { front, right, up }
    }
}

// Converts a space with depth values in the range [-1, 1] to a space with depth values in the range [0, 1]
// keeps the x and y values the same
fn vk_depth_correction() -> Matrix4<f32> {
    Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 1.0, 0.5))
        * Matrix4::new_translation(&Vector3::new(0.0, 0.0, 1.0))
}

// Vulkan puts y = -1 on the top row, so flip y as well as fixing depth
pub fn vk_clip_correction() -> Matrix4<f32> {
    Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, -1.0, 1.0)) * vk_depth_correction()
}

/// Anything that can shoot primary rays through an image.
pub trait Camera {
    fn eye(&self) -> Point3<f32>;
    fn dir_vecs(&self) -> DirVecs;
    fn set_position(&mut self, pos: Point3<f32>);

    /// Unit ray direction through `uv`, where `uv` is in [-1, 1] with -1 at the top left.
    fn ray_direction(&self, uv: Point2<f32>, aspect: f32) -> Vector3<f32> {
        let dirs = self.dir_vecs();
        let half_fov = (self.fov() * 0.5).tan();
        (dirs.front + dirs.right * uv.x * half_fov * aspect - dirs.up * uv.y * half_fov)
            .normalize()
    }

    fn fov(&self) -> f32 {
        deg2rad(60.0)
    }
}

// lets you orbit around the central point
pub struct OrbitCamera {
    // position of the camera's root point
    root_pos: Point3<f32>,
    // world up
    worldup: Vector3<f32>,
    // distance from the root position
    offset: f32,
    pitch: f32,
    yaw: f32,
}

impl OrbitCamera {
    pub fn new(offset: f32, pitch: f32, yaw: f32) -> OrbitCamera {
        OrbitCamera {
            root_pos: Point3::default(),
            worldup: Vector3::new(0.0, 1.0, 0.0),
            offset,
            pitch: pitch.clamp(-deg2rad(89.0), deg2rad(89.0)),
            yaw,
        }
    }

    pub fn set_offset(&mut self, offset: f32) {
        self.offset = offset.max(0.5);
    }
}

impl Camera for OrbitCamera {
    fn eye(&self) -> Point3<f32> {
        // the orbit direction points from the root toward the eye
        let dirs = DirVecs::new(self.worldup, self.pitch, self.yaw);
        self.root_pos + self.offset * dirs.front
    }

    fn dir_vecs(&self) -> DirVecs {
        let orbit = DirVecs::new(self.worldup, self.pitch, self.yaw);
        let front = -orbit.front;
        let right = front.cross(&self.worldup).normalize();
        let up = right.cross(&front).normalize();
        DirVecs { front, right, up }
    }

    fn set_position(&mut self, pos: Point3<f32>) {
        self.root_pos = pos;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbit_camera_looks_at_its_root() {
        let mut camera = OrbitCamera::new(10.0, deg2rad(20.0), deg2rad(30.0));
        camera.set_position(Point3::new(1.0, 2.0, 3.0));
        let to_root = (Point3::new(1.0, 2.0, 3.0) - camera.eye()).normalize();
        let center = camera.ray_direction(Point2::new(0.0, 0.0), 1.0);
        assert!((center - to_root).norm() < 1e-5);
        assert!(((camera.eye() - Point3::new(1.0, 2.0, 3.0)).norm() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn top_of_the_image_looks_up() {
        let camera = OrbitCamera::new(5.0, 0.0, 0.0);
        let top = camera.ray_direction(Point2::new(0.0, -1.0), 1.0);
        let bottom = camera.ray_direction(Point2::new(0.0, 1.0), 1.0);
        assert!(top.y > 0.0);
        assert!(bottom.y < 0.0);
    }

    #[test]
    fn clip_correction_maps_depth_to_unit_range() {
        let m = vk_clip_correction();
        let near = m.transform_point(&Point3::new(0.0, 1.0, -1.0));
        let far = m.transform_point(&Point3::new(0.0, 1.0, 1.0));
        assert!((near.z - 0.0).abs() < 1e-6);
        assert!((far.z - 1.0).abs() < 1e-6);
        assert!((near.y + 1.0).abs() < 1e-6);
    }
}
