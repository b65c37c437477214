use nalgebra::Vector3;

/// Per-object surface description handed over by the geometry source.
/// The voxelizer and the shading pass read it, nothing here writes it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialSample {
    pub ambient: Vector3<f32>,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
    pub specular_exponent: f32,
    // opacity used when a dissolve map is present
    pub dissolve: f32,
    pub has_diffuse_map: bool,
    pub has_bump_map: bool,
    pub has_specular_map: bool,
    pub has_dissolve_map: bool,
}

impl Default for MaterialSample {
    fn default() -> MaterialSample {
        MaterialSample {
            ambient: Vector3::zeros(),
            diffuse: Vector3::new(0.8, 0.8, 0.8),
            specular: Vector3::zeros(),
            specular_exponent: 16.0,
            dissolve: 1.0,
            has_diffuse_map: false,
            has_bump_map: false,
            has_specular_map: false,
            has_dissolve_map: false,
        }
    }
}

impl MaterialSample {
    pub fn diffuse(color: [f32; 3]) -> MaterialSample {
        MaterialSample {
            diffuse: color.into(),
            ..Default::default()
        }
    }

    /// A surface that shows up in the voxel volume even without light.
    pub fn emissive(color: [f32; 3]) -> MaterialSample {
        MaterialSample {
            ambient: color.into(),
            diffuse: Vector3::zeros(),
            ..Default::default()
        }
    }

    pub fn opacity(&self) -> f32 {
        if self.has_dissolve_map {
            self.dissolve.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    /// Radiance written into the voxel grid, premultiplied by opacity.
    /// `lambert` is the clamped cosine toward the light, 1 when no light is known.
    pub fn voxel_radiance(&self, lambert: f32) -> [f32; 4] {
        let alpha = self.opacity();
        let color = self.ambient + self.diffuse * lambert.clamp(0.0, 1.0);
        [
            color.x.clamp(0.0, 1.0) * alpha,
            color.y.clamp(0.0, 1.0) * alpha,
            color.z.clamp(0.0, 1.0) * alpha,
            alpha,
        ]
    }
}
