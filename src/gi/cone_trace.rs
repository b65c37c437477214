use nalgebra::{Point3, Vector2, Vector3, Vector4};

use super::material::MaterialSample;
use super::volume::Volume;
use crate::config::LightingParams;

/// Maximum march length in voxel units.
pub const MAX_TRACE_VOXELS: f32 = 50.0;
/// Accumulated opacity past which a cone counts as blocked.
pub const OCCLUDED_ALPHA: f32 = 0.95;
/// tan(30 degrees): the six diffuse cones are 60 degrees wide.
pub const DIFFUSE_TAN_HALF_ANGLE: f32 = 0.577;
/// About 8 degrees wide.
pub const SPECULAR_TAN_HALF_ANGLE: f32 = 0.07;

// a non-positive step would never advance
const MIN_STEP_SIZE: f32 = 0.01;

/// Something a cone can be marched through.
pub trait RadianceField {
    /// Premultiplied color and opacity at `p`, prefiltered to level `lod`.
    fn sample(&self, p: &Point3<f32>, lod: f32) -> Vector4<f32>;

    /// Base step length and surface offset, in world units.
    fn voxel_size(&self) -> f32;

    fn max_lod(&self) -> f32;
}

impl RadianceField for Volume {
    fn sample(&self, p: &Point3<f32>, lod: f32) -> Vector4<f32> {
        Volume::sample(self, p, lod)
    }

    fn voxel_size(&self) -> f32 {
        self.grid().voxel_size()
    }

    fn max_lod(&self) -> f32 {
        (self.mip_count() - 1) as f32
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cone {
    // tangent space for diffuse cones: x tangent, y normal, z bitangent
    pub direction: Vector3<f32>,
    pub tan_half_angle: f32,
    pub weight: f32,
}

/// The six hemisphere cones: one along the normal and a ring of five
/// raised 50 degrees above the tangent plane, 72 degrees apart.
pub fn diffuse_cones() -> [Cone; 6] {
    let elevation = 50.0f32.to_radians();
    let ring = |i: usize| {
        let azimuth = (72.0 * i as f32).to_radians();
        Cone {
            direction: Vector3::new(
                elevation.cos() * azimuth.cos(),
                elevation.sin(),
                elevation.cos() * azimuth.sin(),
            ),
            tan_half_angle: DIFFUSE_TAN_HALF_ANGLE,
            weight: 0.15,
        }
    };
    [
        Cone {
            direction: Vector3::new(0.0, 1.0, 0.0),
            tan_half_angle: DIFFUSE_TAN_HALF_ANGLE,
            weight: 0.25,
        },
        ring(0),
        ring(1),
        ring(2),
        ring(3),
        ring(4),
    ]
}

/// Orthonormal frame around a surface normal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TangentFrame {
    pub tangent: Vector3<f32>,
    pub normal: Vector3<f32>,
    pub bitangent: Vector3<f32>,
}

impl TangentFrame {
    /// Uses `tangent` when it is usable, otherwise picks any perpendicular.
    pub fn new(normal: Vector3<f32>, tangent: Option<Vector3<f32>>) -> TangentFrame {
        let normal = normal.normalize();
        let fallback = if normal.x.abs() < 0.9 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let hint = tangent.unwrap_or(fallback);
        // Gram-Schmidt against the normal
        let mut t = hint - normal * normal.dot(&hint);
        if t.norm_squared() < 1e-8 {
            t = fallback - normal * normal.dot(&fallback);
        }
        let tangent = t.normalize();
        let bitangent = tangent.cross(&normal);
        TangentFrame {
            tangent,
            normal,
            bitangent,
        }
    }

    pub fn to_world(&self, v: &Vector3<f32>) -> Vector3<f32> {
        (self.tangent * v.x + self.normal * v.y + self.bitangent * v.z).normalize()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConeSample {
    pub color: Vector3<f32>,
    pub alpha: f32,
    pub steps: u32,
}

/// Footprint diameter at `distance` along a cone, never below one voxel.
pub fn cone_diameter(tan_half_angle: f32, distance: f32, voxel_size: f32) -> f32 {
    (2.0 * tan_half_angle * distance).max(voxel_size)
}

/// Mip level whose voxels match `diameter`, clamped into `[0, max_lod]`.
pub fn mip_level(diameter: f32, voxel_size: f32, max_lod: f32) -> f32 {
    let lod = (diameter / voxel_size).log2();
    if lod.is_finite() {
        lod.clamp(0.0, max_lod)
    } else {
        0.0
    }
}

/// Upper bound on march iterations for a given step size.
pub fn max_steps(step_size: f32) -> u32 {
    (MAX_TRACE_VOXELS / step_size.max(MIN_STEP_SIZE)).ceil() as u32
}

/// Marches one cone starting a voxel above `origin` along `normal`.
pub fn trace_cone<F: RadianceField + ?Sized>(
    field: &F,
    origin: &Point3<f32>,
    normal: &Vector3<f32>,
    direction: &Vector3<f32>,
    tan_half_angle: f32,
    step_size: f32,
) -> ConeSample {
    let voxel = field.voxel_size();
    let max_lod = field.max_lod();
    let max_distance = MAX_TRACE_VOXELS * voxel;
    let step_size = step_size.max(MIN_STEP_SIZE);
    let step_limit = max_steps(step_size);
    let start = origin + normal * voxel;
    let direction = direction.normalize();

    let mut color = Vector3::zeros();
    let mut alpha = 0.0f32;
    let mut distance = 0.0f32;
    let mut steps = 0;

    while distance < max_distance && steps < step_limit {
        let diameter = cone_diameter(tan_half_angle, distance, voxel);
        let lod = mip_level(diameter, voxel, max_lod);
        let sample = field.sample(&(start + direction * distance), lod);

        let transmittance = 1.0 - alpha;
        color += sample.xyz() * transmittance;
        alpha += sample.w * transmittance;
        steps += 1;

        if alpha > OCCLUDED_ALPHA {
            break;
        }
        distance += diameter * step_size;
    }

    ConeSample {
        color,
        alpha,
        steps,
    }
}

/// A visible point handed to the shading pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfacePoint {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
    pub tangent: Option<Vector3<f32>>,
    // unit vector from the surface toward the eye
    pub view_dir: Vector3<f32>,
    // tangent-space height gradient, when the material has a bump map
    pub bump_slope: Option<Vector2<f32>>,
    pub material: MaterialSample,
}

/// Externally supplied light state. Missing pieces mean fully lit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LightInputs {
    // unit vector toward the light
    pub direction: Option<Vector3<f32>>,
    // shadow map result in [0, 1]
    pub visibility: Option<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadedSurface {
    pub indirect_diffuse: Vector3<f32>,
    pub indirect_specular: Vector3<f32>,
    pub direct_diffuse: f32,
    pub direct_specular: Vector3<f32>,
    // 1 is unoccluded
    pub occlusion: f32,
    pub radiance: Vector3<f32>,
}

fn shading_frame(surface: &SurfacePoint, params: &LightingParams) -> TangentFrame {
    let frame = TangentFrame::new(surface.normal, surface.tangent);
    match surface.bump_slope {
        Some(slope) if surface.material.has_bump_map => {
            let tilt = (frame.tangent * slope.x + frame.bitangent * slope.y) * params.bump_intensity;
            let bumped = frame.normal - tilt;
            if bumped.norm_squared() > 1e-8 {
                TangentFrame::new(bumped, Some(frame.tangent))
            } else {
                frame
            }
        }
        _ => frame,
    }
}

fn reflect(incident: &Vector3<f32>, normal: &Vector3<f32>) -> Vector3<f32> {
    incident - normal * 2.0 * normal.dot(incident)
}

/// Direct plus cone-traced indirect lighting for one surface point.
pub fn shade_surface<F: RadianceField + ?Sized>(
    field: &F,
    params: &LightingParams,
    surface: &SurfacePoint,
    light: &LightInputs,
) -> ShadedSurface {
    let frame = shading_frame(surface, params);
    let n = frame.normal;
    let material = &surface.material;

    let mut indirect = Vector3::zeros();
    let mut occluded = 0.0;
    for cone in diffuse_cones() {
        let direction = frame.to_world(&cone.direction);
        let traced = trace_cone(
            field,
            &surface.position,
            &n,
            &direction,
            cone.tan_half_angle,
            params.cone_step_size,
        );
        indirect += traced.color * cone.weight;
        occluded += traced.alpha * cone.weight;
    }
    let occlusion = (1.0 - params.occlusion_multiplier * occluded).clamp(0.0, 1.0);
    let indirect_diffuse = indirect * params.indirect_multiplier;

    let view = surface.view_dir.normalize();
    let reflected = reflect(&-view, &n);
    let specular = trace_cone(
        field,
        &surface.position,
        &n,
        &reflected,
        SPECULAR_TAN_HALF_ANGLE,
        params.cone_step_size,
    );
    let indirect_specular =
        specular.color.component_mul(&material.specular) * params.specular_multiplier * occlusion;

    let visibility = light.visibility.unwrap_or(1.0).clamp(0.0, 1.0);
    let (lambert, direct_specular) = match light.direction {
        Some(l) => {
            let l = l.normalize();
            let half = (l + view).normalize();
            let highlight = n.dot(&half).max(0.0).powf(material.specular_exponent.max(1.0));
            (
                n.dot(&l).max(0.0),
                material.specular * highlight * visibility * params.direct_multiplier,
            )
        }
        None => (1.0, Vector3::zeros()),
    };
    let direct_diffuse = lambert * visibility * params.direct_multiplier;

    let diffuse = material
        .diffuse
        .component_mul(&indirect_diffuse.add_scalar(direct_diffuse))
        * occlusion;
    let radiance = material.ambient + diffuse + direct_specular + indirect_specular;

    ShadedSurface {
        indirect_diffuse,
        indirect_specular,
        direct_diffuse,
        direct_specular,
        occlusion,
        radiance,
    }
}
