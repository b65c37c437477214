use nalgebra::{Point3, Translation3, Vector3};
use pretty_assertions::assert_eq;

use voxel_cone_tracing::config::GiConfig;
use voxel_cone_tracing::gi::cone_trace::{LightInputs, SurfacePoint};
use voxel_cone_tracing::gi::material::MaterialSample;
use voxel_cone_tracing::gi::volume::EMPTY;
use voxel_cone_tracing::gi::voxelizer::{SceneObject, SceneParams};
use voxel_cone_tracing::gi::GiSystem;
use voxel_cone_tracing::object::{cuboid, facing, quad, MeshObject};
use voxel_cone_tracing::render_system::soft_raster::SoftwareVoxelizer;

fn config(resolution: u32, scene_scale: f32) -> GiConfig {
    GiConfig {
        resolution,
        scene_scale,
        ..Default::default()
    }
}

#[test]
fn empty_scene_gives_an_empty_volume_at_every_level() {
    let mut gi = GiSystem::new(&config(16, 100.0), SoftwareVoxelizer::new()).unwrap();
    let volume = gi.voxelize_scene(&[], &SceneParams::default()).unwrap();
    assert_eq!(volume.mip_count(), 5);
    for level in volume.levels() {
        assert!(level.texels.iter().all(|t| *t == EMPTY));
    }
}

#[test]
fn emissive_quad_fills_exactly_one_z_slice() {
    let n = 64;
    let mut gi = GiSystem::new(&config(n, 3000.0), SoftwareVoxelizer::new()).unwrap();
    let panel = MeshObject::new(
        quad(1000.0),
        Translation3::identity().to_homogeneous(),
        MaterialSample::emissive([1.0, 0.5, 0.25]),
    );
    let objects: [&dyn SceneObject; 1] = [&panel];
    let volume = gi.voxelize_scene(&objects, &SceneParams::default()).unwrap();

    let mut filled = 0;
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let texel = volume.get([x, y, z]);
                if texel[3] != 0 {
                    assert_eq!(z, 31, "voxel {x},{y},{z} should be empty");
                    filled += 1;
                }
            }
        }
    }
    // the quad spans a third of the grid on each side
    assert!(filled > 20 * 20, "only {filled} voxels filled");
    assert_eq!(volume.get([40, 32, 31]), [255, 128, 64, 255]);
    assert_eq!(volume.get([40, 32, 32]), EMPTY);
    assert!(volume.level(1).get(20, 16, 15)[3] > 0);
}

#[test]
fn voxelizing_twice_does_not_accumulate() {
    let mut gi = GiSystem::new(&config(16, 10.0), SoftwareVoxelizer::new()).unwrap();
    let panel = MeshObject::new(
        quad(4.0),
        Translation3::new(0.0, 0.0, 2.2).to_homogeneous(),
        MaterialSample::diffuse([0.4, 0.4, 0.4]),
    );
    let objects: [&dyn SceneObject; 1] = [&panel];
    let params = SceneParams::with_light(Vector3::z());
    let first = gi.voxelize_scene(&objects, &params).unwrap().clone();
    let second = gi.voxelize_scene(&objects, &params).unwrap();
    assert_eq!(&first, second);
}

#[test]
fn lighting_changes_apply_without_revoxelizing() {
    let mut gi = GiSystem::new(&config(16, 10.0), SoftwareVoxelizer::new()).unwrap();
    let floor = MeshObject::new(
        quad(8.0),
        facing(Point3::new(0.0, -2.0, 0.0), Vector3::y()),
        MaterialSample::emissive([1.0, 1.0, 1.0]),
    );
    let objects: [&dyn SceneObject; 1] = [&floor];
    gi.voxelize_scene(&objects, &SceneParams::default()).unwrap();

    // a point above the floor facing down at it
    let surface = SurfacePoint {
        position: Point3::new(0.0, 0.5, 0.0),
        normal: -Vector3::y(),
        tangent: None,
        view_dir: -Vector3::y(),
        bump_slope: None,
        material: MaterialSample::diffuse([1.0, 1.0, 1.0]),
    };
    let light = LightInputs {
        direction: Some(Vector3::y()),
        visibility: Some(0.0),
    };
    let before = gi.shade(&surface, &light);
    assert!(before.indirect_diffuse.x > 0.0);

    let volume_before = gi.volume().clone();
    gi.lighting_mut().indirect_multiplier = 0.0;
    let after = gi.shade(&surface, &light);
    assert_eq!(after.indirect_diffuse, Vector3::zeros());
    assert_eq!(gi.volume(), &volume_before);
}

#[test]
fn lit_floor_with_nothing_above_is_not_self_occluded() {
    let mut gi = GiSystem::new(&config(16, 10.0), SoftwareVoxelizer::new()).unwrap();
    // y = -2.5 is a cell boundary
    let floor = MeshObject::new(
        quad(8.0),
        facing(Point3::new(0.0, -2.5, 0.0), Vector3::y()),
        MaterialSample::diffuse([0.6, 0.6, 0.6]),
    );
    let objects: [&dyn SceneObject; 1] = [&floor];
    let light = Vector3::y();
    let volume = gi.voxelize_scene(&objects, &SceneParams::with_light(light)).unwrap();

    // captured into the cell underneath, one below the cell the point falls in
    assert_eq!(volume.get([8, 5, 8]), [153, 153, 153, 255]);
    assert_eq!(volume.get([8, 6, 8]), EMPTY);
    assert_eq!(
        volume.grid().world_to_voxel(&Point3::new(0.0, -2.5, 0.0)),
        Some([8, 6, 8])
    );

    let surface = SurfacePoint {
        position: Point3::new(0.3, -2.5, -0.2),
        normal: Vector3::y(),
        tangent: None,
        view_dir: Vector3::y(),
        bump_slope: None,
        material: MaterialSample::diffuse([0.6, 0.6, 0.6]),
    };
    let shaded = gi.shade(
        &surface,
        &LightInputs {
            direction: Some(light),
            visibility: Some(1.0),
        },
    );
    assert!(shaded.occlusion > 0.9, "occlusion {}", shaded.occlusion);
    assert!(shaded.indirect_diffuse.x < 0.1, "indirect {:?}", shaded.indirect_diffuse);
}

#[test]
fn box_faces_land_where_the_grid_puts_them() {
    let mut gi = GiSystem::new(&config(16, 10.0), SoftwareVoxelizer::new()).unwrap();
    let center = Point3::new(3.1, -2.2, 1.7);
    let dims = Vector3::new(2.0, 2.4, 2.6);
    let block = MeshObject::new(
        cuboid(center, dims),
        Translation3::identity().to_homogeneous(),
        MaterialSample::emissive([1.0, 1.0, 1.0]),
    );
    let objects: [&dyn SceneObject; 1] = [&block];
    let volume = gi.voxelize_scene(&objects, &SceneParams::default()).unwrap();
    let grid = *volume.grid();
    let voxel = |p: Point3<f32>| grid.world_to_voxel(&p).unwrap();

    let h = dims * 0.5;
    let faces = [
        (Vector3::new(h.x, 0.0, 0.0), Vector3::x() * grid.cell_size()),
        (Vector3::new(-h.x, 0.0, 0.0), -Vector3::x() * grid.cell_size()),
        (Vector3::new(0.0, h.y, 0.0), Vector3::y() * grid.cell_size()),
        (Vector3::new(0.0, -h.y, 0.0), -Vector3::y() * grid.cell_size()),
    ];
    for (offset, outward) in faces {
        let on_face = center + offset;
        assert_eq!(volume.get(voxel(on_face)), [255, 255, 255, 255], "face at {on_face}");
        assert_eq!(volume.get(voxel(on_face + outward)), EMPTY, "outside {on_face}");
    }
    // hollow inside
    assert_eq!(voxel(center), [10, 6, 9]);
    assert_eq!(volume.get([10, 6, 9]), EMPTY);
}

#[test]
fn bad_configuration_is_rejected() {
    assert!(GiSystem::new(&config(48, 10.0), SoftwareVoxelizer::new()).is_err());
    assert!(GiSystem::new(&config(16, -1.0), SoftwareVoxelizer::new()).is_err());
}
