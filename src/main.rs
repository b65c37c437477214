use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use log::info;
use nalgebra::{Point3, Vector3};
use threadpool::ThreadPool;

use voxel_cone_tracing::camera::{deg2rad, Camera, OrbitCamera};
use voxel_cone_tracing::config::GiConfig;
use voxel_cone_tracing::gi::debug_view::render_debug_view;
use voxel_cone_tracing::gi::voxelizer::{SceneObject, SceneParams, SliceRasterizer};
use voxel_cone_tracing::gi::GiSystem;
use voxel_cone_tracing::object::{demo_room, MeshObject};
use voxel_cone_tracing::render_system::gpu_voxelizer::GpuVoxelizer;
use voxel_cone_tracing::render_system::preview::{render_preview, PreviewInputs, PreviewScene};
use voxel_cone_tracing::render_system::shadow_map::ShadowMap;
use voxel_cone_tracing::render_system::soft_raster::SoftwareVoxelizer;

const SHADOW_MAP_SIZE: u32 = 512;

/// Voxelizes a test room and writes a cone-traced preview and a view of the voxel volume.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON configuration file. Missing fields take their defaults.
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Voxelize on the GPU instead of the software rasterizer.
    #[arg(long)]
    gpu: bool,

    /// Directory the images are written to.
    #[arg(long, short = 'o', default_value = ".")]
    out: PathBuf,

    /// Log debug output.
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    use simplelog::LevelFilter::{Debug, Info, Off};
    simplelog::TermLogger::init(
        if args.verbose { Debug } else { Info },
        simplelog::ConfigBuilder::new()
            .set_target_level(Off)
            .set_location_level(Off)
            .build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    let config = match &args.config {
        Some(path) => GiConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => GiConfig::default(),
    };

    if args.gpu {
        run(&args, &config, GpuVoxelizer::headless()?)
    } else {
        run(&args, &config, SoftwareVoxelizer::new())
    }
}

fn run<R: SliceRasterizer>(args: &Args, config: &GiConfig, rasterizer: R) -> anyhow::Result<()> {
    let mut gi = GiSystem::new(config, rasterizer)?;

    let room: Vec<MeshObject> = demo_room(config.scene_scale);
    let objects: Vec<&dyn SceneObject> = room.iter().map(|o| o as &dyn SceneObject).collect();
    let light = Vector3::new(0.3, 1.0, 0.45).normalize();

    gi.voxelize_scene(&objects, &SceneParams::with_light(light))?;

    let shadow_map = ShadowMap::render(&objects, &light, config.scene_scale, SHADOW_MAP_SIZE)?;

    let mut camera = OrbitCamera::new(config.scene_scale * 2.2, deg2rad(15.0), deg2rad(90.0));
    camera.set_position(Point3::origin());

    let preview = &config.preview;
    let pool = ThreadPool::new(preview.threads.max(1));
    let inputs = Arc::new(PreviewInputs {
        scene: PreviewScene::gather(&objects),
        volume: gi.volume().clone(),
        lighting: *gi.lighting(),
        light_direction: Some(light),
        shadow_map: Some(shadow_map),
    });

    std::fs::create_dir_all(&args.out)?;

    let image = render_preview(&pool, inputs, &camera, preview.width, preview.height)?;
    let path = args.out.join("preview.png");
    image.save(&path)?;
    info!("wrote {}", path.display());

    let debug = render_debug_view(
        gi.volume(),
        &camera as &dyn Camera,
        preview.width,
        preview.height,
        preview.debug_mip,
    );
    let path = args.out.join("voxels.png");
    debug.save(&path)?;
    info!("wrote {}", path.display());

    Ok(())
}
