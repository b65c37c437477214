use std::sync::Arc;

use log::{debug, info};
use vulkano::{
    buffer::{Buffer, BufferContents, BufferCreateInfo, BufferUsage, Subbuffer},
    command_buffer::{
        allocator::StandardCommandBufferAllocator, AutoCommandBufferBuilder,
        ClearColorImageInfo, CommandBufferUsage, CopyImageToBufferInfo,
        PrimaryAutoCommandBuffer, PrimaryCommandBufferAbstract, RenderingAttachmentInfo,
        RenderingInfo,
    },
    device::{
        physical::PhysicalDeviceType, Device, DeviceCreateInfo, DeviceExtensions, Features,
        Queue, QueueCreateInfo, QueueFlags,
    },
    format::{ClearValue, Format, FormatFeatures},
    image::{
        view::{ImageView, ImageViewCreateInfo, ImageViewType},
        Image, ImageAspects, ImageCreateInfo, ImageSubresourceRange, ImageType, ImageUsage,
    },
    instance::{Instance, InstanceCreateFlags, InstanceCreateInfo},
    memory::allocator::{AllocationCreateInfo, MemoryTypeFilter, StandardMemoryAllocator},
    pipeline::{
        graphics::{
            color_blend::{
                AttachmentBlend, BlendFactor, BlendOp, ColorBlendAttachmentState, ColorBlendState,
            },
            depth_stencil::{CompareOp, DepthState, DepthStencilState},
            input_assembly::InputAssemblyState,
            multisample::MultisampleState,
            rasterization::{CullMode, RasterizationState},
            subpass::PipelineRenderingCreateInfo,
            vertex_input::{Vertex, VertexDefinition},
            viewport::{Viewport, ViewportState},
            GraphicsPipelineCreateInfo,
        },
        layout::PipelineDescriptorSetLayoutCreateInfo,
        DynamicState, GraphicsPipeline, Pipeline, PipelineLayout, PipelineShaderStageCreateInfo,
    },
    render_pass::{AttachmentLoadOp, AttachmentStoreOp},
    sync::GpuFuture,
    Version, VulkanLibrary,
};

use super::soft_raster::world_triangles;
use super::voxelize_shader::{fs, vs};
use crate::error::{gpu_err, GiError};
use crate::gi::axis::{Axis, OrthoFrustum};
use crate::gi::volume::{AxisCapture, Rgba8, VoxelGrid};
use crate::gi::voxelizer::{SceneObject, SceneParams, SliceRasterizer};

const CAPTURE_FORMAT: Format = Format::R8G8B8A8_UNORM;
const DEPTH_FORMAT: Format = Format::D16_UNORM;

/// World-space vertex with the radiance it deposits in the volume.
#[derive(Clone, Copy, Debug, PartialEq, BufferContents, Vertex)]
#[repr(C)]
pub struct VoxelVertex {
    #[format(R32G32B32_SFLOAT)]
    pub position: [f32; 3],
    #[format(R32G32B32A32_SFLOAT)]
    pub radiance: [f32; 4],
}

/// Flattens the scene into one world-space triangle list. Lighting is evaluated
/// per vertex, so one buffer serves every slice of every axis.
pub fn slice_vertices(objects: &[&dyn SceneObject], params: &SceneParams) -> Vec<VoxelVertex> {
    let mut vertices = vec![];
    for object in objects {
        let material = object.material();
        for tri in world_triangles(*object) {
            for i in 0..3 {
                let normal = tri.normals[i]
                    .try_normalize(1e-12)
                    .unwrap_or_else(|| tri.face_normal());
                vertices.push(VoxelVertex {
                    position: tri.positions[i].into(),
                    radiance: material.voxel_radiance(params.lambert(&normal)),
                });
            }
        }
    }
    vertices
}

/// Picks a device with a graphics queue that can do dynamic rendering. No surface is needed.
pub fn get_device_for_offscreen_rendering(
    instance: Arc<Instance>,
) -> Result<(Arc<Device>, Arc<Queue>), GiError> {
    let (physical_device, queue_family_index) = instance
        .enumerate_physical_devices()
        .map_err(gpu_err("enumerate physical devices"))?
        .filter(|p| p.api_version() >= Version::V1_3 || p.supported_extensions().khr_dynamic_rendering)
        .filter_map(|p| {
            p.queue_family_properties()
                .iter()
                .position(|q| q.queue_flags.intersects(QueueFlags::GRAPHICS))
                .map(|i| (p, i as u32))
        })
        .min_by_key(|(p, _)| match p.properties().device_type {
            PhysicalDeviceType::DiscreteGpu => 0,
            PhysicalDeviceType::IntegratedGpu => 1,
            PhysicalDeviceType::VirtualGpu => 2,
            PhysicalDeviceType::Cpu => 3,
            PhysicalDeviceType::Other => 4,
            _ => 5,
        })
        .ok_or_else(|| GiError::Gpu("no suitable physical device found".to_string()))?;

    let blendable = physical_device
        .format_properties(CAPTURE_FORMAT)
        .map_err(gpu_err("query capture format"))?
        .optimal_tiling_features
        .contains(FormatFeatures::COLOR_ATTACHMENT_BLEND | FormatFeatures::TRANSFER_SRC);
    if !blendable {
        return Err(GiError::Gpu(format!(
            "{CAPTURE_FORMAT:?} cannot be blended into on this device"
        )));
    }

    let mut device_extensions = DeviceExtensions::empty();
    if physical_device.api_version() < Version::V1_3 {
        device_extensions.khr_dynamic_rendering = true;
    }

    info!(
        "voxelizing on {} ({:?})",
        physical_device.properties().device_name,
        physical_device.properties().device_type
    );

    let (device, mut queues) = Device::new(
        physical_device,
        DeviceCreateInfo {
            enabled_extensions: device_extensions,
            enabled_features: Features {
                dynamic_rendering: true,
                ..Features::empty()
            },
            queue_create_infos: vec![QueueCreateInfo {
                queue_family_index,
                ..Default::default()
            }],
            ..Default::default()
        },
    )
    .map_err(gpu_err("create device"))?;

    let queue = queues
        .next()
        .ok_or_else(|| GiError::Gpu("device has no queue".to_string()))?;
    Ok((device, queue))
}

// per-axis render targets, rebuilt only when the resolution changes
struct CaptureTarget {
    resolution: u32,
    image: Arc<Image>,
    layers: Vec<Arc<ImageView>>,
    depth: Arc<ImageView>,
    readback: Subbuffer<[u8]>,
}

/// Renders each slice into one layer of an `N`-layer array image. `finish_axis`
/// submits the axis, waits, and reads the layers back.
pub struct GpuVoxelizer {
    queue: Arc<Queue>,
    memory_allocator: Arc<StandardMemoryAllocator>,
    command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
    pipeline: Arc<GraphicsPipeline>,
    target: Option<CaptureTarget>,
    axis: Option<Axis>,
    builder: Option<AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>>,
    // scene geometry for the axis being recorded
    vertex_buffer: Option<Subbuffer<[VoxelVertex]>>,
    vertices_uploaded: bool,
}

impl GpuVoxelizer {
    /// Creates an instance and device of its own.
    pub fn headless() -> Result<GpuVoxelizer, GiError> {
        let library = VulkanLibrary::new().map_err(gpu_err("load vulkan library"))?;
        let instance = Instance::new(
            library,
            InstanceCreateInfo {
                flags: InstanceCreateFlags::ENUMERATE_PORTABILITY,
                ..Default::default()
            },
        )
        .map_err(gpu_err("create instance"))?;
        let (device, queue) = get_device_for_offscreen_rendering(instance)?;
        GpuVoxelizer::new(device, queue)
    }

    pub fn new(device: Arc<Device>, queue: Arc<Queue>) -> Result<GpuVoxelizer, GiError> {
        let memory_allocator = Arc::new(StandardMemoryAllocator::new_default(device.clone()));
        let command_buffer_allocator = Arc::new(StandardCommandBufferAllocator::new(
            device.clone(),
            Default::default(),
        ));
        let pipeline = create_pipeline(device)?;
        Ok(GpuVoxelizer {
            queue,
            memory_allocator,
            command_buffer_allocator,
            pipeline,
            target: None,
            axis: None,
            builder: None,
            vertex_buffer: None,
            vertices_uploaded: false,
        })
    }

    fn create_target(&self, resolution: u32) -> Result<CaptureTarget, GiError> {
        let image = Image::new(
            self.memory_allocator.clone(),
            ImageCreateInfo {
                image_type: ImageType::Dim2d,
                format: CAPTURE_FORMAT,
                extent: [resolution, resolution, 1],
                array_layers: resolution,
                usage: ImageUsage::COLOR_ATTACHMENT
                    | ImageUsage::TRANSFER_SRC
                    | ImageUsage::TRANSFER_DST,
                ..Default::default()
            },
            AllocationCreateInfo::default(),
        )
        .map_err(gpu_err("create capture image"))?;

        let layers = (0..resolution)
            .map(|layer| {
                ImageView::new(
                    image.clone(),
                    ImageViewCreateInfo {
                        view_type: ImageViewType::Dim2d,
                        subresource_range: ImageSubresourceRange {
                            aspects: ImageAspects::COLOR,
                            mip_levels: 0..1,
                            array_layers: layer..layer + 1,
                        },
                        ..ImageViewCreateInfo::from_image(&image)
                    },
                )
                .map_err(gpu_err("create capture layer view"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let depth_image = Image::new(
            self.memory_allocator.clone(),
            ImageCreateInfo {
                image_type: ImageType::Dim2d,
                format: DEPTH_FORMAT,
                extent: [resolution, resolution, 1],
                usage: ImageUsage::DEPTH_STENCIL_ATTACHMENT,
                ..Default::default()
            },
            AllocationCreateInfo::default(),
        )
        .map_err(gpu_err("create depth image"))?;
        let depth = ImageView::new_default(depth_image).map_err(gpu_err("create depth view"))?;

        let n = resolution as u64;
        let readback = Buffer::new_slice::<u8>(
            self.memory_allocator.clone(),
            BufferCreateInfo {
                usage: BufferUsage::TRANSFER_DST,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_HOST
                    | MemoryTypeFilter::HOST_RANDOM_ACCESS,
                ..Default::default()
            },
            n * n * n * 4,
        )
        .map_err(gpu_err("create readback buffer"))?;

        debug!("allocated {resolution} layer capture target");
        Ok(CaptureTarget {
            resolution,
            image,
            layers,
            depth,
            readback,
        })
    }

    fn upload_vertices(
        &mut self,
        objects: &[&dyn SceneObject],
        params: &SceneParams,
    ) -> Result<(), GiError> {
        let vertices = slice_vertices(objects, params);
        self.vertex_buffer = if vertices.is_empty() {
            None
        } else {
            Some(
                Buffer::from_iter(
                    self.memory_allocator.clone(),
                    BufferCreateInfo {
                        usage: BufferUsage::VERTEX_BUFFER,
                        ..Default::default()
                    },
                    AllocationCreateInfo {
                        memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
                            | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
                        ..Default::default()
                    },
                    vertices,
                )
                .map_err(gpu_err("upload scene vertices"))?,
            )
        };
        self.vertices_uploaded = true;
        Ok(())
    }
}

fn create_pipeline(device: Arc<Device>) -> Result<Arc<GraphicsPipeline>, GiError> {
    let vs = vs::load(device.clone())
        .map_err(gpu_err("load vertex shader"))?
        .entry_point("main")
        .ok_or_else(|| GiError::Gpu("vertex shader has no main".to_string()))?;
    let fs = fs::load(device.clone())
        .map_err(gpu_err("load fragment shader"))?
        .entry_point("main")
        .ok_or_else(|| GiError::Gpu("fragment shader has no main".to_string()))?;

    let vertex_input_state = VoxelVertex::per_vertex()
        .definition(&vs.info().input_interface)
        .map_err(gpu_err("vertex definition"))?;

    let stages = [
        PipelineShaderStageCreateInfo::new(vs),
        PipelineShaderStageCreateInfo::new(fs),
    ];

    let layout = PipelineLayout::new(
        device.clone(),
        PipelineDescriptorSetLayoutCreateInfo::from_stages(&stages)
            .into_pipeline_layout_create_info(device.clone())
            .map_err(gpu_err("pipeline layout info"))?,
    )
    .map_err(gpu_err("pipeline layout"))?;

    let subpass = PipelineRenderingCreateInfo {
        color_attachment_formats: vec![Some(CAPTURE_FORMAT)],
        depth_attachment_format: Some(DEPTH_FORMAT),
        ..Default::default()
    };

    let additive = AttachmentBlend {
        src_color_blend_factor: BlendFactor::One,
        dst_color_blend_factor: BlendFactor::One,
        color_blend_op: BlendOp::Add,
        src_alpha_blend_factor: BlendFactor::One,
        dst_alpha_blend_factor: BlendFactor::One,
        alpha_blend_op: BlendOp::Add,
    };

    GraphicsPipeline::new(
        device,
        None,
        GraphicsPipelineCreateInfo {
            stages: stages.into_iter().collect(),
            vertex_input_state: Some(vertex_input_state),
            input_assembly_state: Some(InputAssemblyState::default()),
            viewport_state: Some(ViewportState::default()),
            rasterization_state: Some(RasterizationState {
                cull_mode: CullMode::None,
                ..Default::default()
            }),
            depth_stencil_state: Some(DepthStencilState {
                depth: Some(DepthState {
                    write_enable: true,
                    compare_op: CompareOp::Less,
                }),
                ..Default::default()
            }),
            multisample_state: Some(MultisampleState::default()),
            color_blend_state: Some(ColorBlendState::with_attachment_states(
                1,
                ColorBlendAttachmentState {
                    blend: Some(additive),
                    ..Default::default()
                },
            )),
            dynamic_state: [DynamicState::Viewport].into_iter().collect(),
            subpass: Some(subpass.into()),
            ..GraphicsPipelineCreateInfo::layout(layout)
        },
    )
    .map_err(gpu_err("create voxelization pipeline"))
}

impl SliceRasterizer for GpuVoxelizer {
    fn begin_axis(&mut self, grid: &VoxelGrid, axis: Axis) -> Result<(), GiError> {
        let resolution = grid.resolution();
        if self.target.as_ref().map(|t| t.resolution) != Some(resolution) {
            self.target = Some(self.create_target(resolution)?);
        }
        let image = self
            .target
            .as_ref()
            .map(|t| t.image.clone())
            .ok_or_else(|| GiError::Gpu("capture target missing".to_string()))?;

        let mut builder = AutoCommandBufferBuilder::primary(
            self.command_buffer_allocator.as_ref(),
            self.queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .map_err(gpu_err("begin command buffer"))?;
        // layers whose slice gets skipped must still read back as empty
        builder
            .clear_color_image(ClearColorImageInfo::image(image))
            .map_err(gpu_err("clear capture image"))?;

        self.builder = Some(builder);
        self.axis = Some(axis);
        self.vertices_uploaded = false;
        Ok(())
    }

    fn render_slice(
        &mut self,
        frustum: &OrthoFrustum,
        objects: &[&dyn SceneObject],
        params: &SceneParams,
    ) -> Result<(), GiError> {
        let incomplete = |reason: String| GiError::RenderTargetIncomplete {
            axis: frustum.axis,
            slice: frustum.slice,
            reason,
        };
        if !self.vertices_uploaded {
            self.upload_vertices(objects, params)?;
        }
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| incomplete("no capture target bound".to_string()))?;
        let layer = target
            .layers
            .get(frustum.slice as usize)
            .filter(|_| target.resolution == frustum.resolution)
            .ok_or_else(|| incomplete("slice does not fit the bound capture target".to_string()))?
            .clone();
        let depth = target.depth.clone();
        let builder = self
            .builder
            .as_mut()
            .ok_or_else(|| incomplete("no command buffer is recording".to_string()))?;

        let n = frustum.resolution as f32;
        builder
            .begin_rendering(RenderingInfo {
                color_attachments: vec![Some(RenderingAttachmentInfo {
                    load_op: AttachmentLoadOp::Load,
                    store_op: AttachmentStoreOp::Store,
                    ..RenderingAttachmentInfo::image_view(layer)
                })],
                depth_attachment: Some(RenderingAttachmentInfo {
                    load_op: AttachmentLoadOp::Clear,
                    store_op: AttachmentStoreOp::DontCare,
                    clear_value: Some(ClearValue::Depth(1.0)),
                    ..RenderingAttachmentInfo::image_view(depth)
                }),
                ..Default::default()
            })
            .map_err(|e| incomplete(format!("{e:?}")))?;

        builder
            .set_viewport(
                0,
                [Viewport {
                    offset: [0.0, 0.0],
                    extent: [n, n],
                    depth_range: 0.0..=1.0,
                }]
                .into_iter()
                .collect(),
            )
            .map_err(gpu_err("set viewport"))?
            .bind_pipeline_graphics(self.pipeline.clone())
            .map_err(gpu_err("bind pipeline"))?
            .push_constants(
                self.pipeline.layout().clone(),
                0,
                vs::Slice {
                    view_projection: frustum.view_projection().into(),
                },
            )
            .map_err(gpu_err("push slice constants"))?;

        if let Some(vertex_buffer) = self.vertex_buffer.clone() {
            let count = vertex_buffer.len() as u32;
            builder
                .bind_vertex_buffers(0, vertex_buffer)
                .map_err(gpu_err("bind vertices"))?
                .draw(count, 1, 0, 0)
                .map_err(gpu_err("draw slice"))?;
        }

        builder.end_rendering().map_err(gpu_err("end rendering"))?;
        Ok(())
    }

    fn finish_axis(&mut self) -> Result<AxisCapture, GiError> {
        let axis = self.axis.take().ok_or_else(|| GiError::InvalidParameter {
            name: "axis",
            reason: "finish_axis called before begin_axis".to_string(),
        })?;
        let mut builder = self
            .builder
            .take()
            .ok_or_else(|| GiError::Gpu("no command buffer is recording".to_string()))?;
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| GiError::Gpu("capture target missing".to_string()))?;

        builder
            .copy_image_to_buffer(CopyImageToBufferInfo::image_buffer(
                target.image.clone(),
                target.readback.clone(),
            ))
            .map_err(gpu_err("copy capture to host"))?;

        builder
            .build()
            .map_err(gpu_err("build command buffer"))?
            .execute(self.queue.clone())
            .map_err(gpu_err("submit slices"))?
            .then_signal_fence_and_flush()
            .map_err(gpu_err("flush"))?
            .wait(None)
            .map_err(gpu_err("wait for slices"))?;

        let bytes = target.readback.read().map_err(gpu_err("map readback"))?;
        let texels: Vec<Rgba8> = bytes
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();
        self.vertex_buffer = None;
        Ok(AxisCapture::from_texels(axis, target.resolution, texels))
    }
}
