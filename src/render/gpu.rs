use std::collections::HashMap;
use std::mem::size_of;

use bytemuck::{bytes_of, Pod, Zeroable};
use log::{debug, info, warn};
use wgpu::util::DeviceExt;

use crate::drawable::{BufferHandle, GeometryUploader};
use crate::error::ViewerError;
use crate::scene::{DrawCommand, Frame, Submission};
use crate::scheduler::FrameSink;

use super::shader::FLAT_COLOR;

/// wgpu renderer for a window surface or a browser canvas.
///
/// Owns every vertex and index buffer handed out through
/// [`GeometryUploader`]; buffers live as long as the renderer.
pub struct GpuRenderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    pipelines: Pipelines,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    object_layout: wgpu::BindGroupLayout,
    buffers: Vec<wgpu::Buffer>,
    /// Triangle index buffer to its per-triangle outline buffer.
    outlines: HashMap<BufferHandle, BufferHandle>,
}

struct Pipelines {
    fill: wgpu::RenderPipeline,
    lines: wgpu::RenderPipeline,
    outline: wgpu::RenderPipeline,
}

impl GpuRenderer {
    /// Acquires adapter, device and surface. Any failure here is
    /// [`ViewerError::ContextUnavailable`].
    pub async fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<Self, ViewerError> {
        if width == 0 || height == 0 {
            return Err(ViewerError::ContextUnavailable("surface has zero area".into()));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: backends(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance
            .create_surface(target)
            .map_err(|err| ViewerError::ContextUnavailable(format!("surface: {err}")))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|err| ViewerError::ContextUnavailable(format!("no GPU adapter: {err}")))?;
        let adapter_info = adapter.get_info();
        info!(
            "using adapter {} ({:?})",
            adapter_info.name, adapter_info.backend
        );

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("viewer-device"),
            required_features: wgpu::Features::empty(),
            required_limits: required_limits(&adapter),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .map_err(|err| ViewerError::ContextUnavailable(format!("device: {err}")))?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Colours are authored as display values, so prefer a non-sRGB target.
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| !format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| {
                ViewerError::ContextUnavailable("surface reports no texture formats".into())
            })?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, width, height);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("flat-color-shader"),
            source: wgpu::ShaderSource::Wgsl(FLAT_COLOR.into()),
        });

        let global_layout =
            uniform_layout(&device, "global-bind-layout", size_of::<GlobalUniform>());
        let object_layout =
            uniform_layout(&device, "object-bind-layout", size_of::<ObjectConstants>());

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("viewer-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &object_layout],
            push_constant_ranges: &[],
        });

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let pipeline = |label: &str, topology, strip_index_format| {
            create_pipeline(
                &device,
                &pipeline_layout,
                &shader,
                surface_format,
                label,
                wgpu::PrimitiveState {
                    topology,
                    strip_index_format,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    ..Default::default()
                },
            )
        };
        let pipelines = Pipelines {
            fill: pipeline("fill-pipeline", wgpu::PrimitiveTopology::TriangleList, None),
            lines: pipeline("line-pipeline", wgpu::PrimitiveTopology::LineList, None),
            outline: pipeline(
                "outline-pipeline",
                wgpu::PrimitiveTopology::LineStrip,
                Some(wgpu::IndexFormat::Uint32),
            ),
        };

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth,
            pipelines,
            global_buffer,
            global_bind_group,
            object_layout,
            buffers: Vec::new(),
            outlines: HashMap::new(),
        })
    }

    /// Reconfigures the surface and depth buffer. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, width, height);
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn render(&mut self, frame: &Frame) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("viewer-encoder"),
            });

        let globals = GlobalUniform {
            view: frame.view.to_cols_array_2d(),
            projection: frame.projection.to_cols_array_2d(),
        };
        self.queue
            .write_buffer(&self.global_buffer, 0, bytes_of(&globals));

        // Per-command uniforms are created up front so the pass can borrow them.
        let bind_groups: Vec<wgpu::BindGroup> = frame
            .commands
            .iter()
            .map(|command| self.object_bind_group(command))
            .collect();

        let clear = frame.clear_color.as_dvec4();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("main-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: clear.x,
                        g: clear.y,
                        b: clear.z,
                        a: clear.w,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_bind_group(0, &self.global_bind_group, &[]);

        for (command, bind_group) in frame.commands.iter().zip(&bind_groups) {
            let drawable = command.drawable;
            let Some(vertices) = self.buffer(drawable.vertices()) else {
                warn!("{} has no vertex buffer", command.kind.label());
                continue;
            };
            pass.set_vertex_buffer(0, vertices.slice(..));
            pass.set_bind_group(1, bind_group, &[]);

            match command.submission {
                Submission::Triangles { elements } | Submission::Lines { elements } => {
                    let pipeline = match command.submission {
                        Submission::Lines { .. } => &self.pipelines.lines,
                        _ => &self.pipelines.fill,
                    };
                    pass.set_pipeline(pipeline);
                    match drawable.indices().and_then(|handle| self.buffer(handle)) {
                        Some(indices) => {
                            pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                            pass.draw_indexed(0..elements, 0, 0..1);
                        }
                        None => pass.draw(0..elements, 0..1),
                    }
                }
                Submission::TriangleOutlines { triangles } => {
                    let outline = drawable
                        .indices()
                        .and_then(|handle| self.outlines.get(&handle))
                        .and_then(|&handle| self.buffer(handle));
                    let Some(outline) = outline else {
                        debug!("{} has no outline indices", command.kind.label());
                        continue;
                    };
                    pass.set_pipeline(&self.pipelines.outline);
                    pass.set_index_buffer(outline.slice(..), wgpu::IndexFormat::Uint32);
                    for triangle in 0..triangles {
                        let first = triangle * OUTLINE_STRIDE;
                        pass.draw_indexed(first..first + OUTLINE_STRIDE, 0, 0..1);
                    }
                }
            }
        }

        drop(pass);
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn object_bind_group(&self, command: &DrawCommand) -> wgpu::BindGroup {
        let constants = ObjectConstants {
            model: command.model_transform().to_cols_array_2d(),
            color: command.color.to_array(),
        };
        let object_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("object-uniform"),
                contents: bytes_of(&constants),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("object-bind-group"),
            layout: &self.object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: object_buffer.as_entire_binding(),
            }],
        })
    }

    fn buffer(&self, handle: BufferHandle) -> Option<&wgpu::Buffer> {
        self.buffers.get(handle.index() as usize)
    }

    fn push_buffer(&mut self, label: String, contents: &[u8], usage: wgpu::BufferUsages) -> BufferHandle {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&label),
                contents,
                usage,
            });
        self.buffers.push(buffer);
        BufferHandle::new(self.buffers.len() as u32 - 1)
    }
}

impl GeometryUploader for GpuRenderer {
    fn upload_vertices(&mut self, label: &str, positions: &[f32]) -> BufferHandle {
        self.push_buffer(
            format!("{label}-vertices"),
            bytemuck::cast_slice(positions),
            wgpu::BufferUsages::VERTEX,
        )
    }

    fn upload_indices(&mut self, label: &str, indices: &[u32]) -> BufferHandle {
        let handle = self.push_buffer(
            format!("{label}-indices"),
            bytemuck::cast_slice(indices),
            wgpu::BufferUsages::INDEX,
        );
        if indices.len() % 3 == 0 {
            let outline = outline_indices(indices);
            let outline_handle = self.push_buffer(
                format!("{label}-outline"),
                bytemuck::cast_slice(&outline),
                wgpu::BufferUsages::INDEX,
            );
            self.outlines.insert(handle, outline_handle);
        }
        handle
    }
}

impl FrameSink for GpuRenderer {
    fn submit(&mut self, frame: &Frame) -> Result<(), ViewerError> {
        match self.render(frame) {
            Ok(()) => Ok(()),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (width, height) = self.size();
                self.resize(width, height);
                Ok(())
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(ViewerError::GpuOutOfMemory),
            Err(err) => {
                warn!("surface unavailable ({err}); retrying next frame");
                Ok(())
            }
        }
    }
}

/// Indices per closed triangle outline in a line strip.
const OUTLINE_STRIDE: u32 = 4;

/// `a b c` becomes `a b c a`, one closed strip per triangle.
pub(crate) fn outline_indices(indices: &[u32]) -> Vec<u32> {
    indices
        .chunks_exact(3)
        .flat_map(|tri| [tri[0], tri[1], tri[2], tri[0]])
        .collect()
}

#[cfg(target_arch = "wasm32")]
fn backends() -> wgpu::Backends {
    wgpu::Backends::GL | wgpu::Backends::BROWSER_WEBGPU
}

#[cfg(not(target_arch = "wasm32"))]
fn backends() -> wgpu::Backends {
    wgpu::Backends::PRIMARY
}

#[cfg(target_arch = "wasm32")]
fn required_limits(adapter: &wgpu::Adapter) -> wgpu::Limits {
    wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits())
}

#[cfg(not(target_arch = "wasm32"))]
fn required_limits(_adapter: &wgpu::Adapter) -> wgpu::Limits {
    wgpu::Limits::default()
}

fn uniform_layout(device: &wgpu::Device, label: &str, size: usize) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(size as u64),
            },
            count: None,
        }],
    })
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    label: &str,
    primitive: wgpu::PrimitiveState,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: (3 * size_of::<f32>()) as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x3,
                    offset: 0,
                    shader_location: 0,
                }],
            }],
        },
        primitive,
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DepthBuffer::FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GlobalUniform {
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ObjectConstants {
    model: [[f32; 4]; 4],
    color: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outlines_close_every_triangle() {
        let outline = outline_indices(&[0, 1, 2, 0, 2, 3]);
        assert_eq!(outline, vec![0, 1, 2, 0, 0, 2, 3, 0]);
        assert_eq!(outline.len() as u32, 2 * OUTLINE_STRIDE);
    }

    #[test]
    fn uniform_layouts_are_sixteen_byte_aligned() {
        assert_eq!(size_of::<GlobalUniform>() % 16, 0);
        assert_eq!(size_of::<ObjectConstants>() % 16, 0);
    }
}
