//! wgpu implementation of the shading backend
//!
//! Every named uniform lands in one [`DrawUniform`] block. Draw calls are
//! recorded into their own render pass and submitted immediately, because
//! the renderer overwrites the same vertex buffer between draws and queue
//! writes only order against submissions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cgmath::{Matrix4, SquareMatrix};
use wgpu::*;

use super::backend::{uniforms, BufferHandle, Primitive, ShadingBackend, TextureHandle};
use crate::gfx::resources::material::TextureSlot;
use crate::gfx::resources::TextureResource;
use crate::gfx::scene::transform::to_cols_array;
use crate::gfx::scene::Vertex;
use crate::wgpu_utils::{binding_types, ArrayBuffer, UniformBuffer};

/// Extra uniform the renderer does not send; set by the camera owner
pub const VIEW_PROJECTION: &str = "u_viewProjection";

/// GPU mirror of the named uniforms
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniform {
    pub view_proj: [[f32; 4]; 4],
    pub local_to_world: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub flat_shading: u32,
    pub has_albedo_map: u32,
    pub has_metallic_map: u32,
    pub has_roughness_map: u32,
    pub has_ao_map: u32,
    pub has_normal_map: u32,
}

impl Default for DrawUniform {
    fn default() -> Self {
        let identity = to_cols_array(&Matrix4::identity());
        Self {
            view_proj: identity,
            local_to_world: identity,
            base_color: [0.8, 0.8, 0.8, 1.0],
            metallic: 0.0,
            roughness: 0.5,
            flat_shading: 0,
            has_albedo_map: 0,
            has_metallic_map: 0,
            has_roughness_map: 0,
            has_ao_map: 0,
            has_normal_map: 0,
        }
    }
}

impl DrawUniform {
    fn flag_mut(&mut self, name: &str) -> Option<&mut u32> {
        match name {
            uniforms::FLAT_SHADING => Some(&mut self.flat_shading),
            uniforms::HAS_ALBEDO_MAP => Some(&mut self.has_albedo_map),
            uniforms::HAS_METALLIC_MAP => Some(&mut self.has_metallic_map),
            uniforms::HAS_ROUGHNESS_MAP => Some(&mut self.has_roughness_map),
            uniforms::HAS_AO_MAP => Some(&mut self.has_ao_map),
            uniforms::HAS_NORMAL_MAP => Some(&mut self.has_normal_map),
            _ => None,
        }
    }
}

/// Render target setup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WgpuBackendConfig {
    pub color_format: TextureFormat,
    /// `None` renders without depth testing
    pub depth_format: Option<TextureFormat>,
    pub clear_color: Color,
}

impl Default for WgpuBackendConfig {
    fn default() -> Self {
        Self {
            color_format: TextureFormat::Bgra8Unorm,
            depth_format: Some(TextureResource::DEPTH_FORMAT),
            clear_color: Color {
                r: 0.1,
                g: 0.2,
                b: 0.3,
                a: 1.0,
            },
        }
    }
}

impl WgpuBackendConfig {
    pub fn with_color_format(mut self, format: TextureFormat) -> Self {
        self.color_format = format;
        self
    }

    pub fn with_depth_format(mut self, format: Option<TextureFormat>) -> Self {
        self.depth_format = format;
        self
    }

    pub fn with_clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }
}

/// Target of the frame in progress
struct Frame {
    color: TextureView,
}

pub struct WgpuShadingBackend {
    device: Arc<Device>,
    queue: Arc<Queue>,
    config: WgpuBackendConfig,
    shader: ShaderModule,
    pipeline_layout: PipelineLayout,
    pipelines: HashMap<Primitive, RenderPipeline>,

    uniform: UniformBuffer<DrawUniform>,
    staged: DrawUniform,
    uniform_bind_group: BindGroup,

    texture_layout: BindGroupLayout,
    map_sampler: Sampler,
    fallback: TextureResource,
    bound: [Option<TextureHandle>; 5],

    vertex_buffers: HashMap<BufferHandle, ArrayBuffer<Vertex>>,
    textures: HashMap<TextureHandle, TextureResource>,
    next_handle: u32,

    frame: Option<Frame>,
    depth: Option<TextureResource>,
    warned: HashSet<String>,
}

impl WgpuShadingBackend {
    pub fn new(device: Arc<Device>, queue: Arc<Queue>, config: WgpuBackendConfig) -> Self {
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Strata Shader"),
            source: ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let uniform_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Draw Uniform Layout"),
            entries: &[binding_types::entry(
                0,
                ShaderStages::VERTEX_FRAGMENT,
                binding_types::uniform(),
            )],
        });

        let mut texture_entries: Vec<BindGroupLayoutEntry> = TextureSlot::ALL
            .iter()
            .map(|slot| {
                binding_types::entry(slot.unit(), ShaderStages::FRAGMENT, binding_types::texture_2d())
            })
            .collect();
        texture_entries.push(binding_types::entry(
            TextureSlot::ALL.len() as u32,
            ShaderStages::FRAGMENT,
            binding_types::sampler(SamplerBindingType::Filtering),
        ));
        let texture_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Material Map Layout"),
            entries: &texture_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Strata Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let uniform = UniformBuffer::<DrawUniform>::new(&device);
        let uniform_bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Draw Uniform Bind Group"),
            layout: &uniform_layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: uniform.binding_resource(),
            }],
        });

        let fallback = TextureResource::create_from_rgba_data(
            &device,
            &queue,
            &[255, 255, 255, 255],
            1,
            1,
            "Fallback Texture",
        );
        let map_sampler = fallback.sampler.clone();

        Self {
            device,
            queue,
            config,
            shader,
            pipeline_layout,
            pipelines: HashMap::new(),
            uniform,
            staged: DrawUniform::default(),
            uniform_bind_group,
            texture_layout,
            map_sampler,
            fallback,
            bound: [None; 5],
            vertex_buffers: HashMap::new(),
            textures: HashMap::new(),
            next_handle: 0,
            frame: None,
            depth: None,
            warned: HashSet::new(),
        }
    }

    pub fn config(&self) -> &WgpuBackendConfig {
        &self.config
    }

    /// Sets the camera transform used by every following draw
    pub fn set_view_projection(&mut self, view_proj: &Matrix4<f32>) {
        self.staged.view_proj = to_cols_array(view_proj);
    }

    /// Starts a frame on `target`, clearing colour and depth
    pub fn begin_frame(&mut self, target: &TextureView, width: u32, height: u32) {
        if let Some(format) = self.config.depth_format {
            let stale = self
                .depth
                .as_ref()
                .map_or(true, |depth| depth.size() != (width.max(1), height.max(1)));
            if stale {
                self.depth = Some(TextureResource::create_depth_texture(
                    &self.device,
                    width,
                    height,
                    format,
                    "Strata Depth",
                ));
            }
        }

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Clear Encoder"),
        });
        {
            let _pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(self.config.clear_color),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: self.depth.as_ref().map(|depth| {
                    RenderPassDepthStencilAttachment {
                        view: &depth.view,
                        depth_ops: Some(Operations {
                            load: LoadOp::Clear(1.0),
                            store: StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        self.frame = Some(Frame {
            color: target.clone(),
        });
    }

    /// Ends the frame; draws are ignored until the next `begin_frame`
    pub fn end_frame(&mut self) {
        self.frame = None;
    }

    fn next(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn warn_once(&mut self, name: &str) {
        if self.warned.insert(name.to_string()) {
            log::warn!("shader has no uniform named '{name}', ignoring");
        }
    }

    fn ensure_pipeline(&mut self, primitive: Primitive) {
        if self.pipelines.contains_key(&primitive) {
            return;
        }
        let pipeline = self.create_pipeline(primitive);
        self.pipelines.insert(primitive, pipeline);
    }

    fn create_pipeline(&self, primitive: Primitive) -> RenderPipeline {
        let (topology, cull_mode) = match primitive {
            Primitive::Points => (PrimitiveTopology::PointList, None),
            Primitive::Lines => (PrimitiveTopology::LineList, None),
            // no closing segment; the strip ends at the last vertex
            Primitive::LineLoop => (PrimitiveTopology::LineStrip, None),
            Primitive::Triangles => (PrimitiveTopology::TriangleList, None),
        };

        let depth_stencil = self.config.depth_format.map(|format| DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        });

        log::debug!("creating pipeline for {primitive:?}");
        self.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(&format!("Strata {primitive:?} Pipeline")),
            layout: Some(&self.pipeline_layout),
            vertex: VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc()],
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &self.shader,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: self.config.color_format,
                    blend: Some(BlendState::ALPHA_BLENDING),
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode,
                polygon_mode: PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    fn material_bind_group(&self) -> BindGroup {
        let views: Vec<&TextureView> = self
            .bound
            .iter()
            .map(|handle| {
                handle
                    .and_then(|h| self.textures.get(&h))
                    .map_or(&self.fallback.view, |texture| &texture.view)
            })
            .collect();

        let mut entries: Vec<BindGroupEntry> = views
            .iter()
            .enumerate()
            .map(|(binding, &view)| BindGroupEntry {
                binding: binding as u32,
                resource: BindingResource::TextureView(view),
            })
            .collect();
        entries.push(BindGroupEntry {
            binding: views.len() as u32,
            resource: BindingResource::Sampler(&self.map_sampler),
        });

        self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("Material Map Bind Group"),
            layout: &self.texture_layout,
            entries: &entries,
        })
    }
}

impl ShadingBackend for WgpuShadingBackend {
    fn create_vertex_buffer(&mut self, capacity: usize) -> BufferHandle {
        let handle = BufferHandle(self.next());
        self.vertex_buffers
            .insert(handle, ArrayBuffer::new_vertex(&self.device, capacity));
        handle
    }

    fn release_vertex_buffer(&mut self, buffer: BufferHandle) {
        if let Some(array) = self.vertex_buffers.remove(&buffer) {
            array.buffer().destroy();
        }
    }

    fn upload_vertices(&mut self, buffer: BufferHandle, vertices: &[Vertex]) {
        match self.vertex_buffers.get_mut(&buffer) {
            Some(array) => array.update_data(&self.queue, vertices),
            None => log::warn!("upload into released vertex buffer {buffer:?}"),
        }
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> TextureHandle {
        let handle = TextureHandle(self.next());
        let texture = TextureResource::create_from_rgba_data(
            &self.device,
            &self.queue,
            rgba,
            width,
            height,
            &format!("Material Map {}", handle.0),
        );
        self.textures.insert(handle, texture);
        handle
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        if let Some(resource) = self.textures.remove(&texture) {
            resource.texture.destroy();
        }
        for slot in self.bound.iter_mut() {
            if *slot == Some(texture) {
                *slot = None;
            }
        }
    }

    fn use_program(&mut self) {
        self.bound = [None; 5];
    }

    fn unuse_program(&mut self) {
        self.bound = [None; 5];
    }

    fn send_matrix(&mut self, name: &str, value: &Matrix4<f32>) {
        match name {
            uniforms::LOCAL_TO_WORLD => self.staged.local_to_world = to_cols_array(value),
            VIEW_PROJECTION => self.staged.view_proj = to_cols_array(value),
            _ => self.warn_once(name),
        }
    }

    fn send_vec4(&mut self, name: &str, value: [f32; 4]) {
        match name {
            uniforms::BASE_COLOR => self.staged.base_color = value,
            _ => self.warn_once(name),
        }
    }

    fn send_float(&mut self, name: &str, value: f32) {
        match name {
            uniforms::METALLIC => self.staged.metallic = value,
            uniforms::ROUGHNESS => self.staged.roughness = value,
            _ => self.warn_once(name),
        }
    }

    fn send_bool(&mut self, name: &str, value: bool) {
        let Some(flag) = self.staged.flag_mut(name) else {
            self.warn_once(name);
            return;
        };
        *flag = u32::from(value);
        if !value {
            if let Some(slot) = TextureSlot::ALL.iter().find(|s| s.flag_uniform() == name) {
                self.bound[slot.unit() as usize] = None;
            }
        }
    }

    fn bind_texture(&mut self, name: &str, unit: u32, texture: TextureHandle) {
        match TextureSlot::ALL.get(unit as usize) {
            Some(slot) if slot.sampler_uniform() == name => {
                self.bound[unit as usize] = Some(texture);
            }
            _ => self.warn_once(name),
        }
    }

    fn draw(&mut self, buffer: BufferHandle, primitive: Primitive, vertex_count: u32) {
        if self.frame.is_none() {
            log::warn!("draw outside begin_frame/end_frame, ignoring");
            return;
        }
        if !self.vertex_buffers.contains_key(&buffer) {
            log::warn!("draw from released vertex buffer {buffer:?}");
            return;
        }

        self.ensure_pipeline(primitive);
        self.uniform.update_content(&self.queue, self.staged);
        let material_bind_group = self.material_bind_group();

        let (Some(frame), Some(pipeline), Some(vertices)) = (
            self.frame.as_ref(),
            self.pipelines.get(&primitive),
            self.vertex_buffers.get(&buffer),
        ) else {
            return;
        };

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Draw Encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Draw Pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &frame.color,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Load,
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: self.depth.as_ref().map(|depth| {
                    RenderPassDepthStencilAttachment {
                        view: &depth.view,
                        depth_ops: Some(Operations {
                            load: LoadOp::Load,
                            store: StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_bind_group(1, &material_bind_group, &[]);
            pass.set_vertex_buffer(0, vertices.slice(vertex_count as usize));
            pass.draw(0..vertex_count, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
