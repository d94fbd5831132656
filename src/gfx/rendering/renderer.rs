//! Hierarchical draw traversal

use cgmath::{Matrix4, SquareMatrix};

use super::backend::{uniforms, BufferHandle, Primitive, ShadingBackend};
use crate::gfx::resources::material::{Material, TextureSlot};
use crate::gfx::scene::Model;

/// Per-call draw options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderConfig {
    pub primitive: Primitive,
    /// Light with the face normal instead of the averaged vertex normal
    pub flat_shading: bool,
}

impl RenderConfig {
    pub fn with_primitive(mut self, primitive: Primitive) -> Self {
        self.primitive = primitive;
        self
    }

    pub fn wireframe(self) -> Self {
        self.with_primitive(Primitive::LineLoop)
    }

    pub fn with_flat_shading(mut self, flat_shading: bool) -> Self {
        self.flat_shading = flat_shading;
        self
    }
}

/// Draws models through a shading backend
pub trait DrawModel {
    /// Draws every node with geometry, returning the number of draw calls
    fn draw_model(&mut self, model: &Model, config: &RenderConfig) -> usize;

    /// Draws `index` and its subtree under `accumulated`, the world
    /// transform of the node's parent
    fn draw_node(
        &mut self,
        model: &Model,
        index: usize,
        accumulated: Matrix4<f32>,
        config: &RenderConfig,
    ) -> usize;
}

impl<B: ShadingBackend + ?Sized> DrawModel for B {
    fn draw_model(&mut self, model: &Model, config: &RenderConfig) -> usize {
        if model.gpu_buffers().is_none() && model.vertex_count() > 0 {
            log::warn!("model '{}' has no GPU buffers, skipping draw", model.name);
            return 0;
        }
        self.use_program();
        let draws = self.draw_node(model, model.root(), Matrix4::identity(), config);
        self.unuse_program();
        draws
    }

    fn draw_node(
        &mut self,
        model: &Model,
        index: usize,
        accumulated: Matrix4<f32>,
        config: &RenderConfig,
    ) -> usize {
        let Some(node) = model.node(index) else {
            return 0;
        };
        let world = accumulated * node.local_transform;
        let mut draws = 0;

        if let Some(gpu) = model.gpu_buffers().filter(|_| node.has_geometry()) {
            debug_assert!(
                node.vertices.len() <= gpu.capacity,
                "node '{}' holds {} vertices, buffer fits {}",
                node.name,
                node.vertices.len(),
                gpu.capacity
            );
            self.upload_vertices(gpu.vertex_buffer, &node.vertices);
            self.send_matrix(uniforms::LOCAL_TO_WORLD, &world);
            self.send_bool(uniforms::FLAT_SHADING, config.flat_shading);
            push_material(self, &node.material);
            issue_draw(self, gpu.vertex_buffer, config.primitive, node.vertices.len());
            draws += 1;
        }

        for &child in &node.children {
            draws += self.draw_node(model, child, world, config);
        }
        draws
    }
}

fn push_material<B: ShadingBackend + ?Sized>(backend: &mut B, material: &Material) {
    backend.send_vec4(uniforms::BASE_COLOR, material.base_color);
    backend.send_float(uniforms::METALLIC, material.metallic);
    backend.send_float(uniforms::ROUGHNESS, material.roughness);
    for slot in TextureSlot::ALL {
        match material.texture(slot) {
            Some(texture) => {
                backend.send_bool(slot.flag_uniform(), true);
                backend.bind_texture(slot.sampler_uniform(), slot.unit(), texture.handle);
            }
            None => backend.send_bool(slot.flag_uniform(), false),
        }
    }
}

fn issue_draw<B: ShadingBackend + ?Sized>(
    backend: &mut B,
    buffer: BufferHandle,
    primitive: Primitive,
    vertex_count: usize,
) {
    let count = u32::try_from(vertex_count).unwrap_or(u32::MAX);
    backend.draw(buffer, primitive, count);
}
