//! Shading backend seam
//!
//! The hierarchical renderer never talks to a graphics API directly. It
//! pushes named values and issues draws through [`ShadingBackend`], which
//! is implemented on wgpu by [`super::wgpu_backend::WgpuShadingBackend`]
//! and by recording fakes in tests.

use cgmath::Matrix4;

use crate::gfx::scene::Vertex;

/// Opaque vertex buffer owned by the model that created it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Opaque texture owned by the resource registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Primitive topology of a draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Primitive {
    Points,
    Lines,
    /// Wireframe mode
    LineLoop,
    #[default]
    Triangles,
}

/// Uniform names shared with the shader source
pub mod uniforms {
    pub const LOCAL_TO_WORLD: &str = "u_localToWorld";
    pub const BASE_COLOR: &str = "u_baseColor";
    pub const METALLIC: &str = "u_metallic";
    pub const ROUGHNESS: &str = "u_roughness";
    pub const FLAT_SHADING: &str = "u_flatShading";

    pub const HAS_ALBEDO_MAP: &str = "u_hasAlbedoMap";
    pub const HAS_METALLIC_MAP: &str = "u_hasMetallicMap";
    pub const HAS_ROUGHNESS_MAP: &str = "u_hasRoughnessMap";
    pub const HAS_AO_MAP: &str = "u_hasAoMap";
    pub const HAS_NORMAL_MAP: &str = "u_hasNormalMap";

    pub const ALBEDO_MAP: &str = "u_albedoMap";
    pub const METALLIC_MAP: &str = "u_metallicMap";
    pub const ROUGHNESS_MAP: &str = "u_roughnessMap";
    pub const AO_MAP: &str = "u_aoMap";
    pub const NORMAL_MAP: &str = "u_normalMap";
}

/// What the renderer needs from a graphics API.
///
/// Values pushed with the `send_*` methods stay in effect until the next
/// `draw`. Implementations log and ignore names their shader does not
/// declare.
pub trait ShadingBackend {
    /// Allocates a vertex buffer able to hold `capacity` vertices
    fn create_vertex_buffer(&mut self, capacity: usize) -> BufferHandle;
    fn release_vertex_buffer(&mut self, buffer: BufferHandle);
    /// Overwrites the start of `buffer`. `vertices` never exceeds the
    /// capacity the buffer was created with.
    fn upload_vertices(&mut self, buffer: BufferHandle, vertices: &[Vertex]);

    /// Uploads tightly packed RGBA8 pixels
    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> TextureHandle;
    fn release_texture(&mut self, texture: TextureHandle);

    fn use_program(&mut self);
    fn unuse_program(&mut self);

    fn send_matrix(&mut self, name: &str, value: &Matrix4<f32>);
    fn send_vec4(&mut self, name: &str, value: [f32; 4]);
    fn send_float(&mut self, name: &str, value: f32);
    fn send_bool(&mut self, name: &str, value: bool);
    fn bind_texture(&mut self, name: &str, unit: u32, texture: TextureHandle);

    /// Draws the first `vertex_count` vertices of `buffer`
    fn draw(&mut self, buffer: BufferHandle, primitive: Primitive, vertex_count: u32);
}
