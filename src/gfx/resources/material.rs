//! Per-node material
//!
//! A material is plain data: PBR factors passed through to the shader plus
//! five optional texture slots. Slots hold non-owning references; the
//! [`ResourceRegistry`](super::ResourceRegistry) owns the textures.

use cgmath::Vector3;

use super::registry::TextureTag;
use crate::gfx::rendering::backend::{uniforms, TextureHandle};

/// Texture slots a material can fill, in texture unit order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Albedo,
    Metallic,
    Roughness,
    AmbientOcclusion,
    Normal,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; 5] = [
        TextureSlot::Albedo,
        TextureSlot::Metallic,
        TextureSlot::Roughness,
        TextureSlot::AmbientOcclusion,
        TextureSlot::Normal,
    ];

    /// Texture unit the slot is bound to
    pub fn unit(self) -> u32 {
        self as u32
    }

    /// Name of the boolean uniform gating the slot
    pub fn flag_uniform(self) -> &'static str {
        match self {
            TextureSlot::Albedo => uniforms::HAS_ALBEDO_MAP,
            TextureSlot::Metallic => uniforms::HAS_METALLIC_MAP,
            TextureSlot::Roughness => uniforms::HAS_ROUGHNESS_MAP,
            TextureSlot::AmbientOcclusion => uniforms::HAS_AO_MAP,
            TextureSlot::Normal => uniforms::HAS_NORMAL_MAP,
        }
    }

    /// Name of the sampler uniform of the slot
    pub fn sampler_uniform(self) -> &'static str {
        match self {
            TextureSlot::Albedo => uniforms::ALBEDO_MAP,
            TextureSlot::Metallic => uniforms::METALLIC_MAP,
            TextureSlot::Roughness => uniforms::ROUGHNESS_MAP,
            TextureSlot::AmbientOcclusion => uniforms::AO_MAP,
            TextureSlot::Normal => uniforms::NORMAL_MAP,
        }
    }
}

/// Non-owning reference to a registered texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRef {
    pub tag: TextureTag,
    pub handle: TextureHandle,
}

/// Material with PBR factors and optional texture maps
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    textures: [Option<TextureRef>; 5],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            base_color: [0.8, 0.8, 0.8, 1.0],
            metallic: 0.0,
            roughness: 0.5,
            textures: [None; 5],
        }
    }
}

impl Material {
    /// Creates a new material with basic PBR properties
    ///
    /// # Arguments
    /// * `name` - Display name
    /// * `base_color` - RGBA base color
    /// * `metallic` - Metallic factor (0.0 = dielectric, 1.0 = metallic)
    /// * `roughness` - Surface roughness (0.0 = mirror, 1.0 = rough)
    pub fn new(name: &str, base_color: [f32; 4], metallic: f32, roughness: f32) -> Self {
        Self {
            name: name.to_string(),
            base_color,
            metallic: metallic.clamp(0.0, 1.0),
            roughness: roughness.clamp(0.0, 1.0),
            textures: [None; 5],
        }
    }

    /// Material from an imported diffuse colour, alpha 1
    pub fn from_diffuse(name: &str, diffuse: Vector3<f32>) -> Self {
        Self {
            name: name.to_string(),
            base_color: [diffuse.x, diffuse.y, diffuse.z, 1.0],
            ..Self::default()
        }
    }

    pub fn with_color(mut self, r: f32, g: f32, b: f32) -> Self {
        self.base_color = [r, g, b, self.base_color[3]];
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.base_color[3] = alpha.clamp(0.0, 1.0);
        self
    }

    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic.clamp(0.0, 1.0);
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness.clamp(0.0, 1.0);
        self
    }

    pub fn with_texture(mut self, slot: TextureSlot, texture: TextureRef) -> Self {
        self.set_texture(slot, Some(texture));
        self
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<TextureRef> {
        self.textures[slot as usize]
    }

    /// Fills or clears a slot
    pub fn set_texture(&mut self, slot: TextureSlot, texture: Option<TextureRef>) {
        self.textures[slot as usize] = texture;
    }

    /// Clears every slot that references `tag`
    pub fn forget_texture(&mut self, tag: TextureTag) {
        for slot in self.textures.iter_mut() {
            if slot.is_some_and(|t| t.tag == tag) {
                *slot = None;
            }
        }
    }
}
