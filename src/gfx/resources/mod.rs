// src/gfx/resources/mod.rs
//! Resource management
//!
//! Materials, GPU textures, and the registry that owns loaded models and
//! textures.

pub mod material;
pub mod registry;
pub mod texture_resource;

// Re-export main types
pub use material::{Material, TextureRef, TextureSlot};
pub use registry::{ModelTag, RegistryError, ResourceRegistry, TextureTag};
pub use texture_resource::TextureResource;
