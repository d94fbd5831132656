// src/gfx/rendering/mod.rs
//! Core rendering functionality
//!
//! The hierarchical renderer and the shading backends it draws through.

pub mod backend;
pub mod recording;
pub mod renderer;
pub mod wgpu_backend;

// Re-export main types
pub use backend::{BufferHandle, Primitive, ShadingBackend, TextureHandle};
pub use recording::RecordingBackend;
pub use renderer::{DrawModel, RenderConfig};
pub use wgpu_backend::{WgpuBackendConfig, WgpuShadingBackend};
