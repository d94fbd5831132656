// src/lib.rs
//! Strata
//!
//! Imports hierarchical FBX scenes into a flat node arena, normalizes them to
//! unit size and draws them with accumulated transforms through a pluggable
//! shading backend (wgpu included).

pub mod fbx;
pub mod gfx;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use gfx::{import, DrawModel, ImportConfig, ImportError, Model, RenderConfig, ResourceRegistry};
