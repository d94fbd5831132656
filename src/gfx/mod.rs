//! # Graphics Module
//!
//! Everything between an imported file and a draw call.
//!
//! ## Architecture Overview
//!
//! - **Import** ([`import`]) - source hierarchy to node arena, triangulation
//!   and normalization
//! - **Scene** ([`scene`]) - models, nodes, vertices and transforms
//! - **Rendering** ([`rendering`]) - hierarchical traversal and shading
//!   backends
//! - **Resources** ([`resources`]) - materials, textures and the registry
//!
//! ## Usage
//!
//! ```no_run
//! use strata::gfx::import::ImportConfig;
//! use strata::gfx::rendering::{DrawModel, RecordingBackend, RenderConfig};
//! use strata::gfx::resources::ResourceRegistry;
//!
//! let mut backend = RecordingBackend::new();
//! let mut registry = ResourceRegistry::new();
//! let tag = registry.load_model("robot.fbx", &ImportConfig::default(), &mut backend)?;
//! if let Some(model) = registry.model(tag) {
//!     backend.draw_model(model, &RenderConfig::default());
//! }
//! registry.clear(&mut backend);
//! # Ok::<(), strata::gfx::import::ImportError>(())
//! ```

pub mod import;
pub mod rendering;
pub mod resources;
pub mod scene;

// Re-export commonly used types
pub use import::{import, ImportConfig, ImportError};
pub use rendering::{DrawModel, RenderConfig, ShadingBackend};
pub use resources::ResourceRegistry;
pub use scene::Model;
