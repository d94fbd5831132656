//! # Scene Module
//!
//! The in-memory form of an imported model: a flat arena of [`Node`]s owned
//! by a [`Model`], plus the vertex layout and transform helpers they use.
//!
//! ## Key Components
//!
//! - [`Model`] - owning container with the root index and GPU buffer handle
//! - [`Node`] - one hierarchy entry with local transform, geometry and material
//! - [`Vertex`] - render-ready triangle corner
//!
//! Parent and child links are indices into [`Model::nodes`]; index 0 is the
//! synthetic root.

pub mod model;
pub mod node;
pub mod transform;
pub mod vertex;

// Re-export main types
pub use model::{GpuBuffers, Model};
pub use node::Node;
pub use vertex::Vertex;
