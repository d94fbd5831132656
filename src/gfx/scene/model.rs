use cgmath::Matrix4;

use super::node::Node;
use crate::gfx::rendering::backend::{BufferHandle, ShadingBackend};
use crate::gfx::resources::material::{Material, TextureRef, TextureSlot};
use crate::gfx::resources::registry::ModelTag;

/// GPU vertex buffer shared by every node of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuBuffers {
    pub vertex_buffer: BufferHandle,
    /// Capacity in vertices, the vertex count of the largest mesh
    pub capacity: usize,
}

/// An imported hierarchy: a flat node arena rooted at `root`.
///
/// Geometry is fixed once the importer hands the model out; materials stay
/// editable. The GPU buffer is sized to the largest single mesh and
/// overwritten by every draw, so it must be released through
/// [`Model::destroy`] while the backend is still alive.
#[derive(Debug)]
pub struct Model {
    pub name: String,
    tag: Option<ModelTag>,
    nodes: Vec<Node>,
    root: usize,
    largest_mesh: Option<usize>,
    gpu: Option<GpuBuffers>,
}

impl Model {
    pub(crate) fn from_parts(
        name: impl Into<String>,
        nodes: Vec<Node>,
        root: usize,
        largest_mesh: Option<usize>,
    ) -> Self {
        Self {
            name: name.into(),
            tag: None,
            nodes,
            root,
            largest_mesh,
            gpu: None,
        }
    }

    pub fn tag(&self) -> Option<ModelTag> {
        self.tag
    }

    /// Assigns the registry tag. A tag, once set, never changes; returns
    /// false if one was already assigned.
    pub(crate) fn assign_tag(&mut self, tag: ModelTag) -> bool {
        if self.tag.is_some() {
            return false;
        }
        self.tag = Some(tag);
        true
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Materials are the one part of a model editors may change
    pub fn material_mut(&mut self, index: usize) -> Option<&mut Material> {
        self.nodes.get_mut(index).map(|node| &mut node.material)
    }

    /// Fills or clears a texture slot on every node
    pub fn set_texture(&mut self, slot: TextureSlot, texture: Option<TextureRef>) {
        for node in &mut self.nodes {
            node.material.set_texture(slot, texture);
        }
    }

    /// Index of the node with the most vertices
    pub fn largest_mesh(&self) -> Option<usize> {
        self.largest_mesh
    }

    /// Vertex count the GPU buffer has to hold
    pub fn vertex_capacity(&self) -> usize {
        self.largest_mesh
            .map(|index| self.nodes[index].vertices.len())
            .unwrap_or(0)
    }

    /// Total vertices over all nodes
    pub fn vertex_count(&self) -> usize {
        self.nodes.iter().map(|node| node.vertices.len()).sum()
    }

    /// Evaluates a node's global transform from its parent chain
    pub fn world_transform(&self, index: usize) -> Option<Matrix4<f32>> {
        let mut node = self.nodes.get(index)?;
        let mut world = node.local_transform;
        while let Some(parent) = node.parent {
            node = &self.nodes[parent];
            world = node.local_transform * world;
        }
        Some(world)
    }

    /// Indented `name (N vertices)` lines, depth first from the root
    pub fn hierarchy_lines(&self) -> Vec<String> {
        fn visit(model: &Model, index: usize, depth: usize, out: &mut Vec<String>) {
            let node = &model.nodes[index];
            let marker = if model.largest_mesh == Some(index) { " *" } else { "" };
            out.push(format!(
                "{}{} ({} vertices){}",
                "  ".repeat(depth),
                node.name,
                node.vertices.len(),
                marker
            ));
            for &child in &node.children {
                visit(model, child, depth + 1, out);
            }
        }

        let mut out = Vec::new();
        visit(self, self.root, 0, &mut out);
        out
    }

    /// Allocates the shared vertex buffer. Models without geometry get
    /// none; calling again is a no-op.
    pub fn init_gpu_buffers(&mut self, backend: &mut dyn ShadingBackend) {
        if self.gpu.is_some() {
            return;
        }
        let capacity = self.vertex_capacity();
        if capacity == 0 {
            return;
        }
        self.gpu = Some(GpuBuffers {
            vertex_buffer: backend.create_vertex_buffer(capacity),
            capacity,
        });
    }

    pub fn gpu_buffers(&self) -> Option<GpuBuffers> {
        self.gpu
    }

    /// Releases GPU buffers. The model can be re-initialised afterwards.
    pub fn destroy(&mut self, backend: &mut dyn ShadingBackend) {
        if let Some(gpu) = self.gpu.take() {
            backend.release_vertex_buffer(gpu.vertex_buffer);
        }
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        if self.gpu.is_some() {
            log::warn!("model '{}' dropped with live GPU buffers", self.name);
        }
    }
}
