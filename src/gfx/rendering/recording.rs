//! Headless backend that records every call
//!
//! Used by tests and by the inspector's dry-run draw. Buffers and textures
//! are tracked so leaks and over-sized uploads show up.

use std::collections::{HashMap, HashSet};

use cgmath::Matrix4;

use super::backend::{uniforms, BufferHandle, Primitive, ShadingBackend, TextureHandle};
use crate::gfx::scene::Vertex;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    UseProgram,
    UnuseProgram,
    Upload {
        buffer: BufferHandle,
        vertices: usize,
    },
    Matrix(String, Matrix4<f32>),
    Vec4(String, [f32; 4]),
    Float(String, f32),
    Bool(String, bool),
    BindTexture {
        name: String,
        unit: u32,
        texture: TextureHandle,
    },
    Draw {
        buffer: BufferHandle,
        primitive: Primitive,
        vertex_count: u32,
    },
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: Vec<Call>,
    buffers: HashMap<BufferHandle, usize>,
    textures: HashSet<TextureHandle>,
    next_handle: u32,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn draw_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::Draw { .. }))
            .count()
    }

    /// Local-to-world matrices in draw order
    pub fn world_matrices(&self) -> Vec<Matrix4<f32>> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Matrix(name, m) if name == uniforms::LOCAL_TO_WORLD => Some(*m),
                _ => None,
            })
            .collect()
    }

    /// Last value pushed for a boolean uniform
    pub fn last_bool(&self, name: &str) -> Option<bool> {
        self.calls.iter().rev().find_map(|call| match call {
            Call::Bool(n, value) if n == name => Some(*value),
            _ => None,
        })
    }

    pub fn last_float(&self, name: &str) -> Option<f32> {
        self.calls.iter().rev().find_map(|call| match call {
            Call::Float(n, value) if n == name => Some(*value),
            _ => None,
        })
    }

    /// Last value pushed for a vec4 uniform
    pub fn last_vec4(&self, name: &str) -> Option<[f32; 4]> {
        self.calls.iter().rev().find_map(|call| match call {
            Call::Vec4(n, value) if n == name => Some(*value),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    fn next(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl ShadingBackend for RecordingBackend {
    fn create_vertex_buffer(&mut self, capacity: usize) -> BufferHandle {
        let handle = BufferHandle(self.next());
        self.buffers.insert(handle, capacity);
        handle
    }

    fn release_vertex_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
    }

    fn upload_vertices(&mut self, buffer: BufferHandle, vertices: &[Vertex]) {
        let capacity = self.buffers.get(&buffer).copied().unwrap_or(0);
        debug_assert!(
            vertices.len() <= capacity,
            "upload of {} vertices into buffer {buffer:?} of capacity {capacity}",
            vertices.len()
        );
        self.calls.push(Call::Upload {
            buffer,
            vertices: vertices.len(),
        });
    }

    fn create_texture(&mut self, _width: u32, _height: u32, _rgba: &[u8]) -> TextureHandle {
        let handle = TextureHandle(self.next());
        self.textures.insert(handle);
        handle
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
    }

    fn use_program(&mut self) {
        self.calls.push(Call::UseProgram);
    }

    fn unuse_program(&mut self) {
        self.calls.push(Call::UnuseProgram);
    }

    fn send_matrix(&mut self, name: &str, value: &Matrix4<f32>) {
        self.calls.push(Call::Matrix(name.to_string(), *value));
    }

    fn send_vec4(&mut self, name: &str, value: [f32; 4]) {
        self.calls.push(Call::Vec4(name.to_string(), value));
    }

    fn send_float(&mut self, name: &str, value: f32) {
        self.calls.push(Call::Float(name.to_string(), value));
    }

    fn send_bool(&mut self, name: &str, value: bool) {
        self.calls.push(Call::Bool(name.to_string(), value));
    }

    fn bind_texture(&mut self, name: &str, unit: u32, texture: TextureHandle) {
        self.calls.push(Call::BindTexture {
            name: name.to_string(),
            unit,
            texture,
        });
    }

    fn draw(&mut self, buffer: BufferHandle, primitive: Primitive, vertex_count: u32) {
        self.calls.push(Call::Draw {
            buffer,
            primitive,
            vertex_count,
        });
    }
}
