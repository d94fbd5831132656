//! # Vertex Data Structures
//!
//! This module defines the render-ready vertex produced by geometry
//! extraction. It is uploaded to the GPU as-is, one vertex per
//! triangle corner.

use cgmath::{Vector2, Vector3};

/// A triangle corner with both smooth and flat shading normals.
///
/// # Memory Layout
///
/// The `#[repr(C)]` attribute ensures the struct has a C-compatible memory
/// layout, which is required for GPU buffer operations.
///
/// # Fields
///
/// - `position`: homogeneous position, `w = 1`
/// - `vertex_normal`: normal averaged over every polygon corner sharing the
///   control point, `w = 0`
/// - `face_normal`: flat normal of the polygon the corner belongs to, `w = 0`
/// - `tex_coord`: texture coordinate, `[0, 0]` when the surface has none
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 4],
    pub vertex_normal: [f32; 4],
    pub face_normal: [f32; 4],
    pub tex_coord: [f32; 2],
}

impl Vertex {
    pub fn new(
        position: Vector3<f32>,
        vertex_normal: Vector3<f32>,
        face_normal: Vector3<f32>,
        tex_coord: Vector2<f32>,
    ) -> Self {
        Self {
            position: position.extend(1.0).into(),
            vertex_normal: vertex_normal.extend(0.0).into(),
            face_normal: face_normal.extend(0.0).into(),
            tex_coord: tex_coord.into(),
        }
    }

    pub fn position(&self) -> Vector3<f32> {
        Vector3::new(self.position[0], self.position[1], self.position[2])
    }

    pub fn vertex_normal(&self) -> Vector3<f32> {
        Vector3::new(
            self.vertex_normal[0],
            self.vertex_normal[1],
            self.vertex_normal[2],
        )
    }

    pub fn face_normal(&self) -> Vector3<f32> {
        Vector3::new(self.face_normal[0], self.face_normal[1], self.face_normal[2])
    }

    pub fn tex_coord(&self) -> Vector2<f32> {
        Vector2::new(self.tex_coord[0], self.tex_coord[1])
    }

    /// Returns the vertex buffer layout for wgpu rendering.
    ///
    /// - Attribute 0: Position (Float32x4)
    /// - Attribute 1: Vertex normal (Float32x4)
    /// - Attribute 2: Face normal (Float32x4)
    /// - Attribute 3: Texture coordinate (Float32x2)
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
            0 => Float32x4,
            1 => Float32x4,
            2 => Float32x4,
            3 => Float32x2
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}
