//! Local transform composition
//!
//! Nodes keep their translation, Euler rotation (degrees) and scale
//! alongside the composed matrix so the matrix can be rebuilt after the
//! components are edited.

use cgmath::{Deg, Matrix4, Vector3, Vector4};

/// Composes `T * Rx * Ry * Rz * S`. Order matters: scale is applied first,
/// then the rotations about Z, Y and X, then the translation.
pub fn compose(translation: Vector3<f32>, rotation: Vector3<f32>, scale: Vector3<f32>) -> Matrix4<f32> {
    let t = Matrix4::from_translation(translation);
    let rx = Matrix4::from_angle_x(Deg(rotation.x));
    let ry = Matrix4::from_angle_y(Deg(rotation.y));
    let rz = Matrix4::from_angle_z(Deg(rotation.z));
    let s = Matrix4::from_nonuniform_scale(scale.x, scale.y, scale.z);
    t * rx * ry * rz * s
}

/// Transforms a point (`w = 1`)
pub fn transform_point(matrix: &Matrix4<f32>, point: Vector3<f32>) -> Vector3<f32> {
    let p: Vector4<f32> = *matrix * point.extend(1.0);
    p.truncate()
}

/// Column-major copy suitable for uniform upload
pub fn to_cols_array(matrix: &Matrix4<f32>) -> [[f32; 4]; 4] {
    (*matrix).into()
}
