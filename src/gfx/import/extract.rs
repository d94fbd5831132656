//! Polygon soup to render-ready vertices

use cgmath::{InnerSpace, Vector2, Vector3, Vector4, Zero};

use crate::fbx::PolygonSurface;
use crate::gfx::scene::Vertex;

/// Corner order of the two triangles a quad's UV samples expand into
const QUAD_UV_ORDER: [usize; 6] = [0, 1, 2, 0, 2, 3];

/// Flat normal of the triangle `p0 p1 p2`, zero when it has no area
pub fn face_normal(p0: Vector3<f32>, p1: Vector3<f32>, p2: Vector3<f32>) -> Vector3<f32> {
    let cross = (p1 - p0).cross(p2 - p0);
    if cross.magnitude2() > f32::EPSILON * f32::EPSILON {
        cross.normalize()
    } else {
        Vector3::zero()
    }
}

/// Triangulates a surface into a flat vertex list.
///
/// Polygons are fanned from their first corner and every fan triangle
/// shares the polygon's face normal. Polygons with fewer than three
/// corners come out as isolated points with a zero face normal. Vertex
/// normals are the mean of the source normals of every corner sharing a
/// control point; corners without a source normal contribute their
/// polygon's face normal.
///
/// Texture coordinates come from the first UV channel. Quads expand their
/// four samples to six to line up with the two fan triangles, any other
/// polygon passes its samples through unchanged, and vertices past the
/// end of the sample list get `(0, 0)`.
pub fn extract_vertices<S: PolygonSurface + ?Sized>(surface: &S) -> Vec<Vertex> {
    let positions = surface.control_points();
    // xyz: normal sum, w: corner count
    let mut normal_sums = vec![Vector4::<f32>::zero(); positions.len()];
    let mut corners: Vec<(usize, Vector3<f32>)> = Vec::new();
    let mut tex_coords: Vec<Vector2<f32>> = Vec::new();
    let has_uvs = surface.uv_channel_count() > 0;

    for polygon in 0..surface.polygon_count() {
        let size = surface.polygon_size(polygon);
        let corner_point = |corner: usize| surface.polygon_vertex(polygon, corner);

        let normal = if size < 3 {
            Vector3::zero()
        } else {
            face_normal(
                positions[corner_point(0)],
                positions[corner_point(1)],
                positions[corner_point(2)],
            )
        };

        for corner in 0..size {
            let source = surface
                .polygon_vertex_normal(polygon, corner)
                .unwrap_or(normal);
            normal_sums[corner_point(corner)] += source.extend(1.0);
        }

        if size < 3 {
            corners.extend((0..size).map(|corner| (corner_point(corner), normal)));
        } else {
            for k in 2..size {
                for corner in [0, k - 1, k] {
                    corners.push((corner_point(corner), normal));
                }
            }
        }

        if has_uvs {
            let samples: Vec<Vector2<f32>> = (0..size)
                .map(|corner| {
                    surface
                        .polygon_vertex_uv(0, polygon, corner)
                        .unwrap_or(Vector2::zero())
                })
                .collect();
            if size == 4 {
                tex_coords.extend(QUAD_UV_ORDER.iter().map(|&corner| samples[corner]));
            } else {
                tex_coords.extend(samples);
            }
        }
    }

    let averaged: Vec<Vector3<f32>> = normal_sums
        .iter()
        .map(|sum| {
            if sum.w > 0.0 {
                sum.truncate() / sum.w
            } else {
                Vector3::zero()
            }
        })
        .collect();

    corners
        .iter()
        .enumerate()
        .map(|(i, &(point, normal))| {
            Vertex::new(
                positions[point],
                averaged[point],
                normal,
                tex_coords.get(i).copied().unwrap_or(Vector2::zero()),
            )
        })
        .collect()
}
