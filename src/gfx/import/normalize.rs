//! Fitting an imported hierarchy around the origin at unit size

use cgmath::{Matrix4, SquareMatrix, Vector3};

use crate::gfx::scene::Node;

/// World-space extrema and centroid of every emitted vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    min: Vector3<f32>,
    max: Vector3<f32>,
    sum: Vector3<f64>,
    count: usize,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            min: Vector3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Vector3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
            sum: Vector3::new(0.0, 0.0, 0.0),
            count: 0,
        }
    }
}

impl WorldBounds {
    pub fn add(&mut self, point: Vector3<f32>) {
        self.min = Vector3::new(
            self.min.x.min(point.x),
            self.min.y.min(point.y),
            self.min.z.min(point.z),
        );
        self.max = Vector3::new(
            self.max.x.max(point.x),
            self.max.y.max(point.y),
            self.max.z.max(point.z),
        );
        self.sum += Vector3::new(point.x as f64, point.y as f64, point.z as f64);
        self.count += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn min(&self) -> Option<Vector3<f32>> {
        (!self.is_empty()).then_some(self.min)
    }

    pub fn max(&self) -> Option<Vector3<f32>> {
        (!self.is_empty()).then_some(self.max)
    }

    /// Mean of all added points
    pub fn centroid(&self) -> Option<Vector3<f32>> {
        if self.is_empty() {
            return None;
        }
        let mean = self.sum / self.count as f64;
        Some(Vector3::new(mean.x as f32, mean.y as f32, mean.z as f32))
    }

    /// Per-axis `max - min`, zero when empty
    pub fn extent(&self) -> Vector3<f32> {
        if self.is_empty() {
            return Vector3::new(0.0, 0.0, 0.0);
        }
        self.max - self.min
    }

    /// Uniform factor bringing the largest extent to 1. Zero-length axes
    /// put no constraint on it; a fully degenerate box keeps scale 1.
    pub fn unit_scale(&self) -> f32 {
        let extent = self.extent();
        let largest = extent.x.max(extent.y).max(extent.z);
        if largest > 0.0 && largest.is_finite() {
            1.0 / largest
        } else {
            1.0
        }
    }
}

/// Recentres and rescales a freshly built hierarchy.
///
/// Only the root's direct children are rewritten: their translation is
/// moved by `-centroid` and scaled, and their scale multiplied, by the
/// unit scale. Deeper nodes pick the change up through composition, so
/// every world-space point `p` ends up at `(p - centroid) * scale`. The
/// root is forced back to identity.
///
/// Returns the centroid and scale that were applied.
pub fn normalize(nodes: &mut [Node], root: usize, bounds: &WorldBounds) -> (Vector3<f32>, f32) {
    nodes[root].local_transform = Matrix4::identity();

    let Some(center) = bounds.centroid() else {
        return (Vector3::new(0.0, 0.0, 0.0), 1.0);
    };
    let scale = bounds.unit_scale();

    let children = nodes[root].children.clone();
    for child in children {
        let node = &mut nodes[child];
        node.translation = (node.translation - center) * scale;
        node.scale *= scale;
        node.rebuild_local_transform();
    }

    (center, scale)
}
