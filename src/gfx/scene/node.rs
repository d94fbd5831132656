use cgmath::{Matrix4, SquareMatrix, Vector3};

use super::transform;
use super::vertex::Vertex;
use crate::gfx::resources::Material;

/// One entry of a model's node arena
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub local_transform: Matrix4<f32>,
    pub translation: Vector3<f32>,
    /// Euler angles in degrees
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
    /// Triangle corners, empty when the node carries no mesh
    pub vertices: Vec<Vertex>,
    pub material: Material,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub index: usize,
}

impl Node {
    /// Create a new node with identity transformation
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            local_transform: Matrix4::identity(),
            translation: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            vertices: Vec::new(),
            material: Material::default(),
            parent: None,
            children: Vec::new(),
            index,
        }
    }

    /// The synthetic root every model starts with
    pub fn root() -> Self {
        Self::new("Root", 0)
    }

    /// Sets translation, rotation (degrees) and scale and rebuilds the
    /// local transform
    pub fn set_transform_trs(
        &mut self,
        translation: Vector3<f32>,
        rotation: Vector3<f32>,
        scale: Vector3<f32>,
    ) {
        self.translation = translation;
        self.rotation = rotation;
        self.scale = scale;
        self.rebuild_local_transform();
    }

    pub fn rebuild_local_transform(&mut self) {
        self.local_transform = transform::compose(self.translation, self.rotation, self.scale);
    }

    /// Reset to identity matrix, keeping the components in agreement
    pub fn reset_transform(&mut self) {
        self.set_transform_trs(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
        );
    }

    pub fn has_geometry(&self) -> bool {
        !self.vertices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_identity_without_geometry() {
        let root = Node::root();
        assert_eq!(root.name, "Root");
        assert_eq!(root.index, 0);
        assert_eq!(root.local_transform, Matrix4::identity());
        assert!(root.parent.is_none());
        assert!(!root.has_geometry());
    }

    #[test]
    fn components_drive_the_matrix() {
        let mut node = Node::new("n", 3);
        node.set_transform_trs(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2.0, 2.0, 2.0),
        );
        let p = transform::transform_point(&node.local_transform, Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(p, Vector3::new(3.0, 4.0, 5.0));

        node.scale = Vector3::new(1.0, 1.0, 1.0);
        node.rebuild_local_transform();
        assert_eq!(node.local_transform, Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0)));

        node.reset_transform();
        assert_eq!(node.local_transform, Matrix4::identity());
    }
}
