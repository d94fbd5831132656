//! Source scene to node arena

use std::ffi::OsStr;
use std::path::Path;

use cgmath::{Matrix4, SquareMatrix};

use super::extract::extract_vertices;
use super::normalize::{normalize, WorldBounds};
use super::{ImportConfig, ImportError, FBX_EXTENSION};
use crate::fbx::{self, SourceScene};
use crate::gfx::resources::Material;
use crate::gfx::scene::transform::transform_point;
use crate::gfx::scene::{Model, Node};

/// Imports an `.fbx` file into a [`Model`].
///
/// Nothing is returned on failure; the caller decides whether to log and
/// carry on.
pub fn import(path: impl AsRef<Path>, config: &ImportConfig) -> Result<Model, ImportError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ImportError::NotFound(path.to_path_buf()));
    }
    if path.extension().and_then(OsStr::to_str) != Some(FBX_EXTENSION) {
        return Err(ImportError::UnsupportedFormat(path.to_path_buf()));
    }

    let scene = fbx::load(path).map_err(|source| ImportError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let name = path
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("model");

    build_model(name, &scene, config).ok_or_else(|| ImportError::EmptyScene(path.to_path_buf()))
}

/// Builds a model from an already resolved scene, `None` when no node is
/// reachable from the scene's roots
pub fn build_model(name: &str, scene: &SourceScene, config: &ImportConfig) -> Option<Model> {
    if config.log_hierarchy && log::log_enabled!(log::Level::Debug) {
        for line in scene.describe() {
            log::debug!("{line}");
        }
    }

    let mut builder = SceneBuilder::new(scene);
    for &root in &scene.roots {
        if let Some(child) = builder.visit(root, 0, Matrix4::identity()) {
            builder.nodes[0].children.push(child);
        }
    }

    if builder.nodes.len() == 1 {
        return None;
    }

    let SceneBuilder {
        mut nodes,
        bounds,
        largest,
        ..
    } = builder;

    if config.normalize {
        let (center, scale) = normalize(&mut nodes, 0, &bounds);
        log::debug!(
            "normalized '{name}': centroid ({}, {}, {}), scale {scale}",
            center.x,
            center.y,
            center.z
        );
    }

    let model = Model::from_parts(name, nodes, 0, largest.map(|(index, _)| index));
    log::info!(
        "imported '{}': {} nodes, {} vertices, largest mesh holds {}",
        model.name,
        model.nodes().len(),
        model.vertex_count(),
        model.vertex_capacity()
    );
    Some(model)
}

/// State threaded through one depth-first walk
struct SceneBuilder<'a> {
    scene: &'a SourceScene,
    nodes: Vec<Node>,
    bounds: WorldBounds,
    /// (node index, vertex count) of the largest mesh so far
    largest: Option<(usize, usize)>,
    visited: Vec<bool>,
}

impl<'a> SceneBuilder<'a> {
    fn new(scene: &'a SourceScene) -> Self {
        Self {
            scene,
            nodes: vec![Node::root()],
            bounds: WorldBounds::default(),
            largest: None,
            visited: vec![false; scene.nodes.len()],
        }
    }

    /// Appends `source` and its subtree, returning the new node's index
    fn visit(&mut self, source: usize, parent: usize, parent_global: Matrix4<f32>) -> Option<usize> {
        let Some(seen) = self.visited.get_mut(source) else {
            log::warn!("scene references missing node {source}");
            return None;
        };
        if *seen {
            log::warn!("node {source} is reachable twice, keeping the first occurrence");
            return None;
        }
        *seen = true;

        let scene = self.scene;
        let source_node = &scene.nodes[source];
        let index = self.nodes.len();

        let mut node = Node::new(source_node.name.clone(), index);
        node.set_transform_trs(
            source_node.translation,
            source_node.rotation,
            source_node.scale,
        );
        node.parent = Some(parent);
        let global = parent_global * node.local_transform;

        if let Some(mesh) = &source_node.mesh {
            node.vertices = extract_vertices(mesh);
            for vertex in &node.vertices {
                self.bounds.add(transform_point(&global, vertex.position()));
            }
            let count = node.vertices.len();
            if count > 0 && self.largest.map_or(true, |(_, best)| count > best) {
                self.largest = Some((index, count));
            }
        }
        if let Some(material) = &source_node.material {
            node.material = Material::from_diffuse(&material.name, material.diffuse);
        }

        self.nodes.push(node);

        for &child in &source_node.children {
            if let Some(child_index) = self.visit(child, index, global) {
                self.nodes[index].children.push(child_index);
            }
        }

        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fbx::{SourceMesh, SourceNode};
    use cgmath::{InnerSpace, Vector3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn v(x: f32, y: f32, z: f32) -> Vector3<f32> {
        Vector3::new(x, y, z)
    }

    fn cube_mesh() -> SourceMesh {
        let points = vec![
            v(-1.0, -1.0, -1.0),
            v(1.0, -1.0, -1.0),
            v(1.0, 1.0, -1.0),
            v(-1.0, 1.0, -1.0),
            v(-1.0, -1.0, 1.0),
            v(1.0, -1.0, 1.0),
            v(1.0, 1.0, 1.0),
            v(-1.0, 1.0, 1.0),
        ];
        let faces = vec![
            vec![0, 3, 2, 1],
            vec![4, 5, 6, 7],
            vec![0, 1, 5, 4],
            vec![2, 3, 7, 6],
            vec![1, 2, 6, 5],
            vec![0, 4, 7, 3],
        ];
        SourceMesh::new("cube", points, faces).unwrap()
    }

    fn no_normalize() -> ImportConfig {
        ImportConfig::default().with_normalize(false)
    }

    #[test]
    fn empty_scene_builds_nothing() {
        let scene = SourceScene::default();
        assert!(build_model("empty", &scene, &ImportConfig::default()).is_none());
    }

    #[test]
    fn arena_mirrors_the_source_tree() {
        let mut scene = SourceScene::default();
        let body = scene.add_node(SourceNode::new("body"));
        let arm = scene.add_node(SourceNode::new("arm"));
        let hand = scene.add_node(SourceNode::new("hand"));
        let leg = scene.add_node(SourceNode::new("leg"));
        scene.add_child(body, arm);
        scene.add_child(arm, hand);
        scene.add_child(body, leg);
        scene.roots.push(body);

        let model = build_model("rig", &scene, &no_normalize()).unwrap();
        let names: Vec<&str> = model.nodes().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Root", "body", "arm", "hand", "leg"]);
        assert_eq!(model.nodes()[0].children, vec![1]);
        assert_eq!(model.nodes()[1].children, vec![2, 4]);
        assert_eq!(model.nodes()[3].parent, Some(2));
        for (i, node) in model.nodes().iter().enumerate() {
            assert_eq!(node.index, i);
            // every parent chain terminates at the root
            let mut cursor = node;
            while let Some(parent) = cursor.parent {
                cursor = &model.nodes()[parent];
            }
            assert_eq!(cursor.index, 0);
        }
    }

    #[test]
    fn repeated_references_are_visited_once() {
        let mut scene = SourceScene::default();
        let a = scene.add_node(SourceNode::new("a"));
        let b = scene.add_node(SourceNode::new("b"));
        scene.add_child(a, b);
        scene.add_child(b, a);
        scene.roots.push(a);
        scene.roots.push(b);

        let model = build_model("loop", &scene, &no_normalize()).unwrap();
        assert_eq!(model.nodes().len(), 3);
    }

    #[test]
    fn cyclic_scene_with_hierarchy_logging_terminates() {
        let _ = env_logger::builder().is_test(true).filter_level(log::LevelFilter::Debug).try_init();

        let mut scene = SourceScene::default();
        let a = scene.add_node(SourceNode::new("a"));
        let b = scene.add_node(SourceNode::new("b"));
        scene.add_child(a, b);
        scene.add_child(b, a);
        scene.roots.push(a);

        let config = ImportConfig::default().with_log_hierarchy(true);
        let model = build_model("loop", &scene, &config).unwrap();
        assert_eq!(model.nodes().len(), 3);
        assert_eq!(scene.describe().len(), 2);
    }

    #[test]
    fn tracks_largest_mesh() {
        let mut scene = SourceScene::default();
        let mut small = SourceNode::new("small");
        small.mesh = Some(
            SourceMesh::new("tri", vec![v(0.0, 0.0, 0.0), v(1.0, 0.0, 0.0), v(0.0, 1.0, 0.0)], vec![vec![0, 1, 2]])
                .unwrap(),
        );
        let mut big = SourceNode::new("big");
        big.mesh = Some(cube_mesh());
        let small = scene.add_node(small);
        let big = scene.add_node(big);
        scene.roots.extend([small, big]);

        let model = build_model("pair", &scene, &ImportConfig::default()).unwrap();
        assert_eq!(model.largest_mesh(), Some(2));
        assert_eq!(model.vertex_capacity(), 36);
        assert_eq!(model.vertex_count(), 39);
    }

    #[test]
    fn materials_carry_diffuse_colour() {
        let mut scene = SourceScene::default();
        let mut node = SourceNode::new("painted");
        node.material = Some(fbx::SourceMaterial {
            name: "Blue".to_string(),
            diffuse: v(0.0, 0.0, 1.0),
        });
        let node = scene.add_node(node);
        scene.roots.push(node);

        let model = build_model("m", &scene, &ImportConfig::default()).unwrap();
        assert_eq!(model.nodes()[1].material.base_color, [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(model.nodes()[1].material.name, "Blue");
    }

    fn random_vector(rng: &mut StdRng, range: std::ops::Range<f32>) -> Vector3<f32> {
        v(
            rng.random_range(range.clone()),
            rng.random_range(range.clone()),
            rng.random_range(range),
        )
    }

    /// Chain of random transforms, each link carrying a cube
    fn random_chain(rng: &mut StdRng, depth: usize) -> SourceScene {
        let mut scene = SourceScene::default();
        let mut parent = None;
        for level in 0..depth {
            let mut node = SourceNode::new(format!("level{level}"));
            node.translation = random_vector(rng, -20.0..20.0);
            node.rotation = random_vector(rng, -180.0..180.0);
            let s = rng.random_range(0.2..3.0);
            node.scale = v(s, s, s);
            node.mesh = Some(cube_mesh());
            let index = scene.add_node(node);
            match parent {
                Some(p) => scene.add_child(p, index),
                None => scene.roots.push(index),
            }
            parent = Some(index);
        }
        scene
    }

    #[test]
    fn normalized_hierarchy_fits_unit_box_at_origin() {
        let mut rng = StdRng::seed_from_u64(42);
        for depth in 1..5 {
            let scene = random_chain(&mut rng, depth);
            let model = build_model("chain", &scene, &ImportConfig::default()).unwrap();
            assert_eq!(model.nodes()[0].local_transform, Matrix4::identity());

            let mut bounds = WorldBounds::default();
            for (index, node) in model.nodes().iter().enumerate() {
                let world = model.world_transform(index).unwrap();
                for vertex in &node.vertices {
                    bounds.add(transform_point(&world, vertex.position()));
                }
            }
            let extent = bounds.extent();
            let largest = extent.x.max(extent.y).max(extent.z);
            assert!((largest - 1.0).abs() < 1e-4, "largest extent {largest}");
            assert!(bounds.centroid().unwrap().magnitude() < 1e-4);
        }
    }

    #[test]
    fn normalization_can_be_disabled() {
        let mut rng = StdRng::seed_from_u64(5);
        let scene = random_chain(&mut rng, 2);
        let model = build_model("raw", &scene, &no_normalize()).unwrap();
        assert_eq!(model.nodes()[1].translation, scene.nodes[0].translation);
        assert_eq!(model.nodes()[1].scale, scene.nodes[0].scale);
    }
}
