//! Object/connection resolution
//!
//! An FBX document stores objects flat under `Objects` and wires them
//! together with `Connections`. This module turns that into the shape the
//! importer consumes: an arena of [`SourceNode`]s reachable from
//! [`SourceScene::roots`], each with its local transform components and
//! optional mesh and material.

use std::collections::{HashMap, HashSet};

use cgmath::{Vector2, Vector3};

use super::document::{FbxDocument, FbxNode};
use super::FbxError;

/// Read access to a polygon soup, shaped after what an interchange SDK
/// exposes for a mesh node.
pub trait PolygonSurface {
    fn control_points(&self) -> &[Vector3<f32>];
    fn polygon_count(&self) -> usize;
    fn polygon_size(&self, polygon: usize) -> usize;
    /// Control point index of one polygon corner
    fn polygon_vertex(&self, polygon: usize, corner: usize) -> usize;
    /// Source normal of one polygon corner, `None` when the surface has no
    /// normal layer or the layer has no value for that corner
    fn polygon_vertex_normal(&self, polygon: usize, corner: usize) -> Option<Vector3<f32>>;
    fn uv_channel_count(&self) -> usize;
    fn polygon_vertex_uv(&self, channel: usize, polygon: usize, corner: usize)
        -> Option<Vector2<f32>>;
}

/// How a layer's values are addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapping {
    /// One value per polygon corner (`ByPolygonVertex`)
    PerCorner,
    /// One value per control point (`ByVertice` / `ByControlPoint`)
    PerControlPoint,
    /// One value per polygon (`ByPolygon`)
    PerPolygon,
    /// A single value for the whole mesh (`AllSame`)
    AllSame,
}

impl Mapping {
    fn from_fbx(name: &str) -> Option<Self> {
        match name {
            "ByPolygonVertex" => Some(Mapping::PerCorner),
            "ByVertice" | "ByVertex" | "ByControlPoint" => Some(Mapping::PerControlPoint),
            "ByPolygon" => Some(Mapping::PerPolygon),
            "AllSame" => Some(Mapping::AllSame),
            _ => None,
        }
    }
}

/// A per-element attribute channel (normals, UVs) with optional index
/// indirection (`IndexToDirect`).
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLayer<T> {
    pub name: String,
    pub mapping: Mapping,
    pub values: Vec<T>,
    pub indices: Option<Vec<usize>>,
}

impl<T: Copy> SourceLayer<T> {
    pub fn direct(mapping: Mapping, values: Vec<T>) -> Self {
        Self {
            name: String::new(),
            mapping,
            values,
            indices: None,
        }
    }

    pub fn indexed(mapping: Mapping, values: Vec<T>, indices: Vec<usize>) -> Self {
        Self {
            name: String::new(),
            mapping,
            values,
            indices: Some(indices),
        }
    }

    /// Value for a corner given its polygon, its flat corner index and the
    /// control point it references
    pub fn sample(&self, polygon: usize, corner: usize, control_point: usize) -> Option<T> {
        let slot = match self.mapping {
            Mapping::PerCorner => corner,
            Mapping::PerControlPoint => control_point,
            Mapping::PerPolygon => polygon,
            Mapping::AllSame => 0,
        };
        let value_index = match &self.indices {
            Some(indices) => *indices.get(slot)?,
            None => slot,
        };
        self.values.get(value_index).copied()
    }
}

/// Polygon mesh attached to a node
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMesh {
    pub name: String,
    pub control_points: Vec<Vector3<f32>>,
    polygon_vertices: Vec<usize>,
    /// `polygon_starts[p]..polygon_starts[p + 1]` are the corners of polygon `p`
    polygon_starts: Vec<usize>,
    pub normals: Option<SourceLayer<Vector3<f32>>>,
    pub uvs: Vec<SourceLayer<Vector2<f32>>>,
}

impl SourceMesh {
    /// Builds a mesh from explicit polygons, rejecting corners that point
    /// past the control point table
    pub fn new(
        name: impl Into<String>,
        control_points: Vec<Vector3<f32>>,
        polygons: Vec<Vec<usize>>,
    ) -> Result<Self, FbxError> {
        let name = name.into();
        let mut polygon_vertices = Vec::new();
        let mut polygon_starts = vec![0];
        for polygon in polygons {
            if let Some(&bad) = polygon.iter().find(|&&i| i >= control_points.len()) {
                return Err(FbxError::InvalidGeometry {
                    name,
                    message: format!(
                        "polygon corner {bad} is out of range for {} control points",
                        control_points.len()
                    ),
                });
            }
            polygon_vertices.extend(polygon);
            polygon_starts.push(polygon_vertices.len());
        }

        Ok(Self {
            name,
            control_points,
            polygon_vertices,
            polygon_starts,
            normals: None,
            uvs: Vec::new(),
        })
    }

    pub fn with_normals(mut self, normals: SourceLayer<Vector3<f32>>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_uvs(mut self, uvs: SourceLayer<Vector2<f32>>) -> Self {
        self.uvs.push(uvs);
        self
    }

    /// Control point indices of one polygon
    pub fn polygon(&self, polygon: usize) -> &[usize] {
        &self.polygon_vertices[self.polygon_starts[polygon]..self.polygon_starts[polygon + 1]]
    }

    /// Total number of polygon corners
    pub fn corner_count(&self) -> usize {
        self.polygon_vertices.len()
    }

    fn from_geometry(node: &FbxNode) -> Result<Self, FbxError> {
        let name = node
            .property(1)
            .and_then(|p| p.as_str())
            .map(object_name)
            .unwrap_or_default();

        let control_points = node
            .child_f64_array("Vertices")
            .unwrap_or_default()
            .chunks_exact(3)
            .map(|c| Vector3::new(c[0] as f32, c[1] as f32, c[2] as f32))
            .collect();

        let raw = node.child_i64_array("PolygonVertexIndex").unwrap_or_default();
        let mut polygons = Vec::new();
        let mut current = Vec::new();
        for index in raw {
            // a negative index closes the polygon and encodes `-(i + 1)`
            let (index, closes) = if index < 0 { (!index, true) } else { (index, false) };
            let index = usize::try_from(index).map_err(|_| FbxError::InvalidGeometry {
                name: name.clone(),
                message: format!("polygon index {index} does not fit in memory"),
            })?;
            current.push(index);
            if closes {
                polygons.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            polygons.push(current);
        }

        let mut mesh = SourceMesh::new(name, control_points, polygons)?;

        mesh.normals = node
            .children_named("LayerElementNormal")
            .find_map(|layer| read_layer(layer, "Normals", "NormalsIndex", 3))
            .map(|layer| map_layer(layer, |c| Vector3::new(c[0], c[1], c[2])));

        mesh.uvs = node
            .children_named("LayerElementUV")
            .filter_map(|layer| read_layer(layer, "UV", "UVIndex", 2))
            .map(|layer| map_layer(layer, |c| Vector2::new(c[0], c[1])))
            .collect();

        Ok(mesh)
    }
}

impl PolygonSurface for SourceMesh {
    fn control_points(&self) -> &[Vector3<f32>] {
        &self.control_points
    }

    fn polygon_count(&self) -> usize {
        self.polygon_starts.len() - 1
    }

    fn polygon_size(&self, polygon: usize) -> usize {
        self.polygon_starts[polygon + 1] - self.polygon_starts[polygon]
    }

    fn polygon_vertex(&self, polygon: usize, corner: usize) -> usize {
        self.polygon_vertices[self.polygon_starts[polygon] + corner]
    }

    fn polygon_vertex_normal(&self, polygon: usize, corner: usize) -> Option<Vector3<f32>> {
        let flat = self.polygon_starts[polygon] + corner;
        self.normals
            .as_ref()?
            .sample(polygon, flat, self.polygon_vertices[flat])
    }

    fn uv_channel_count(&self) -> usize {
        self.uvs.len()
    }

    fn polygon_vertex_uv(
        &self,
        channel: usize,
        polygon: usize,
        corner: usize,
    ) -> Option<Vector2<f32>> {
        let flat = self.polygon_starts[polygon] + corner;
        self.uvs
            .get(channel)?
            .sample(polygon, flat, self.polygon_vertices[flat])
    }
}

/// Raw layer data before the element type is known
struct RawLayer {
    name: String,
    mapping: Mapping,
    values: Vec<Vec<f32>>,
    indices: Option<Vec<usize>>,
}

fn read_layer(layer: &FbxNode, values: &str, indices: &str, width: usize) -> Option<RawLayer> {
    let mapping_name = layer.child_str("MappingInformationType").unwrap_or("ByPolygonVertex");
    let Some(mapping) = Mapping::from_fbx(mapping_name) else {
        log::debug!("skipping {} with mapping {mapping_name}", layer.name);
        return None;
    };

    let raw_values = layer.child_f64_array(values)?;
    let indexed = matches!(
        layer.child_str("ReferenceInformationType"),
        Some("IndexToDirect") | Some("Index")
    );
    let indices = if indexed {
        layer.child_i64_array(indices).map(|ix| {
            ix.into_iter()
                .map(|i| usize::try_from(i).unwrap_or(usize::MAX))
                .collect()
        })
    } else {
        None
    };

    Some(RawLayer {
        name: layer.child_str("Name").unwrap_or_default().to_string(),
        mapping,
        values: raw_values
            .chunks_exact(width)
            .map(|c| c.iter().map(|&v| v as f32).collect())
            .collect(),
        indices,
    })
}

fn map_layer<T>(raw: RawLayer, convert: impl Fn(&[f32]) -> T) -> SourceLayer<T> {
    SourceLayer {
        name: raw.name,
        mapping: raw.mapping,
        values: raw.values.iter().map(|v| convert(v.as_slice())).collect(),
        indices: raw.indices,
    }
}

/// Surface colour of a node
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMaterial {
    pub name: String,
    pub diffuse: Vector3<f32>,
}

/// One node of the external hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct SourceNode {
    pub name: String,
    /// Model class, e.g. "Mesh", "Null" or "LimbNode"
    pub kind: String,
    pub translation: Vector3<f32>,
    /// Euler angles in degrees
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
    pub mesh: Option<SourceMesh>,
    pub material: Option<SourceMaterial>,
    pub children: Vec<usize>,
}

impl SourceNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: "Null".to_string(),
            translation: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            mesh: None,
            material: None,
            children: Vec::new(),
        }
    }

    /// Kinds of attributes this node carries, for hierarchy dumps
    pub fn attribute_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.mesh.is_some() {
            names.push("mesh");
        }
        if self.material.is_some() {
            names.push("material");
        }
        names
    }
}

/// The external scene: an arena of nodes plus the top-level entries
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceScene {
    pub nodes: Vec<SourceNode>,
    pub roots: Vec<usize>,
}

impl SourceScene {
    /// Appends a node and returns its index
    pub fn add_node(&mut self, node: SourceNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn add_child(&mut self, parent: usize, child: usize) {
        self.nodes[parent].children.push(child);
    }

    /// Indented `name T=.. R=.. S=..` lines, depth first from the roots
    pub fn describe(&self) -> Vec<String> {
        fn visit(
            scene: &SourceScene,
            index: usize,
            depth: usize,
            visited: &mut [bool],
            out: &mut Vec<String>,
        ) {
            let Some(node) = scene.nodes.get(index) else {
                return;
            };
            if std::mem::replace(&mut visited[index], true) {
                return;
            }
            let t = node.translation;
            let r = node.rotation;
            let s = node.scale;
            out.push(format!(
                "{}{} [{}] T=({}, {}, {}) R=({}, {}, {}) S=({}, {}, {}) attributes={:?}",
                "  ".repeat(depth),
                node.name,
                node.kind,
                t.x,
                t.y,
                t.z,
                r.x,
                r.y,
                r.z,
                s.x,
                s.y,
                s.z,
                node.attribute_names()
            ));
            for &child in &node.children {
                visit(scene, child, depth + 1, visited, out);
            }
        }

        let mut visited = vec![false; self.nodes.len()];
        let mut out = Vec::new();
        for &root in &self.roots {
            visit(self, root, 0, &mut visited, &mut out);
        }
        out
    }

    /// Resolves `Objects` and `Connections` of a parsed document
    pub fn from_document(document: &FbxDocument) -> Result<Self, FbxError> {
        let mut scene = SourceScene::default();
        let mut models: HashMap<i64, usize> = HashMap::new();
        let mut geometries: HashMap<i64, SourceMesh> = HashMap::new();
        let mut materials: HashMap<i64, SourceMaterial> = HashMap::new();

        if let Some(objects) = document.node("Objects") {
            for object in &objects.children {
                let Some(id) = object.property(0).and_then(|p| p.as_i64()) else {
                    continue;
                };
                let name = object
                    .property(1)
                    .and_then(|p| p.as_str())
                    .map(object_name)
                    .unwrap_or_default();
                let class = object.property(2).and_then(|p| p.as_str()).unwrap_or("");

                match object.name.as_str() {
                    "Model" => {
                        let properties = object.child("Properties70");
                        let mut node = SourceNode::new(name);
                        node.kind = class.to_string();
                        if let Some(t) = vector_property(properties, "Lcl Translation") {
                            node.translation = t;
                        }
                        if let Some(r) = vector_property(properties, "Lcl Rotation") {
                            node.rotation = r;
                        }
                        if let Some(s) = vector_property(properties, "Lcl Scaling") {
                            node.scale = s;
                        }
                        models.insert(id, scene.add_node(node));
                    }
                    "Geometry" if class == "Mesh" => {
                        geometries.insert(id, SourceMesh::from_geometry(object)?);
                    }
                    "Material" => {
                        let diffuse = vector_property(object.child("Properties70"), "DiffuseColor")
                            .unwrap_or(Vector3::new(1.0, 1.0, 1.0));
                        materials.insert(id, SourceMaterial { name, diffuse });
                    }
                    _ => {}
                }
            }
        }

        let mut parented: HashSet<usize> = HashSet::new();
        if let Some(connections) = document.node("Connections") {
            for connection in connections.children_named("C") {
                if connection.property(0).and_then(|p| p.as_str()) != Some("OO") {
                    continue;
                }
                let (Some(child), Some(parent)) = (
                    connection.property(1).and_then(|p| p.as_i64()),
                    connection.property(2).and_then(|p| p.as_i64()),
                ) else {
                    continue;
                };

                if let Some(&child_index) = models.get(&child) {
                    // first parent wins, which keeps every reachable chain acyclic
                    if parented.contains(&child_index) {
                        continue;
                    }
                    if parent == 0 {
                        scene.roots.push(child_index);
                        parented.insert(child_index);
                    } else if let Some(&parent_index) = models.get(&parent) {
                        if parent_index != child_index {
                            scene.add_child(parent_index, child_index);
                            parented.insert(child_index);
                        }
                    }
                } else if let Some(&model_index) = models.get(&parent) {
                    let node = &mut scene.nodes[model_index];
                    if let Some(mesh) = geometries.get(&child) {
                        node.mesh.get_or_insert_with(|| mesh.clone());
                    } else if let Some(material) = materials.get(&child) {
                        node.material.get_or_insert_with(|| material.clone());
                    }
                }
            }
        }

        Ok(scene)
    }
}

/// Strips the class decoration from an object name: binary files store
/// `Name\0\x01Class`, ASCII files `Class::Name`.
fn object_name(raw: &str) -> String {
    if let Some((name, _)) = raw.split_once("\u{0}\u{1}") {
        return name.to_string();
    }
    match raw.split_once("::") {
        Some((_, name)) => name.to_string(),
        None => raw.to_string(),
    }
}

/// Reads a three component `P:` entry from a `Properties70` block
fn vector_property(properties: Option<&FbxNode>, name: &str) -> Option<Vector3<f32>> {
    let entry = properties?
        .children_named("P")
        .find(|p| p.property(0).and_then(|v| v.as_str()) == Some(name))?;
    let x = entry.property(4)?.as_f64()?;
    let y = entry.property(5)?.as_f64()?;
    let z = entry.property(6)?.as_f64()?;
    Some(Vector3::new(x as f32, y as f32, z as f32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fbx::ascii;

    const SCENE: &str = r#"
Objects:  {
	Model: 10, "Model::Body", "Null" {
		Properties70:  {
			P: "Lcl Translation", "Lcl Translation", "", "A",1,2,3
			P: "Lcl Rotation", "Lcl Rotation", "", "A",90,0,0
		}
	}
	Model: 11, "Model::Arm", "Mesh" {
		Properties70:  {
			P: "Lcl Scaling", "Lcl Scaling", "", "A",2,2,2
		}
	}
	Model: 12, "Model::Orphan", "Mesh" {
	}
	Geometry: 20, "Geometry::ArmMesh", "Mesh" {
		Vertices: *12 {
			a: 0,0,0,1,0,0,1,1,0,0,1,0
		}
		PolygonVertexIndex: *4 {
			a: 0,1,2,-4
		}
		LayerElementNormal: 0 {
			MappingInformationType: "ByVertice"
			ReferenceInformationType: "Direct"
			Normals: *12 {
				a: 0,0,1,0,0,1,0,0,1,0,0,1
			}
		}
		LayerElementUV: 0 {
			Name: "map1"
			MappingInformationType: "ByPolygonVertex"
			ReferenceInformationType: "IndexToDirect"
			UV: *4 {
				a: 0,0,1,1
			}
			UVIndex: *4 {
				a: 0,1,1,0
			}
		}
	}
	Material: 30, "Material::Red", "" {
		Properties70:  {
			P: "DiffuseColor", "Color", "", "A",1,0,0
		}
	}
}
Connections:  {
	C: "OO",10,0
	C: "OO",11,10
	C: "OO",11,0
	C: "OO",20,11
	C: "OO",30,11
	C: "OP",30,11, "DiffuseColor"
}
"#;

    fn scene() -> SourceScene {
        SourceScene::from_document(&ascii::parse(SCENE).unwrap()).unwrap()
    }

    #[test]
    fn resolves_hierarchy_from_connections() {
        let scene = scene();
        assert_eq!(scene.nodes.len(), 3);
        assert_eq!(scene.roots, vec![0]);
        assert_eq!(scene.nodes[0].name, "Body");
        assert_eq!(scene.nodes[0].children, vec![1]);
        assert!(scene.nodes[1].children.is_empty());
        // the orphan is never reachable from the roots
        assert!(!scene.describe().iter().any(|l| l.contains("Orphan")));
    }

    #[test]
    fn reads_local_transform_components() {
        let scene = scene();
        let body = &scene.nodes[0];
        assert_eq!(body.translation, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(body.rotation, Vector3::new(90.0, 0.0, 0.0));
        assert_eq!(body.scale, Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(scene.nodes[1].scale, Vector3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn attaches_mesh_layers_and_material() {
        let scene = scene();
        let arm = &scene.nodes[1];
        let mesh = arm.mesh.as_ref().unwrap();
        assert_eq!(mesh.name, "ArmMesh");
        assert_eq!(mesh.polygon_count(), 1);
        assert_eq!(mesh.polygon(0), &[0, 1, 2, 3]);
        assert_eq!(
            mesh.polygon_vertex_normal(0, 2),
            Some(Vector3::new(0.0, 0.0, 1.0))
        );
        assert_eq!(mesh.uv_channel_count(), 1);
        assert_eq!(mesh.uvs[0].name, "map1");
        assert_eq!(mesh.polygon_vertex_uv(0, 0, 1), Some(Vector2::new(1.0, 1.0)));
        assert_eq!(mesh.polygon_vertex_uv(0, 0, 3), Some(Vector2::new(0.0, 0.0)));
        assert_eq!(mesh.polygon_vertex_uv(1, 0, 0), None);

        let material = arm.material.as_ref().unwrap();
        assert_eq!(material.name, "Red");
        assert_eq!(material.diffuse, Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn decodes_polygon_terminators() {
        let document = ascii::parse(
            r#"Objects: {
	Geometry: 1, "Geometry::G", "Mesh" {
		Vertices: *15 {
			a: 0,0,0,1,0,0,1,1,0,0,1,0,2,2,0
		}
		PolygonVertexIndex: *7 {
			a: 0,1,-3,2,3,4,-1
		}
	}
	Model: 2, "Model::M", "Mesh" {
	}
}
Connections: {
	C: "OO",2,0
	C: "OO",1,2
}"#,
        )
        .unwrap();
        let scene = SourceScene::from_document(&document).unwrap();
        let mesh = scene.nodes[0].mesh.as_ref().unwrap();
        assert_eq!(mesh.polygon(0), &[0, 1, 2]);
        assert_eq!(mesh.polygon(1), &[2, 3, 4, 0]);
        assert_eq!(mesh.corner_count(), 7);
        assert_eq!(mesh.polygon_vertex_normal(0, 0), None);
    }

    #[test]
    fn rejects_out_of_range_corners() {
        let err = SourceMesh::new(
            "bad",
            vec![Vector3::new(0.0, 0.0, 0.0)],
            vec![vec![0, 0, 3]],
        )
        .unwrap_err();
        assert!(matches!(err, FbxError::InvalidGeometry { .. }));
    }

    #[test]
    fn strips_class_decoration_from_names() {
        assert_eq!(object_name("Cube\u{0}\u{1}Model"), "Cube");
        assert_eq!(object_name("Model::Cube"), "Cube");
        assert_eq!(object_name("Plain"), "Plain");
    }

    #[test]
    fn layer_sampling_follows_mapping_and_indices() {
        let per_polygon = SourceLayer::direct(Mapping::PerPolygon, vec![1.0f32, 2.0]);
        assert_eq!(per_polygon.sample(1, 5, 0), Some(2.0));
        let all_same = SourceLayer::direct(Mapping::AllSame, vec![7.0f32]);
        assert_eq!(all_same.sample(3, 9, 4), Some(7.0));
        let indexed = SourceLayer::indexed(Mapping::PerControlPoint, vec![1.0f32, 2.0], vec![1, 0]);
        assert_eq!(indexed.sample(0, 0, 0), Some(2.0));
        assert_eq!(indexed.sample(0, 0, 2), None);
    }

    #[test]
    fn describe_lists_each_node_once_in_cycles() {
        let mut scene = SourceScene::default();
        let a = scene.add_node(SourceNode::new("a"));
        let b = scene.add_node(SourceNode::new("b"));
        scene.add_child(a, b);
        scene.add_child(b, a);
        scene.roots.push(a);

        let lines = scene.describe();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("a ["));
        assert!(lines[1].starts_with("  b ["));
    }
}
