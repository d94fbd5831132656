//! Fixture files for the integration tests, written as ASCII FBX into the
//! system temp directory

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::PathBuf;

/// A model entry of a fixture scene
pub struct FixtureModel {
    pub id: i64,
    pub name: &'static str,
    pub parent: i64,
    pub translation: [f64; 3],
    pub rotation: [f64; 3],
    pub scale: [f64; 3],
    /// Control points and polygons (closing corner not yet negated)
    pub mesh: Option<(Vec<[f64; 3]>, Vec<Vec<i64>>)>,
}

impl FixtureModel {
    pub fn new(id: i64, name: &'static str, parent: i64) -> Self {
        Self {
            id,
            name,
            parent,
            translation: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
            mesh: None,
        }
    }

    pub fn translated(mut self, t: [f64; 3]) -> Self {
        self.translation = t;
        self
    }

    pub fn rotated(mut self, r: [f64; 3]) -> Self {
        self.rotation = r;
        self
    }

    pub fn scaled(mut self, s: [f64; 3]) -> Self {
        self.scale = s;
        self
    }

    pub fn with_mesh(mut self, points: Vec<[f64; 3]>, polygons: Vec<Vec<i64>>) -> Self {
        self.mesh = Some((points, polygons));
        self
    }
}

fn join<T: ToString>(values: impl IntoIterator<Item = T>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Renders a scene as ASCII FBX
pub fn ascii_scene(models: &[FixtureModel]) -> String {
    let mut out = String::new();
    out.push_str("; FBX 7.4.0 project file\n");
    out.push_str("FBXHeaderExtension:  {\n\tFBXVersion: 7400\n}\n");
    out.push_str("Objects:  {\n");
    let mut connections = Vec::new();

    for model in models {
        let _ = writeln!(out, "\tModel: {}, \"Model::{}\", \"Mesh\" {{", model.id, model.name);
        out.push_str("\t\tProperties70:  {\n");
        for (name, v) in [
            ("Lcl Translation", model.translation),
            ("Lcl Rotation", model.rotation),
            ("Lcl Scaling", model.scale),
        ] {
            let _ = writeln!(
                out,
                "\t\t\tP: \"{name}\", \"{name}\", \"\", \"A\",{},{},{}",
                v[0], v[1], v[2]
            );
        }
        out.push_str("\t\t}\n\t}\n");
        connections.push((model.id, model.parent));

        if let Some((points, polygons)) = &model.mesh {
            let geometry_id = model.id + 1000;
            let flat: Vec<f64> = points.iter().flatten().copied().collect();
            let indices: Vec<i64> = polygons
                .iter()
                .flat_map(|polygon| {
                    let last = polygon.len() - 1;
                    polygon
                        .iter()
                        .enumerate()
                        .map(move |(i, &index)| if i == last { -index - 1 } else { index })
                })
                .collect();
            let _ = writeln!(
                out,
                "\tGeometry: {geometry_id}, \"Geometry::{}Mesh\", \"Mesh\" {{",
                model.name
            );
            let _ = writeln!(out, "\t\tVertices: *{} {{\n\t\t\ta: {}\n\t\t}}", flat.len(), join(flat));
            let _ = writeln!(
                out,
                "\t\tPolygonVertexIndex: *{} {{\n\t\t\ta: {}\n\t\t}}",
                indices.len(),
                join(indices)
            );
            out.push_str("\t}\n");
            connections.push((geometry_id, model.id));
        }
    }
    out.push_str("}\n");

    out.push_str("Connections:  {\n");
    for (child, parent) in connections {
        let _ = writeln!(out, "\tC: \"OO\",{child},{parent}");
    }
    out.push_str("}\n");
    out
}

/// Writes `contents` to a uniquely named file in the temp directory
pub fn write_fixture(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("strata-tests-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// A single root-level node holding one quad in the y = 0 plane
pub fn quad_scene() -> String {
    ascii_scene(&[FixtureModel::new(1, "Quad", 0).with_mesh(
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 1.0],
            [0.0, 0.0, 1.0],
        ],
        vec![vec![0, 1, 2, 3]],
    )])
}

pub fn cube_points(size: f64) -> Vec<[f64; 3]> {
    let h = size / 2.0;
    vec![
        [-h, -h, -h],
        [h, -h, -h],
        [h, h, -h],
        [-h, h, -h],
        [-h, -h, h],
        [h, -h, h],
        [h, h, h],
        [-h, h, h],
    ]
}

pub fn cube_faces() -> Vec<Vec<i64>> {
    vec![
        vec![0, 3, 2, 1],
        vec![4, 5, 6, 7],
        vec![0, 1, 5, 4],
        vec![2, 3, 7, 6],
        vec![1, 2, 6, 5],
        vec![0, 4, 7, 3],
    ]
}
