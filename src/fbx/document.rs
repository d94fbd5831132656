//! Format-independent FBX node tree
//!
//! Both the binary and the ASCII parser produce the same [`FbxDocument`].
//! Consumers never need to know which encoding a file used: numeric
//! accessors convert between the integer and floating point variants.

/// A single typed value attached to an FBX node
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Raw(Vec<u8>),
    BoolArray(Vec<bool>),
    I32Array(Vec<i32>),
    I64Array(Vec<i64>),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
}

impl Property {
    /// Integer view of a scalar property
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Property::Bool(v) => Some(v as i64),
            Property::I16(v) => Some(v as i64),
            Property::I32(v) => Some(v as i64),
            Property::I64(v) => Some(v),
            Property::F32(v) if v.fract() == 0.0 => Some(v as i64),
            Property::F64(v) if v.fract() == 0.0 => Some(v as i64),
            _ => None,
        }
    }

    /// Floating point view of a scalar property
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Property::Bool(v) => Some(if v { 1.0 } else { 0.0 }),
            Property::I16(v) => Some(v as f64),
            Property::I32(v) => Some(v as f64),
            Property::I64(v) => Some(v as f64),
            Property::F32(v) => Some(v as f64),
            Property::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Property::String(s) => Some(s),
            _ => None,
        }
    }

    /// Array view as doubles; a scalar is treated as a one-element array
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Property::BoolArray(v) => Some(v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect()),
            Property::I32Array(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Property::I64Array(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Property::F32Array(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Property::F64Array(v) => Some(v.clone()),
            scalar => scalar.as_f64().map(|x| vec![x]),
        }
    }

    /// Array view as integers; floats are accepted only when integral
    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        match self {
            Property::BoolArray(v) => Some(v.iter().map(|&b| b as i64).collect()),
            Property::I32Array(v) => Some(v.iter().map(|&x| x as i64).collect()),
            Property::I64Array(v) => Some(v.clone()),
            Property::F32Array(v) => v
                .iter()
                .map(|&x| (x.fract() == 0.0).then_some(x as i64))
                .collect(),
            Property::F64Array(v) => v
                .iter()
                .map(|&x| (x.fract() == 0.0).then_some(x as i64))
                .collect(),
            scalar => scalar.as_i64().map(|x| vec![x]),
        }
    }
}

/// One record of the FBX tree
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FbxNode {
    pub name: String,
    pub properties: Vec<Property>,
    pub children: Vec<FbxNode>,
}

impl FbxNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&FbxNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FbxNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn property(&self, index: usize) -> Option<&Property> {
        self.properties.get(index)
    }

    /// String value of the first property of a named child, e.g.
    /// `MappingInformationType: "ByPolygonVertex"`
    pub fn child_str(&self, name: &str) -> Option<&str> {
        self.child(name)?.property(0)?.as_str()
    }

    /// Array value of the first property of a named child, e.g. `Vertices: *12 {..}`
    pub fn child_f64_array(&self, name: &str) -> Option<Vec<f64>> {
        self.child(name)?.property(0)?.to_f64_vec()
    }

    pub fn child_i64_array(&self, name: &str) -> Option<Vec<i64>> {
        self.child(name)?.property(0)?.to_i64_vec()
    }
}

/// A parsed FBX file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FbxDocument {
    /// Format version, e.g. 7400. ASCII files report the `FBXVersion`
    /// header value when present and 0 otherwise.
    pub version: u32,
    pub nodes: Vec<FbxNode>,
}

impl FbxDocument {
    pub fn node(&self, name: &str) -> Option<&FbxNode> {
        self.nodes.iter().find(|n| n.name == name)
    }
}
