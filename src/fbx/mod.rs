//! # FBX Interchange Reader
//!
//! Reads `.fbx` files (binary 7.x and ASCII) into an SDK-shaped scene:
//! an arena of [`SourceNode`]s with local translation/rotation/scale, an
//! optional polygon mesh and an optional material.
//!
//! The reader is split in layers:
//!
//! - [`document`] - encoding independent node tree
//! - [`binary`] / [`ascii`] - the two encodings
//! - [`scene`] - objects and connections resolved into a node hierarchy

pub mod ascii;
pub mod binary;
pub mod document;
pub mod scene;

use std::path::Path;

use thiserror::Error;

pub use document::{FbxDocument, FbxNode, Property};
pub use scene::{
    Mapping, PolygonSurface, SourceLayer, SourceMaterial, SourceMesh, SourceNode, SourceScene,
};

/// Reasons the reader rejects a file
#[derive(Debug, Error)]
pub enum FbxError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected end of data at byte {offset}")]
    UnexpectedEof { offset: usize },
    #[error("missing binary FBX magic")]
    BadMagic,
    #[error("unsupported FBX version {0}")]
    UnsupportedVersion(u32),
    #[error("unknown property type code {code:#04x} at byte {offset}")]
    UnknownPropertyType { code: u8, offset: usize },
    #[error("unknown array encoding {encoding} at byte {offset}")]
    UnknownArrayEncoding { encoding: u32, offset: usize },
    #[error("array at byte {offset} holds {actual} bytes, expected {expected}")]
    ArrayLengthMismatch {
        offset: usize,
        expected: usize,
        actual: usize,
    },
    #[error("failed to inflate array: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("file is neither binary FBX nor UTF-8 text")]
    NotText,
    #[error("invalid geometry '{name}': {message}")]
    InvalidGeometry { name: String, message: String },
}

/// Parses FBX bytes of either encoding into a document tree
pub fn parse_document(bytes: &[u8]) -> Result<FbxDocument, FbxError> {
    if binary::is_binary(bytes) {
        binary::parse(bytes)
    } else {
        let text = std::str::from_utf8(bytes).map_err(|_| FbxError::NotText)?;
        ascii::parse(text)
    }
}

/// Reads and resolves an FBX file into a [`SourceScene`]
pub fn load(path: impl AsRef<Path>) -> Result<SourceScene, FbxError> {
    let bytes = std::fs::read(path.as_ref())?;
    let document = parse_document(&bytes)?;
    SourceScene::from_document(&document)
}
