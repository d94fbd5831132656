//! Binary FBX reader
//!
//! Layout reference: a 27 byte header (magic + little-endian version)
//! followed by node records. Each record starts with its end offset,
//! property count and property list length (`u32` before version 7500,
//! `u64` from 7500 on), then a length-prefixed name, the properties and
//! finally any nested records terminated by an all-zero record.

use std::io::Read;

use flate2::read::ZlibDecoder;

use super::document::{FbxDocument, FbxNode, Property};
use super::FbxError;

pub const MAGIC: &[u8; 23] = b"Kaydara FBX Binary  \x00\x1a\x00";

/// Oldest binary revision this reader understands.
const MIN_VERSION: u32 = 7100;

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], FbxError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(FbxError::UnexpectedEof { offset: self.pos })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], FbxError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, FbxError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, FbxError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, FbxError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn i16(&mut self) -> Result<i16, FbxError> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, FbxError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64, FbxError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn f32(&mut self) -> Result<f32, FbxError> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64, FbxError> {
        Ok(f64::from_le_bytes(self.array()?))
    }
}

/// Returns true when `bytes` starts with the binary FBX magic
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

pub fn parse(bytes: &[u8]) -> Result<FbxDocument, FbxError> {
    if !is_binary(bytes) {
        return Err(FbxError::BadMagic);
    }
    let mut reader = Reader {
        data: bytes,
        pos: MAGIC.len(),
    };
    let version = reader.u32()?;
    if version < MIN_VERSION {
        return Err(FbxError::UnsupportedVersion(version));
    }
    let wide = version >= 7500;

    let mut nodes = Vec::new();
    while let Some(node) = read_node(&mut reader, wide)? {
        nodes.push(node);
    }

    Ok(FbxDocument { version, nodes })
}

/// Reads one record. `Ok(None)` marks the null record that closes a list
/// (or the end of the top-level list when the footer starts).
fn read_node(reader: &mut Reader, wide: bool) -> Result<Option<FbxNode>, FbxError> {
    let start = reader.pos;
    let (end_offset, property_count, _property_len) = if wide {
        (reader.u64()?, reader.u64()?, reader.u64()?)
    } else {
        (
            reader.u32()? as u64,
            reader.u32()? as u64,
            reader.u32()? as u64,
        )
    };
    let name_len = reader.u8()? as usize;

    if end_offset == 0 {
        return Ok(None);
    }
    let end_offset = usize::try_from(end_offset)
        .ok()
        .filter(|&end| end > start && end <= reader.data.len())
        .ok_or(FbxError::UnexpectedEof { offset: start })?;

    let name = String::from_utf8_lossy(reader.take(name_len)?).into_owned();
    let mut node = FbxNode::new(name);

    for _ in 0..property_count {
        node.properties.push(read_property(reader)?);
    }

    while reader.pos < end_offset {
        match read_node(reader, wide)? {
            Some(child) => node.children.push(child),
            None => break,
        }
    }
    reader.pos = end_offset;

    Ok(Some(node))
}

fn read_property(reader: &mut Reader) -> Result<Property, FbxError> {
    let offset = reader.pos;
    let code = reader.u8()?;
    let property = match code {
        b'Y' => Property::I16(reader.i16()?),
        b'C' => Property::Bool(reader.u8()? != 0),
        b'I' => Property::I32(reader.i32()?),
        b'F' => Property::F32(reader.f32()?),
        b'D' => Property::F64(reader.f64()?),
        b'L' => Property::I64(reader.i64()?),
        b'S' => {
            let len = reader.u32()? as usize;
            Property::String(String::from_utf8_lossy(reader.take(len)?).into_owned())
        }
        b'R' => {
            let len = reader.u32()? as usize;
            Property::Raw(reader.take(len)?.to_vec())
        }
        b'f' => Property::F32Array(
            read_array(reader, 4)?
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        b'd' => Property::F64Array(
            read_array(reader, 8)?
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
        ),
        b'l' => Property::I64Array(
            read_array(reader, 8)?
                .chunks_exact(8)
                .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
        ),
        b'i' => Property::I32Array(
            read_array(reader, 4)?
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        b'b' => Property::BoolArray(read_array(reader, 1)?.iter().map(|&b| b != 0).collect()),
        other => return Err(FbxError::UnknownPropertyType { code: other, offset }),
    };
    Ok(property)
}

/// Returns the raw little-endian payload of an array property, inflating
/// it first when the encoding flag says it is zlib-compressed.
fn read_array(reader: &mut Reader, element_size: usize) -> Result<Vec<u8>, FbxError> {
    let offset = reader.pos;
    let length = reader.u32()? as usize;
    let encoding = reader.u32()?;
    let compressed_length = reader.u32()? as usize;
    let expected = length
        .checked_mul(element_size)
        .ok_or(FbxError::UnexpectedEof { offset })?;

    let payload = match encoding {
        0 => reader.take(expected)?.to_vec(),
        1 => {
            let compressed = reader.take(compressed_length)?;
            let mut out = Vec::new();
            // one byte past the declared size is enough to detect a mismatch
            ZlibDecoder::new(compressed)
                .take(expected as u64 + 1)
                .read_to_end(&mut out)
                .map_err(FbxError::Decompress)?;
            out
        }
        other => return Err(FbxError::UnknownArrayEncoding { encoding: other, offset }),
    };

    if payload.len() != expected {
        return Err(FbxError::ArrayLengthMismatch {
            offset,
            expected,
            actual: payload.len(),
        });
    }
    Ok(payload)
}

#[cfg(test)]
pub(crate) mod writer {
    //! Minimal binary encoder used to build fixtures in tests.

    use std::io::Write;

    use flate2::{write::ZlibEncoder, Compression};

    use super::MAGIC;
    use crate::fbx::document::{FbxNode, Property};

    pub fn encode(version: u32, nodes: &[FbxNode], compress_arrays: bool) -> Vec<u8> {
        let wide = version >= 7500;
        let mut out = MAGIC.to_vec();
        out.extend_from_slice(&version.to_le_bytes());
        for node in nodes {
            write_node(&mut out, node, wide, compress_arrays);
        }
        write_null_record(&mut out, wide);
        out
    }

    fn write_null_record(out: &mut Vec<u8>, wide: bool) {
        let len = if wide { 25 } else { 13 };
        out.extend(std::iter::repeat(0u8).take(len));
    }

    fn write_header_field(out: &mut Vec<u8>, at: usize, value: u64, wide: bool) {
        if wide {
            out[at..at + 8].copy_from_slice(&value.to_le_bytes());
        } else {
            out[at..at + 4].copy_from_slice(&(value as u32).to_le_bytes());
        }
    }

    fn write_node(out: &mut Vec<u8>, node: &FbxNode, wide: bool, compress: bool) {
        let field = if wide { 8 } else { 4 };
        let start = out.len();
        out.extend(std::iter::repeat(0u8).take(field * 3));
        out.push(node.name.len() as u8);
        out.extend_from_slice(node.name.as_bytes());

        let properties_start = out.len();
        for property in &node.properties {
            write_property(out, property, compress);
        }
        let property_len = out.len() - properties_start;

        if !node.children.is_empty() {
            for child in &node.children {
                write_node(out, child, wide, compress);
            }
            write_null_record(out, wide);
        }

        let end = out.len() as u64;
        write_header_field(out, start, end, wide);
        write_header_field(out, start + field, node.properties.len() as u64, wide);
        write_header_field(out, start + 2 * field, property_len as u64, wide);
    }

    fn write_array(out: &mut Vec<u8>, code: u8, count: usize, payload: Vec<u8>, compress: bool) {
        out.push(code);
        out.extend_from_slice(&(count as u32).to_le_bytes());
        if compress {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&payload).unwrap();
            let compressed = encoder.finish().unwrap();
            out.extend_from_slice(&1u32.to_le_bytes());
            out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
            out.extend_from_slice(&compressed);
        } else {
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            out.extend_from_slice(&payload);
        }
    }

    fn write_property(out: &mut Vec<u8>, property: &Property, compress: bool) {
        match property {
            Property::Bool(v) => {
                out.push(b'C');
                out.push(*v as u8);
            }
            Property::I16(v) => {
                out.push(b'Y');
                out.extend_from_slice(&v.to_le_bytes());
            }
            Property::I32(v) => {
                out.push(b'I');
                out.extend_from_slice(&v.to_le_bytes());
            }
            Property::I64(v) => {
                out.push(b'L');
                out.extend_from_slice(&v.to_le_bytes());
            }
            Property::F32(v) => {
                out.push(b'F');
                out.extend_from_slice(&v.to_le_bytes());
            }
            Property::F64(v) => {
                out.push(b'D');
                out.extend_from_slice(&v.to_le_bytes());
            }
            Property::String(s) => {
                out.push(b'S');
                out.extend_from_slice(&(s.len() as u32).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            Property::Raw(bytes) => {
                out.push(b'R');
                out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                out.extend_from_slice(bytes);
            }
            Property::BoolArray(v) => {
                let payload = v.iter().map(|&b| b as u8).collect();
                write_array(out, b'b', v.len(), payload, compress);
            }
            Property::I32Array(v) => {
                let payload = v.iter().flat_map(|x| x.to_le_bytes()).collect();
                write_array(out, b'i', v.len(), payload, compress);
            }
            Property::I64Array(v) => {
                let payload = v.iter().flat_map(|x| x.to_le_bytes()).collect();
                write_array(out, b'l', v.len(), payload, compress);
            }
            Property::F32Array(v) => {
                let payload = v.iter().flat_map(|x| x.to_le_bytes()).collect();
                write_array(out, b'f', v.len(), payload, compress);
            }
            Property::F64Array(v) => {
                let payload = v.iter().flat_map(|x| x.to_le_bytes()).collect();
                write_array(out, b'd', v.len(), payload, compress);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Vec<FbxNode> {
        let mut geometry = FbxNode::new("Geometry");
        geometry.properties = vec![
            Property::I64(42),
            Property::String("Quad\x00\x01Geometry".into()),
            Property::String("Mesh".into()),
        ];
        let mut vertices = FbxNode::new("Vertices");
        vertices
            .properties
            .push(Property::F64Array(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0]));
        let mut indices = FbxNode::new("PolygonVertexIndex");
        indices.properties.push(Property::I32Array(vec![0, 1, -3]));
        geometry.children = vec![vertices, indices];

        let mut objects = FbxNode::new("Objects");
        objects.children.push(geometry);
        let mut flag = FbxNode::new("Flag");
        flag.properties = vec![Property::Bool(true), Property::I16(-2), Property::F32(0.5)];
        vec![objects, flag]
    }

    #[test]
    fn parses_records_of_both_header_widths() {
        for version in [7400, 7500] {
            let bytes = writer::encode(version, &sample_tree(), false);
            let document = parse(&bytes).unwrap();
            assert_eq!(document.version, version);
            assert_eq!(document.nodes, sample_tree());
        }
    }

    #[test]
    fn inflates_compressed_arrays() {
        let bytes = writer::encode(7400, &sample_tree(), true);
        let document = parse(&bytes).unwrap();
        let geometry = document.node("Objects").unwrap().child("Geometry").unwrap();
        assert_eq!(
            geometry.child_i64_array("PolygonVertexIndex"),
            Some(vec![0, 1, -3])
        );
        assert_eq!(geometry.child_f64_array("Vertices").unwrap().len(), 9);
    }

    #[test]
    fn oversized_compressed_array_stops_inflating() {
        use flate2::{write::ZlibEncoder, Compression};
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[0u8; 1 << 20]).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut data = Vec::new();
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        data.extend_from_slice(&compressed);

        let mut reader = Reader { data: &data, pos: 0 };
        match read_array(&mut reader, 8) {
            Err(FbxError::ArrayLengthMismatch { expected, actual, .. }) => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 17);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_magic_and_old_versions() {
        assert!(matches!(parse(b"not an fbx file at all......"), Err(FbxError::BadMagic)));
        let bytes = writer::encode(6100, &[], false);
        assert!(matches!(parse(&bytes), Err(FbxError::UnsupportedVersion(6100))));
    }

    #[test]
    fn truncated_input_is_an_error_not_a_panic() {
        let bytes = writer::encode(7400, &sample_tree(), false);
        for cut in [30, 40, bytes.len() / 2, bytes.len() - 20] {
            assert!(parse(&bytes[..cut]).is_err(), "cut at {cut} should fail");
        }
    }

    #[test]
    fn unknown_property_code_is_reported() {
        let mut node = FbxNode::new("N");
        node.properties.push(Property::I32(1));
        let mut bytes = writer::encode(7400, &[node], false);
        // header (27) + record header (12) + name length (1) + name (1)
        let code_at = 27 + 12 + 1 + 1;
        assert_eq!(bytes[code_at], b'I');
        bytes[code_at] = b'Q';
        assert!(matches!(
            parse(&bytes),
            Err(FbxError::UnknownPropertyType { code: b'Q', .. })
        ));
    }
}
