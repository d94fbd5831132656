//! ASCII FBX reader
//!
//! The text encoding mirrors the binary tree:
//!
//! ```text
//! ; comment
//! Model: 1001, "Model::Cube", "Mesh" {
//!     Properties70:  {
//!         P: "Lcl Translation", "Lcl Translation", "", "A",1,2,3
//!     }
//! }
//! Vertices: *6 {
//!     a: 0,0,0,1,0,0
//! }
//! ```
//!
//! A node is `Key:` followed by comma separated values and an optional
//! `{ ... }` block of children. `*N { a: ... }` is an array value.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace1, not_line_ending},
    combinator::{cut, eof, map, map_res, not, opt, recognize, value},
    error::{context, ContextError, ErrorKind, ParseError, VerboseError, VerboseErrorKind},
    multi::{many0, many0_count, separated_list0},
    number::complete::recognize_float,
    sequence::{delimited, pair, preceded, terminated},
    IResult, Offset,
};

use super::document::{FbxDocument, FbxNode, Property};
use super::FbxError;

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Unrecoverable error at `input` carrying `message`
fn failure<'a, T>(input: &'a str, message: &'static str) -> Res<'a, T> {
    Err(nom::Err::Failure(VerboseError::add_context(
        input,
        message,
        VerboseError::from_error_kind(input, ErrorKind::Verify),
    )))
}

/// Whitespace and `;` line comments
fn ws(input: &str) -> Res<'_, ()> {
    value(
        (),
        many0_count(alt((
            multispace1,
            recognize(pair(char(';'), not_line_ending)),
        ))),
    )(input)
}

fn identifier(input: &str) -> Res<'_, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_"), tag("|")))),
    ))(input)
}

/// `Name:` opening a node
fn key(input: &str) -> Res<'_, &str> {
    terminated(identifier, char(':'))(input)
}

/// Bare word value such as `T` or `Y`, never a key
fn word(input: &str) -> Res<'_, &str> {
    terminated(identifier, not(char(':')))(input)
}

fn string(input: &str) -> Res<'_, &str> {
    preceded(
        char('"'),
        cut(context(
            "unterminated string",
            terminated(take_till(|c: char| c == '"' || c == '\n'), char('"')),
        )),
    )(input)
}

fn number_property(text: &str) -> Result<Property, std::num::ParseFloatError> {
    if !text.contains(['.', 'e', 'E']) {
        if let Ok(v) = text.parse::<i64>() {
            return Ok(Property::I64(v));
        }
    }
    text.parse::<f64>().map(Property::F64)
}

fn number(input: &str) -> Res<'_, Property> {
    map_res(recognize_float, number_property)(input)
}

/// `*N { a: v, v, ... }`
fn array(input: &str) -> Res<'_, Property> {
    let (input, _) = char('*')(input)?;
    let (input, declared) = cut(context(
        "expected an array length after '*'",
        map_res(preceded(ws, digit1), |digits: &str| digits.parse::<usize>()),
    ))(input)?;
    let (input, _) = cut(context("expected '{' after array length", preceded(ws, char('{'))))(input)?;
    let (input, texts) = opt(preceded(
        preceded(ws, tag("a:")),
        terminated(
            separated_list0(delimited(ws, char(','), ws), preceded(ws, recognize_float)),
            opt(preceded(ws, char(','))),
        ),
    ))(input)?;
    let texts = texts.unwrap_or_default();
    let (rest, _) = cut(context("expected '}' closing the array", preceded(ws, char('}'))))(input)?;

    if texts.len() != declared {
        return failure(input, "array length does not match its declared count");
    }

    let property = if texts.iter().any(|t| t.contains(['.', 'e', 'E'])) {
        texts
            .iter()
            .map(|t| t.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map(Property::F64Array)
            .ok()
    } else {
        texts
            .iter()
            .map(|t| t.parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map(Property::I64Array)
            .ok()
    };
    match property {
        Some(property) => Ok((rest, property)),
        None => failure(input, "invalid number in array"),
    }
}

fn property(input: &str) -> Res<'_, Property> {
    alt((
        map(string, |s| Property::String(s.to_string())),
        array,
        number,
        map(word, |w| Property::String(w.to_string())),
    ))(input)
}

/// Comma separated values after a key, possibly none
fn properties(input: &str) -> Res<'_, Vec<Property>> {
    let (input, first) = opt(preceded(ws, property))(input)?;
    let Some(first) = first else {
        return Ok((input, Vec::new()));
    };
    let (input, rest) = many0(preceded(
        delimited(ws, char(','), ws),
        cut(context("expected a value", property)),
    ))(input)?;

    let mut values = vec![first];
    values.extend(rest);
    Ok((input, values))
}

/// `{ node* }`
fn block(input: &str) -> Res<'_, Vec<FbxNode>> {
    preceded(
        char('{'),
        cut(terminated(
            many0(node),
            preceded(ws, context("unclosed block", char('}'))),
        )),
    )(input)
}

fn node(input: &str) -> Res<'_, FbxNode> {
    let (input, name) = preceded(ws, key)(input)?;
    let (input, properties) = properties(input)?;
    let (input, children) = opt(preceded(ws, block))(input)?;

    let mut node = FbxNode::new(name);
    node.properties = properties;
    node.children = children.unwrap_or_default();
    Ok((input, node))
}

fn document(input: &str) -> Res<'_, Vec<FbxNode>> {
    terminated(many0(node), preceded(ws, context("expected a node name", eof)))(input)
}

/// Converts a nom error into a syntax error on the line it points at
fn syntax_error(source: &str, error: VerboseError<&str>) -> FbxError {
    let Some((remaining, kind)) = error.errors.first() else {
        return FbxError::Syntax {
            line: 1,
            message: "invalid input".to_string(),
        };
    };
    let offset = source.offset(remaining);
    let line = source[..offset].matches('\n').count() + 1;
    let message = error
        .errors
        .iter()
        .find_map(|(_, kind)| match kind {
            VerboseErrorKind::Context(label) => Some(label.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| format!("unexpected input ({kind:?})"));
    FbxError::Syntax { line, message }
}

pub fn parse(source: &str) -> Result<FbxDocument, FbxError> {
    let nodes = match document(source) {
        Ok((_, nodes)) => nodes,
        Err(nom::Err::Error(error) | nom::Err::Failure(error)) => {
            return Err(syntax_error(source, error))
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(FbxError::Syntax {
                line: source.lines().count().max(1),
                message: "unexpected end of file".to_string(),
            })
        }
    };

    let version = nodes
        .iter()
        .find(|n| n.name == "FBXHeaderExtension")
        .and_then(|h| h.child("FBXVersion"))
        .and_then(|v| v.property(0))
        .and_then(|p| p.as_i64())
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0);

    Ok(FbxDocument { version, nodes })
}
