//! `strata-inspect <file.fbx>`
//!
//! Imports a file, prints the node tree with per-node vertex counts and
//! does a dry-run draw to count draw calls.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use strata::fbx;
use strata::gfx::rendering::{DrawModel, RecordingBackend, RenderConfig};
use strata::gfx::resources::ResourceRegistry;
use strata::ImportConfig;

/// Prints the node hierarchy of an FBX file as strata imports it
#[derive(Parser, Debug)]
#[clap(name = "strata-inspect", version)]
struct Args {
    /// Skip normalization to unit size
    #[clap(long)]
    raw: bool,

    /// Also print the source hierarchy as read from the file
    #[clap(long)]
    source: bool,

    /// File to import
    #[clap(value_parser)]
    path: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ImportConfig::default().with_normalize(!args.raw);
    let path = &args.path;

    if args.source {
        let scene = fbx::load(path).with_context(|| format!("failed to read {}", path.display()))?;
        println!("source hierarchy:");
        for line in scene.describe() {
            println!("  {line}");
        }
    }

    let mut backend = RecordingBackend::new();
    let mut registry = ResourceRegistry::new();
    let tag = registry
        .load_model(path, &config, &mut backend)
        .with_context(|| format!("failed to import {}", path.display()))?;
    let Some(model) = registry.model(tag) else {
        bail!("model {tag:?} missing after registration");
    };

    println!("model '{}' ({tag:?})", model.name);
    for line in model.hierarchy_lines() {
        println!("  {line}");
    }
    println!("nodes: {}", model.nodes().len());
    println!("vertices: {}", model.vertex_count());
    match model.largest_mesh().and_then(|index| model.node(index)) {
        Some(node) => println!(
            "largest mesh: '{}' ({} vertices)",
            node.name,
            model.vertex_capacity()
        ),
        None => println!("largest mesh: none"),
    }

    let draws = backend.draw_model(model, &RenderConfig::default());
    println!("draw calls per frame: {draws}");

    registry.clear(&mut backend);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_and_path() {
        let args = Args::try_parse_from(["strata-inspect", "--raw", "robot.fbx"]).unwrap();
        assert!(args.raw);
        assert!(!args.source);
        assert_eq!(args.path, PathBuf::from("robot.fbx"));
    }

    #[test]
    fn rejects_missing_path_and_extra_arguments() {
        assert!(Args::try_parse_from(["strata-inspect", "--source"]).is_err());
        assert!(Args::try_parse_from(["strata-inspect", "a.fbx", "b.fbx"]).is_err());
        assert!(Args::try_parse_from(["strata-inspect", "--unknown", "a.fbx"]).is_err());
    }
}
