//! # Model Import
//!
//! Turns an interchange file into a [`Model`](crate::gfx::scene::Model):
//!
//! - [`builder`] walks the source hierarchy into a node arena
//! - [`extract`] triangulates each mesh into render-ready vertices
//! - [`normalize`] fits the result around the origin at unit size
//!
//! ```no_run
//! use strata::gfx::import::{import, ImportConfig};
//!
//! let model = import("assets/robot.fbx", &ImportConfig::default())?;
//! for line in model.hierarchy_lines() {
//!     println!("{line}");
//! }
//! # Ok::<(), strata::gfx::import::ImportError>(())
//! ```

pub mod builder;
pub mod extract;
pub mod normalize;

use std::path::PathBuf;

use thiserror::Error;

use crate::fbx::FbxError;

pub use builder::{build_model, import};
pub use extract::extract_vertices;
pub use normalize::WorldBounds;

/// The one extension the importer accepts, compared case-sensitively
pub const FBX_EXTENSION: &str = "fbx";

/// Why an import produced no model. All variants are recoverable.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("unsupported format: {} (expected .fbx)", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("failed to parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: FbxError,
    },
    #[error("no nodes in scene {}", .0.display())]
    EmptyScene(PathBuf),
}

/// Import options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportConfig {
    /// Recentre and rescale the hierarchy to unit size
    pub normalize: bool,
    /// Dump the source hierarchy at debug level before building
    pub log_hierarchy: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            log_hierarchy: false,
        }
    }
}

impl ImportConfig {
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_log_hierarchy(mut self, log_hierarchy: bool) -> Self {
        self.log_hierarchy = log_hierarchy;
        self
    }
}
