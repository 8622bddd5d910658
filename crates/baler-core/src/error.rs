//! Domain-specific errors for package builds.

use crate::requirements::TranslateError;
use std::path::PathBuf;
use thiserror::Error;

/// Why a single target's build failed.
///
/// One build failing never aborts sibling builds; the driver records the
/// failure and keeps going. Descriptor problems are caught earlier, at
/// load time, before any build starts.
#[derive(Error, Debug)]
pub enum BuildError {
    /// A requirement could not be rewritten as a conda spec, or its
    /// marker expression was malformed.
    #[error("dependency translation failed: {0}")]
    Translate(#[from] TranslateError),

    /// The launcher stub needed for a Windows target is missing.
    #[error("launcher stub not found: {0}")]
    MissingLauncherStub(PathBuf),

    /// Filesystem or archive I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The index record could not be serialized.
    #[error("index serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
