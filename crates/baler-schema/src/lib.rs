//! Shared types and format constants for baler.
//!
//! Everything the builder and the CLI agree on lives here: the build
//! [`Target`] (python version, platform, bitness), the serialized
//! `info/index.json` record, and the fixed on-disk conventions of the
//! conda package format.

pub mod index;
pub mod platform;

// Re-exports
pub use index::IndexJson;
pub use platform::*;

/// Install-prefix placeholder embedded in generated launcher scripts.
///
/// The installer rewrites this token to the real environment prefix at
/// install time; it must be written into the archive verbatim and never
/// resolved at build time.
pub const PREFIX_PLACEHOLDER: &str = "/opt/anaconda1anaconda2anaconda3";

/// Archive path of the package metadata record.
pub const INFO_INDEX: &str = "info/index.json";

/// Archive path of the prefix-substitution list.
pub const INFO_HAS_PREFIX: &str = "info/has_prefix";

/// Archive path of the installed-files list.
pub const INFO_FILES: &str = "info/files";

/// Build number baked into every archive name and index record.
// TODO: derive the build number from packages already present in the dist
// directory instead of pinning 0.
pub const BUILD_NUMBER: u32 = 0;
