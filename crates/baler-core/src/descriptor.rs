//! Project descriptor parsing.
//!
//! A project describes itself in a `pyproject.toml`: identity and
//! requirements in the `[project]` table, entry points in
//! `[project.scripts]`, and conda-specific extensions in `[tool.baler]`.
//! Loading resolves everything the build pipeline needs up front - module
//! root, license, entry points - so that a malformed descriptor fails
//! before any archive bytes are written.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Classifier prefix used for license fallback resolution.
const LICENSE_CLASSIFIER_PREFIX: &str = "License :: OSI Approved :: ";

/// Errors that can occur when loading or validating a project descriptor.
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// An I/O error occurred while reading the descriptor.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML content could not be deserialized.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// An entry point was not of the form `module:function`.
    #[error("invalid entry point '{name} = \"{value}\"': expected 'module:function'")]
    EntryPoint {
        /// Script name as declared.
        name: String,
        /// The malformed declaration.
        value: String,
    },

    /// No module matching the project name was found next to the
    /// descriptor.
    #[error("no module named '{0}' found next to the project file")]
    ModuleNotFound(String),
}

/// One declared entry point: an executable name bound to a module-level
/// function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Name of the launcher to generate.
    pub name: String,
    /// Dotted module path.
    pub module: String,
    /// Function inside the module to call.
    pub function: String,
}

/// Where the project's code lives: a single-file module or a package
/// directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    /// A lone `<name>.py` file.
    File(PathBuf),
    /// A `<name>/` package directory.
    Package(PathBuf),
}

impl ModuleSource {
    /// Filesystem path of the module root.
    pub fn path(&self) -> &Path {
        match self {
            Self::File(path) | Self::Package(path) => path,
        }
    }
}

/// Everything the build pipeline needs to know about a project.
///
/// Loaded once per invocation and shared read-only across all target
/// builds.
#[derive(Debug, Clone)]
pub struct ProjectDescriptor {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Resolved license identifier; empty when unknown.
    pub license: String,
    /// Abstract requirement strings, in declaration order.
    pub requires: Vec<String>,
    /// Module root resolved from the project name.
    pub module: ModuleSource,
    /// Entry points in name order.
    pub entry_points: Vec<EntryPoint>,
    /// Explicit conda dependency override from `[tool.baler].depends`.
    pub conda_depends: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawPyproject {
    project: RawProject,
    #[serde(default)]
    tool: RawTool,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    name: String,
    version: String,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    classifiers: Vec<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    scripts: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTool {
    #[serde(default)]
    baler: RawBalerTool,
}

#[derive(Debug, Default, Deserialize)]
struct RawBalerTool {
    #[serde(default)]
    module: Option<PathBuf>,
    #[serde(default)]
    depends: Option<Vec<String>>,
}

impl ProjectDescriptor {
    /// Load and validate a descriptor from the given `pyproject.toml` path.
    ///
    /// # Errors
    ///
    /// Returns a [`DescriptorError`] if the file cannot be read or parsed,
    /// an entry point is malformed, or no module matching the project name
    /// exists next to the descriptor.
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        let content = fs::read_to_string(path)?;
        let raw: RawPyproject = toml::from_str(&content)?;

        let project_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let module = resolve_module(&project_dir, &raw.project.name, raw.tool.baler.module)?;
        let license = resolve_license(raw.project.license, &raw.project.classifiers);

        // BTreeMap iteration gives name order, which keeps launcher
        // generation deterministic.
        let entry_points = raw
            .project
            .scripts
            .into_iter()
            .map(|(name, value)| parse_entry_point(&name, &value))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: raw.project.name,
            version: raw.project.version,
            license,
            requires: raw.project.dependencies,
            module,
            entry_points,
            conda_depends: raw.tool.baler.depends,
        })
    }
}

/// Resolve the module root from the project name: `<name>.py`, `<name>/`,
/// then the same under `src/`. Hyphens in the project name map to
/// underscores in the module name.
fn resolve_module(
    project_dir: &Path,
    name: &str,
    override_path: Option<PathBuf>,
) -> Result<ModuleSource, DescriptorError> {
    if let Some(rel) = override_path {
        let path = project_dir.join(rel);
        return if path.is_dir() {
            Ok(ModuleSource::Package(path))
        } else if path.is_file() {
            Ok(ModuleSource::File(path))
        } else {
            Err(DescriptorError::ModuleNotFound(
                path.to_string_lossy().into_owned(),
            ))
        };
    }

    let module_name = name.replace('-', "_");
    for dir in [project_dir.to_path_buf(), project_dir.join("src")] {
        let file = dir.join(format!("{module_name}.py"));
        if file.is_file() {
            return Ok(ModuleSource::File(file));
        }
        let package = dir.join(&module_name);
        if package.is_dir() {
            return Ok(ModuleSource::Package(package));
        }
    }

    Err(DescriptorError::ModuleNotFound(module_name))
}

/// Prefer the explicit license field; else scan classifiers for
/// `License :: OSI Approved :: X` and use the suffix; else empty.
fn resolve_license(license: Option<String>, classifiers: &[String]) -> String {
    if let Some(license) = license {
        return license;
    }
    classifiers
        .iter()
        .find_map(|c| c.strip_prefix(LICENSE_CLASSIFIER_PREFIX))
        .map_or_else(String::new, |suffix| suffix.trim().to_string())
}

fn parse_entry_point(name: &str, value: &str) -> Result<EntryPoint, DescriptorError> {
    let malformed = || DescriptorError::EntryPoint {
        name: name.to_string(),
        value: value.to_string(),
    };

    let (module, function) = value.split_once(':').ok_or_else(malformed)?;
    let module = module.trim();
    let function = function.trim();
    if module.is_empty() || function.is_empty() {
        return Err(malformed());
    }

    Ok(EntryPoint {
        name: name.to_string(),
        module: module.to_string(),
        function: function.to_string(),
    })
}
