//! Command implementations.

pub mod build;
pub mod publish;

use crate::{Cli, DEFAULT_PLATFORMS, DEFAULT_PYTHONS};
use std::path::PathBuf;

/// Fully-resolved options shared by the build and publish commands.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Path to the project's pyproject.toml.
    pub project: PathBuf,
    /// Directory that receives the built packages.
    pub dist_dir: PathBuf,
    /// Python versions to build for.
    pub pythons: Vec<String>,
    /// Platform specs to build for.
    pub platforms: Vec<String>,
    /// Directory holding the Windows launcher stubs.
    pub launchers: PathBuf,
}

impl BuildOptions {
    /// Resolve defaults from the parsed command line.
    pub fn from_cli(cli: &Cli) -> Self {
        let project_dir = match cli.project.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Self {
            project: cli.project.clone(),
            dist_dir: cli
                .dist_dir
                .clone()
                .unwrap_or_else(|| project_dir.join("dist")),
            pythons: split_list(cli.pythons.as_deref(), DEFAULT_PYTHONS),
            platforms: split_list(cli.platforms.as_deref(), DEFAULT_PLATFORMS),
            launchers: cli
                .launchers
                .clone()
                .unwrap_or_else(|| project_dir.join("launchers")),
        }
    }
}

fn split_list(value: Option<&str>, default: &[&str]) -> Vec<String> {
    match value {
        Some(value) => value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(ToString::to_string)
            .collect(),
        None => default.iter().map(ToString::to_string).collect(),
    }
}
