//! baler - conda packages for pure-Python projects
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Builds binary conda packages straight from a project's
//! `pyproject.toml`, one archive per (python version, platform, bitness)
//! combination, without involving a Python toolchain.
//!
//! # Overview
//!
//! - `baler build` assembles `dist/<platform>-<bits>/<name>-<version>-py<ver>_0.tar.bz2`
//!   for every requested target.
//! - `baler publish` builds and then hands the archives to the
//!   `anaconda` client for upload.
//!
//! All heavy lifting lives in `baler-core`; this crate is argument
//! parsing and dispatch.

pub mod cmd;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Platforms built when `--platforms` is not given.
pub const DEFAULT_PLATFORMS: &[&str] = &["linux-64", "linux-32", "osx-64", "win-64", "win-32"];

/// Python versions built when `--pythons` is not given.
pub const DEFAULT_PYTHONS: &[&str] = &["3.9"];

#[derive(Debug, Parser)]
#[command(name = "baler")]
#[command(author, version, about = "Build conda packages for pure-Python projects")]
pub struct Cli {
    /// Comma-separated Python versions to build for (e.g. 3.9,3.10)
    #[arg(long, global = true)]
    pub pythons: Option<String>,

    /// Comma-separated conda platforms to build for (e.g. linux-64,osx-64)
    #[arg(long, global = true)]
    pub platforms: Option<String>,

    /// Project description file
    #[arg(long, global = true, default_value = "pyproject.toml")]
    pub project: PathBuf,

    /// Directory that receives the built packages (defaults to <project dir>/dist)
    #[arg(long, global = true)]
    pub dist_dir: Option<PathBuf>,

    /// Directory holding the Windows launcher stubs cli-32.exe / cli-64.exe
    /// (only consulted for win-* targets; defaults to <project dir>/launchers)
    #[arg(long, global = true)]
    pub launchers: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build conda packages
    Build,
    /// Build conda packages & publish them to anaconda.org
    Publish,
}
