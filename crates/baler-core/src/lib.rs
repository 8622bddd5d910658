//! Core library for baler.
//!
//! Turns a pure-Python project description into conda binary packages.
//! The pipeline: a [`descriptor::ProjectDescriptor`] is loaded once, then
//! the [`driver`] fans out one [`assemble::PackageBuilder`] per
//! (python version, platform, bitness) target. Each builder filters the
//! project's requirements through the [`markers`] evaluator, rewrites them
//! with [`requirements`], renders entry-point launchers with [`scripts`],
//! and streams a deterministic `tar.bz2` archive to its sink.

pub mod assemble;
pub mod descriptor;
pub mod driver;
pub mod error;
pub mod markers;
pub mod requirements;
pub mod scripts;

pub use error::BuildError;
