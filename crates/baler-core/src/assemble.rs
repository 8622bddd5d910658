//! Archive assembly.
//!
//! A [`PackageBuilder`] streams one complete conda package to a byte sink:
//! the module tree under the platform's site-packages prefix, generated
//! entry-point launchers, and the `info/` metadata trio. Output is
//! byte-deterministic - entries are written in a fixed order, every tar
//! header carries epoch-zero timestamps and zeroed ownership, and the
//! compression level is pinned - so two builds from identical inputs
//! produce identical archives.

use crate::descriptor::{ModuleSource, ProjectDescriptor};
use crate::error::BuildError;
use crate::requirements::{self, TranslateError};
use crate::scripts;
use baler_schema::{BUILD_NUMBER, INFO_FILES, INFO_HAS_PREFIX, INFO_INDEX, IndexJson, Target};
use bzip2::Compression;
use bzip2::write::BzEncoder;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tar::{EntryType, Header};
use walkdir::WalkDir;

/// Accumulated record of everything written into one archive.
///
/// One manifest exists per (package, target) combination; it is built
/// incrementally during assembly and frozen when [`PackageBuilder::build`]
/// returns. Every path in `files` corresponds to exactly one payload entry
/// in the archive, and `has_prefix` is always a subset of `files`.
#[derive(Debug, Clone)]
pub struct BuildManifest {
    /// Every installed file path, in write order.
    pub files: Vec<String>,
    /// Subset of `files` whose contents need install-time prefix
    /// substitution.
    pub has_prefix: Vec<String>,
    /// The `info/index.json` record written into the archive.
    pub index: IndexJson,
}

/// Assembles one package archive for one target.
#[derive(Debug)]
pub struct PackageBuilder<'a> {
    descriptor: &'a ProjectDescriptor,
    target: Target,
    launchers_dir: PathBuf,
}

impl<'a> PackageBuilder<'a> {
    /// Create a builder for the given descriptor and target.
    pub fn new(
        descriptor: &'a ProjectDescriptor,
        target: Target,
        launchers_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            descriptor,
            target,
            launchers_dir: launchers_dir.into(),
        }
    }

    /// File name of the archive this builder produces, e.g.
    /// `foo-1.0-py39_0.tar.bz2`.
    pub fn archive_name(&self) -> String {
        format!(
            "{}-{}-{}.tar.bz2",
            self.descriptor.name,
            self.descriptor.version,
            self.target.build_tag()
        )
    }

    /// Write the complete archive to `sink` and return its manifest.
    ///
    /// Write order is fixed: module payload, launchers, `info/index.json`,
    /// `info/has_prefix` (omitted when no file needs substitution),
    /// `info/files`.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] if the module tree cannot be read, a
    /// launcher stub is missing, a requirement cannot be translated, or
    /// the sink fails. Callers are expected to discard the partial sink
    /// contents on error.
    pub fn build<W: Write>(&self, sink: W) -> Result<BuildManifest, BuildError> {
        let encoder = BzEncoder::new(sink, Compression::best());
        let mut tar = tar::Builder::new(encoder);

        let mut files: Vec<String> = Vec::new();
        let mut has_prefix: Vec<String> = Vec::new();

        self.add_module(&mut tar, &mut files)?;

        let generated = scripts::generate(
            &self.descriptor.entry_points,
            &self.target,
            &self.launchers_dir,
        )?;
        for file in generated {
            append_file(&mut tar, &file.archive_path, &file.contents, file.executable)?;
            files.push(file.archive_path.clone());
            if file.needs_prefix {
                has_prefix.push(file.archive_path);
            }
        }

        let index = self.index_record()?;
        append_file(&mut tar, INFO_INDEX, &index.to_pretty_json()?, false)?;
        if !has_prefix.is_empty() {
            append_file(&mut tar, INFO_HAS_PREFIX, has_prefix.join("\n").as_bytes(), false)?;
        }
        append_file(&mut tar, INFO_FILES, files.join("\n").as_bytes(), false)?;

        let encoder = tar.into_inner()?;
        encoder.finish()?;

        Ok(BuildManifest {
            files,
            has_prefix,
            index,
        })
    }

    /// Copy the module tree into the archive under the site-packages
    /// prefix, recording every file written.
    fn add_module<W: Write>(
        &self,
        tar: &mut tar::Builder<W>,
        files: &mut Vec<String>,
    ) -> Result<(), BuildError> {
        let site = self.target.site_packages_path();

        match &self.descriptor.module {
            ModuleSource::File(path) => {
                let file_name = file_name_of(path)?;
                let arcname = format!("{site}{file_name}");
                append_file(tar, &arcname, &fs::read(path)?, false)?;
                files.push(arcname);
            }
            ModuleSource::Package(dir) => {
                let root_name = file_name_of(dir)?;
                // Sorted walk with bytecode caches excluded keeps the
                // archive reproducible across filesystems.
                let walker = WalkDir::new(dir)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_entry(|entry| !is_build_artifact(entry));
                for entry in walker {
                    let entry = entry.map_err(io::Error::from)?;
                    let rel = entry
                        .path()
                        .strip_prefix(dir)
                        .map_err(io::Error::other)?;
                    let arcname = if rel.as_os_str().is_empty() {
                        format!("{site}{root_name}")
                    } else {
                        format!("{site}{root_name}/{}", relative_arc_path(rel))
                    };

                    if entry.file_type().is_dir() {
                        append_dir(tar, &format!("{arcname}/"))?;
                    } else {
                        append_file(tar, &arcname, &fs::read(entry.path())?, false)?;
                        files.push(arcname);
                    }
                }
            }
        }

        Ok(())
    }

    /// Compute the package-identity record, resolving the dependency list
    /// for this target.
    fn index_record(&self) -> Result<IndexJson, TranslateError> {
        let depends = requirements::translate(
            &self.descriptor.requires,
            self.descriptor.conda_depends.as_deref(),
            &self.target,
        )?;
        Ok(IndexJson {
            arch: self.target.bitness.arch().to_string(),
            build: self.target.build_tag(),
            build_number: BUILD_NUMBER,
            depends,
            license: self.descriptor.license.clone(),
            name: self.descriptor.name.clone(),
            platform: self.target.platform.as_str().to_string(),
            subdir: self.target.subdir(),
            version: self.descriptor.version.clone(),
        })
    }
}

/// Bytecode caches never ship: `__pycache__` directories (pruned whole)
/// and stray compiled files.
fn is_build_artifact(entry: &walkdir::DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    if entry.file_type().is_dir() {
        name == "__pycache__"
    } else {
        name.ends_with(".pyc") || name.ends_with(".pyo")
    }
}

fn file_name_of(path: &Path) -> io::Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| io::Error::other(format!("module path has no file name: {}", path.display())))
}

/// Render a relative filesystem path with forward slashes, the archive's
/// separator on every platform.
fn relative_arc_path(rel: &Path) -> String {
    rel.iter()
        .map(|component| component.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Append one regular file with a deterministic header.
fn append_file<W: Write>(
    tar: &mut tar::Builder<W>,
    archive_path: &str,
    contents: &[u8],
    executable: bool,
) -> io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(contents.len() as u64);
    header.set_mode(if executable { 0o755 } else { 0o644 });
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    tar.append_data(&mut header, archive_path, contents)
}

/// Append one directory entry with a deterministic header.
fn append_dir<W: Write>(tar: &mut tar::Builder<W>, archive_path: &str) -> io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Directory);
    header.set_size(0);
    header.set_mode(0o755);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    tar.append_data(&mut header, archive_path, io::empty())
}
