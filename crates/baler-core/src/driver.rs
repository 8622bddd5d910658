//! Multi-target build orchestration.
//!
//! Every (python version, platform, bitness) combination is an
//! independent build: the only shared state is the read-only descriptor,
//! so builds fan out onto the blocking thread pool and run in parallel.
//! One build failing is recorded and never aborts its siblings.

use crate::assemble::PackageBuilder;
use crate::descriptor::ProjectDescriptor;
use anyhow::{Context, Result};
use baler_schema::Target;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Outcome of one multi-target run.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Archives successfully written, in completion order.
    pub built: Vec<PathBuf>,
    /// (target, error) pairs for builds that failed.
    pub failures: Vec<(String, String)>,
}

/// Build one archive per (python, platform spec) combination under
/// `dist_dir`.
///
/// Platform specs are `<platform>-<bits>` strings such as `linux-64`.
/// Output directories are created idempotently; each archive is written
/// through a temporary file in its destination directory and only renamed
/// into place on success, so a failed or interrupted build never leaves a
/// partial archive claiming to be usable.
///
/// # Errors
///
/// Returns an error only for whole-run problems: an unparseable platform
/// spec, an unwritable dist directory, or a panicked build task.
/// Per-target build failures are reported in the returned
/// [`BuildReport`].
pub async fn build_all(
    descriptor: &Arc<ProjectDescriptor>,
    pythons: &[String],
    platforms: &[String],
    dist_dir: &Path,
    launchers_dir: &Path,
) -> Result<BuildReport> {
    let mut handles = Vec::new();

    for spec in platforms {
        let platform_dir = dist_dir.join(spec);
        std::fs::create_dir_all(&platform_dir)
            .with_context(|| format!("Failed to create {}", platform_dir.display()))?;

        for python in pythons {
            let target = Target::from_spec(python, spec).map_err(|err| anyhow::anyhow!(err))?;
            let descriptor = Arc::clone(descriptor);
            let platform_dir = platform_dir.clone();
            let launchers_dir = launchers_dir.to_path_buf();
            handles.push(tokio::task::spawn_blocking(move || {
                let result = build_one(&descriptor, &target, &platform_dir, &launchers_dir);
                (target, result)
            }));
        }
    }

    let mut report = BuildReport::default();
    for joined in futures::future::join_all(handles).await {
        let (target, outcome) = joined.context("Build task panicked")?;
        match outcome {
            Ok(path) => {
                tracing::info!("Built {}", path.display());
                report.built.push(path);
            }
            Err(err) => {
                tracing::error!("Build failed for {target}: {err:#}");
                report.failures.push((target.to_string(), format!("{err:#}")));
            }
        }
    }

    Ok(report)
}

/// Glob pattern matching every archive a run produces; the file name is
/// the same across targets, only the subdir varies.
pub fn result_glob(dist_dir: &Path, descriptor: &ProjectDescriptor) -> String {
    format!(
        "{}/*/{}-{}-*.tar.bz2",
        dist_dir.display(),
        descriptor.name,
        descriptor.version
    )
}

fn build_one(
    descriptor: &ProjectDescriptor,
    target: &Target,
    platform_dir: &Path,
    launchers_dir: &Path,
) -> Result<PathBuf> {
    let builder = PackageBuilder::new(descriptor, target.clone(), launchers_dir);
    let final_path = platform_dir.join(builder.archive_name());

    let tmp = NamedTempFile::new_in(platform_dir)
        .context("Failed to create temporary archive file")?;
    let mut writer = BufWriter::new(tmp);
    builder.build(&mut writer)?;
    let tmp = writer
        .into_inner()
        .map_err(std::io::IntoInnerError::into_error)?;
    tmp.persist(&final_path)
        .map_err(|err| err.error)
        .context("Failed to move finished archive into place")?;

    Ok(final_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{EntryPoint, ModuleSource};
    use std::fs;

    fn fixture_descriptor(dir: &Path) -> ProjectDescriptor {
        fs::write(dir.join("foo.py"), "def main():\n    pass\n").unwrap();
        ProjectDescriptor {
            name: "foo".to_string(),
            version: "1.0".to_string(),
            license: String::new(),
            requires: vec![],
            module: ModuleSource::File(dir.join("foo.py")),
            entry_points: vec![EntryPoint {
                name: "foo".to_string(),
                module: "foo".to_string(),
                function: "main".to_string(),
            }],
            conda_depends: None,
        }
    }

    #[tokio::test]
    async fn test_builds_full_matrix() {
        let tmp = tempfile::tempdir().unwrap();
        let descriptor = Arc::new(fixture_descriptor(tmp.path()));
        let dist = tmp.path().join("dist");

        let report = build_all(
            &descriptor,
            &["3.8".to_string(), "3.9".to_string()],
            &["linux-64".to_string(), "osx-64".to_string()],
            &dist,
            tmp.path(),
        )
        .await
        .unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(report.built.len(), 4);
        for subdir in ["linux-64", "osx-64"] {
            for tag in ["py38_0", "py39_0"] {
                assert!(dist.join(subdir).join(format!("foo-1.0-{tag}.tar.bz2")).is_file());
            }
        }
    }

    #[tokio::test]
    async fn test_failed_target_does_not_abort_siblings() {
        let tmp = tempfile::tempdir().unwrap();
        let descriptor = Arc::new(fixture_descriptor(tmp.path()));
        let dist = tmp.path().join("dist");

        // No cli-64.exe stub exists, so the Windows build must fail while
        // the Linux one completes.
        let report = build_all(
            &descriptor,
            &["3.9".to_string()],
            &["win-64".to_string(), "linux-64".to_string()],
            &dist,
            tmp.path(),
        )
        .await
        .unwrap();

        assert_eq!(report.built.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].0.contains("win-64"));
        assert!(dist.join("linux-64/foo-1.0-py39_0.tar.bz2").is_file());
        // The failed build left nothing behind but the (empty) platform dir.
        let leftovers: Vec<_> = fs::read_dir(dist.join("win-64")).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_platform_spec_is_a_run_error() {
        let tmp = tempfile::tempdir().unwrap();
        let descriptor = Arc::new(fixture_descriptor(tmp.path()));

        let result = build_all(
            &descriptor,
            &["3.9".to_string()],
            &["amiga-64".to_string()],
            &tmp.path().join("dist"),
            tmp.path(),
        )
        .await;

        assert!(result.is_err());
    }
}
