//! Build conda packages for every requested target.

use super::BuildOptions;
use anyhow::{Context, Result};
use baler_core::descriptor::ProjectDescriptor;
use baler_core::driver::{self, BuildReport};
use std::sync::Arc;

/// Run the full build matrix and report where the archives landed.
pub async fn build(opts: &BuildOptions) -> Result<()> {
    let report = run_builds(opts).await?;
    fail_on_errors(&report)
}

/// Shared by build and publish: load the descriptor once, fan out the
/// builds, print the result glob.
pub(crate) async fn run_builds(opts: &BuildOptions) -> Result<BuildReport> {
    let descriptor = Arc::new(
        ProjectDescriptor::load(&opts.project)
            .with_context(|| format!("Failed to load {}", opts.project.display()))?,
    );

    let report = driver::build_all(
        &descriptor,
        &opts.pythons,
        &opts.platforms,
        &opts.dist_dir,
        &opts.launchers,
    )
    .await?;

    println!(
        "Packages are now in {}",
        driver::result_glob(&opts.dist_dir, &descriptor)
    );

    Ok(report)
}

/// Surface per-target failures as a non-zero exit after the whole matrix
/// has run.
pub(crate) fn fail_on_errors(report: &BuildReport) -> Result<()> {
    if report.failures.is_empty() {
        return Ok(());
    }
    for (target, err) in &report.failures {
        eprintln!("  {target}: {err}");
    }
    anyhow::bail!(
        "{} of {} builds failed",
        report.failures.len(),
        report.failures.len() + report.built.len()
    )
}
