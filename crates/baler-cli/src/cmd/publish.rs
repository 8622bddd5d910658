//! Build and upload packages to anaconda.org.

use super::BuildOptions;
use super::build::{fail_on_errors, run_builds};
use anyhow::{Context, Result};
use std::process::Command;

/// Build the full matrix, then hand every archive to the `anaconda`
/// client. Upload retries and credentials are the client's business, not
/// ours.
pub async fn publish(opts: &BuildOptions) -> Result<()> {
    let report = run_builds(opts).await?;
    fail_on_errors(&report)?;

    println!(
        "Uploading {} files to anaconda.org...",
        report.built.len()
    );
    let status = Command::new("anaconda")
        .arg("upload")
        .args(&report.built)
        .status()
        .context("Failed to run 'anaconda upload' - is the anaconda client installed?")?;

    if !status.success() {
        anyhow::bail!("anaconda upload exited with {status}");
    }
    Ok(())
}
