//! Entry-point launcher generation.
//!
//! Every declared entry point becomes an executable in the archive. On
//! POSIX targets that is a small Python source file under `bin/` whose
//! shebang points at the install-prefix placeholder - the installer
//! rewrites it, so the file is flagged for prefix substitution. Windows
//! uses a different convention: a `<name>-script.py` source next to a
//! copy of a precompiled `<name>.exe` stub that finds and runs it.

use crate::descriptor::EntryPoint;
use crate::error::BuildError;
use baler_schema::{PREFIX_PLACEHOLDER, Platform, Target};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// A file emitted by the script generator, ready to be streamed into the
/// archive.
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    /// Path inside the archive.
    pub archive_path: String,
    /// File contents.
    pub contents: Vec<u8>,
    /// Whether the archive entry is marked executable.
    pub executable: bool,
    /// Whether the file needs install-time prefix substitution.
    pub needs_prefix: bool,
}

/// Render the launcher source for one entry point.
///
/// The template is identical for every entry point; only the module and
/// function names are substituted. The placeholder interpreter path must
/// survive into the archive verbatim.
fn render_launcher(entry_point: &EntryPoint) -> String {
    format!(
        r"#!{PREFIX_PLACEHOLDER}/bin/python
import sys

from {module} import {function}

if __name__ == '__main__':
    sys.exit({function}())
",
        module = entry_point.module,
        function = entry_point.function,
    )
}

/// Generate launcher files for all entry points of one target.
///
/// `launchers_dir` must hold the precompiled Windows stubs
/// (`cli-32.exe` / `cli-64.exe`); it is only consulted for Windows
/// targets.
///
/// # Errors
///
/// Returns [`BuildError::MissingLauncherStub`] if a Windows build cannot
/// find its stub, or [`BuildError::Io`] for other read failures.
pub fn generate(
    entry_points: &[EntryPoint],
    target: &Target,
    launchers_dir: &Path,
) -> Result<Vec<GeneratedFile>, BuildError> {
    // The stub is identical for every entry point; read it once.
    let stub = if target.platform == Platform::Windows && !entry_points.is_empty() {
        let stub_path = launchers_dir.join(format!("cli-{}.exe", target.bitness.as_str()));
        let bytes = fs::read(&stub_path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                BuildError::MissingLauncherStub(stub_path.clone())
            } else {
                BuildError::Io(err)
            }
        })?;
        Some(bytes)
    } else {
        None
    };

    let scripts_dir = target.scripts_path();
    let mut generated = Vec::new();
    for entry_point in entry_points {
        let source = render_launcher(entry_point);
        match target.platform {
            Platform::Windows => {
                generated.push(GeneratedFile {
                    archive_path: format!("{scripts_dir}{}-script.py", entry_point.name),
                    contents: source.into_bytes(),
                    executable: false,
                    needs_prefix: false,
                });
                generated.push(GeneratedFile {
                    archive_path: format!("{scripts_dir}{}.exe", entry_point.name),
                    contents: stub.clone().unwrap_or_default(),
                    executable: true,
                    needs_prefix: false,
                });
            }
            Platform::Linux | Platform::Osx => {
                generated.push(GeneratedFile {
                    archive_path: format!("{scripts_dir}{}", entry_point.name),
                    contents: source.into_bytes(),
                    executable: true,
                    needs_prefix: true,
                });
            }
        }
    }

    Ok(generated)
}
