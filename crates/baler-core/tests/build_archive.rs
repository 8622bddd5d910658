//! End-to-end archive tests: build real packages into memory and read
//! them back through the tar/bzip2 decoders.

use baler_core::assemble::PackageBuilder;
use baler_core::descriptor::ProjectDescriptor;
use baler_schema::{Bitness, Platform, Target};
use bzip2::read::BzDecoder;
use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::Path;
use tar::Archive;
use tempfile::tempdir;

struct ArchiveEntry {
    path: String,
    is_dir: bool,
    mode: u32,
    contents: Vec<u8>,
}

fn read_archive(bytes: &[u8]) -> Vec<ArchiveEntry> {
    let mut archive = Archive::new(BzDecoder::new(bytes));
    archive
        .entries()
        .expect("archive should parse")
        .map(|entry| {
            let mut entry = entry.expect("entry should parse");
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            let is_dir = entry.header().entry_type().is_dir();
            let mode = entry.header().mode().unwrap();
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).unwrap();
            ArchiveEntry {
                path,
                is_dir,
                mode,
                contents,
            }
        })
        .collect()
}

fn entry_contents<'a>(entries: &'a [ArchiveEntry], path: &str) -> &'a [u8] {
    &entries
        .iter()
        .find(|entry| entry.path == path)
        .unwrap_or_else(|| panic!("archive should contain {path}"))
        .contents
}

fn single_file_project(dir: &Path) -> ProjectDescriptor {
    fs::write(dir.join("foo.py"), "def main():\n    print('hello')\n").unwrap();
    fs::write(
        dir.join("pyproject.toml"),
        r#"
[project]
name = "foo"
version = "0.2.5"
classifiers = ["License :: OSI Approved :: MIT License"]

[project.scripts]
foo = "foo:main"
"#,
    )
    .unwrap();
    ProjectDescriptor::load(&dir.join("pyproject.toml")).unwrap()
}

#[test]
fn test_end_to_end_single_file_build() {
    let tmp = tempdir().unwrap();
    let descriptor = single_file_project(tmp.path());
    let target = Target::new("3.9", Platform::Linux, Bitness::X64);
    let builder = PackageBuilder::new(&descriptor, target, tmp.path());

    let mut bytes = Vec::new();
    let manifest = builder.build(&mut bytes).unwrap();
    let entries = read_archive(&bytes);

    let paths: Vec<&str> = entries.iter().map(|entry| entry.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "lib/python3.9/site-packages/foo.py",
            "bin/foo",
            "info/index.json",
            "info/has_prefix",
            "info/files",
        ]
    );

    // The launcher is executable and embeds the placeholder verbatim.
    let launcher = entries.iter().find(|entry| entry.path == "bin/foo").unwrap();
    assert_eq!(launcher.mode, 0o755);
    let source = String::from_utf8(launcher.contents.clone()).unwrap();
    assert!(source.starts_with("#!/opt/anaconda1anaconda2anaconda3/bin/python\n"));

    let index: serde_json::Value =
        serde_json::from_slice(entry_contents(&entries, "info/index.json")).unwrap();
    assert_eq!(index["name"], "foo");
    assert_eq!(index["version"], "0.2.5");
    assert_eq!(index["license"], "MIT License");
    assert_eq!(index["build"], "py39_0");
    assert_eq!(index["build_number"], 0);
    assert_eq!(index["arch"], "x86_64");
    assert_eq!(index["platform"], "linux");
    assert_eq!(index["subdir"], "linux-64");
    assert_eq!(index["depends"], serde_json::json!(["python 3.9*"]));

    assert_eq!(entry_contents(&entries, "info/has_prefix"), b"bin/foo".as_slice());
    assert_eq!(
        entry_contents(&entries, "info/files"),
        b"lib/python3.9/site-packages/foo.py\nbin/foo".as_slice()
    );

    assert_eq!(
        manifest.files,
        vec!["lib/python3.9/site-packages/foo.py", "bin/foo"]
    );
    assert_eq!(manifest.has_prefix, vec!["bin/foo"]);
}

#[test]
fn test_archives_are_byte_identical_across_builds() {
    let tmp = tempdir().unwrap();
    let descriptor = single_file_project(tmp.path());
    let target = Target::new("3.9", Platform::Linux, Bitness::X64);
    let builder = PackageBuilder::new(&descriptor, target, tmp.path());

    let mut first = Vec::new();
    builder.build(&mut first).unwrap();
    let mut second = Vec::new();
    builder.build(&mut second).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_manifest_matches_archive_contents() {
    let tmp = tempdir().unwrap();
    // A package directory with a subpackage and bytecode caches that must
    // not ship.
    let pkg = tmp.path().join("mypkg");
    fs::create_dir_all(pkg.join("sub")).unwrap();
    fs::create_dir_all(pkg.join("__pycache__")).unwrap();
    fs::write(pkg.join("__init__.py"), "").unwrap();
    fs::write(pkg.join("core.py"), "x = 1\n").unwrap();
    fs::write(pkg.join("core.pyc"), b"\x00\x01").unwrap();
    fs::write(pkg.join("sub/__init__.py"), "").unwrap();
    fs::write(pkg.join("__pycache__/core.cpython-39.pyc"), b"\x00").unwrap();
    fs::write(
        tmp.path().join("pyproject.toml"),
        r#"
[project]
name = "mypkg"
version = "1.0"
license = "BSD"
"#,
    )
    .unwrap();

    let descriptor = ProjectDescriptor::load(&tmp.path().join("pyproject.toml")).unwrap();
    let target = Target::new("3.9", Platform::Linux, Bitness::X64);
    let builder = PackageBuilder::new(&descriptor, target, tmp.path());

    let mut bytes = Vec::new();
    let manifest = builder.build(&mut bytes).unwrap();
    let entries = read_archive(&bytes);

    // Payload files in the archive and the manifest agree exactly.
    let archive_files: BTreeSet<String> = entries
        .iter()
        .filter(|entry| !entry.is_dir && !entry.path.starts_with("info/"))
        .map(|entry| entry.path.clone())
        .collect();
    let manifest_files: BTreeSet<String> = manifest.files.iter().cloned().collect();
    assert_eq!(archive_files, manifest_files);

    // Bytecode caches were excluded.
    assert!(!archive_files.iter().any(|path| path.contains("__pycache__")));
    assert!(!archive_files.iter().any(|path| path.ends_with(".pyc")));

    // Intermediate directories exist as directory entries.
    let dirs: Vec<&str> = entries
        .iter()
        .filter(|entry| entry.is_dir)
        .map(|entry| entry.path.as_str())
        .collect();
    assert!(dirs.contains(&"lib/python3.9/site-packages/mypkg/"));
    assert!(dirs.contains(&"lib/python3.9/site-packages/mypkg/sub/"));

    // Walk order is sorted at every level.
    assert_eq!(
        manifest.files,
        vec![
            "lib/python3.9/site-packages/mypkg/__init__.py",
            "lib/python3.9/site-packages/mypkg/core.py",
            "lib/python3.9/site-packages/mypkg/sub/__init__.py",
        ]
    );

    // No entry points, nothing to substitute: has_prefix is omitted.
    assert!(!entries.iter().any(|entry| entry.path == "info/has_prefix"));
    assert!(manifest.has_prefix.is_empty());
}

#[test]
fn test_windows_layout() {
    let tmp = tempdir().unwrap();
    let descriptor = single_file_project(tmp.path());
    fs::write(tmp.path().join("cli-64.exe"), b"MZfake").unwrap();

    let target = Target::new("3.5", Platform::Windows, Bitness::X64);
    let builder = PackageBuilder::new(&descriptor, target, tmp.path());

    let mut bytes = Vec::new();
    let manifest = builder.build(&mut bytes).unwrap();
    let entries = read_archive(&bytes);

    let paths: Vec<&str> = entries.iter().map(|entry| entry.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "Lib/site-packages/foo.py",
            "Scripts/foo-script.py",
            "Scripts/foo.exe",
            "info/index.json",
            "info/files",
        ]
    );
    assert_eq!(entry_contents(&entries, "Scripts/foo.exe"), b"MZfake".as_slice());

    // Nothing is flagged for prefix substitution on Windows.
    assert!(manifest.has_prefix.is_empty());

    let index: serde_json::Value =
        serde_json::from_slice(entry_contents(&entries, "info/index.json")).unwrap();
    assert_eq!(index["platform"], "win");
    assert_eq!(index["subdir"], "win-64");
    assert_eq!(index["build"], "py35_0");
}

#[test]
fn test_marker_guarded_requirements_per_target() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("foo.py"), "def main():\n    pass\n").unwrap();
    fs::write(
        tmp.path().join("pyproject.toml"),
        r#"
[project]
name = "foo"
version = "1.0"
dependencies = [
    "requests >=2.0",
    "enum34; python_version == '3.3'",
    "pywin32; 'win' in sys.platform",
]
"#,
    )
    .unwrap();
    let descriptor = ProjectDescriptor::load(&tmp.path().join("pyproject.toml")).unwrap();

    let linux = Target::new("3.9", Platform::Linux, Bitness::X64);
    let mut bytes = Vec::new();
    let manifest = PackageBuilder::new(&descriptor, linux, tmp.path())
        .build(&mut bytes)
        .unwrap();
    assert_eq!(
        manifest.index.depends,
        vec!["python 3.9*", "requests >=2.0"]
    );

    let windows = Target::new("3.3", Platform::Windows, Bitness::X64);
    fs::write(tmp.path().join("cli-64.exe"), b"MZ").unwrap();
    let mut bytes = Vec::new();
    let manifest = PackageBuilder::new(&descriptor, windows, tmp.path())
        .build(&mut bytes)
        .unwrap();
    assert_eq!(
        manifest.index.depends,
        vec!["python 3.3*", "requests >=2.0", "enum34", "pywin32"]
    );
}
