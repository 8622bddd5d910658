//! Build-target identity: platform family, bitness, and the full [`Target`]
//! triple that drives every path and filtering decision downstream.

use serde::{Deserialize, Serialize};

/// Operating-system family a package is built for.
///
/// The platform decides the install layout inside the archive (POSIX
/// `lib/pythonX.Y/site-packages` + `bin` versus Windows
/// `Lib/site-packages` + `Scripts`) and which launcher convention the
/// script generator uses.
///
/// # Example
///
/// ```
/// use baler_schema::Platform;
///
/// let platform: Platform = "linux".parse().unwrap();
/// assert_eq!(platform.sys_platform(), "linux");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Linux distributions.
    Linux,
    /// macOS.
    Osx,
    /// Windows.
    #[serde(rename = "win")]
    Windows,
}

impl Platform {
    /// Short platform token used in subdir names and the index record.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Osx => "osx",
            Self::Windows => "win",
        }
    }

    /// The value Python's `sys.platform` reports on this platform.
    ///
    /// Distinct from [`as_str()`](Self::as_str): marker expressions compare
    /// against the interpreter's view of the world (`darwin`, `win32`), not
    /// the packaging ecosystem's directory names.
    pub fn sys_platform(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Osx => "darwin",
            Self::Windows => "win32",
        }
    }

    /// Archive directory that receives the module tree, with a trailing
    /// slash. Version-qualified on POSIX, fixed on Windows.
    pub fn site_packages_path(self, python: &str) -> String {
        match self {
            Self::Windows => "Lib/site-packages/".to_string(),
            Self::Linux | Self::Osx => format!("lib/python{python}/site-packages/"),
        }
    }

    /// Archive directory that receives entry-point launchers, with a
    /// trailing slash.
    pub fn scripts_path(self) -> &'static str {
        match self {
            Self::Windows => "Scripts/",
            Self::Linux | Self::Osx => "bin/",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "osx" | "darwin" => Ok(Self::Osx),
            "win" | "win32" | "windows" => Ok(Self::Windows),
            _ => Err(format!("Unknown platform: {s}")),
        }
    }
}

/// Word width of the target interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bitness {
    /// 32-bit.
    #[serde(rename = "32")]
    X32,
    /// 64-bit.
    #[serde(rename = "64")]
    X64,
}

impl Bitness {
    /// Bit-width token used in subdir names (`32` / `64`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X32 => "32",
            Self::X64 => "64",
        }
    }

    /// Architecture token written to the index record (`x86` / `x86_64`).
    pub fn arch(self) -> &'static str {
        match self {
            Self::X32 => "x86",
            Self::X64 => "x86_64",
        }
    }
}

impl std::fmt::Display for Bitness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Bitness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "32" => Ok(Self::X32),
            "64" => Ok(Self::X64),
            _ => Err(format!("Unknown bitness: {s}")),
        }
    }
}

/// The (python version, platform, bitness) triple one archive is built for.
///
/// Constructed once per build and treated as immutable from then on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Interpreter version the package targets, e.g. `3.9`. Compared as a
    /// plain string in marker expressions.
    pub python: String,
    /// Operating-system family.
    pub platform: Platform,
    /// Word width.
    pub bitness: Bitness,
}

impl Target {
    /// Create a target from its parts.
    pub fn new(python: impl Into<String>, platform: Platform, bitness: Bitness) -> Self {
        Self {
            python: python.into(),
            platform,
            bitness,
        }
    }

    /// Parse a `<platform>-<bits>` spec such as `linux-64` together with a
    /// python version.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the spec is not of the form
    /// `<platform>-<bits>` or either component is unknown.
    pub fn from_spec(python: &str, spec: &str) -> Result<Self, String> {
        let (platform, bitness) = spec
            .split_once('-')
            .ok_or_else(|| format!("Invalid platform spec '{spec}': expected <platform>-<bits>"))?;
        Ok(Self {
            python: python.to_string(),
            platform: platform.parse()?,
            bitness: bitness.parse()?,
        })
    }

    /// Package-index subdirectory for this target, e.g. `linux-64`.
    pub fn subdir(&self) -> String {
        format!("{}-{}", self.platform.as_str(), self.bitness.as_str())
    }

    /// Archive directory that receives the module tree, with a trailing
    /// slash.
    pub fn site_packages_path(&self) -> String {
        self.platform.site_packages_path(&self.python)
    }

    /// Archive directory that receives entry-point launchers, with a
    /// trailing slash.
    pub fn scripts_path(&self) -> &'static str {
        self.platform.scripts_path()
    }

    /// The value Python's `platform.machine()` reports on this target.
    ///
    /// `i386` only for 32-bit Linux; every other combination reports the
    /// 64-bit token, matching how upstream markers are written.
    pub fn machine(&self) -> &'static str {
        match (self.platform, self.bitness) {
            (Platform::Linux, Bitness::X32) => "i386",
            _ => "x86_64",
        }
    }

    /// The value Python's `sys.platform` reports on this target.
    pub fn sys_platform(&self) -> &'static str {
        self.platform.sys_platform()
    }

    /// Python version with the dots removed, e.g. `39` for `3.9`.
    pub fn python_digits(&self) -> String {
        self.python.replace('.', "")
    }

    /// Build tag recorded in the index and the archive name, e.g. `py39_0`.
    pub fn build_tag(&self) -> String {
        format!("py{}_{}", self.python_digits(), crate::BUILD_NUMBER)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} py{}", self.subdir(), self.python)
    }
}
