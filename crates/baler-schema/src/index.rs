//! The serialized `info/index.json` record.

use serde::{Deserialize, Serialize};

/// Package metadata written into every archive as `info/index.json`.
///
/// This structure is shared between the assembler (producer) and any
/// downstream index tooling (consumer). The package format wants the JSON
/// keys sorted; fields are declared in alphabetical order because serde
/// emits them in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexJson {
    /// Architecture token, e.g. `x86_64`.
    pub arch: String,
    /// Build tag, e.g. `py39_0`.
    pub build: String,
    /// Build number; currently always zero.
    pub build_number: u32,
    /// Resolved dependency specs, interpreter requirement first.
    pub depends: Vec<String>,
    /// License identifier, empty when unknown.
    pub license: String,
    /// Package name.
    pub name: String,
    /// Platform token, e.g. `linux`.
    pub platform: String,
    /// Index subdirectory, e.g. `linux-64`.
    pub subdir: String,
    /// Package version.
    pub version: String,
}

impl IndexJson {
    /// Render the record as human-readable JSON with sorted keys.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails, which for this plain-data
    /// struct means an I/O failure inside serde_json.
    pub fn to_pretty_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_sorted() {
        let record = IndexJson {
            arch: "x86_64".to_string(),
            build: "py39_0".to_string(),
            build_number: 0,
            depends: vec!["python 3.9*".to_string()],
            license: "MIT".to_string(),
            name: "foo".to_string(),
            platform: "linux".to_string(),
            subdir: "linux-64".to_string(),
            version: "1.0".to_string(),
        };

        let json = String::from_utf8(record.to_pretty_json().unwrap()).unwrap();
        let keys: Vec<usize> = [
            "\"arch\"",
            "\"build\"",
            "\"build_number\"",
            "\"depends\"",
            "\"license\"",
            "\"name\"",
            "\"platform\"",
            "\"subdir\"",
            "\"version\"",
        ]
        .iter()
        .map(|k| json.find(k).unwrap())
        .collect();

        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted, "index.json keys must appear in sorted order");
    }

    #[test]
    fn test_roundtrip() {
        let record = IndexJson {
            arch: "x86".to_string(),
            build: "py35_0".to_string(),
            build_number: 0,
            depends: vec![],
            license: String::new(),
            name: "pkg".to_string(),
            platform: "win".to_string(),
            subdir: "win-32".to_string(),
            version: "0.1".to_string(),
        };
        let json = record.to_pretty_json().unwrap();
        let back: IndexJson = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, record);
    }
}
