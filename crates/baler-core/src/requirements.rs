//! Requirement translation into conda match specifiers.
//!
//! Abstract requirements arrive in pip's convention
//! (`name >=1.0,<2.0; marker`) and leave in conda's
//! (`name >=1.0,<2.0` with the name and range separated by a space).
//! Translation filters marker-guarded clauses against the build target
//! first, then rewrites the survivors; it never *resolves* versions, only
//! rewrites the constraint syntax.

use crate::markers::{self, Expr, MarkerEnv};
use baler_schema::Target;
use thiserror::Error;

/// Comparators conda can express directly. Anything else (`~=`, `===`)
/// fails translation for the affected build.
const COMPARATORS: [&str; 6] = ["==", "!=", ">=", "<=", ">", "<"];

/// Why a requirement could not be rewritten.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    /// The requirement string carried no package name.
    #[error("requirement '{0}' has no package name")]
    MissingName(String),

    /// A version comparator outside the supported set was used.
    #[error("unsupported version constraint '{constraint}' in requirement '{requirement}'")]
    UnsupportedConstraint {
        /// The full requirement as declared.
        requirement: String,
        /// The offending constraint fragment.
        constraint: String,
    },

    /// The clause's marker expression was malformed.
    #[error("invalid marker in requirement '{requirement}': {source}")]
    Marker {
        /// The full requirement as declared.
        requirement: String,
        /// The underlying parse failure.
        source: markers::ExpressionError,
    },
}

/// One parsed requirement clause: name, optional version constraint,
/// optional guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Package name as declared.
    pub name: String,
    /// Normalized comma-joined constraint, e.g. `>=2.0,<3.0`.
    pub constraint: Option<String>,
    /// Parsed marker expression, if the clause was guarded.
    pub marker: Option<Expr>,
}

impl Requirement {
    /// Parse a single requirement string.
    ///
    /// # Errors
    ///
    /// Returns a [`TranslateError`] if the name is missing, the constraint
    /// uses an unsupported comparator, or the marker does not parse.
    pub fn parse(input: &str) -> Result<Self, TranslateError> {
        let (spec, marker_text) = match input.split_once(';') {
            Some((spec, marker)) => (spec.trim(), Some(marker.trim())),
            None => (input.trim(), None),
        };

        let name: String = spec
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            .collect();
        if name.is_empty() {
            return Err(TranslateError::MissingName(input.to_string()));
        }

        let mut rest = spec[name.len()..].trim();
        // Historical convention allows the range in parentheses: `name (>=1.0)`.
        if let Some(inner) = rest.strip_prefix('(') {
            rest = inner.strip_suffix(')').unwrap_or(inner).trim();
        }
        let constraint = if rest.is_empty() {
            None
        } else {
            Some(normalize_constraint(input, rest)?)
        };

        let marker = marker_text
            .map(|text| {
                Expr::parse(text).map_err(|source| TranslateError::Marker {
                    requirement: input.to_string(),
                    source,
                })
            })
            .transpose()?;

        Ok(Self {
            name,
            constraint,
            marker,
        })
    }

    /// Render this clause as a conda match specifier.
    pub fn conda_spec(&self) -> String {
        match &self.constraint {
            Some(constraint) => format!("{} {constraint}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Validate a version range and strip incidental whitespace, keeping the
/// comma-joined comparator list as one token.
fn normalize_constraint(requirement: &str, raw: &str) -> Result<String, TranslateError> {
    let unsupported = |fragment: &str| TranslateError::UnsupportedConstraint {
        requirement: requirement.to_string(),
        constraint: fragment.to_string(),
    };

    let mut parts = Vec::new();
    for fragment in raw.split(',') {
        let fragment = fragment.trim();
        // `===` starts with `==`; catch it before the comparator scan.
        if fragment.is_empty() || fragment.starts_with("===") || fragment.starts_with("~=") {
            return Err(unsupported(fragment));
        }
        let op = COMPARATORS
            .iter()
            .find(|op| fragment.starts_with(**op))
            .ok_or_else(|| unsupported(fragment))?;
        let version = fragment[op.len()..].trim();
        if version.is_empty() || version.contains(char::is_whitespace) {
            return Err(unsupported(fragment));
        }
        parts.push(format!("{op}{version}"));
    }
    Ok(parts.join(","))
}

/// Translate a project's abstract requirements into the conda dependency
/// list for one target.
///
/// The synthesized interpreter requirement always comes first. When an
/// explicit override list is given it replaces per-clause translation
/// wholesale; otherwise clauses are marker-filtered against the target and
/// rewritten in declaration order.
///
/// # Errors
///
/// Returns a [`TranslateError`] if any surviving clause cannot be parsed
/// or rewritten. The failure is fatal only to the build that needed this
/// dependency list.
pub fn translate(
    requires: &[String],
    override_depends: Option<&[String]>,
    target: &Target,
) -> Result<Vec<String>, TranslateError> {
    let mut depends = vec![format!("python {}*", target.python)];

    if let Some(explicit) = override_depends {
        depends.extend(explicit.iter().cloned());
        return Ok(depends);
    }

    let env = MarkerEnv::from_target(target);
    for raw in requires {
        let requirement = Requirement::parse(raw)?;
        if let Some(marker) = &requirement.marker {
            if !marker.evaluate(&env) {
                continue;
            }
        }
        depends.push(requirement.conda_spec());
    }

    Ok(depends)
}

#[cfg(test)]
mod tests {
    use super::*;
    use baler_schema::{Bitness, Platform};

    fn linux64(python: &str) -> Target {
        Target::new(python, Platform::Linux, Bitness::X64)
    }

    #[test]
    fn test_interpreter_requirement_always_first() {
        let requires = vec!["requests >=2.0".to_string()];
        let depends = translate(&requires, None, &linux64("3.9")).unwrap();
        assert_eq!(depends[0], "python 3.9*");

        let override_list = vec!["numpy".to_string()];
        let depends = translate(&requires, Some(&override_list), &linux64("3.9")).unwrap();
        assert_eq!(depends[0], "python 3.9*");
    }

    #[test]
    fn test_override_replaces_translation() {
        let requires = vec!["requests >=2.0".to_string(), "six".to_string()];
        let override_list = vec!["numpy 1.11*".to_string()];
        let depends = translate(&requires, Some(&override_list), &linux64("3.9")).unwrap();
        assert_eq!(depends, vec!["python 3.9*", "numpy 1.11*"]);
    }

    #[test]
    fn test_marker_filtering() {
        let requires = vec![
            "enum34; python_version == '3.3'".to_string(),
            "requests".to_string(),
        ];
        let depends = translate(&requires, None, &linux64("3.9")).unwrap();
        assert_eq!(depends, vec!["python 3.9*", "requests"]);

        let depends = translate(&requires, None, &linux64("3.3")).unwrap();
        assert_eq!(depends, vec!["python 3.3*", "enum34", "requests"]);
    }

    #[test]
    fn test_declaration_order_is_preserved() {
        let requires = vec![
            "zzz".to_string(),
            "aaa".to_string(),
            "mmm >=1.0".to_string(),
        ];
        let depends = translate(&requires, None, &linux64("3.9")).unwrap();
        assert_eq!(depends, vec!["python 3.9*", "zzz", "aaa", "mmm >=1.0"]);
    }

    #[test]
    fn test_constraint_normalization() {
        let req = Requirement::parse("requests >= 2.0 , < 3.0").unwrap();
        assert_eq!(req.conda_spec(), "requests >=2.0,<3.0");

        let req = Requirement::parse("requests(>=2.0)").unwrap();
        assert_eq!(req.conda_spec(), "requests >=2.0");

        let req = Requirement::parse("six").unwrap();
        assert_eq!(req.conda_spec(), "six");
    }

    #[test]
    fn test_unsupported_comparators() {
        for raw in ["requests ~=2.0", "requests ===2.0", "requests ^2.0"] {
            let err = Requirement::parse(raw).unwrap_err();
            assert!(
                matches!(err, TranslateError::UnsupportedConstraint { .. }),
                "{raw} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn test_missing_name() {
        let err = Requirement::parse(">=2.0").unwrap_err();
        assert!(matches!(err, TranslateError::MissingName(_)));
    }

    #[test]
    fn test_malformed_marker_is_fatal() {
        let requires = vec!["enum34; python_version ==".to_string()];
        let err = translate(&requires, None, &linux64("3.9")).unwrap_err();
        assert!(matches!(err, TranslateError::Marker { .. }));
    }
}
