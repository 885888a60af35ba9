//! Raw dependency strings to canonical declarations

use crate::error::{Result, VersionError};
use crate::version::{BareVersion, Constraint, Narrowness};
use mosaic_core::{Warning, WarningKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// One dependency string as extracted from a manifest by an upstream parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDependencySpec {
    pub source_id: String,
    pub manifest_path: String,
    pub raw_string: String,
    /// Manifest dialect (`pip`, `cargo`, `npm`, or a manifest file name).
    pub format_tag: String,
    #[serde(default)]
    pub is_dev: bool,
}

impl RawDependencySpec {
    pub fn new(
        source_id: impl Into<String>,
        manifest_path: impl Into<String>,
        raw_string: impl Into<String>,
        format_tag: impl Into<String>,
    ) -> Self {
        RawDependencySpec {
            source_id: source_id.into(),
            manifest_path: manifest_path.into(),
            raw_string: raw_string.into(),
            format_tag: format_tag.into(),
            is_dev: false,
        }
    }

    pub fn dev(mut self) -> Self {
        self.is_dev = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Pip,
    Cargo,
    Npm,
    Other,
}

impl ManifestFormat {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "pip" | "pypi" | "requirements" | "requirements.txt" | "pyproject" | "pyproject.toml"
            | "setup.py" | "setup.cfg" | "pipfile" | "poetry" => ManifestFormat::Pip,
            "cargo" | "cargo.toml" | "crates" => ManifestFormat::Cargo,
            "npm" | "package.json" | "yarn" | "pnpm" => ManifestFormat::Npm,
            _ => ManifestFormat::Other,
        }
    }

    pub fn bare_version(&self) -> BareVersion {
        match self {
            ManifestFormat::Cargo => BareVersion::Caret,
            _ => BareVersion::Exact,
        }
    }
}

/// A normalized statement that a source requires a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDeclaration {
    /// Canonical name, the grouping key.
    pub name: String,
    /// Name as first written.
    pub display_name: String,
    /// `None` when the constraint text could not be parsed.
    pub constraint: Option<Constraint>,
    pub raw_constraint: String,
    pub extras: Vec<String>,
    pub source_id: String,
    pub manifest_path: String,
    pub is_dev: bool,
    /// Position within its source set.
    pub order: usize,
}

impl DependencyDeclaration {
    pub fn is_parseable(&self) -> bool {
        self.constraint.is_some()
    }

    /// `source:manifest`, used in logs and relaxation entries.
    pub fn source_label(&self) -> String {
        format!("{}:{}", self.source_id, self.manifest_path)
    }

    pub fn narrowness(&self) -> Narrowness {
        self.constraint
            .as_ref()
            .map_or(Narrowness::Open, Constraint::narrowness)
    }

    /// Render back to a raw dependency string that normalizes to the same declaration.
    pub fn to_raw(&self) -> String {
        let extras = if self.extras.is_empty() {
            String::new()
        } else {
            format!("[{}]", self.extras.join(","))
        };
        let constraint = match &self.constraint {
            Some(constraint) => constraint.to_string(),
            None => self.raw_constraint.clone(),
        };
        format!("{}{} {}", self.display_name, extras, constraint)
    }
}

/// The declarations of one input source, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySet {
    pub source_id: String,
    pub declarations: Vec<DependencyDeclaration>,
}

/// Lowercase, with every run of `-`, `_` and `.` folded to a single `-`.
pub fn canonical_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_run {
                out.push('-');
            }
            in_run = true;
        } else {
            out.extend(c.to_lowercase());
            in_run = false;
        }
    }
    out
}

struct Requirement<'a> {
    name: &'a str,
    extras: Vec<String>,
    constraint: &'a str,
}

/// Split `name [extras] [sep] constraint [; markers]`.
fn split_requirement(raw: &str) -> Requirement<'_> {
    let body = raw.split(';').next().unwrap_or_default().trim();

    let scoped = body.starts_with('@');
    let mut seen_slash = false;
    let mut end = 0;
    for (i, c) in body.char_indices() {
        let accepted = c.is_alphanumeric()
            || matches!(c, '-' | '_' | '.')
            || (i == 0 && scoped)
            || (c == '/' && scoped && !seen_slash);
        if !accepted {
            break;
        }
        seen_slash |= c == '/';
        end = i + c.len_utf8();
    }
    let name = &body[..end];
    let mut rest = body[end..].trim_start();

    let mut extras = Vec::new();
    if let Some(inner) = rest.strip_prefix('[') {
        if let Some(close) = inner.find(']') {
            extras = inner[..close]
                .split(',')
                .map(canonical_name)
                .filter(|e| !e.is_empty())
                .collect();
            extras.sort();
            extras.dedup();
            rest = inner[close + 1..].trim_start();
        }
    }

    if let Some(after) = rest.strip_prefix('@') {
        rest = after;
    } else if rest.starts_with('=') && !rest.starts_with("==") {
        rest = &rest[1..];
    }

    let constraint = rest
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '(' | ')'))
        .trim();

    Requirement {
        name,
        extras,
        constraint,
    }
}

/// Normalize one raw spec. Fails only when no package name can be found;
/// a bad constraint gives an unparseable declaration instead.
pub fn normalize(spec: &RawDependencySpec) -> Result<DependencyDeclaration> {
    let requirement = split_requirement(&spec.raw_string);
    if requirement.name.is_empty() || requirement.name == "@" {
        return Err(VersionError::MissingName(spec.raw_string.clone()));
    }

    let format = ManifestFormat::from_tag(&spec.format_tag);
    let constraint = Constraint::parse(requirement.constraint, format.bare_version()).ok();

    Ok(DependencyDeclaration {
        name: canonical_name(requirement.name),
        display_name: requirement.name.to_string(),
        constraint,
        raw_constraint: requirement.constraint.to_string(),
        extras: requirement.extras,
        source_id: spec.source_id.clone(),
        manifest_path: spec.manifest_path.clone(),
        is_dev: spec.is_dev,
        order: 0,
    })
}

/// Normalize every spec into one set per source, merging duplicates.
///
/// Sets come out in first-appearance order of their source ids.
pub fn normalize_all(specs: &[RawDependencySpec]) -> (Vec<DependencySet>, Vec<Warning>) {
    let mut sets: Vec<DependencySet> = Vec::new();
    let mut set_index: HashMap<String, usize> = HashMap::new();
    let mut positions: Vec<HashMap<String, usize>> = Vec::new();
    let mut warnings = Vec::new();

    for spec in specs {
        let declaration = match normalize(spec) {
            Ok(declaration) => declaration,
            Err(e) => {
                warnings.push(
                    Warning::new(
                        WarningKind::MalformedConstraint,
                        &spec.source_id,
                        format!("{e} ({})", spec.manifest_path),
                    )
                    .logged(),
                );
                continue;
            }
        };
        if !declaration.is_parseable() {
            warnings.push(
                Warning::new(
                    WarningKind::MalformedConstraint,
                    &declaration.name,
                    format!(
                        "constraint `{}` from {} cannot be parsed; excluded from automatic resolution",
                        declaration.raw_constraint,
                        declaration.source_label()
                    ),
                )
                .logged(),
            );
        }

        let index = *set_index.entry(spec.source_id.clone()).or_insert_with(|| {
            sets.push(DependencySet {
                source_id: spec.source_id.clone(),
                declarations: Vec::new(),
            });
            positions.push(HashMap::new());
            sets.len() - 1
        });
        let set = &mut sets[index];

        match positions[index].get(&declaration.name) {
            Some(&existing) => {
                debug!("Merging duplicate {} in {}", declaration.name, set.source_id);
                merge_into(&mut set.declarations[existing], declaration);
            }
            None => {
                let order = set.declarations.len();
                positions[index].insert(declaration.name.clone(), order);
                set.declarations.push(DependencyDeclaration { order, ..declaration });
            }
        }
    }

    (sets, warnings)
}

fn merge_into(existing: &mut DependencyDeclaration, duplicate: DependencyDeclaration) {
    existing.constraint = match (existing.constraint.take(), duplicate.constraint) {
        (Some(a), Some(b)) => Some(a.intersect(&b)),
        _ => None,
    };
    existing.raw_constraint = match (existing.raw_constraint.is_empty(), duplicate.raw_constraint.is_empty()) {
        (_, true) => existing.raw_constraint.clone(),
        (true, false) => duplicate.raw_constraint,
        (false, false) => format!("{},{}", existing.raw_constraint, duplicate.raw_constraint),
    };
    existing.extras.extend(duplicate.extras);
    existing.extras.sort();
    existing.extras.dedup();
    existing.is_dev &= duplicate.is_dev;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pip(raw: &str) -> DependencyDeclaration {
        normalize(&RawDependencySpec::new("s", "requirements.txt", raw, "pip")).unwrap()
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("Flask_SQLAlchemy"), "flask-sqlalchemy");
        assert_eq!(canonical_name("zope.interface"), "zope-interface");
        assert_eq!(canonical_name("a-_.b"), "a-b");
        assert_eq!(canonical_name("@Types/Node"), "@types/node");
    }

    #[test]
    fn test_split_forms() {
        let d = pip("Requests[Security, socks] >=2.0,<3.0 ; python_version >= '3.8'");
        assert_eq!(d.name, "requests");
        assert_eq!(d.display_name, "Requests");
        assert_eq!(d.extras, vec!["security", "socks"]);
        assert_eq!(d.constraint.unwrap().to_string(), ">=2.0,<3.0");

        let npm = normalize(&RawDependencySpec::new("w", "package.json", "@types/node@^20.1.0", "npm")).unwrap();
        assert_eq!(npm.name, "@types/node");
        assert_eq!(npm.constraint.unwrap().to_string(), ">=20.1.0,<21");

        let cargo = normalize(&RawDependencySpec::new("r", "Cargo.toml", "serde = \"1.0\"", "cargo")).unwrap();
        assert_eq!(cargo.name, "serde");
        assert_eq!(cargo.constraint.unwrap().to_string(), ">=1.0,<2");

        assert!(pip("numpy").constraint.unwrap().is_any());
        assert_eq!(pip("numpy==1.20").constraint.unwrap().to_string(), "==1.20");
        assert_eq!(pip("numpy 1.20").constraint.unwrap().to_string(), "==1.20");
    }

    #[test]
    fn test_malformed_constraint_is_kept() {
        let d = pip("torch >=banana");
        assert!(!d.is_parseable());
        assert_eq!(d.raw_constraint, ">=banana");
        assert!(normalize(&RawDependencySpec::new("s", "r.txt", ">=1.0", "pip")).is_err());
    }

    #[test]
    fn test_to_raw_roundtrip() {
        let d = pip("Flask_Login[extra]~=0.6.2");
        let again = pip(&d.to_raw());
        assert_eq!(again.name, d.name);
        assert_eq!(again.constraint, d.constraint);
        assert_eq!(again.extras, d.extras);
    }
}
