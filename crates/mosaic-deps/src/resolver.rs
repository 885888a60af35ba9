//! Version resolution with bounded constraint relaxation
//!
//! Non-conflicting packages get the highest available version inside the
//! intersection of their declarations. Conflicting packages go through at
//! most `max_attempts` relaxation steps: each step widens the narrowest
//! declaration outside the largest satisfiable subset (every declaration
//! when that subset is tied) by one notch.

use crate::conflict::{self, Conflict, ConflictReason, PackageGroup, Severity};
use crate::normalize::{DependencyDeclaration, RawDependencySpec, normalize_all};
use crate::oracle::VersionOracle;
use crate::version::{Constraint, Version};
use mosaic_core::{Warning, WarningKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDependency {
    pub package: String,
    pub version: Version,
    /// Intersection the version was picked from.
    pub constraint: Constraint,
    pub declarations: Vec<DependencyDeclaration>,
    pub extras: Vec<String>,
    pub is_dev: bool,
    /// Set when relaxation was needed to get here.
    pub relaxed_from: Option<Conflict>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelaxationOutcome {
    StillConflicting,
    NoMatchingVersion,
    Resolved,
}

/// One relaxation step, as recorded in the resolution log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaxationEntry {
    pub package: String,
    pub attempt: u32,
    /// `source:manifest` of the widened declaration.
    pub declaration: String,
    pub before: String,
    pub after: String,
    pub outcome: RelaxationOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub resolved: Vec<ResolvedDependency>,
    /// Unresolved conflicts, for a human to settle.
    pub conflicts: Vec<Conflict>,
    pub relaxation_log: Vec<RelaxationEntry>,
}

impl ResolutionResult {
    pub fn get(&self, package: &str) -> Option<&ResolvedDependency> {
        self.resolved.iter().find(|r| r.package == package)
    }

    pub fn conflict(&self, package: &str) -> Option<&Conflict> {
        self.conflicts.iter().find(|c| c.package == package)
    }

    pub fn is_complete(&self) -> bool {
        self.conflicts.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolveOutput {
    pub result: ResolutionResult,
    pub warnings: Vec<Warning>,
}

pub struct Resolver<'a> {
    oracle: &'a dyn VersionOracle,
    max_attempts: u32,
}

impl<'a> Resolver<'a> {
    pub fn new(oracle: &'a dyn VersionOracle, max_attempts: u32) -> Self {
        Resolver {
            oracle,
            max_attempts,
        }
    }

    /// Resolve every group, serially and in group order.
    ///
    /// `conflicts` are the detector's findings for these groups.
    pub async fn resolve(&self, groups: &[PackageGroup], conflicts: &[Conflict]) -> ResolveOutput {
        let mut output = ResolveOutput::default();

        for group in groups {
            let known = conflicts.iter().find(|c| c.package == group.name);
            self.resolve_group(group, known, &mut output).await;
        }

        info!(
            "Resolution finished via {} oracle: {} resolved, {} conflicts, {} relaxation steps",
            self.oracle.name(),
            output.result.resolved.len(),
            output.result.conflicts.len(),
            output.result.relaxation_log.len()
        );
        output
    }

    async fn resolve_group(&self, group: &PackageGroup, known: Option<&Conflict>, output: &mut ResolveOutput) {
        if let Some(conflict) = known.filter(|c| c.reason == ConflictReason::Unparseable) {
            unresolved(output, conflict.clone(), WarningKind::UnresolvedConflict);
            return;
        }

        let versions = match self.oracle.available_versions(&group.name).await {
            Ok(versions) => versions,
            Err(e) => {
                let conflict = Conflict::new(
                    &group.name,
                    group.declarations.clone(),
                    ConflictReason::OracleUnavailable,
                    None,
                );
                output.warnings.push(
                    Warning::new(
                        WarningKind::OracleUnavailable,
                        &group.name,
                        format!("{} oracle failed: {e:#}", self.oracle.name()),
                    )
                    .logged(),
                );
                output.result.conflicts.push(conflict);
                return;
            }
        };

        match known {
            Some(conflict) => self.relax(group, conflict, &versions, output),
            None => {
                let merged = Constraint::intersect_all(group.constraints()).simplified();
                match highest_matching(&versions, &merged) {
                    Some(version) => {
                        debug!("{} -> {} (from {})", group.name, version, merged);
                        output.result.resolved.push(resolved(group, version, merged, None));
                    }
                    None => {
                        let conflict = Conflict::new(
                            &group.name,
                            group.declarations.clone(),
                            ConflictReason::NoMatchingVersion,
                            Some(merged),
                        );
                        unresolved(output, conflict, WarningKind::NoMatchingVersion);
                    }
                }
            }
        }
    }

    fn relax(&self, group: &PackageGroup, conflict: &Conflict, versions: &[Version], output: &mut ResolveOutput) {
        let parseable = group.parseable();
        let mut working: Vec<Constraint> = group.constraints().into_iter().cloned().collect();

        for attempt in 1..=self.max_attempts {
            let refs: Vec<&Constraint> = working.iter().collect();
            let subset = conflict::largest_satisfiable(&refs);
            if subset.is_complete(working.len()) {
                // Satisfiable but nothing published inside it; widening further only guesses
                break;
            }

            let candidates: Vec<usize> = if subset.tied || subset.members.is_empty() {
                (0..working.len()).collect()
            } else {
                (0..working.len())
                    .filter(|i| !subset.members.contains(i))
                    .collect()
            };
            let Some(pick) = candidates
                .into_iter()
                .filter(|i| !working[*i].is_any())
                .min_by_key(|i| (working[*i].narrowness(), *i))
            else {
                break;
            };
            let Some(widened) = working[pick].widen() else {
                break;
            };

            let before = std::mem::replace(&mut working[pick], widened);
            let merged = Constraint::intersect_all(&working);
            let picked = if merged.is_satisfiable() {
                highest_matching(versions, &merged.simplified())
            } else {
                None
            };
            let outcome = match (&picked, merged.is_satisfiable()) {
                (Some(_), _) => RelaxationOutcome::Resolved,
                (None, true) => RelaxationOutcome::NoMatchingVersion,
                (None, false) => RelaxationOutcome::StillConflicting,
            };

            let entry = RelaxationEntry {
                package: group.name.clone(),
                attempt,
                declaration: parseable[pick].source_label(),
                before: before.to_string(),
                after: working[pick].to_string(),
                outcome,
            };
            info!(
                "Relaxing {} (attempt {}): {} {} -> {}: {:?}",
                entry.package, entry.attempt, entry.declaration, entry.before, entry.after, entry.outcome
            );
            output.result.relaxation_log.push(entry);

            if let Some(version) = picked {
                let provenance = Conflict {
                    severity: Severity::Resolvable,
                    ..conflict.clone()
                };
                output
                    .result
                    .resolved
                    .push(resolved(group, version, merged.simplified(), Some(provenance)));
                return;
            }
        }

        unresolved(output, conflict.clone(), WarningKind::UnresolvedConflict);
    }
}

fn highest_matching(versions: &[Version], constraint: &Constraint) -> Option<Version> {
    versions.iter().filter(|v| constraint.matches(v)).max().cloned()
}

fn resolved(
    group: &PackageGroup,
    version: Version,
    constraint: Constraint,
    relaxed_from: Option<Conflict>,
) -> ResolvedDependency {
    let mut extras: Vec<String> = group
        .declarations
        .iter()
        .flat_map(|d| d.extras.iter().cloned())
        .collect();
    extras.sort();
    extras.dedup();

    ResolvedDependency {
        package: group.name.clone(),
        version,
        constraint,
        declarations: group.parseable().into_iter().cloned().collect(),
        extras,
        is_dev: group.declarations.iter().all(|d| d.is_dev),
        relaxed_from,
    }
}

fn unresolved(output: &mut ResolveOutput, conflict: Conflict, kind: WarningKind) {
    let message = match kind {
        WarningKind::NoMatchingVersion => format!(
            "no available version satisfies {}",
            conflict
                .suggested
                .as_ref()
                .map_or_else(|| "*".to_string(), Constraint::to_string)
        ),
        _ => format!("needs manual resolution: {}", conflict.describe()),
    };
    output
        .warnings
        .push(Warning::new(kind, &conflict.package, message).logged());
    output.result.conflicts.push(conflict);
}

/// Normalize, detect conflicts and resolve in one serial pass.
pub async fn resolve_specs(
    specs: &[RawDependencySpec],
    oracle: &dyn VersionOracle,
    max_attempts: u32,
) -> ResolveOutput {
    let (sets, mut warnings) = normalize_all(specs);
    let groups = conflict::group(&sets);
    let conflicts: Vec<Conflict> = groups.iter().filter_map(conflict::detect_group).collect();
    debug!("{} packages, {} conflicting", groups.len(), conflicts.len());

    let mut output = Resolver::new(oracle, max_attempts)
        .resolve(&groups, &conflicts)
        .await;
    warnings.append(&mut output.warnings);
    output.warnings = warnings;
    output
}
