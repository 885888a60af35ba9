//! Grouping declarations by package and detecting unsatisfiable groups

use crate::normalize::{DependencyDeclaration, DependencySet};
use crate::version::Constraint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Above this many declarations the satisfiable-subset search turns greedy.
pub const EXACT_SEARCH_LIMIT: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    /// Settled, possibly after relaxation.
    Resolvable,
    /// Needs a human decision.
    Unresolvable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictReason {
    EmptyIntersection,
    Unparseable,
    NoMatchingVersion,
    OracleUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub package: String,
    pub declarations: Vec<DependencyDeclaration>,
    pub severity: Severity,
    pub reason: ConflictReason,
    /// Intersection of the largest satisfiable subset of declarations.
    pub suggested: Option<Constraint>,
}

impl Conflict {
    pub fn new(
        package: impl Into<String>,
        declarations: Vec<DependencyDeclaration>,
        reason: ConflictReason,
        suggested: Option<Constraint>,
    ) -> Self {
        Conflict {
            package: package.into(),
            declarations,
            severity: Severity::Unresolvable,
            reason,
            suggested,
        }
    }

    pub fn describe(&self) -> String {
        let parts: Vec<String> = self
            .declarations
            .iter()
            .map(|d| format!("{} ({})", d.source_label(), d.raw_constraint))
            .collect();
        parts.join(", ")
    }
}

/// Every declaration of one canonical package name, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageGroup {
    pub name: String,
    pub declarations: Vec<DependencyDeclaration>,
}

impl PackageGroup {
    /// Declarations taking part in automatic resolution.
    pub fn parseable(&self) -> Vec<&DependencyDeclaration> {
        self.declarations.iter().filter(|d| d.is_parseable()).collect()
    }

    pub fn constraints(&self) -> Vec<&Constraint> {
        self.declarations
            .iter()
            .filter_map(|d| d.constraint.as_ref())
            .collect()
    }
}

/// Group declarations by canonical name, in first-appearance order.
pub fn group(sets: &[DependencySet]) -> Vec<PackageGroup> {
    let mut groups: Vec<PackageGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for declaration in sets.iter().flat_map(|s| s.declarations.iter()) {
        match index.get(declaration.name.as_str()) {
            Some(&i) => groups[i].declarations.push(declaration.clone()),
            None => {
                index.insert(&declaration.name, groups.len());
                groups.push(PackageGroup {
                    name: declaration.name.clone(),
                    declarations: vec![declaration.clone()],
                });
            }
        }
    }
    groups
}

/// The largest subset of constraints with a non-empty intersection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subset {
    /// Indices into the input, ascending.
    pub members: Vec<usize>,
    /// Another subset of the same size is satisfiable too.
    pub tied: bool,
}

impl Subset {
    pub fn is_complete(&self, total: usize) -> bool {
        self.members.len() == total
    }
}

/// Search subsets by size, largest first, in lexicographic index order.
/// Exact up to `EXACT_SEARCH_LIMIT` constraints, greedy in input order beyond.
pub fn largest_satisfiable(constraints: &[&Constraint]) -> Subset {
    let n = constraints.len();
    let satisfiable = |members: &[usize]| {
        Constraint::intersect_all(members.iter().map(|i| constraints[*i])).is_satisfiable()
    };

    let all: Vec<usize> = (0..n).collect();
    if satisfiable(&all) {
        return Subset {
            members: all,
            tied: false,
        };
    }

    if n > EXACT_SEARCH_LIMIT {
        let mut members = Vec::new();
        for i in 0..n {
            members.push(i);
            if !satisfiable(&members) {
                members.pop();
            }
        }
        return Subset {
            members,
            tied: false,
        };
    }

    for size in (1..n).rev() {
        let mut found: Option<Vec<usize>> = None;
        let mut combination: Vec<usize> = (0..size).collect();
        loop {
            if satisfiable(&combination) {
                if found.is_some() {
                    return Subset {
                        members: found.unwrap_or_default(),
                        tied: true,
                    };
                }
                found = Some(combination.clone());
            }
            if !next_combination(&mut combination, n) {
                break;
            }
        }
        if let Some(members) = found {
            return Subset {
                members,
                tied: false,
            };
        }
    }

    Subset {
        members: Vec::new(),
        tied: false,
    }
}

/// Advance to the next k-combination of `0..n` in lexicographic order.
fn next_combination(combination: &mut [usize], n: usize) -> bool {
    let k = combination.len();
    let Some(i) = (0..k).rev().find(|&i| combination[i] < n - k + i) else {
        return false;
    };
    combination[i] += 1;
    for j in i + 1..k {
        combination[j] = combination[j - 1] + 1;
    }
    true
}

/// Conflict of one group, if it has one.
pub fn detect_group(group: &PackageGroup) -> Option<Conflict> {
    let constraints = group.constraints();

    if constraints.is_empty() {
        debug!("{}: no parseable declarations", group.name);
        return Some(Conflict::new(
            &group.name,
            group.declarations.clone(),
            ConflictReason::Unparseable,
            None,
        ));
    }

    if Constraint::intersect_all(constraints.iter().copied()).is_satisfiable() {
        return None;
    }

    let subset = largest_satisfiable(&constraints);
    let suggested = (!subset.members.is_empty()).then(|| {
        Constraint::intersect_all(subset.members.iter().map(|i| constraints[*i])).simplified()
    });
    debug!(
        "{}: {} declarations conflict, largest satisfiable subset has {}",
        group.name,
        constraints.len(),
        subset.members.len()
    );
    Some(Conflict::new(
        &group.name,
        group.declarations.clone(),
        ConflictReason::EmptyIntersection,
        suggested,
    ))
}

/// Conflicts across every set, in first-appearance order of their packages.
pub fn detect(sets: &[DependencySet]) -> Vec<Conflict> {
    group(sets).iter().filter_map(detect_group).collect()
}
