//! Version algebra: versions, constraint clauses and interval sets
//!
//! Versions are dotted numeric release segments compared with zero padding,
//! so `1.20` and `1.20.0` are the same version. Between any two distinct
//! versions there is always another one (append a segment), which makes a
//! constraint unsatisfiable only when its bounds cross or meet exclusively.

use crate::error::{Result, VersionError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Bound;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    segments: Vec<u64>,
}

impl Version {
    pub fn new(segments: Vec<u64>) -> Self {
        if segments.is_empty() {
            return Version { segments: vec![0] };
        }
        Version { segments }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        if digits.is_empty() {
            return Err(VersionError::InvalidVersion(text.to_string()));
        }
        let segments = digits
            .split('.')
            .map(|segment| {
                if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(VersionError::InvalidVersion(text.to_string()));
                }
                segment
                    .parse::<u64>()
                    .map_err(|_| VersionError::InvalidVersion(text.to_string()))
            })
            .collect::<Result<Vec<u64>>>()?;
        Ok(Version { segments })
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    fn segment(&self, index: usize) -> u64 {
        self.segments.get(index).copied().unwrap_or(0)
    }

    /// Smallest version above every version sharing the first `index + 1` segments.
    ///
    /// `1.4.2`.bump(1) is `1.5`, `0.3`.bump(0) is `1`.
    pub fn bump(&self, index: usize) -> Version {
        let mut segments: Vec<u64> = (0..=index).map(|i| self.segment(i)).collect();
        segments[index] = segments[index].saturating_add(1);
        Version { segments }
    }

    fn significant(&self) -> &[u64] {
        let len = self
            .segments
            .iter()
            .rposition(|s| *s != 0)
            .map_or(0, |i| i + 1);
        &self.segments[..len]
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        (0..len)
            .map(|i| self.segment(i).cmp(&other.segment(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.segments.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self> {
        Version::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Op {
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
}

impl Op {
    pub fn symbol(&self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Ge => ">=",
            Op::Gt => ">",
            Op::Le => "<=",
            Op::Lt => "<",
        }
    }

    fn is_lower(&self) -> bool {
        matches!(self, Op::Ge | Op::Gt)
    }

    fn is_upper(&self) -> bool {
        matches!(self, Op::Le | Op::Lt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Clause {
    pub op: Op,
    pub version: Version,
}

impl Clause {
    pub fn new(op: Op, version: Version) -> Self {
        Clause { op, version }
    }

    pub fn matches(&self, version: &Version) -> bool {
        match self.op {
            Op::Eq => version == &self.version,
            Op::Ne => version != &self.version,
            Op::Ge => version >= &self.version,
            Op::Gt => version > &self.version,
            Op::Le => version <= &self.version,
            Op::Lt => version < &self.version,
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.symbol(), self.version)
    }
}

/// What a version written without an operator means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BareVersion {
    /// `1.2` means `==1.2` (pip, npm).
    #[default]
    Exact,
    /// `1.2` means `^1.2` (cargo).
    Caret,
}

/// How tightly a constraint pins a package. Narrowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Narrowness {
    Pin,
    Range,
    OneSided,
    Open,
}

/// Conjunction of clauses. No clauses means any version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Constraint {
    clauses: Vec<Clause>,
}

// Longest first so `>=` is not read as `>`
const OPERATORS: &[&str] = &["===", "==", "!=", ">=", "<=", "~=", ">", "<", "^", "~", "="];

impl Constraint {
    pub fn any() -> Self {
        Constraint::default()
    }

    pub fn from_clauses(clauses: Vec<Clause>) -> Self {
        Constraint { clauses }
    }

    /// Parse a comma or whitespace separated list of clauses.
    pub fn parse(text: &str, bare: BareVersion) -> Result<Self> {
        let mut clauses = Vec::new();
        let mut tokens = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty());

        while let Some(token) = tokens.next() {
            let mut token = token.to_string();
            if OPERATORS.contains(&token.as_str()) {
                // `>= 1.0`: the version is the next token
                let Some(next) = tokens.next() else {
                    return Err(invalid(text, "operator without a version"));
                };
                token.push_str(next);
            }
            parse_clause(text, &token, bare, &mut clauses)?;
        }
        Ok(Constraint { clauses })
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_any(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.clauses.iter().all(|c| c.matches(version))
    }

    pub fn intersect(&self, other: &Constraint) -> Constraint {
        let mut clauses = self.clauses.clone();
        clauses.extend(other.clauses.iter().cloned());
        Constraint { clauses }
    }

    pub fn intersect_all<'a>(constraints: impl IntoIterator<Item = &'a Constraint>) -> Constraint {
        Constraint {
            clauses: constraints
                .into_iter()
                .flat_map(|c| c.clauses.iter().cloned())
                .collect(),
        }
    }

    pub fn is_satisfiable(&self) -> bool {
        !VersionSet::from_constraint(self).is_empty()
    }

    /// Equivalent constraint with redundant clauses removed.
    ///
    /// Unsatisfiable constraints are returned unchanged.
    pub fn simplified(&self) -> Constraint {
        if !self.is_satisfiable() {
            return self.clone();
        }
        if let Some(pin) = self.clauses.iter().find(|c| c.op == Op::Eq) {
            return Constraint {
                clauses: vec![pin.clone()],
            };
        }

        let lower = self
            .clauses
            .iter()
            .filter(|c| c.op.is_lower())
            .fold(None::<&Clause>, |best, c| match best {
                Some(b) if b.version > c.version || (b.version == c.version && b.op == Op::Gt) => Some(b),
                _ => Some(c),
            });
        let upper = self
            .clauses
            .iter()
            .filter(|c| c.op.is_upper())
            .fold(None::<&Clause>, |best, c| match best {
                Some(b) if b.version < c.version || (b.version == c.version && b.op == Op::Lt) => Some(b),
                _ => Some(c),
            });

        if let (Some(l), Some(u)) = (lower, upper) {
            if l.version == u.version {
                return Constraint {
                    clauses: vec![Clause::new(Op::Eq, l.version.clone())],
                };
            }
        }

        let mut excluded: Vec<&Clause> = self
            .clauses
            .iter()
            .filter(|c| c.op == Op::Ne)
            .filter(|c| lower.is_none_or(|l| l.matches(&c.version)))
            .filter(|c| upper.is_none_or(|u| u.matches(&c.version)))
            .collect();
        excluded.sort_by(|a, b| a.version.cmp(&b.version));
        excluded.dedup_by(|a, b| a.version == b.version);

        let clauses = lower
            .into_iter()
            .chain(upper)
            .chain(excluded)
            .cloned()
            .collect();
        Constraint { clauses }
    }

    pub fn narrowness(&self) -> Narrowness {
        let has = |f: fn(&Op) -> bool| self.clauses.iter().any(|c| f(&c.op));
        if has(|op| *op == Op::Eq) {
            Narrowness::Pin
        } else if has(Op::is_lower) && has(Op::is_upper) {
            Narrowness::Range
        } else if self.is_any() {
            Narrowness::Open
        } else {
            Narrowness::OneSided
        }
    }

    /// Loosen by one step: pins become lower bounds, then upper bounds go,
    /// then exclusions, then lower bounds. `None` once nothing is left.
    pub fn widen(&self) -> Option<Constraint> {
        let has = |f: fn(&Op) -> bool| self.clauses.iter().any(|c| f(&c.op));
        let clauses: Vec<Clause> = if has(|op| *op == Op::Eq) {
            self.clauses
                .iter()
                .map(|c| match c.op {
                    Op::Eq => Clause::new(Op::Ge, c.version.clone()),
                    _ => c.clone(),
                })
                .collect()
        } else if has(Op::is_upper) {
            self.clauses.iter().filter(|c| !c.op.is_upper()).cloned().collect()
        } else if has(|op| *op == Op::Ne) {
            self.clauses.iter().filter(|c| c.op != Op::Ne).cloned().collect()
        } else if has(Op::is_lower) {
            self.clauses.iter().filter(|c| !c.op.is_lower()).cloned().collect()
        } else {
            return None;
        };
        Some(Constraint { clauses })
    }
}

fn invalid(text: &str, reason: &str) -> VersionError {
    VersionError::InvalidConstraint {
        text: text.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_clause(text: &str, token: &str, bare: BareVersion, out: &mut Vec<Clause>) -> Result<()> {
    if token == "*" || token.eq_ignore_ascii_case("x") {
        return Ok(());
    }

    let (operator, rest) = OPERATORS
        .iter()
        .find_map(|op| token.strip_prefix(op).map(|rest| (*op, rest)))
        .unwrap_or(("", token));
    if rest.is_empty() {
        return Err(invalid(text, "operator without a version"));
    }

    let wildcard = [".*", ".x", ".X"].iter().find_map(|w| rest.strip_suffix(w));
    if let Some(prefix) = wildcard.or(if rest == "*" { Some("") } else { None }) {
        return match operator {
            "" | "==" | "===" | "=" | "^" | "~" => {
                if prefix.is_empty() {
                    return Ok(());
                }
                let base = Version::parse(prefix)?;
                let upper = base.bump(base.segments().len() - 1);
                out.push(Clause::new(Op::Ge, base));
                out.push(Clause::new(Op::Lt, upper));
                Ok(())
            }
            ">=" if prefix.is_empty() => Ok(()),
            _ => Err(invalid(text, "wildcard not allowed with this operator")),
        };
    }

    let version = Version::parse(rest)?;
    match operator {
        "==" | "===" | "=" => out.push(Clause::new(Op::Eq, version)),
        "!=" => out.push(Clause::new(Op::Ne, version)),
        ">=" => out.push(Clause::new(Op::Ge, version)),
        ">" => out.push(Clause::new(Op::Gt, version)),
        "<=" => out.push(Clause::new(Op::Le, version)),
        "<" => out.push(Clause::new(Op::Lt, version)),
        "~=" => {
            let len = version.segments().len();
            if len < 2 {
                return Err(invalid(text, "`~=` needs at least two release segments"));
            }
            let upper = version.bump(len - 2);
            out.push(Clause::new(Op::Ge, version));
            out.push(Clause::new(Op::Lt, upper));
        }
        "^" => push_caret(version, out),
        "~" => {
            let index = if version.segments().len() >= 2 { 1 } else { 0 };
            let upper = version.bump(index);
            out.push(Clause::new(Op::Ge, version));
            out.push(Clause::new(Op::Lt, upper));
        }
        _ => match bare {
            BareVersion::Exact => out.push(Clause::new(Op::Eq, version)),
            BareVersion::Caret => push_caret(version, out),
        },
    }
    Ok(())
}

fn push_caret(version: Version, out: &mut Vec<Clause>) {
    let segments = version.segments();
    let index = segments
        .iter()
        .position(|s| *s != 0)
        .unwrap_or(segments.len() - 1);
    let upper = version.bump(index);
    out.push(Clause::new(Op::Ge, version));
    out.push(Clause::new(Op::Lt, upper));
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return write!(f, "*");
        }
        let parts: Vec<String> = self.clauses.iter().map(Clause::to_string).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for Constraint {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self> {
        Constraint::parse(s, BareVersion::Exact)
    }
}

impl TryFrom<String> for Constraint {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Constraint> for String {
    fn from(constraint: Constraint) -> Self {
        constraint.to_string()
    }
}

/// Union of disjoint version intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSet {
    intervals: Vec<(Bound<Version>, Bound<Version>)>,
}

impl VersionSet {
    pub fn all() -> Self {
        VersionSet {
            intervals: vec![(Bound::Unbounded, Bound::Unbounded)],
        }
    }

    pub fn from_constraint(constraint: &Constraint) -> Self {
        constraint
            .clauses()
            .iter()
            .fold(VersionSet::all(), |set, clause| set.restrict(clause))
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.intervals
            .iter()
            .any(|(lower, upper)| contains(lower, upper, version))
    }

    fn restrict(self, clause: &Clause) -> Self {
        let v = clause.version.clone();
        let (lower, upper) = match clause.op {
            Op::Eq => (Bound::Included(v.clone()), Bound::Included(v)),
            Op::Ge => (Bound::Included(v), Bound::Unbounded),
            Op::Gt => (Bound::Excluded(v), Bound::Unbounded),
            Op::Le => (Bound::Unbounded, Bound::Included(v)),
            Op::Lt => (Bound::Unbounded, Bound::Excluded(v)),
            Op::Ne => return self.remove_point(&v),
        };

        let intervals = self
            .intervals
            .into_iter()
            .map(|(lo, hi)| (tighter_lower(lo, lower.clone()), tighter_upper(hi, upper.clone())))
            .filter(|(lo, hi)| non_empty(lo, hi))
            .collect();
        VersionSet { intervals }
    }

    fn remove_point(self, point: &Version) -> Self {
        let mut intervals = Vec::with_capacity(self.intervals.len() + 1);
        for (lo, hi) in self.intervals {
            if !contains(&lo, &hi, point) {
                intervals.push((lo, hi));
                continue;
            }
            let left = (lo, Bound::Excluded(point.clone()));
            let right = (Bound::Excluded(point.clone()), hi);
            for piece in [left, right] {
                if non_empty(&piece.0, &piece.1) {
                    intervals.push(piece);
                }
            }
        }
        VersionSet { intervals }
    }
}

fn contains(lower: &Bound<Version>, upper: &Bound<Version>, v: &Version) -> bool {
    let above = match lower {
        Bound::Unbounded => true,
        Bound::Included(l) => v >= l,
        Bound::Excluded(l) => v > l,
    };
    let below = match upper {
        Bound::Unbounded => true,
        Bound::Included(u) => v <= u,
        Bound::Excluded(u) => v < u,
    };
    above && below
}

fn tighter_lower(a: Bound<Version>, b: Bound<Version>) -> Bound<Version> {
    let keep_a = match (&a, &b) {
        (Bound::Unbounded, _) => false,
        (_, Bound::Unbounded) => true,
        (Bound::Included(x) | Bound::Excluded(x), Bound::Included(y) | Bound::Excluded(y)) => {
            match x.cmp(y) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => matches!(a, Bound::Excluded(_)),
            }
        }
    };
    if keep_a { a } else { b }
}

fn tighter_upper(a: Bound<Version>, b: Bound<Version>) -> Bound<Version> {
    let keep_a = match (&a, &b) {
        (Bound::Unbounded, _) => false,
        (_, Bound::Unbounded) => true,
        (Bound::Included(x) | Bound::Excluded(x), Bound::Included(y) | Bound::Excluded(y)) => {
            match x.cmp(y) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => matches!(a, Bound::Excluded(_)),
            }
        }
    };
    if keep_a { a } else { b }
}

fn non_empty(lower: &Bound<Version>, upper: &Bound<Version>) -> bool {
    match (lower, upper) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => true,
        (Bound::Included(l), Bound::Included(u)) => l <= u,
        (Bound::Included(l) | Bound::Excluded(l), Bound::Included(u) | Bound::Excluded(u)) => l < u,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    fn c(text: &str) -> Constraint {
        text.parse().unwrap()
    }

    #[test]
    fn test_version_padding_and_order() {
        assert_eq!(v("1.20"), v("1.20.0"));
        assert_eq!(v("v2"), v("2.0.0"));
        assert!(v("1.9") < v("1.10"));
        assert!(v("1.0.0.1") > v("1"));
        assert_eq!(v("1.20").to_string(), "1.20");
        assert!(Version::parse("1.2a").is_err());
        assert!(Version::parse("1..2").is_err());
        assert!(Version::parse("").is_err());
    }

    #[test]
    fn test_bump() {
        assert_eq!(v("1.4.2").bump(1), v("1.5"));
        assert_eq!(v("0.3").bump(0), v("1"));
        assert_eq!(v("2").bump(2), v("2.0.1"));
    }

    #[test]
    fn test_desugared_forms() {
        insta::assert_snapshot!(c("~=1.4.2").to_string(), @">=1.4.2,<1.5");
        insta::assert_snapshot!(c("^1.2.3").to_string(), @">=1.2.3,<2");
        insta::assert_snapshot!(c("^0.2.3").to_string(), @">=0.2.3,<0.3");
        insta::assert_snapshot!(c("~1.2.3").to_string(), @">=1.2.3,<1.3");
        insta::assert_snapshot!(c("==1.2.*").to_string(), @">=1.2,<1.3");
        insta::assert_snapshot!(c(">= 2.0, < 3.0").to_string(), @">=2.0,<3.0");
        insta::assert_snapshot!(c("*").to_string(), @"*");
        insta::assert_snapshot!(Constraint::parse("1.2", BareVersion::Caret).unwrap().to_string(), @">=1.2,<2");
    }

    #[test]
    fn test_malformed_constraints() {
        assert!("~=1".parse::<Constraint>().is_err());
        assert!(">=".parse::<Constraint>().is_err());
        assert!("!=1.2.*".parse::<Constraint>().is_err());
        assert!("1.0 || 2.0".parse::<Constraint>().is_err());
        assert!(">=banana".parse::<Constraint>().is_err());
    }

    #[test]
    fn test_satisfiability() {
        assert!(c(">=2.0,<3.0,>=2.5").is_satisfiable());
        assert!(!c("==1.20,>=1.24").is_satisfiable());
        assert!(!c(">=2,<2").is_satisfiable());
        assert!(c(">=2,<=2").is_satisfiable());
        assert!(!c("==1.0,!=1.0.0").is_satisfiable());
        assert!(c(">1.0,<1.0.1").is_satisfiable());
        assert!(!c(">1,<=1").is_satisfiable());
    }

    #[test]
    fn test_version_set_holes() {
        let set = VersionSet::from_constraint(&c(">=1.0,<2.0,!=1.5"));
        assert!(set.contains(&v("1.4")));
        assert!(!set.contains(&v("1.5.0")));
        assert!(set.contains(&v("1.5.1")));
        assert!(!set.contains(&v("2.0")));
    }

    #[test]
    fn test_simplified() {
        assert_eq!(c(">=2.0,<3.0,>=2.5").simplified().to_string(), ">=2.5,<3.0");
        assert_eq!(c(">=1,<=1").simplified().to_string(), "==1");
        assert_eq!(c(">=1,!=0.5,!=1.2,!=1.2").simplified().to_string(), ">=1,!=1.2");
        assert_eq!(c(">1,>=1").simplified().to_string(), ">1");
    }

    #[test]
    fn test_widen_steps() {
        let pinned = c("==1.20,!=1.21");
        let step1 = pinned.widen().unwrap();
        assert_eq!(step1.to_string(), ">=1.20,!=1.21");
        let ranged = c(">=1.0,<2.0,!=1.5");
        let step2 = ranged.widen().unwrap();
        assert_eq!(step2.to_string(), ">=1.0,!=1.5");
        let step3 = step2.widen().unwrap();
        assert_eq!(step3.to_string(), ">=1.0");
        let step4 = step3.widen().unwrap();
        assert!(step4.is_any());
        assert_eq!(step4.widen(), None);
    }

    #[test]
    fn test_narrowness_order() {
        assert_eq!(c("==1.0").narrowness(), Narrowness::Pin);
        assert_eq!(c(">=1,<2").narrowness(), Narrowness::Range);
        assert_eq!(c(">=1").narrowness(), Narrowness::OneSided);
        assert_eq!(c("*").narrowness(), Narrowness::Open);
        assert!(Narrowness::Pin < Narrowness::Range);
    }
}
